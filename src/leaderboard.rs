//! Leaderboard assembly: fetch notes, rank them, resolve author names.
//!
//! A refresh is a generation-guarded pipeline: `begin` hands out a ticket,
//! `apply` turns fetched events into entries only if no newer refresh has
//! started since. Profile names are resolved through a bounded cache so an
//! unreachable author never wedges the board.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde_json::Value;

use powstr_core::{rank, Candidate, Event, RankedNote, ScoreMode, KIND_METADATA, KIND_TEXT_NOTE};

use crate::relay::{Filter, RelayClient, RelayError};

/// Notes requested per refresh.
pub const FETCH_LIMIT: usize = 500;
/// Seconds before an unresolved profile is retried.
const PROFILE_RETRY_SECS: u64 = 5;
/// Lookups attempted per profile before settling on the fallback.
const PROFILE_MAX_ATTEMPTS: u32 = 3;
/// Pubkey characters shown when no profile name resolves.
const FALLBACK_CHARS: usize = 8;

/// One row of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Profile name, or a truncated pubkey until one resolves.
    pub display_name: String,
    pub note: RankedNote,
}

struct ProfileEntry {
    resolved: bool,
    name: Option<String>,
    last_attempt: u64,
    attempts: u32,
}

/// Per-author name cache with retry pacing and an attempt ceiling.
#[derive(Default)]
pub struct ProfileCache {
    entries: HashMap<String, ProfileEntry>,
}

impl ProfileCache {
    /// Whether a lookup for this author should be issued now.
    pub fn due(&self, pubkey: &str, now: u64) -> bool {
        match self.entries.get(pubkey) {
            None => true,
            Some(e) => {
                !e.resolved
                    && e.attempts < PROFILE_MAX_ATTEMPTS
                    && now.saturating_sub(e.last_attempt) >= PROFILE_RETRY_SECS
            }
        }
    }

    pub fn record_attempt(&mut self, pubkey: &str, now: u64) {
        let entry = self.entries.entry(pubkey.to_string()).or_insert(ProfileEntry {
            resolved: false,
            name: None,
            last_attempt: now,
            attempts: 0,
        });
        entry.last_attempt = now;
        entry.attempts += 1;
    }

    pub fn record_name(&mut self, pubkey: &str, name: String, now: u64) {
        self.entries.insert(
            pubkey.to_string(),
            ProfileEntry {
                resolved: true,
                name: Some(name),
                last_attempt: now,
                attempts: 0,
            },
        );
    }

    /// Resolved name, or the truncated-pubkey fallback.
    pub fn display_name(&self, pubkey: &str) -> String {
        match self.entries.get(pubkey).and_then(|e| e.name.as_deref()) {
            Some(name) => name.to_string(),
            None => pubkey.chars().take(FALLBACK_CHARS).collect(),
        }
    }
}

/// Ticket tying an in-flight refresh to the generation that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

/// Leaderboard state: the current entries plus the profile cache.
#[derive(Default)]
pub struct Leaderboard {
    generation: u64,
    profiles: ProfileCache,
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// Start a refresh. Any refresh begun earlier is superseded: its
    /// `apply` becomes a no-op.
    pub fn begin(&mut self) -> RefreshTicket {
        self.generation += 1;
        RefreshTicket(self.generation)
    }

    /// Rank fetched events into entries. Returns `None` without touching
    /// the board when the ticket is stale.
    pub fn apply(
        &mut self,
        ticket: RefreshTicket,
        events: &[Event],
        mode: ScoreMode,
        top_n: usize,
        now: u64,
    ) -> Option<&[LeaderboardEntry]> {
        if ticket.0 != self.generation {
            debug!("discarding stale refresh (generation {})", ticket.0);
            return None;
        }
        let candidates: Vec<Candidate> = events.iter().map(Candidate::from).collect();
        self.entries = rank(&candidates, mode, top_n, now)
            .into_iter()
            .enumerate()
            .map(|(i, note)| LeaderboardEntry {
                rank: i + 1,
                display_name: self.profiles.display_name(&note.pubkey),
                note,
            })
            .collect();
        Some(&self.entries)
    }

    /// Fetch kind-0 profiles for authors whose names are still unresolved
    /// and patch the entries in place.
    pub async fn resolve_names(
        &mut self,
        client: &mut RelayClient,
        now: u64,
    ) -> Result<(), RelayError> {
        let due: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.note.pubkey.clone())
            .filter(|pk| self.profiles.due(pk, now))
            .collect();
        if due.is_empty() {
            return Ok(());
        }
        for pk in &due {
            self.profiles.record_attempt(pk, now);
        }

        let filter = Filter::kind(KIND_METADATA).authors(due);
        for event in client.fetch_events(&filter).await? {
            if let Some(name) = profile_name(&event.content) {
                self.profiles.record_name(&event.pubkey, name, now);
            }
        }
        for entry in &mut self.entries {
            entry.display_name = self.profiles.display_name(&entry.note.pubkey);
        }
        Ok(())
    }

    /// Full refresh: fetch, rank, resolve names. Name resolution is
    /// best-effort; a failure there keeps the ranked board with its
    /// fallback names.
    pub async fn refresh(
        &mut self,
        client: &mut RelayClient,
        mode: ScoreMode,
        top_n: usize,
    ) -> Result<&[LeaderboardEntry], RelayError> {
        let ticket = self.begin();
        let filter = Filter::kind(KIND_TEXT_NOTE).limit(FETCH_LIMIT);
        let events = client.fetch_events(&filter).await?;
        let now = unix_now();
        self.apply(ticket, &events, mode, top_n, now);
        if let Err(e) = self.resolve_names(client, now).await {
            warn!("profile resolution failed: {e}");
        }
        Ok(&self.entries)
    }
}

/// Extract a display name from kind-0 profile JSON. Checks
/// `display_name`, then `displayName`, then `name`.
pub fn profile_name(content: &str) -> Option<String> {
    let profile: Value = serde_json::from_str(content).ok()?;
    for key in ["display_name", "displayName", "name"] {
        if let Some(name) = profile.get(key).and_then(Value::as_str) {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
