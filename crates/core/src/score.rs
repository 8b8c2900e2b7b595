//! Leaderboard scoring and ranking.
//!
//! `rank` is a pure function of its inputs: the same candidate set, mode,
//! and reference time always produce the identical ordered output. All
//! tie-breaks are deterministic and documented on [`rank`].

use std::collections::HashMap;

use crate::event::Event;
use crate::pow::leading_zero_bits;

/// Seconds of age that cost one bit of score in decayed mode (3 days).
pub const DECAY_SECONDS_PER_BIT: u64 = 259_200;
/// Minimum proof-of-work accepted by the decayed leaderboard.
pub const DECAY_MIN_BITS: u32 = 4;
/// Leaderboard length in raw mode.
pub const RAW_TOP_N: usize = 10;
/// Leaderboard length in decayed mode.
pub const DECAYED_TOP_N: usize = 25;
/// Characters of content kept for the preview column.
const PREVIEW_CHARS: usize = 48;

/// How submissions are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    /// Score is the raw difficulty: leading zero bits of the id.
    Raw,
    /// Difficulty minus one bit per three days of age. May go negative;
    /// entries below [`DECAY_MIN_BITS`] of raw difficulty are dropped.
    Decayed,
}

impl ScoreMode {
    /// Default leaderboard length for this mode.
    pub fn top_n(self) -> usize {
        match self {
            ScoreMode::Raw => RAW_TOP_N,
            ScoreMode::Decayed => DECAYED_TOP_N,
        }
    }

    /// Raw-difficulty floor below which candidates are discarded.
    pub fn min_bits(self) -> u32 {
        match self {
            ScoreMode::Raw => 0,
            ScoreMode::Decayed => DECAY_MIN_BITS,
        }
    }
}

/// A fetched note reduced to the fields ranking needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub content: String,
}

impl From<&Event> for Candidate {
    fn from(ev: &Event) -> Self {
        Self {
            id: ev.id.clone(),
            pubkey: ev.pubkey.clone(),
            created_at: ev.created_at,
            content: ev.content.clone(),
        }
    }
}

/// One ranked note, the best submission of its author.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedNote {
    pub pubkey: String,
    pub id: String,
    /// Raw difficulty of the id.
    pub pow: u32,
    /// Ranking score: `pow` in raw mode, decayed in decayed mode.
    pub score: f64,
    pub created_at: u64,
    /// Truncated content for display.
    pub preview: String,
    pub age_days: f64,
}

/// Rank candidates into a leaderboard of at most `top_n` entries.
///
/// Pipeline: score each candidate (dropping those under the mode's raw
/// floor), keep each author's best, sort, truncate. Ordering is fully
/// deterministic: the per-author best is the highest score, ties going to
/// the earlier `created_at` and then the smaller id; the final sort is
/// score descending with equal scores ordered by id ascending.
pub fn rank(candidates: &[Candidate], mode: ScoreMode, top_n: usize, now: u64) -> Vec<RankedNote> {
    let mut best: HashMap<&str, RankedNote> = HashMap::new();

    for candidate in candidates {
        let pow = leading_zero_bits(&candidate.id);
        if pow < mode.min_bits() {
            continue;
        }
        let age = now.saturating_sub(candidate.created_at);
        let score = match mode {
            ScoreMode::Raw => pow as f64,
            ScoreMode::Decayed => pow as f64 - age as f64 / DECAY_SECONDS_PER_BIT as f64,
        };
        let entry = RankedNote {
            pubkey: candidate.pubkey.clone(),
            id: candidate.id.clone(),
            pow,
            score,
            created_at: candidate.created_at,
            preview: preview(&candidate.content),
            age_days: age as f64 / 86_400.0,
        };
        match best.get(candidate.pubkey.as_str()) {
            Some(incumbent) if !beats(&entry, incumbent) => {}
            _ => {
                best.insert(candidate.pubkey.as_str(), entry);
            }
        }
    }

    let mut out: Vec<RankedNote> = best.into_values().collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    out.truncate(top_n);
    out
}

/// Higher score wins; ties fall to the earlier note, then the smaller id.
fn beats(candidate: &RankedNote, incumbent: &RankedNote) -> bool {
    candidate
        .score
        .total_cmp(&incumbent.score)
        .then(incumbent.created_at.cmp(&candidate.created_at))
        .then(incumbent.id.cmp(&candidate.id))
        .is_gt()
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
