//! Nostr event model and canonical identifiers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Kind number for plain text notes.
pub const KIND_TEXT_NOTE: u32 = 1;
/// Kind number reserved for profile metadata documents.
pub const KIND_METADATA: u32 = 0;
/// Tag name of the nonce carrier mutated during mining.
pub const NONCE_TAG: &str = "nonce";

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// The first element names the tag, the rest carry data. The miner only
/// cares about the `nonce` tag, `["nonce", "<decimal nonce>", "<target>"]`,
/// but arbitrary tags are preserved verbatim so they stay part of the
/// hashed serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// The nonce carrier. The third field records the declared target
    /// difficulty so verifiers can reject lucky low-target hits.
    pub fn nonce(nonce: u64, target_difficulty: u32) -> Self {
        Tag(vec![
            NONCE_TAG.to_string(),
            nonce.to_string(),
            target_difficulty.to_string(),
        ])
    }

    /// Tag name, e.g. `nonce` or `t`.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// First data element.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

/// Template validity errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("template has no nonce tag")]
    MissingNonce,
    #[error("template has {0} nonce tags, expected exactly one")]
    DuplicateNonce(usize),
    #[error("nonce tag has no value element")]
    MalformedNonce,
}

/// The unsigned candidate an author mines over.
///
/// Exactly one tag must be the nonce carrier; its value is rewritten once
/// per mining attempt. Everything here feeds the canonical hash, so any
/// field change produces a fresh identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventTemplate {
    /// Author public key (hex, x-only).
    pub pubkey: String,
    /// Unix timestamp of creation (seconds).
    pub created_at: u64,
    /// Kind number, e.g. `1` for text notes.
    pub kind: u32,
    /// Tags, including the nonce carrier.
    pub tags: Vec<Tag>,
    /// Free-text content body.
    pub content: String,
}

impl EventTemplate {
    /// A kind-1 note ready for mining, with the nonce tag first.
    pub fn text_note(
        pubkey: impl Into<String>,
        content: impl Into<String>,
        target_difficulty: u32,
        created_at: u64,
    ) -> Self {
        Self {
            pubkey: pubkey.into(),
            created_at,
            kind: KIND_TEXT_NOTE,
            tags: vec![Tag::nonce(0, target_difficulty)],
            content: content.into(),
        }
    }

    /// Index of the nonce carrier tag. Exactly one must be present and it
    /// must carry a value slot, so writing a nonce into it cannot fail.
    pub fn nonce_index(&self) -> Result<usize, EventError> {
        let mut found = None;
        let mut count = 0;
        for (i, tag) in self.tags.iter().enumerate() {
            if tag.name() == Some(NONCE_TAG) {
                count += 1;
                found.get_or_insert(i);
            }
        }
        match (found, count) {
            (Some(i), 1) if self.tags[i].0.len() >= 2 => Ok(i),
            (Some(_), 1) => Err(EventError::MalformedNonce),
            (None, _) => Err(EventError::MissingNonce),
            (_, n) => Err(EventError::DuplicateNonce(n)),
        }
    }

    /// Write `nonce` into the nonce tag as its decimal string form.
    pub fn set_nonce(&mut self, nonce: u64) -> Result<(), EventError> {
        let idx = self.nonce_index()?;
        self.tags[idx].0[1] = nonce.to_string();
        Ok(())
    }

    /// Current nonce tag value, if the tag exists.
    pub fn nonce_value(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name() == Some(NONCE_TAG))
            .and_then(Tag::value)
    }

    /// Canonical 32-byte event hash per NIP-01: SHA-256 over the compact
    /// JSON serialization `[0, pubkey, created_at, kind, tags, content]`.
    pub fn id_bytes(&self) -> [u8; 32] {
        let canonical = serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ])
        .to_string();
        Sha256::digest(canonical.as_bytes()).into()
    }

    /// Hex event identifier.
    pub fn id(&self) -> String {
        hex::encode(self.id_bytes())
    }

    /// Attach the settled id and signature, producing the wire event.
    pub fn finalize(self, id: String, sig: String) -> Event {
        Event {
            id,
            pubkey: self.pubkey,
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags,
            content: self.content,
            sig,
        }
    }
}

/// A finalized, signed note as relays exchange it.
///
/// ```json
/// {
///   "id": "00a1...",
///   "pubkey": "8f2a...",
///   "kind": 1,
///   "created_at": 1700000000,
///   "tags": [["nonce", "91414", "20"]],
///   "content": "hello",
///   "sig": "deadbeef..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Event identifier (hex of the canonical SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Tags, nonce carrier included.
    pub tags: Vec<Tag>,
    /// Content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}
