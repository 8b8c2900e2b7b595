//! # powstr-core
//!
//! Proof-of-work primitives for Nostr notes.
//!
//! This crate is the pure algorithm layer shared by the native miner and
//! the browser (wasm) worker: no I/O, no clocks, no async. It provides
//!
//! - the event model and the canonical NIP-01 identifier (SHA-256 over
//!   `[0, pubkey, created_at, kind, tags, content]`),
//! - NIP-13 difficulty scoring (leading zero bits of the hex id),
//! - the leaderboard ranking pipeline (raw and time-decayed scoring,
//!   dedup by author, deterministic ordering, top-N truncation).
//!
//! ## Example
//!
//! ```rust
//! use powstr_core::{leading_zero_bits, meets_difficulty, EventTemplate};
//!
//! let mut template = EventTemplate::text_note("a".repeat(64), "hello", 8, 1_700_000_000);
//! template.set_nonce(42).unwrap();
//!
//! let id = template.id();
//! assert_eq!(id.len(), 64);
//!
//! if meets_difficulty(&id, 8) {
//!     println!("mined a note with {} leading zero bits", leading_zero_bits(&id));
//! }
//! ```

pub mod event;
pub mod pow;
pub mod score;

pub use event::{Event, EventError, EventTemplate, Tag, KIND_METADATA, KIND_TEXT_NOTE, NONCE_TAG};
pub use pow::{leading_zero_bits, meets_difficulty};
pub use score::{
    rank, Candidate, RankedNote, ScoreMode, DECAYED_TOP_N, DECAY_MIN_BITS, DECAY_SECONDS_PER_BIT,
    RAW_TOP_N,
};

#[cfg(test)]
mod tests;
