//! powstr: mine proof-of-work notes, publish them to relays, and rank
//! them on a leaderboard.
//!
//! The event model, difficulty scoring, and ranking live in
//! [`powstr_core`], re-exported here as [`protocol`]. This crate adds the
//! background miner, the relay client, the signing identity, and the
//! leaderboard service on top.

pub use powstr_core as protocol;

pub mod keys;
pub mod leaderboard;
pub mod miner;
pub mod relay;

pub use miner::{
    Clock, FixedClock, MineError, MinedNote, Miner, MinerEvent, MinerHandle, Progress, SystemClock,
};
pub use powstr_core::{
    leading_zero_bits, meets_difficulty, rank, Candidate, Event, EventTemplate, RankedNote,
    ScoreMode,
};
