//! Tests for event identifiers, difficulty scoring, and ranking.

use sha2::{Digest, Sha256};

use crate::{
    leading_zero_bits, meets_difficulty, rank, Candidate, EventError, EventTemplate, ScoreMode,
    Tag, DECAY_SECONDS_PER_BIT, NONCE_TAG,
};

const PUBKEY: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

fn sample_template(content: &str, difficulty: u32) -> EventTemplate {
    EventTemplate::text_note(PUBKEY, content, difficulty, 1_700_000_000)
}

fn candidate(id: &str, pubkey: &str, created_at: u64) -> Candidate {
    Candidate {
        id: id.to_string(),
        pubkey: pubkey.to_string(),
        created_at,
        content: format!("note by {pubkey}"),
    }
}

#[test]
fn test_id_is_deterministic() {
    let template = sample_template("test input data", 8);
    let id = template.id();

    assert_eq!(id.len(), 64);
    assert_eq!(id, template.id());
}

#[test]
fn test_id_changes_with_any_field() {
    let base = sample_template("same content", 8);

    let mut nonce_changed = base.clone();
    nonce_changed.set_nonce(1).unwrap();

    let mut time_changed = base.clone();
    time_changed.created_at += 1;

    let mut content_changed = base.clone();
    content_changed.content.push('!');

    assert_ne!(base.id(), nonce_changed.id());
    assert_ne!(base.id(), time_changed.id());
    assert_ne!(base.id(), content_changed.id());
}

#[test]
fn test_id_matches_canonical_serialization() {
    let mut template = sample_template("hi", 8);
    template.set_nonce(5).unwrap();

    let canonical = format!(r#"[0,"{PUBKEY}",1700000000,1,[["nonce","5","8"]],"hi"]"#);
    let expected = hex::encode(Sha256::digest(canonical.as_bytes()));

    assert_eq!(template.id(), expected);
}

#[test]
fn test_exactly_one_nonce_tag() {
    let mut template = sample_template("x", 8);
    assert_eq!(template.nonce_index(), Ok(0));

    template.tags.push(Tag::nonce(0, 8));
    assert_eq!(template.nonce_index(), Err(EventError::DuplicateNonce(2)));
    assert_eq!(template.set_nonce(1), Err(EventError::DuplicateNonce(2)));

    template.tags.clear();
    assert_eq!(template.nonce_index(), Err(EventError::MissingNonce));
}

#[test]
fn test_bare_nonce_tag_is_malformed() {
    // A nonce tag without a value slot, as deserialized input can carry.
    let mut template = sample_template("x", 8);
    template.tags[0] = Tag(vec![NONCE_TAG.to_string()]);

    assert_eq!(template.nonce_index(), Err(EventError::MalformedNonce));
    assert_eq!(template.set_nonce(1), Err(EventError::MalformedNonce));
}

#[test]
fn test_set_nonce_writes_decimal_string() {
    let mut template = sample_template("x", 8);
    template.set_nonce(123_456_789).unwrap();
    assert_eq!(template.nonce_value(), Some("123456789"));
}

#[test]
fn test_leading_zero_bits() {
    assert_eq!(leading_zero_bits(""), 0);
    assert_eq!(leading_zero_bits("ffff"), 0);
    assert_eq!(leading_zero_bits("8fff"), 0);
    assert_eq!(leading_zero_bits("7fff"), 1);
    assert_eq!(leading_zero_bits("1fff"), 3);
    assert_eq!(leading_zero_bits("0fff"), 4);
    assert_eq!(leading_zero_bits("002f"), 10);
    assert_eq!(leading_zero_bits("0001"), 15);
    assert_eq!(leading_zero_bits(&"0".repeat(64)), 256);
}

#[test]
fn test_score_bound() {
    // 0 <= score <= 4 * len for arbitrary hex ids.
    for id in ["", "f", "00", "0a0a", &"0".repeat(64), &"f".repeat(64)] {
        let bits = leading_zero_bits(id);
        assert!(bits <= 4 * id.len() as u32, "{id}: {bits}");
    }
}

#[test]
fn test_meets_difficulty_is_threshold() {
    // 12 leading zero bits qualifies for anything up to 12.
    let id = "000fab";
    assert!(meets_difficulty(id, 0));
    assert!(meets_difficulty(id, 8));
    assert!(meets_difficulty(id, 12));
    assert!(!meets_difficulty(id, 13));
}

#[test]
fn test_rank_dedups_by_author() {
    let candidates = vec![
        candidate("0fff", "alice", 100), // 4 bits
        candidate("00ff", "alice", 200), // 8 bits
        candidate("1fff", "bob", 150),   // 3 bits
    ];

    let ranked = rank(&candidates, ScoreMode::Raw, 10, 1_000);

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].pubkey, "alice");
    assert_eq!(ranked[0].pow, 8);
    assert_eq!(ranked[1].pubkey, "bob");
}

#[test]
fn test_rank_is_idempotent() {
    let candidates = vec![
        candidate("00aa", "alice", 100),
        candidate("0bbb", "bob", 200),
        candidate("000c", "carol", 300),
    ];

    let first = rank(&candidates, ScoreMode::Decayed, 25, 100_000);
    let second = rank(&candidates, ScoreMode::Decayed, 25, 100_000);

    assert_eq!(first, second);
}

#[test]
fn test_rank_orders_by_score_then_id() {
    // Equal difficulty, equal age: ids break the tie ascending.
    let candidates = vec![
        candidate("00cc", "carol", 100),
        candidate("00aa", "alice", 100),
        candidate("00bb", "bob", 100),
    ];

    let ranked = rank(&candidates, ScoreMode::Raw, 10, 100);
    let ids: Vec<&str> = ranked.iter().map(|n| n.id.as_str()).collect();

    assert_eq!(ids, vec!["00aa", "00bb", "00cc"]);
}

#[test]
fn test_dedup_tie_breaks_on_earlier_note() {
    // Same author, same difficulty: the earlier note is kept.
    let candidates = vec![
        candidate("00bb", "alice", 500),
        candidate("00aa", "alice", 100),
    ];

    let ranked = rank(&candidates, ScoreMode::Raw, 10, 1_000);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, "00aa");
    assert_eq!(ranked[0].created_at, 100);
}

#[test]
fn test_decay_loses_one_bit_per_three_days() {
    let now = 10 * DECAY_SECONDS_PER_BIT;
    let fresh = candidate("00ff", "alice", now); // 8 bits, no age
    let aged = candidate("00ff", "bob", now - 2 * DECAY_SECONDS_PER_BIT);

    let ranked = rank(&[fresh, aged], ScoreMode::Decayed, 25, now);

    assert_eq!(ranked[0].pubkey, "alice");
    assert_eq!(ranked[0].score, 8.0);
    assert_eq!(ranked[1].pubkey, "bob");
    assert_eq!(ranked[1].score, 6.0);
}

#[test]
fn test_decay_may_go_negative() {
    let now = 20 * DECAY_SECONDS_PER_BIT;
    let ancient = candidate("0fff", "alice", now - 10 * DECAY_SECONDS_PER_BIT);

    let ranked = rank(&[ancient], ScoreMode::Decayed, 25, now);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].score, -6.0);
}

#[test]
fn test_decayed_mode_drops_low_pow() {
    let candidates = vec![
        candidate("1fff", "alice", 100), // 3 bits, under the floor
        candidate("0fff", "bob", 100),   // 4 bits, at the floor
    ];

    let decayed = rank(&candidates, ScoreMode::Decayed, 25, 100);
    assert_eq!(decayed.len(), 1);
    assert_eq!(decayed[0].pubkey, "bob");

    // Raw mode keeps everything.
    let raw = rank(&candidates, ScoreMode::Raw, 10, 100);
    assert_eq!(raw.len(), 2);
}

#[test]
fn test_top_n_cap() {
    let candidates: Vec<Candidate> = (0..30)
        .map(|i| candidate("00ff", &format!("author-{i:02}"), 100 + i))
        .collect();

    assert_eq!(rank(&candidates, ScoreMode::Raw, 10, 1_000).len(), 10);
    assert_eq!(rank(&candidates, ScoreMode::Decayed, 25, 1_000).len(), 25);
}

#[test]
fn test_preview_truncates_long_content() {
    let long = "x".repeat(100);
    let ranked = rank(&[candidate("00ff", "alice", 100)], ScoreMode::Raw, 10, 100);
    assert_eq!(ranked[0].preview, "note by alice");

    let c = Candidate {
        content: long,
        ..candidate("00ff", "alice", 100)
    };
    let ranked = rank(&[c], ScoreMode::Raw, 10, 100);
    assert!(ranked[0].preview.ends_with("..."));
    assert_eq!(ranked[0].preview.chars().count(), 48 + 3);
}

/// End-to-end mining example: target difficulty 8, frozen clock. The
/// winning id must start with two zero hex characters, the nonce tag must
/// hold the winning nonce in decimal, and no smaller nonce may qualify.
#[test]
fn test_mine_to_difficulty_8() {
    let mut template = sample_template("hello", 8);

    let mut nonce = 0u64;
    let winning_id = loop {
        template.set_nonce(nonce).unwrap();
        let id = template.id();
        if meets_difficulty(&id, 8) {
            break id;
        }
        nonce += 1;
    };

    assert!(winning_id.starts_with("00"), "{winning_id}");
    assert_eq!(template.nonce_value(), Some(nonce.to_string().as_str()));

    // No earlier nonce satisfies the threshold.
    let mut probe = sample_template("hello", 8);
    for earlier in 0..nonce {
        probe.set_nonce(earlier).unwrap();
        assert!(!meets_difficulty(&probe.id(), 8), "nonce {earlier} qualified early");
    }

    // Re-running from zero lands on the same nonce and id.
    let mut rerun = sample_template("hello", 8);
    let mut n = 0u64;
    loop {
        rerun.set_nonce(n).unwrap();
        if meets_difficulty(&rerun.id(), 8) {
            break;
        }
        n += 1;
    }
    assert_eq!(n, nonce);
    assert_eq!(rerun.id(), winning_id);
}
