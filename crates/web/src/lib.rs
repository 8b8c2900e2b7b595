//! Browser bindings for the mining core.
//!
//! A worker constructs a [`Miner`] and calls [`Miner::mine_batch`] in a
//! loop, yielding to the event loop between batches so cancellation
//! messages are handled promptly. Results cross the boundary as JSON
//! strings to keep the interface flat.

use wasm_bindgen::prelude::*;

use powstr_core::{leading_zero_bits, EventTemplate, KIND_TEXT_NOTE};

/// Leading zero bits of a hex event id.
#[wasm_bindgen]
pub fn event_pow(id: &str) -> u32 {
    leading_zero_bits(id)
}

/// Incremental miner over a fixed template.
#[wasm_bindgen]
pub struct Miner {
    template: EventTemplate,
    difficulty: u32,
    best_pow: u32,
}

#[wasm_bindgen]
impl Miner {
    /// Timestamps are `f64` at this boundary; fractional seconds are
    /// truncated.
    #[wasm_bindgen(constructor)]
    pub fn new(pubkey: &str, content: &str, created_at: f64, difficulty: u32) -> Miner {
        let template = EventTemplate::text_note(pubkey, content, difficulty, created_at as u64);
        Miner {
            template,
            difficulty,
            best_pow: 0,
        }
    }

    pub fn kind(&self) -> u32 {
        KIND_TEXT_NOTE
    }

    pub fn best_pow(&self) -> u32 {
        self.best_pow
    }

    /// Refresh the timestamp between batches so long runs stay current.
    pub fn set_created_at(&mut self, created_at: f64) {
        self.template.created_at = created_at as u64;
    }

    /// Try `batch_size` nonces starting at `start_nonce`, stepping by
    /// `nonce_step` (the worker's stride when several run in parallel).
    /// Returns a JSON object: `{"found":true,"id":...,"nonce":...,
    /// "count":...,"best_pow":...}` on success, `{"found":false,...}`
    /// when the batch is exhausted.
    pub fn mine_batch(&mut self, start_nonce: f64, nonce_step: u32, batch_size: u32) -> String {
        let mut nonce = start_nonce as u64;
        let step = nonce_step.max(1) as u64;

        for count in 1..=batch_size {
            if self.template.set_nonce(nonce).is_err() {
                break;
            }
            let id = self.template.id();
            let pow = leading_zero_bits(&id);
            self.best_pow = self.best_pow.max(pow);

            if pow >= self.difficulty {
                return format!(
                    r#"{{"found":true,"id":"{id}","nonce":{nonce},"count":{count},"best_pow":{}}}"#,
                    self.best_pow
                );
            }
            nonce += step;
        }

        format!(
            r#"{{"found":false,"next_nonce":{nonce},"count":{batch_size},"best_pow":{}}}"#,
            self.best_pow
        )
    }
}

/// Hash-rate probe backed by `performance.now()`.
#[wasm_bindgen]
pub struct Benchmark {
    performance: web_sys::Performance,
}

#[wasm_bindgen]
impl Benchmark {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Benchmark, JsValue> {
        let performance = web_sys::window()
            .and_then(|w| w.performance())
            .ok_or_else(|| JsValue::from_str("performance API unavailable"))?;
        Ok(Benchmark { performance })
    }

    /// Hashes per second over `count` iterations.
    pub fn hash_rate(&self, count: u32) -> f64 {
        let mut template = EventTemplate::text_note(
            "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d",
            "benchmark note content",
            20,
            1_700_000_000,
        );

        let start = self.performance.now();
        for nonce in 0..count as u64 {
            if template.set_nonce(nonce).is_err() {
                break;
            }
            leading_zero_bits(&template.id());
        }
        let elapsed_ms = self.performance.now() - start;
        if elapsed_ms <= 0.0 {
            return 0.0;
        }
        count as f64 / (elapsed_ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

    #[test]
    fn batch_reports_found_at_low_difficulty() {
        let mut miner = Miner::new(PUBKEY, "hello", 1_700_000_000.0, 0);
        let out = miner.mine_batch(0.0, 1, 16);

        assert!(out.contains(r#""found":true"#));
        assert!(out.contains(r#""nonce":0"#));
    }

    #[test]
    fn exhausted_batch_reports_next_nonce() {
        let mut miner = Miner::new(PUBKEY, "hello", 1_700_000_000.0, 64);
        let out = miner.mine_batch(0.0, 4, 8);

        assert!(out.contains(r#""found":false"#));
        // 8 nonces at stride 4 from 0 leaves the cursor at 32.
        assert!(out.contains(r#""next_nonce":32"#));
    }

    #[test]
    fn strided_batches_partition_the_search() {
        // Two workers at stride 2 cover disjoint nonce sets.
        let mut even = Miner::new(PUBKEY, "hello", 1_700_000_000.0, 64);
        let mut odd = Miner::new(PUBKEY, "hello", 1_700_000_000.0, 64);

        let a = even.mine_batch(0.0, 2, 4);
        let b = odd.mine_batch(1.0, 2, 4);

        assert!(a.contains(r#""next_nonce":8"#));
        assert!(b.contains(r#""next_nonce":9"#));
    }
}
