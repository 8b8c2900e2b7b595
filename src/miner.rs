//! Background proof-of-work mining engine.
//!
//! A job runs on its own worker thread and communicates with the caller
//! exclusively through an mpsc channel: a stream of
//! [`MinerEvent::Progress`] snapshots followed by exactly one
//! [`MinerEvent::Result`], delivered in emission order. Fixed policies:
//!
//! - termination: threshold - stop at the first nonce whose id carries at
//!   least the requested leading zero bits
//! - nonce search: monotonic counter from 0, step 1, full u64 range (an
//!   unreachable target spins until cancelled; that is an accepted
//!   liveness risk, not an error)
//! - timestamp: `created_at` is refreshed from the clock on every attempt
//! - progress cadence: at most one emission per second

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use powstr_core::{leading_zero_bits, EventError, EventTemplate};

/// Minimum spacing between progress emissions.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum MineError {
    #[error("a mining job is already active")]
    JobActive,
    #[error(transparent)]
    Template(#[from] EventError),
}

/// Source of `created_at` stamps. Injectable so tests can freeze time and
/// make a run fully reproducible.
pub trait Clock: Send + 'static {
    fn unix_now(&self) -> u64;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Frozen clock for deterministic runs.
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_now(&self) -> u64 {
        self.0
    }
}

/// Progress snapshot emitted while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub hash_count: u64,
    pub hash_rate: f64,
    pub best_pow: u32,
}

/// A finished job: the template with its winning nonce settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedNote {
    pub template: EventTemplate,
    pub id: String,
    pub nonce: u64,
    pub hash_count: u64,
}

/// Messages delivered over the job channel, FIFO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MinerEvent {
    Progress(Progress),
    Result(MinedNote),
}

/// Mutable state owned by the worker while a job is live. Updated through
/// discrete transitions; `snapshot` derives the progress view.
struct JobState {
    nonce: u64,
    hash_count: u64,
    best_pow: u32,
    started: Instant,
    last_report: Instant,
}

impl JobState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            nonce: 0,
            hash_count: 0,
            best_pow: 0,
            started: now,
            last_report: now,
        }
    }

    fn record_attempt(&mut self, pow: u32) {
        self.hash_count += 1;
        self.best_pow = self.best_pow.max(pow);
    }

    fn advance(&mut self) {
        self.nonce += 1;
    }

    fn due_report(&mut self) -> bool {
        if self.last_report.elapsed() >= PROGRESS_INTERVAL {
            self.last_report = Instant::now();
            true
        } else {
            false
        }
    }

    fn snapshot(&self) -> Progress {
        let elapsed = self.started.elapsed().as_secs_f64();
        let hash_rate = if elapsed > 0.0 {
            self.hash_count as f64 / elapsed
        } else {
            0.0
        };
        Progress {
            hash_count: self.hash_count,
            hash_rate,
            best_pow: self.best_pow,
        }
    }
}

/// Owns at most one active job per session.
#[derive(Default)]
pub struct Miner {
    active: Option<MinerHandle>,
}

impl Miner {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Submit a job. Fails while another job is still running, so two
    /// workers can never race to publish.
    pub fn start(&mut self, template: EventTemplate, difficulty: u32) -> Result<(), MineError> {
        self.start_with_clock(template, difficulty, SystemClock)
    }

    pub fn start_with_clock<C: Clock>(
        &mut self,
        template: EventTemplate,
        difficulty: u32,
        clock: C,
    ) -> Result<(), MineError> {
        if self.active.as_ref().is_some_and(MinerHandle::is_running) {
            return Err(MineError::JobActive);
        }
        // Validate before spawning so the hot loop stays infallible.
        template.nonce_index()?;
        self.active = Some(MinerHandle::spawn(template, difficulty, clock));
        Ok(())
    }

    pub fn handle(&mut self) -> Option<&mut MinerHandle> {
        self.active.as_mut()
    }

    /// Abandon the active job, if any. The in-flight attempt is discarded
    /// and no result is delivered.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
    }
}

/// Owned handle to a running job: event receiver plus worker lifecycle.
/// Dropping the handle cancels the job.
pub struct MinerHandle {
    events: Receiver<MinerEvent>,
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MinerHandle {
    fn spawn<C: Clock>(template: EventTemplate, difficulty: u32, clock: C) -> Self {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = Arc::clone(&stop);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                mine_loop(template, difficulty, &clock, &stop, &tx);
                done.store(true, Ordering::SeqCst);
            })
        };
        Self {
            events: rx,
            stop,
            done,
            worker: Some(worker),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }

    /// Next event, blocking. `None` once the worker has exited and the
    /// channel drained.
    pub fn recv(&self) -> Option<MinerEvent> {
        self.events.recv().ok()
    }

    /// Next event if one is queued.
    pub fn try_recv(&self) -> Option<MinerEvent> {
        self.events.try_recv().ok()
    }

    /// Stop the worker and wait for it to exit.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for MinerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The hot loop. No fallible calls inside: the nonce tag index is
/// validated before the worker starts.
fn mine_loop<C: Clock>(
    mut template: EventTemplate,
    difficulty: u32,
    clock: &C,
    stop: &AtomicBool,
    events: &Sender<MinerEvent>,
) {
    let Ok(nonce_idx) = template.nonce_index() else {
        return;
    };
    let mut state = JobState::new();

    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        template.created_at = clock.unix_now();
        template.tags[nonce_idx].0[1] = state.nonce.to_string();

        let id = template.id();
        let pow = leading_zero_bits(&id);
        state.record_attempt(pow);

        if pow >= difficulty {
            let _ = events.send(MinerEvent::Result(MinedNote {
                nonce: state.nonce,
                hash_count: state.hash_count,
                id,
                template,
            }));
            return;
        }

        if state.due_report() && events.send(MinerEvent::Progress(state.snapshot())).is_err() {
            // Caller dropped the handle; nothing left to report to.
            return;
        }

        state.advance();
    }
}
