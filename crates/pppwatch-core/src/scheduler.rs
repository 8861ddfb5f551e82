// ── Sync scheduler ──
//
// Fires the sync cycle on a fixed interval, one cycle at a time. A cycle
// that overruns `deadline` is cancelled. A cycle still marked running
// after `ceiling` (its task is wedged and never reached an await point)
// is abandoned and the next tick starts a fresh one.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::clock::Clock;

// ── CycleGate ────────────────────────────────────────────────────

/// Outcome of asking to start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// No cycle was running; this one may start.
    Start { generation: u64 },
    /// A cycle is running and within the ceiling.
    Busy { running_for: Duration },
    /// A cycle was running past the ceiling and has been forcibly cleared.
    Superseded {
        generation: u64,
        stuck_for: Duration,
    },
}

#[derive(Debug, Default)]
struct GateState {
    in_progress: bool,
    started_at: Option<DateTime<Utc>>,
    generation: u64,
}

/// The "cycle in progress" flag plus the time the cycle started.
///
/// Each start gets a new generation number; only the matching generation
/// can clear the flag, so a superseded cycle that eventually finishes
/// cannot release its successor's claim.
pub struct CycleGate {
    state: Mutex<GateState>,
    ceiling: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl CycleGate {
    pub fn new(ceiling: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            ceiling: chrono::Duration::from_std(ceiling).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    pub fn try_begin(&self) -> Gate {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.in_progress {
            let running_for = state.started_at.map_or(chrono::Duration::zero(), |t| now - t);
            if running_for <= self.ceiling {
                return Gate::Busy {
                    running_for: running_for.to_std().unwrap_or_default(),
                };
            }
            state.generation += 1;
            state.started_at = Some(now);
            return Gate::Superseded {
                generation: state.generation,
                stuck_for: running_for.to_std().unwrap_or_default(),
            };
        }

        state.in_progress = true;
        state.started_at = Some(now);
        state.generation += 1;
        Gate::Start {
            generation: state.generation,
        }
    }

    /// Release the flag. Returns `false` if `generation` was superseded.
    pub fn finish(&self, generation: u64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            return false;
        }
        state.in_progress = false;
        state.started_at = None;
        true
    }

    pub fn in_progress(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_progress
    }
}

// ── SyncScheduler ────────────────────────────────────────────────

pub struct SyncScheduler {
    gate: Arc<CycleGate>,
    interval: Duration,
    deadline: Duration,
}

impl SyncScheduler {
    pub fn new(gate: Arc<CycleGate>, interval: Duration, deadline: Duration) -> Self {
        Self {
            gate,
            interval,
            deadline,
        }
    }

    /// Start the ticking loop. The first cycle runs immediately.
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, run_cycle: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => self.on_tick(&cancel, &run_cycle),
                }
            }
            debug!("sync scheduler stopped");
        })
    }

    fn on_tick<F, Fut>(&self, cancel: &CancellationToken, run_cycle: &F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = match self.gate.try_begin() {
            Gate::Start { generation } => generation,
            Gate::Busy { running_for } => {
                debug!(
                    running_secs = running_for.as_secs(),
                    "previous sync cycle still running, skipping tick"
                );
                return;
            }
            Gate::Superseded {
                generation,
                stuck_for,
            } => {
                error!(
                    stuck_secs = stuck_for.as_secs(),
                    "sync cycle exceeded the hard ceiling; force-clearing and starting a new one"
                );
                generation
            }
        };

        let gate = Arc::clone(&self.gate);
        let deadline = self.deadline;
        let cancel = cancel.child_token();
        let cycle = run_cycle();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => debug!("sync cycle cancelled by shutdown"),
                result = tokio::time::timeout(deadline, cycle) => {
                    if result.is_err() {
                        warn!(
                            deadline_secs = deadline.as_secs(),
                            "sync cycle exceeded its deadline and was cancelled"
                        );
                    }
                }
            }
            gate.finish(generation);
        });
    }
}
