use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::gateway::SubmissionGateway;
use crate::model::{AggregatedResult, Submission, TestOutcome, TestWeight};
use crate::poller::{poll_submission, PollConfig, PollOutcome, PollPhase, RunKind};

// --- Published state ---

/// Snapshot published on a slot's watch channel. Replaced wholesale on every
/// transition; consumers never see partial updates.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub kind: RunKind,
    pub phase: PollPhase,
    pub submission_id: Option<String>,
    /// Current poll attempt (0 until the first fetch).
    pub attempt: u32,
    pub result: Option<AggregatedResult>,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    fn idle(kind: RunKind) -> Self {
        RunState {
            kind,
            phase: PollPhase::Idle,
            submission_id: None,
            attempt: 0,
            result: None,
            message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            PollPhase::Completed | PollPhase::Failed | PollPhase::TimedOut
        )
    }
}

// --- Slots ---

struct SlotInner {
    generation: u64,
    stop_tx: Option<watch::Sender<bool>>,
}

/// One lifecycle slot (test or graded). The generation counter makes a
/// superseded poll loop's publishes no-ops instead of a race: every publish
/// compares its generation against the slot's current one under the lock.
struct Slot {
    state_tx: watch::Sender<RunState>,
    busy: AtomicBool,
    inner: Mutex<SlotInner>,
}

impl Slot {
    fn new(kind: RunKind) -> Arc<Self> {
        let (state_tx, _) = watch::channel(RunState::idle(kind));
        Arc::new(Slot {
            state_tx,
            busy: AtomicBool::new(false),
            inner: Mutex::new(SlotInner {
                generation: 0,
                stop_tx: None,
            }),
        })
    }

    /// Publish a state for `generation`; silently dropped if a newer
    /// invocation has taken over the slot.
    fn publish(&self, generation: u64, state: RunState) -> bool {
        let inner = self.inner.lock().expect("slot lock poisoned");
        if inner.generation != generation {
            return false;
        }
        self.state_tx.send_replace(state);
        true
    }

    fn finish(&self, generation: u64) {
        let inner = self.inner.lock().expect("slot lock poisoned");
        if inner.generation == generation {
            self.busy.store(false, Ordering::Release);
        }
    }
}

// --- Orchestrator ---

/// Public entry point for one problem: `run` starts an ephemeral test,
/// `submit` a graded submission. Each spawns a fresh poll loop publishing
/// `queued → polling → terminal` on the slot's watch channel; starting a new
/// invocation on a slot cancels and supersedes the previous one.
pub struct Orchestrator {
    gateway: Arc<SubmissionGateway>,
    problem_id: String,
    weights: Option<Vec<TestWeight>>,
    poll_config: PollConfig,
    /// Fired for graded submissions on successful creation (optimistic
    /// history refresh) and again on terminal completion (authoritative).
    completion_hook: Option<Arc<dyn Fn() + Send + Sync>>,
    test_slot: Arc<Slot>,
    graded_slot: Arc<Slot>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<SubmissionGateway>, problem_id: impl Into<String>) -> Self {
        Orchestrator {
            gateway,
            problem_id: problem_id.into(),
            weights: None,
            poll_config: PollConfig::default(),
            completion_hook: None,
            test_slot: Slot::new(RunKind::Test),
            graded_slot: Slot::new(RunKind::Graded),
        }
    }

    pub fn with_weights(mut self, weights: Vec<TestWeight>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_poll_config(mut self, config: PollConfig) -> Self {
        self.poll_config = config;
        self
    }

    pub fn with_completion_hook(mut self, hook: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.completion_hook = Some(hook);
        self
    }

    /// Start an ephemeral test run. Returns a receiver of state snapshots.
    pub fn run(
        &self,
        source_code: &str,
        language: &str,
        on_error: impl Fn(TestOutcome) + Send + Sync + 'static,
    ) -> watch::Receiver<RunState> {
        self.start(RunKind::Test, source_code, language, on_error)
    }

    /// Start a graded submission. Returns a receiver of state snapshots.
    pub fn submit(
        &self,
        source_code: &str,
        language: &str,
        on_error: impl Fn(TestOutcome) + Send + Sync + 'static,
    ) -> watch::Receiver<RunState> {
        self.start(RunKind::Graded, source_code, language, on_error)
    }

    pub fn is_test_busy(&self) -> bool {
        self.test_slot.busy.load(Ordering::Acquire)
    }

    pub fn is_submit_busy(&self) -> bool {
        self.graded_slot.busy.load(Ordering::Acquire)
    }

    /// Latest published state for a slot.
    pub fn state(&self, kind: RunKind) -> RunState {
        self.slot(kind).state_tx.borrow().clone()
    }

    pub fn subscribe(&self, kind: RunKind) -> watch::Receiver<RunState> {
        self.slot(kind).state_tx.subscribe()
    }

    /// Submission history for this orchestrator's problem.
    pub async fn history(
        &self,
        page: u32,
        page_size: u32,
    ) -> crate::error::ClientResult<Vec<Submission>> {
        self.gateway
            .list_submissions(&self.problem_id, page, page_size)
            .await
    }

    /// Await the next terminal state on a receiver.
    pub async fn wait_terminal(mut rx: watch::Receiver<RunState>) -> RunState {
        loop {
            {
                let state = rx.borrow_and_update();
                if state.is_terminal() {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    fn slot(&self, kind: RunKind) -> &Arc<Slot> {
        match kind {
            RunKind::Test => &self.test_slot,
            RunKind::Graded => &self.graded_slot,
        }
    }

    fn start(
        &self,
        kind: RunKind,
        source_code: &str,
        language: &str,
        on_error: impl Fn(TestOutcome) + Send + Sync + 'static,
    ) -> watch::Receiver<RunState> {
        let slot = self.slot(kind).clone();
        let (stop_tx, stop_rx) = watch::channel(false);

        // Supersede any in-flight invocation on this slot.
        let generation = {
            let mut inner = slot.inner.lock().expect("slot lock poisoned");
            if let Some(previous) = inner.stop_tx.take() {
                info!("Superseding in-flight {} poll loop", kind.label());
                let _ = previous.send(true);
            }
            inner.generation += 1;
            inner.stop_tx = Some(stop_tx);
            inner.generation
        };
        slot.busy.store(true, Ordering::Release);

        // Clears any previous terminal result from the channel.
        slot.publish(
            generation,
            RunState {
                kind,
                phase: PollPhase::AwaitingCreation,
                submission_id: None,
                attempt: 0,
                result: None,
                message: None,
                updated_at: Utc::now(),
            },
        );

        let receiver = slot.state_tx.subscribe();

        let gateway = self.gateway.clone();
        let problem_id = self.problem_id.clone();
        let weights = self.weights.clone();
        let poll_config = self.poll_config.clone();
        let completion_hook = self.completion_hook.clone();
        let source_code = source_code.to_string();
        let language = language.to_string();

        tokio::spawn(async move {
            let created = match kind {
                RunKind::Test => gateway.run_code(&problem_id, &source_code, &language).await,
                RunKind::Graded => {
                    gateway
                        .submit_code(&problem_id, &source_code, &language)
                        .await
                }
            };

            let submission_id = match created {
                Ok(id) => id,
                Err(e) => {
                    warn!("Failed to create {}: {}", kind.label(), e);
                    slot.publish(
                        generation,
                        RunState {
                            kind,
                            phase: PollPhase::Failed,
                            submission_id: None,
                            attempt: 0,
                            result: None,
                            message: Some(format!("Could not create {}: {e}", kind.label())),
                            updated_at: Utc::now(),
                        },
                    );
                    slot.finish(generation);
                    return;
                }
            };

            info!("Created {} {}", kind.label(), submission_id);
            slot.publish(
                generation,
                RunState {
                    kind,
                    phase: PollPhase::Queued,
                    submission_id: Some(submission_id.clone()),
                    attempt: 0,
                    result: None,
                    message: None,
                    updated_at: Utc::now(),
                },
            );

            // Optimistic history refresh: the submission now exists even if
            // grading has not finished.
            if kind == RunKind::Graded {
                if let Some(hook) = &completion_hook {
                    hook();
                }
            }

            let outcome = poll_submission(
                &gateway,
                &submission_id,
                kind,
                weights.as_deref(),
                &poll_config,
                stop_rx,
                |attempt| {
                    slot.publish(
                        generation,
                        RunState {
                            kind,
                            phase: PollPhase::Polling,
                            submission_id: Some(submission_id.clone()),
                            attempt,
                            result: None,
                            message: None,
                            updated_at: Utc::now(),
                        },
                    );
                },
                |outcome| on_error(outcome.clone()),
            )
            .await;

            match outcome {
                PollOutcome::Completed { submission, result } => {
                    let published = slot.publish(
                        generation,
                        RunState {
                            kind,
                            phase: PollPhase::Completed,
                            submission_id: Some(submission.id.clone()),
                            attempt: 0,
                            result: Some(result),
                            message: None,
                            updated_at: Utc::now(),
                        },
                    );
                    // Authoritative history refresh once grading finished.
                    if published && kind == RunKind::Graded {
                        if let Some(hook) = &completion_hook {
                            hook();
                        }
                    }
                }
                PollOutcome::TimedOut { message } => {
                    slot.publish(
                        generation,
                        RunState {
                            kind,
                            phase: PollPhase::TimedOut,
                            submission_id: Some(submission_id.clone()),
                            attempt: 0,
                            result: None,
                            message: Some(message),
                            updated_at: Utc::now(),
                        },
                    );
                }
                PollOutcome::Failed { message } => {
                    slot.publish(
                        generation,
                        RunState {
                            kind,
                            phase: PollPhase::Failed,
                            submission_id: Some(submission_id.clone()),
                            attempt: 0,
                            result: None,
                            message: Some(message),
                            updated_at: Utc::now(),
                        },
                    );
                }
                PollOutcome::Cancelled => {
                    // A newer invocation owns the slot; publish nothing.
                }
            }

            slot.finish(generation);
        });

        receiver
    }
}
