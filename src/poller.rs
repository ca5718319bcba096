use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::config::{POLL_BASE_DELAY_MS, POLL_MAX_ATTEMPTS, POLL_MAX_DELAY_MS};
use crate::gateway::SubmissionGateway;
use crate::model::{AggregatedResult, Submission, TestOutcome, TestWeight};

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Ephemeral test run, not recorded in history.
    Test,
    /// Graded submission, recorded in history.
    Graded,
}

impl RunKind {
    pub fn label(&self) -> &'static str {
        match self {
            RunKind::Test => "test run",
            RunKind::Graded => "submission",
        }
    }

    fn timeout_message(&self) -> &'static str {
        match self {
            RunKind::Test => "Test run timed out. The grading service is taking unusually long.",
            RunKind::Graded => {
                "Grading is taking unusually long. Check your submission history later."
            }
        }
    }

    fn failure_message(&self, detail: &str) -> String {
        match self {
            RunKind::Test => format!("Could not fetch test run result: {detail}"),
            RunKind::Graded => format!("Could not fetch submission result: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Idle,
    AwaitingCreation,
    Queued,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

/// Backoff and budget knobs. Defaults match the protocol constants; tests
/// shrink the delays to millisecond scale.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            base_delay: Duration::from_millis(POLL_BASE_DELAY_MS),
            max_delay: Duration::from_millis(POLL_MAX_DELAY_MS),
            max_attempts: POLL_MAX_ATTEMPTS,
        }
    }
}

/// Capped exponential backoff: `min(base * 2^(attempt-1), max)` for 1-based
/// attempt numbers.
pub fn poll_delay(config: &PollConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    config
        .base_delay
        .saturating_mul(1u32 << exp)
        .min(config.max_delay)
}

#[derive(Debug)]
pub enum PollOutcome {
    Completed {
        submission: Submission,
        result: AggregatedResult,
    },
    TimedOut {
        message: String,
    },
    Failed {
        message: String,
    },
    Cancelled,
}

// --- Poll loop ---

/// Drive one submission from creation to a terminal state.
///
/// Each iteration sleeps on the capped exponential schedule, then fetches a
/// fresh snapshot. A backend-terminal status ends the loop; a fetch failure
/// ends it immediately (the transport has already spent its retry budget by
/// the time an error surfaces here); exhausting the attempt budget yields a
/// timeout. The stop token is honored before every sleep and fetch, so a
/// superseded loop does nothing further.
///
/// `on_error` fires with the first outcome carrying a non-empty error message
/// before the terminal outcome is returned, so callers can surface a detailed
/// diagnostic alongside the summary.
#[allow(clippy::too_many_arguments)]
pub async fn poll_submission(
    gateway: &SubmissionGateway,
    submission_id: &str,
    kind: RunKind,
    weights: Option<&[TestWeight]>,
    config: &PollConfig,
    mut stop_rx: watch::Receiver<bool>,
    on_attempt: impl Fn(u32),
    on_error: impl Fn(&TestOutcome),
) -> PollOutcome {
    for attempt in 1..=config.max_attempts {
        if *stop_rx.borrow() {
            debug!("Poll loop for {} {} cancelled", kind.label(), submission_id);
            return PollOutcome::Cancelled;
        }

        let delay = poll_delay(config, attempt);
        tokio::select! {
            _ = sleep(delay) => {},
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    debug!("Poll loop for {} {} cancelled during backoff", kind.label(), submission_id);
                    return PollOutcome::Cancelled;
                }
            }
        }

        if *stop_rx.borrow() {
            return PollOutcome::Cancelled;
        }

        on_attempt(attempt);
        debug!(
            "Polling {} {} (attempt {}/{})",
            kind.label(),
            submission_id,
            attempt,
            config.max_attempts
        );

        let submission = match gateway.get_submission(submission_id).await {
            Ok(s) => s,
            Err(e) => {
                // One fetch failure ends polling; retrying transient errors
                // is the transport's job and its budget is already spent.
                warn!(
                    "Fetch failed for {} {}: {}",
                    kind.label(),
                    submission_id,
                    e
                );
                return PollOutcome::Failed {
                    message: kind.failure_message(&e.to_string()),
                };
            }
        };

        if submission.status.is_terminal() {
            info!(
                "{} {} reached terminal status {:?} after {} attempt(s)",
                kind.label(),
                submission_id,
                submission.status,
                attempt
            );
            if let Some(erroring) = submission.results.iter().find(|o| o.has_error_message()) {
                on_error(erroring);
            }
            let result = aggregate(
                &submission.results,
                weights,
                &submission.status,
                submission.score,
            );
            return PollOutcome::Completed { submission, result };
        }
    }

    warn!(
        "{} {} still not terminal after {} attempts, giving up",
        kind.label(),
        submission_id,
        config.max_attempts
    );
    PollOutcome::TimedOut {
        message: kind.timeout_message().to_string(),
    }
}
