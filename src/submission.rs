// Submission orchestration: user code -> run service -> outcome, and the
// hand-off of that outcome to the playback state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animation::{AnimationState, AnimationStateMachine};
use crate::engine::config::*;
use crate::engine::telemetry::TelemetryFrame;
use crate::error::{Error, Result};
use crate::metrics;
use crate::report::{outcome_message, Level, Notice, Reporter};
use crate::run_service::{RunRequest, RunResponse, RunService};

/// What a submission is run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionTarget {
    /// A single practice attempt on one maze; the result is animated.
    Practice { maze_id: i64 },
    /// A scored tournament entry; only the final outcome comes back.
    Tournament { tournament_id: i64 },
}

impl SubmissionTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            SubmissionTarget::Practice { .. } => "practice",
            SubmissionTarget::Tournament { .. } => "tournament",
        }
    }
}

/// A successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Practice result with the positions to replay.
    Replay {
        did_win: bool,
        total_moves: u32,
        telemetry: Vec<TelemetryFrame>,
    },
    /// Tournament result: outcome only, never animated.
    Scored { did_win: bool, total_moves: u32 },
}

impl RunOutcome {
    pub fn did_win(&self) -> bool {
        match self {
            RunOutcome::Replay { did_win, .. } | RunOutcome::Scored { did_win, .. } => *did_win,
        }
    }

    pub fn total_moves(&self) -> u32 {
        match self {
            RunOutcome::Replay { total_moves, .. } | RunOutcome::Scored { total_moves, .. } => {
                *total_moves
            }
        }
    }

    fn from_response(response: RunResponse, target: SubmissionTarget) -> Result<Self> {
        if !response.is_ok() {
            return Err(Error::RunFailure(response.failure_message()));
        }
        let did_win = response.did_win.unwrap_or(false);
        let total_moves = response.total_time.unwrap_or(0).clamp(0, u32::MAX as i64) as u32;

        Ok(match target {
            SubmissionTarget::Practice { .. } => RunOutcome::Replay {
                did_win,
                total_moves,
                telemetry: response.telemetry.unwrap_or_default(),
            },
            // Whatever the payload carries, tournament entries are not replayed
            SubmissionTarget::Tournament { .. } => RunOutcome::Scored {
                did_win,
                total_moves,
            },
        })
    }
}

/// Sends code to the run service and reports exactly one notice per attempt.
pub struct SubmissionCoordinator<S> {
    service: S,
    reporter: Arc<dyn Reporter>,
    timeout: Duration,
}

impl<S: RunService> SubmissionCoordinator<S> {
    pub fn new(service: S, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            service,
            reporter,
            timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
        }
    }

    /// Bound how long a submission may stay in flight.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `code` against `target`.
    ///
    /// Non-"ok" statuses become `RunFailure`, unreachable services
    /// `TransportFailure`, and a service slower than the timeout `Timeout`.
    /// No retries.
    pub async fn submit(&self, code: &str, target: SubmissionTarget) -> Result<RunOutcome> {
        let attempt = Uuid::new_v4();
        let kind = target.kind();
        metrics::SUBMISSIONS_TOTAL.with_label_values(&[kind]).inc();
        tracing::info!(attempt = %attempt, kind, "submitting code");

        let started = Instant::now();
        let request = RunRequest::new(code, target);
        let result = match tokio::time::timeout(self.timeout, self.service.run(request)).await {
            Ok(Ok(response)) => RunOutcome::from_response(response, target),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout(self.timeout)),
        };
        metrics::SUBMISSION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        self.report(attempt, &result);
        result
    }

    fn report(&self, attempt: Uuid, result: &Result<RunOutcome>) {
        let label = match result {
            Ok(outcome) if outcome.did_win() => "won",
            Ok(_) => "halted",
            Err(e) if !e.is_submission_failure() => "invalid_response",
            Err(Error::RunFailure(_)) => "run_failure",
            Err(Error::Timeout(_)) => "timeout",
            Err(_) => "transport_failure",
        };
        metrics::SUBMISSION_OUTCOMES_TOTAL
            .with_label_values(&[label])
            .inc();

        let notice = match result {
            Ok(outcome) => {
                let (level, message) = outcome_message(outcome.did_win(), outcome.total_moves());
                Notice::new(attempt, level, message)
            }
            Err(e) => Notice::new(attempt, Level::Error, e.to_string()),
        };
        self.reporter.report(notice);
    }
}

/// Feed a submission result into the state machine and return where it landed.
///
/// Practice telemetry starts playback (or returns to NONE when empty);
/// tournament outcomes and failures return to NONE.
pub fn apply_outcome(
    machine: &mut AnimationStateMachine,
    result: Result<RunOutcome>,
) -> AnimationState {
    match result {
        Ok(RunOutcome::Replay { telemetry, .. }) => {
            if let Err(e) = machine.load(telemetry) {
                tracing::debug!("nothing to animate: {e}");
            }
        }
        Ok(RunOutcome::Scored { .. }) | Err(_) => machine.settle(),
    }
    machine.state()
}
