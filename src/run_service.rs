// The code-execution backend, seen from the client: a request/response
// contract plus an HTTP implementation and an offline log-replay one.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::engine::telemetry::{parse_simulation_log, SimulationLog, TelemetryFrame};
use crate::error::{Error, Result};
use crate::submission::SubmissionTarget;

/// Body posted to the run service. Exactly one of the ids is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub user_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maze_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<i64>,
}

impl RunRequest {
    pub fn new(user_code: impl Into<String>, target: SubmissionTarget) -> Self {
        let (maze_id, tournament_id) = match target {
            SubmissionTarget::Practice { maze_id } => (Some(maze_id), None),
            SubmissionTarget::Tournament { tournament_id } => (None, Some(tournament_id)),
        };
        Self {
            user_code: user_code.into(),
            maze_id,
            tournament_id,
        }
    }
}

/// Run-service answer. Practice runs carry `telemetry`; tournament runs and
/// error payloads do not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub telemetry: Option<Vec<TelemetryFrame>>,
    #[serde(default)]
    pub did_win: Option<bool>,
    #[serde(default)]
    pub total_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Best available failure text.
    pub fn failure_message(&self) -> String {
        self.details
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| format!("Run failed with status '{}'", self.status))
    }

    /// The answer a run service gives for a decoded simulator log. Tournament
    /// answers leave the telemetry out.
    pub fn from_log(log: SimulationLog, target: SubmissionTarget) -> Self {
        let telemetry = match target {
            SubmissionTarget::Practice { .. } => Some(log.frames),
            SubmissionTarget::Tournament { .. } => None,
        };
        Self {
            status: "ok".into(),
            telemetry,
            did_win: Some(log.did_win),
            total_time: Some(log.total_moves as i64),
            details: None,
            error: None,
        }
    }

    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            details: Some(details.into()),
            ..Self::default()
        }
    }
}

/// Executes user code against a maze or tournament.
///
/// `Err` means the service could not produce an answer at all; a run that
/// failed inside the simulator comes back as `Ok` with a non-"ok" status.
pub trait RunService: Send + Sync + 'static {
    fn run(&self, request: RunRequest) -> impl Future<Output = Result<RunResponse>> + Send;
}

/// Posts requests as JSON to an HTTP endpoint.
pub struct HttpRunService {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpRunService {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            token,
        }
    }
}

impl RunService for HttpRunService {
    async fn run(&self, request: RunRequest) -> Result<RunResponse> {
        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            // Error bodies look like {"error": "..."}; fall back to the status reason
            let message = serde_json::from_str::<RunResponse>(&body)
                .ok()
                .and_then(|r| r.error.or(r.details))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(Error::TransportFailure(format!("{status}: {message}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::InvalidTelemetry(format!("malformed run response: {e}")))
    }
}

/// Answers every request from a pre-recorded simulator log, for offline use.
pub struct LogRunService {
    log: String,
}

impl LogRunService {
    pub fn new(log: impl Into<String>) -> Self {
        Self { log: log.into() }
    }
}

impl RunService for LogRunService {
    async fn run(&self, request: RunRequest) -> Result<RunResponse> {
        let target = match (request.maze_id, request.tournament_id) {
            (_, Some(tournament_id)) => SubmissionTarget::Tournament { tournament_id },
            (Some(maze_id), None) => SubmissionTarget::Practice { maze_id },
            (None, None) => {
                return Ok(RunResponse::failed("request names neither a maze nor a tournament"))
            }
        };
        match parse_simulation_log(&self.log) {
            Ok(log) => Ok(RunResponse::from_log(log, target)),
            Err(Error::RunFailure(reason)) => Ok(RunResponse::failed(reason)),
            Err(e) => Err(e),
        }
    }
}
