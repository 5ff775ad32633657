// Error kinds shared by the maze model, the run service, and playback.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A cell code outside 0..=15, a non-hex cell string, or a ragged grid.
    #[error("invalid maze data: {0}")]
    InvalidMazeData(String),

    /// The run service could not be reached or answered with a non-2xx status.
    #[error("run service unavailable: {0}")]
    TransportFailure(String),

    /// The run service answered, but the run itself failed (`status != "ok"`).
    #[error("{0}")]
    RunFailure(String),

    /// A successful run produced no frames to animate.
    #[error("run produced no telemetry")]
    EmptyTelemetry,

    /// The run service did not answer within the configured timeout.
    #[error("run service timed out after {0:?}")]
    Timeout(Duration),

    /// A telemetry frame or simulator log line could not be decoded.
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error ends a submission attempt (as opposed to a local decoding problem).
    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            Error::TransportFailure(_) | Error::RunFailure(_) | Error::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::TransportFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_failure_displays_details_verbatim() {
        let err = Error::RunFailure("Infinite loop".into());
        assert_eq!(err.to_string(), "Infinite loop");
    }

    #[test]
    fn test_submission_failure_classification() {
        assert!(Error::TransportFailure("refused".into()).is_submission_failure());
        assert!(Error::RunFailure("boom".into()).is_submission_failure());
        assert!(Error::Timeout(Duration::from_secs(15)).is_submission_failure());
        assert!(!Error::EmptyTelemetry.is_submission_failure());
        assert!(!Error::InvalidMazeData("x".into()).is_submission_failure());
    }
}
