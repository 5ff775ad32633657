// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::config::*;
use crate::error::{Error, Result};

const DEFAULT_RUN_URL: &str = "http://localhost:8000/backend/communication/receive_file/";

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Run-service endpoint that executes submitted code.
    pub run_url: String,
    /// Token sent as `Authorization: Token <t>`, if any.
    pub run_token: Option<String>,
    /// Delay between replayed frames.
    pub frame_delay: Duration,
    /// Upper bound on how long a submission may stay in flight.
    pub run_timeout: Duration,
    /// Maze JSON file. When absent a maze is generated.
    pub maze_file: Option<PathBuf>,
    /// Side length of the generated maze; random when absent.
    pub maze_size: Option<usize>,
    /// Simulator log to replay instead of calling the run service.
    pub log_file: Option<PathBuf>,
    /// Submit as an entry to this tournament instead of a practice run.
    pub tournament_id: Option<i64>,
    /// File holding the code to submit.
    pub code_file: Option<PathBuf>,
    /// Drive the robot by hand from stdin instead of submitting.
    pub drive: bool,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `ROBOMAZE_RUN_URL` - run-service endpoint
    /// - `ROBOMAZE_RUN_TOKEN` - run-service auth token
    /// - `ROBOMAZE_FRAME_DELAY_MS` - frame delay (default: 25)
    /// - `ROBOMAZE_RUN_TIMEOUT_SECS` - submission timeout (default: 15)
    /// - `ROBOMAZE_MAZE_FILE` - maze JSON file
    ///
    /// CLI flags take precedence: `--run-url`, `--delay`, `--timeout`,
    /// `--maze`, `--maze-size`, `--log`, `--tournament`, `--code`, `--drive`.
    pub fn load() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a config from explicit arguments and an environment lookup.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |flag: &str, var: &str| Self::parse_cli_value(args, flag).or_else(|| env(var));

        let run_url = lookup("--run-url", "ROBOMAZE_RUN_URL")
            .unwrap_or_else(|| DEFAULT_RUN_URL.to_string());
        let run_token = env("ROBOMAZE_RUN_TOKEN").filter(|t| !t.is_empty());

        let frame_delay_ms = match lookup("--delay", "ROBOMAZE_FRAME_DELAY_MS") {
            Some(v) => parse_number("frame delay", &v)?,
            None => DEFAULT_FRAME_DELAY_MS,
        };
        let run_timeout_secs = match lookup("--timeout", "ROBOMAZE_RUN_TIMEOUT_SECS") {
            Some(v) => parse_number("run timeout", &v)?,
            None => DEFAULT_RUN_TIMEOUT_SECS,
        };
        if run_timeout_secs == 0 {
            return Err(Error::Config("run timeout must be at least 1 second".into()));
        }

        let maze_size = Self::parse_cli_value(args, "--maze-size")
            .map(|v| parse_number::<usize>("maze size", &v))
            .transpose()?;
        if maze_size == Some(0) {
            return Err(Error::Config("maze size must be at least 1".into()));
        }

        let tournament_id = Self::parse_cli_value(args, "--tournament")
            .map(|v| parse_number::<i64>("tournament id", &v))
            .transpose()?;

        Ok(Config {
            run_url,
            run_token,
            frame_delay: Duration::from_millis(frame_delay_ms),
            run_timeout: Duration::from_secs(run_timeout_secs),
            maze_file: lookup("--maze", "ROBOMAZE_MAZE_FILE").map(PathBuf::from),
            maze_size,
            log_file: Self::parse_cli_value(args, "--log").map(PathBuf::from),
            tournament_id,
            code_file: Self::parse_cli_value(args, "--code").map(PathBuf::from),
            drive: args.iter().any(|a| a == "--drive"),
        })
    }

    /// Parse a CLI flag value like `--delay 100`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn parse_number<T: std::str::FromStr>(what: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {what}: '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("robomaze")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(&args(&[]), |_| None).unwrap();
        assert_eq!(config.run_url, DEFAULT_RUN_URL);
        assert_eq!(config.frame_delay, Duration::from_millis(25));
        assert_eq!(config.run_timeout, Duration::from_secs(15));
        assert!(config.run_token.is_none());
        assert!(config.maze_file.is_none());
        assert!(!config.drive);
    }

    #[test]
    fn test_cli_overrides_env() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ROBOMAZE_FRAME_DELAY_MS", "100"),
            ("ROBOMAZE_RUN_TIMEOUT_SECS", "30"),
            ("ROBOMAZE_RUN_TOKEN", "abc"),
        ]);
        let config = Config::from_sources(&args(&["--delay", "5", "--drive"]), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.frame_delay, Duration::from_millis(5));
        assert_eq!(config.run_timeout, Duration::from_secs(30));
        assert_eq!(config.run_token.as_deref(), Some("abc"));
        assert!(config.drive);
    }

    #[test]
    fn test_submission_flags() {
        let config = Config::from_sources(
            &args(&["--tournament", "7", "--code", "bot.py", "--maze-size", "9"]),
            |_| None,
        )
        .unwrap();
        assert_eq!(config.tournament_id, Some(7));
        assert_eq!(config.code_file, Some(PathBuf::from("bot.py")));
        assert_eq!(config.maze_size, Some(9));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_sources(&args(&["--delay", "fast"]), |_| None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_sources(&args(&["--timeout", "0"]), |_| None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_sources(&args(&["--maze-size", "0"]), |_| None),
            Err(Error::Config(_))
        ));
    }
}
