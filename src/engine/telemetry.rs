// Telemetry frames and simulator log decoding.

use serde::{Deserialize, Serialize};

use super::config::*;
use super::robot::{Direction, RobotState};
use crate::error::{Error, Result};

/// One recorded robot sample from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,
}

impl TelemetryFrame {
    /// A frame with a position only.
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            direction: None,
            time: None,
        }
    }

    pub fn facing(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// The frame that puts the display back at the start state.
    pub fn initial() -> Self {
        Self::from(RobotState::initial())
    }
}

impl From<RobotState> for TelemetryFrame {
    fn from(state: RobotState) -> Self {
        Self {
            x: state.x,
            y: state.y,
            direction: Some(state.direction),
            time: None,
        }
    }
}

/// A decoded simulator log.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationLog {
    pub frames: Vec<TelemetryFrame>,
    pub did_win: bool,
    /// Moves made, not counting the starting position.
    pub total_moves: u32,
}

/// Decode the simulator's plaintext log.
///
/// Every line but the last is `"<dir> <x> <y>"` with `dir` in `0..=3`
/// (up, right, down, left); the last line starts with `1` when the robot
/// reached the goal. A log whose first line is `-1` is a failed run and its
/// second line is the reason.
pub fn parse_simulation_log(log: &str) -> Result<SimulationLog> {
    let lines: Vec<&str> = log.trim().lines().map(str::trim).collect();

    if lines.first() == Some(&LOG_ERROR_MARKER) {
        let reason = lines.get(1).copied().unwrap_or("Simulation failed");
        return Err(Error::RunFailure(reason.to_string()));
    }

    let (status, moves) = match lines.split_last() {
        Some((status, moves)) if !moves.is_empty() => (status, moves),
        _ => {
            return Err(Error::InvalidTelemetry(
                "simulator log has no moves".into(),
            ))
        }
    };

    let frames = moves
        .iter()
        .enumerate()
        .map(|(i, line)| parse_log_line(i, line))
        .collect::<Result<Vec<_>>>()?;

    Ok(SimulationLog {
        did_win: status.starts_with('1'),
        total_moves: (frames.len() - 1) as u32,
        frames,
    })
}

fn parse_log_line(index: usize, line: &str) -> Result<TelemetryFrame> {
    let bad = || Error::InvalidTelemetry(format!("line {}: '{line}'", index + 1));

    let mut parts = line.split_whitespace();
    let (dir, x, y) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(x), Some(y), None) => (d, x, y),
        _ => return Err(bad()),
    };

    let direction = dir
        .parse::<usize>()
        .ok()
        .and_then(|i| LOG_DIRECTIONS.get(i))
        .and_then(|name| Direction::from_name(name))
        .ok_or_else(bad)?;

    Ok(TelemetryFrame {
        x: x.parse().map_err(|_| bad())?,
        y: y.parse().map_err(|_| bad())?,
        direction: Some(direction),
        time: Some(index as u32),
    })
}
