// Robot state and the manual movement rules.

use serde::{Deserialize, Serialize};

use super::config::*;
use super::maze::{MazeConfiguration, Walls};
use super::telemetry::TelemetryFrame;

/// Which way the robot is facing. "Up" is toward row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Parse a wire direction name (`"up"`, `"right"`, ...).
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Quarter turn counter-clockwise: right -> up -> left -> down -> right.
    pub fn rotated_left(self) -> Self {
        match self {
            Self::Right => Self::Up,
            Self::Up => Self::Left,
            Self::Left => Self::Down,
            Self::Down => Self::Right,
        }
    }

    /// Quarter turn clockwise.
    pub fn rotated_right(self) -> Self {
        match self {
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
            Self::Up => Self::Right,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Column and row delta of one step in this direction.
    fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// Whether `walls` blocks leaving the cell in this direction.
    fn blocked_by(self, walls: &Walls) -> bool {
        match self {
            Self::Up => walls.north,
            Self::Down => walls.south,
            Self::Left => walls.west,
            Self::Right => walls.east,
        }
    }
}

/// Position (`x` = column, `y` = row) and facing of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotState {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
}

impl RobotState {
    /// The canonical start state: top-left cell, facing up.
    pub const fn initial() -> Self {
        Self {
            x: INITIAL_X,
            y: INITIAL_Y,
            direction: Direction::Up,
        }
    }

    /// Move to a replayed frame. Frames without a direction keep the current facing.
    pub fn apply_frame(&mut self, frame: &TelemetryFrame) {
        self.x = frame.x;
        self.y = frame.y;
        if let Some(direction) = frame.direction {
            self.direction = direction;
        }
    }
}

impl Default for RobotState {
    fn default() -> Self {
        Self::initial()
    }
}

/// A manual driving command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Forward,
    Backward,
    RotateLeft,
    RotateRight,
}

impl Command {
    /// Map a key name to a command. Arrow keys as reported by browsers, plus
    /// WASD for terminal driving.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" | "w" | "W" => Some(Self::Forward),
            "ArrowDown" | "s" | "S" => Some(Self::Backward),
            "ArrowLeft" | "a" | "A" => Some(Self::RotateLeft),
            "ArrowRight" | "d" | "D" => Some(Self::RotateRight),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::RotateLeft => "rotate_left",
            Self::RotateRight => "rotate_right",
        }
    }
}

/// Apply one command to the robot.
///
/// Rotations always succeed. Moves are gated by the wall on the side the
/// robot leaves through; a blocked move returns the state unchanged. Cells
/// outside the grid count as fully walled.
pub fn apply_command(state: RobotState, maze: &MazeConfiguration, command: Command) -> RobotState {
    let heading = match command {
        Command::RotateLeft => {
            return RobotState {
                direction: state.direction.rotated_left(),
                ..state
            }
        }
        Command::RotateRight => {
            return RobotState {
                direction: state.direction.rotated_right(),
                ..state
            }
        }
        Command::Forward => state.direction,
        Command::Backward => state.direction.opposite(),
    };

    let walls = maze.walls_at(state.x, state.y).unwrap_or(Walls::CLOSED);
    if heading.blocked_by(&walls) {
        return state;
    }

    let (dx, dy) = heading.delta();
    RobotState {
        x: state.x + dx,
        y: state.y + dy,
        direction: state.direction,
    }
}
