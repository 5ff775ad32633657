// Wall bits, in the order they appear in a cell code (most significant first)
pub const WALL_NORTH: u8 = 0b1000;
pub const WALL_EAST: u8 = 0b0100;
pub const WALL_SOUTH: u8 = 0b0010;
pub const WALL_WEST: u8 = 0b0001;

pub const WALL_ALL: u8 = WALL_NORTH | WALL_EAST | WALL_SOUTH | WALL_WEST;
pub const MAX_CELL_CODE: u8 = 15;

// Robot start state, restored on every reset
pub const INITIAL_X: i32 = 0;
pub const INITIAL_Y: i32 = 0;

// Simulator log direction indices [up, right, down, left]
pub const LOG_DIRECTIONS: [&str; 4] = ["up", "right", "down", "left"];

// Simulator log marker for a failed run
pub const LOG_ERROR_MARKER: &str = "-1";

// Playback timing (milliseconds)
pub const DEFAULT_FRAME_DELAY_MS: u64 = 25;
pub const MAX_SPEED: u64 = 500;

// Run service timeout (seconds)
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 15;

// Random maze sizes (square, inclusive)
pub const MIN_RANDOM_MAZE_SIZE: usize = 5;
pub const MAX_RANDOM_MAZE_SIZE: usize = 15;
