use serde::{Deserialize, Serialize};

use super::config::*;
use crate::error::{Error, Result};

/// Which sides of a cell are blocked. `true` means a wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Walls {
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

impl Walls {
    /// A cell with every side closed.
    pub const CLOSED: Walls = Walls {
        north: true,
        east: true,
        south: true,
        west: true,
    };

    /// Encode back into a cell code (inverse of [`walls_of`]).
    pub fn code(&self) -> u8 {
        let mut code = 0;
        if self.north {
            code |= WALL_NORTH;
        }
        if self.east {
            code |= WALL_EAST;
        }
        if self.south {
            code |= WALL_SOUTH;
        }
        if self.west {
            code |= WALL_WEST;
        }
        code
    }
}

/// Decode a cell wall code.
///
/// The code is read as a 4-bit number, most significant bit first, in the
/// order north, east, south, west: `9` (`1001`) is walled to the north and
/// west and open to the east and south.
pub fn walls_of(code: u8) -> Result<Walls> {
    if code > MAX_CELL_CODE {
        return Err(Error::InvalidMazeData(format!(
            "cell code {code} is out of range 0..=15"
        )));
    }
    Ok(Walls {
        north: code & WALL_NORTH != 0,
        east: code & WALL_EAST != 0,
        south: code & WALL_SOUTH != 0,
        west: code & WALL_WEST != 0,
    })
}

/// Parse a single hex digit string (`"d"`, `"F"`, `"0"`) into a cell code.
pub fn parse_cell_code(s: &str) -> Result<u8> {
    let mut chars = s.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c
            .to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| Error::InvalidMazeData(format!("'{s}' is not a hex digit"))),
        _ => Err(Error::InvalidMazeData(format!(
            "'{s}' is not a single hex digit"
        ))),
    }
}

/// A grid cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

/// A maze as fetched from the backend: start and goal cells plus a
/// rectangular grid of wall codes. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MazeConfiguration {
    pub id: i64,
    pub start: CellPos,
    pub goal: CellPos,
    rows: usize,
    cols: usize,
    cells: Vec<Walls>,
}

// --- JSON deserialization helpers ---

#[derive(Deserialize)]
struct MazeJson {
    id: i64,
    start_row: usize,
    start_col: usize,
    end_row: usize,
    end_col: usize,
    level_configuration: Vec<Vec<String>>,
}

impl MazeConfiguration {
    /// Build a maze from row-major cell codes.
    ///
    /// Fails with `InvalidMazeData` when the grid is empty or ragged, or
    /// when any code is out of range.
    pub fn new(id: i64, start: CellPos, goal: CellPos, grid: Vec<Vec<u8>>) -> Result<Self> {
        let rows = grid.len();
        let cols = grid.first().map(|r| r.len()).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidMazeData("maze grid is empty".into()));
        }

        let mut cells = Vec::with_capacity(rows * cols);
        for (r, row) in grid.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::InvalidMazeData(format!(
                    "row {r} has {} cells, expected {cols}",
                    row.len()
                )));
            }
            for &code in row {
                cells.push(walls_of(code)?);
            }
        }

        for (label, pos) in [("start", start), ("goal", goal)] {
            if pos.row >= rows || pos.col >= cols {
                return Err(Error::InvalidMazeData(format!(
                    "{label} cell ({}, {}) is outside the {rows}x{cols} grid",
                    pos.row, pos.col
                )));
            }
        }

        Ok(Self {
            id,
            start,
            goal,
            rows,
            cols,
            cells,
        })
    }

    /// Load a maze from the maze-fetch JSON format.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: MazeJson = serde_json::from_str(json)
            .map_err(|e| Error::InvalidMazeData(format!("malformed maze JSON: {e}")))?;

        let grid = parsed
            .level_configuration
            .iter()
            .map(|row| row.iter().map(|s| parse_cell_code(s)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;

        Self::new(
            parsed.id,
            CellPos {
                row: parsed.start_row,
                col: parsed.start_col,
            },
            CellPos {
                row: parsed.end_row,
                col: parsed.end_col,
            },
            grid,
        )
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Walls of the cell at column `x`, row `y`, or `None` outside the grid.
    pub fn walls_at(&self, x: i32, y: i32) -> Option<Walls> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.cols || y >= self.rows {
            return None;
        }
        Some(self.cells[y * self.cols + x])
    }

    /// The grid as hex digit strings, row-major (the `level_configuration` shape).
    pub fn hex_grid(&self) -> Vec<Vec<String>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.iter().map(|w| format!("{:x}", w.code())).collect())
            .collect()
    }
}
