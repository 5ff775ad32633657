use rand::seq::SliceRandom;
use rand::Rng;

use super::config::*;
use super::maze::{CellPos, MazeConfiguration};
use crate::error::Result;

/// Generate a perfect maze of `rows` x `cols` cells.
///
/// Algorithm (randomized depth-first search):
/// 1. Start with every wall of every cell standing
/// 2. Mark a random cell visited and push it on a stack
/// 3. Pop a cell; if it has unvisited neighbours, push it back, pick one at
///    random, knock down the wall between them on both sides, mark the
///    neighbour visited and push it
/// 4. Repeat until the stack is empty
///
/// Every cell ends up reachable from every other and the outer boundary stays
/// closed. Start is the top-left cell, goal the bottom-right one.
pub fn generate_maze<R: Rng + ?Sized>(
    id: i64,
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> Result<MazeConfiguration> {
    let rows = rows.max(1);
    let cols = cols.max(1);

    let mut grid = vec![vec![WALL_ALL; cols]; rows];
    let mut visited = vec![vec![false; cols]; rows];

    let first = (rng.gen_range(0..rows), rng.gen_range(0..cols));
    visited[first.0][first.1] = true;
    let mut stack = vec![first];

    while let Some((r, c)) = stack.pop() {
        let mut neighbours: Vec<(usize, usize, u8, u8)> = Vec::with_capacity(4);
        if r > 0 && !visited[r - 1][c] {
            neighbours.push((r - 1, c, WALL_NORTH, WALL_SOUTH));
        }
        if r + 1 < rows && !visited[r + 1][c] {
            neighbours.push((r + 1, c, WALL_SOUTH, WALL_NORTH));
        }
        if c + 1 < cols && !visited[r][c + 1] {
            neighbours.push((r, c + 1, WALL_EAST, WALL_WEST));
        }
        if c > 0 && !visited[r][c - 1] {
            neighbours.push((r, c - 1, WALL_WEST, WALL_EAST));
        }

        if let Some(&(nr, nc, here, there)) = neighbours.choose(rng) {
            stack.push((r, c));
            grid[r][c] &= !here;
            grid[nr][nc] &= !there;
            visited[nr][nc] = true;
            stack.push((nr, nc));
        }
    }

    MazeConfiguration::new(
        id,
        CellPos { row: 0, col: 0 },
        CellPos {
            row: rows - 1,
            col: cols - 1,
        },
        grid,
    )
}

/// Generate a square maze with a random side length, the way the backend's
/// random-maze endpoint does.
pub fn random_maze<R: Rng + ?Sized>(id: i64, rng: &mut R) -> Result<MazeConfiguration> {
    let size = rng.gen_range(MIN_RANDOM_MAZE_SIZE..=MAX_RANDOM_MAZE_SIZE);
    generate_maze(id, size, size, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;

    fn reachable_cells(maze: &MazeConfiguration) -> usize {
        let mut seen = vec![false; maze.rows() * maze.cols()];
        let mut queue = VecDeque::new();
        queue.push_back((0i32, 0i32));
        seen[0] = true;
        let mut count = 0;
        while let Some((x, y)) = queue.pop_front() {
            count += 1;
            let walls = maze.walls_at(x, y).unwrap();
            let steps = [
                (!walls.north, 0, -1),
                (!walls.south, 0, 1),
                (!walls.east, 1, 0),
                (!walls.west, -1, 0),
            ];
            for (open, dx, dy) in steps {
                let (nx, ny) = (x + dx, y + dy);
                if open && maze.walls_at(nx, ny).is_some() {
                    let idx = ny as usize * maze.cols() + nx as usize;
                    if !seen[idx] {
                        seen[idx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
        count
    }

    #[test]
    fn test_generated_maze_is_fully_connected() {
        let mut rng = StdRng::seed_from_u64(7);
        let maze = generate_maze(1, 8, 6, &mut rng).unwrap();
        assert_eq!(maze.rows(), 8);
        assert_eq!(maze.cols(), 6);
        assert_eq!(reachable_cells(&maze), 48);
        assert_eq!(maze.start, CellPos { row: 0, col: 0 });
        assert_eq!(maze.goal, CellPos { row: 7, col: 5 });
    }

    #[test]
    fn test_generated_maze_keeps_boundary_closed() {
        let mut rng = StdRng::seed_from_u64(42);
        let maze = generate_maze(1, 5, 5, &mut rng).unwrap();
        for i in 0..5 {
            assert!(maze.walls_at(i, 0).unwrap().north);
            assert!(maze.walls_at(i, 4).unwrap().south);
            assert!(maze.walls_at(0, i).unwrap().west);
            assert!(maze.walls_at(4, i).unwrap().east);
        }
    }

    #[test]
    fn test_neighbouring_walls_agree() {
        let mut rng = StdRng::seed_from_u64(3);
        let maze = generate_maze(1, 6, 6, &mut rng).unwrap();
        for y in 0..6 {
            for x in 0..6 {
                let here = maze.walls_at(x, y).unwrap();
                if let Some(right) = maze.walls_at(x + 1, y) {
                    assert_eq!(here.east, right.west);
                }
                if let Some(below) = maze.walls_at(x, y + 1) {
                    assert_eq!(here.south, below.north);
                }
            }
        }
    }

    #[test]
    fn test_random_maze_size_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            let maze = random_maze(1, &mut rng).unwrap();
            assert_eq!(maze.rows(), maze.cols());
            assert!((MIN_RANDOM_MAZE_SIZE..=MAX_RANDOM_MAZE_SIZE).contains(&maze.rows()));
        }
    }

    #[test]
    fn test_single_cell_maze() {
        let mut rng = StdRng::seed_from_u64(0);
        let maze = generate_maze(1, 1, 1, &mut rng).unwrap();
        assert_eq!(maze.hex_grid(), vec![vec!["f".to_string()]]);
    }
}
