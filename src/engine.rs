use rand::Rng;
use std::fmt;

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions in evaluation order.
    ///
    /// Policies iterate this array and break ties toward the earlier
    /// direction, so the order is part of the move-selection contract.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

/// Number of cells on the 3x3 board.
pub const CELLS: usize = 9;

/// 3x3 board of tile exponents, row-major.
///
/// Each cell holds an exponent in `[0, 11)`: 0 is empty, `k` is the tile
/// with face value `2^k`. The value network indexes straight off these
/// exponents, so anything >= 11 is outside the contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board([u8; CELLS]);

// Row-major index triples for each movement axis. Left/Up consume these
// forward; Right/Down consume them reversed.
const ROWS: [[usize; 3]; 3] = [[0, 1, 2], [3, 4, 5], [6, 7, 8]];
const COLS: [[usize; 3]; 3] = [[0, 3, 6], [1, 4, 7], [2, 5, 8]];

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board([0; CELLS]);

    /// Construct a `Board` from raw cell exponents.
    #[inline]
    pub fn from_cells(cells: [u8; CELLS]) -> Self {
        Board(cells)
    }

    /// Borrow the raw cell exponents.
    #[inline]
    pub fn cells(&self) -> &[u8; CELLS] {
        &self.0
    }

    /// Exponent at `idx` (0..9, row-major).
    #[inline]
    pub fn cell(&self, idx: usize) -> u8 {
        self.0[idx]
    }

    /// Return the board resulting from sliding/merging tiles in `dir`
    /// (no random insert), plus the score gained by merges.
    ///
    /// Adjacent equal tiles merge into one tile of exponent+1, each tile
    /// merging at most once per move; every merge adds the resulting
    /// tile's face value to the returned score.
    pub fn shift(self, dir: Move) -> (Board, u32) {
        let (lines, reverse): (&[[usize; 3]; 3], bool) = match dir {
            Move::Left => (&ROWS, false),
            Move::Right => (&ROWS, true),
            Move::Up => (&COLS, false),
            Move::Down => (&COLS, true),
        };
        let mut out = self.0;
        let mut gained = 0;
        for line in lines {
            let idx = if reverse {
                [line[2], line[1], line[0]]
            } else {
                *line
            };
            let (merged, score) = merge_line([self.0[idx[0]], self.0[idx[1]], self.0[idx[2]]]);
            out[idx[0]] = merged[0];
            out[idx[1]] = merged[1];
            out[idx[2]] = merged[2];
            gained += score;
        }
        (Board(out), gained)
    }

    /// Count the number of empty cells.
    #[inline]
    pub fn count_empty(self) -> usize {
        self.0.iter().filter(|&&c| c == 0).count()
    }

    /// Insert a random tile of exponent 1 (90%) or 2 (10%) into a uniformly
    /// random empty cell, using the provided RNG.
    ///
    /// The caller must guarantee the board is not full.
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let mut index = rng.gen_range(0..self.count_empty());
        let tile = generate_random_tile(rng);
        let mut out = self.0;
        for cell in out.iter_mut() {
            if *cell != 0 {
                continue;
            }
            if index == 0 {
                *cell = tile;
                break;
            }
            index -= 1;
        }
        Board(out)
    }

    /// True if no move in any direction changes the board.
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| self.shift(dir).0 == self)
    }

    /// Highest exponent present on the board.
    #[inline]
    pub fn highest_exponent(self) -> u8 {
        self.0.iter().copied().max().unwrap_or(0)
    }

    /// Sum of the face values of all tiles (`2^exponent` per non-empty cell).
    pub fn total_value(self) -> u32 {
        self.0
            .iter()
            .filter(|&&c| c != 0)
            .map(|&c| 1u32 << c)
            .sum()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:?})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<_> = self.0.iter().map(format_val).collect();
        write!(
            f,
            "\n{}|{}|{}\n-----------------------\n{}|{}|{}\n-----------------------\n{}|{}|{}\n",
            cells[0], cells[1], cells[2], cells[3], cells[4], cells[5], cells[6], cells[7], cells[8]
        )
    }
}

/// A board plus its cumulative merge score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub score: u32,
}

impl GameState {
    /// Start a new game: empty board, score 0, two spawned tiles.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let board = Board::EMPTY.with_random_tile(rng).with_random_tile(rng);
        GameState { board, score: 0 }
    }

    /// Simulate a slide-and-merge move. Returns `None` when the move
    /// changes nothing (an illegal move, not an error).
    pub fn play(&self, dir: Move) -> Option<GameState> {
        let (board, gained) = self.board.shift(dir);
        if board == self.board {
            return None;
        }
        Some(GameState {
            board,
            score: self.score + gained,
        })
    }

    /// Place a new random tile. The caller must guarantee a free cell.
    pub fn put_new_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.board = self.board.with_random_tile(rng);
    }

    /// True iff `play` would return `None` for all four directions.
    pub fn is_game_over(&self) -> bool {
        self.board.is_game_over()
    }
}

/// Slide a 3-cell line toward index 0 and merge one adjacent equal pair.
///
/// Returns the merged line and the face value gained by the merge (0 when
/// nothing merged).
fn merge_line(line: [u8; 3]) -> ([u8; 3], u32) {
    // Compact non-empty tiles toward the front.
    let mut out = [0u8; 3];
    let mut n = 0;
    for &v in &line {
        if v != 0 {
            out[n] = v;
            n += 1;
        }
    }
    // At most one merge is possible on a 3-cell line.
    if out[0] != 0 && out[0] == out[1] {
        out[0] += 1;
        out[1] = out[2];
        out[2] = 0;
        (out, 1 << out[0])
    } else if out[1] != 0 && out[1] == out[2] {
        out[1] += 1;
        out[2] = 0;
        (out, 1 << out[1])
    } else {
        (out, 0)
    }
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    if rng.gen_range(0..10) < 9 {
        1
    } else {
        2
    }
}

fn format_val(val: &u8) -> String {
    match val {
        0 => String::from("       "),
        &x => format!("{:^7}", 1u32 << x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn it_merge_line() {
        assert_eq!(merge_line([0, 0, 0]), ([0, 0, 0], 0));
        assert_eq!(merge_line([1, 0, 1]), ([2, 0, 0], 4));
        assert_eq!(merge_line([1, 1, 1]), ([2, 1, 0], 4));
        assert_eq!(merge_line([2, 1, 1]), ([2, 2, 0], 4));
        assert_eq!(merge_line([1, 2, 1]), ([1, 2, 1], 0));
        assert_eq!(merge_line([0, 0, 3]), ([3, 0, 0], 0));
        assert_eq!(merge_line([3, 3, 0]), ([4, 0, 0], 16));
    }

    #[test]
    fn test_shift_left() {
        let b = Board::from_cells([1, 0, 1, 2, 2, 0, 0, 0, 3]);
        let (shifted, gained) = b.shift(Move::Left);
        assert_eq!(shifted, Board::from_cells([2, 0, 0, 3, 0, 0, 3, 0, 0]));
        assert_eq!(gained, 4 + 8);
    }

    #[test]
    fn test_shift_right() {
        let b = Board::from_cells([1, 0, 1, 2, 2, 0, 0, 0, 3]);
        let (shifted, gained) = b.shift(Move::Right);
        assert_eq!(shifted, Board::from_cells([0, 0, 2, 0, 0, 3, 0, 0, 3]));
        assert_eq!(gained, 4 + 8);
    }

    #[test]
    fn test_shift_up() {
        let b = Board::from_cells([1, 2, 0, 1, 0, 3, 2, 2, 3]);
        let (shifted, gained) = b.shift(Move::Up);
        assert_eq!(shifted, Board::from_cells([2, 3, 4, 2, 0, 0, 0, 0, 0]));
        assert_eq!(gained, 4 + 8 + 16);
    }

    #[test]
    fn test_shift_down() {
        let b = Board::from_cells([1, 2, 0, 1, 0, 3, 2, 2, 3]);
        let (shifted, gained) = b.shift(Move::Down);
        assert_eq!(shifted, Board::from_cells([0, 0, 0, 2, 0, 0, 2, 3, 4]));
        assert_eq!(gained, 4 + 8 + 16);
    }

    #[test]
    fn merge_only_once_per_move() {
        // [1, 1, 2] must not cascade into [3, 0, 0].
        let b = Board::from_cells([1, 1, 2, 0, 0, 0, 0, 0, 0]);
        let (shifted, gained) = b.shift(Move::Left);
        assert_eq!(shifted, Board::from_cells([2, 2, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(gained, 4);
    }

    #[test]
    fn illegal_move_returns_none() {
        let state = GameState {
            board: Board::from_cells([1, 2, 3, 0, 0, 0, 0, 0, 0]),
            score: 0,
        };
        assert!(state.play(Move::Up).is_none());
        assert!(state.play(Move::Down).is_some());
    }

    #[test]
    fn game_over_iff_all_moves_illegal() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let mut state = GameState::new(&mut rng);
            // Walk a random game; the equivalence must hold at every state.
            loop {
                let any_legal = Move::ALL.iter().any(|&d| state.play(d).is_some());
                assert_eq!(state.is_game_over(), !any_legal);
                if !any_legal {
                    break;
                }
                let dir = *Move::ALL
                    .iter()
                    .find(|&&d| state.play(d).is_some())
                    .unwrap();
                state = state.play(dir).unwrap();
                if state.board.count_empty() > 0 {
                    state.put_new_tile(&mut rng);
                }
            }
        }
    }

    #[test]
    fn tile_value_conserved_by_moves() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let mut cells = [0u8; CELLS];
            for c in cells.iter_mut() {
                *c = rng.gen_range(0..6);
            }
            let board = Board::from_cells(cells);
            for dir in Move::ALL {
                let (shifted, _) = board.shift(dir);
                // Merging 2^k + 2^k into 2^(k+1) preserves the face total.
                assert_eq!(shifted.total_value(), board.total_value());
            }
        }
    }

    #[test]
    fn random_tile_fills_board() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut board = Board::EMPTY;
        for _ in 0..CELLS {
            board = board.with_random_tile(&mut rng);
        }
        assert_eq!(board.count_empty(), 0);
        assert!(board.cells().iter().all(|&c| c == 1 || c == 2));
    }

    #[test]
    fn new_game_has_two_tiles() {
        let mut rng = StdRng::seed_from_u64(42);
        let state = GameState::new(&mut rng);
        assert_eq!(state.board.count_empty(), CELLS - 2);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn play_accumulates_score() {
        let state = GameState {
            board: Board::from_cells([2, 2, 0, 0, 0, 0, 0, 0, 0]),
            score: 100,
        };
        let next = state.play(Move::Left).unwrap();
        assert_eq!(next.score, 108);
        assert_eq!(next.board, Board::from_cells([3, 0, 0, 0, 0, 0, 0, 0, 0]));
    }
}
