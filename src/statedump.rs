//! Text dumps of recorded games, one record per line.
//!
//! A line is either 9 whitespace-separated cell exponents (row-major) or a
//! game-over marker, e.g. `gameover_turn: 57; game: 3; progress: 220;
//! score: 1852`. Marker lines are kept verbatim so evaluators can echo
//! them into their output unchanged.

use std::fs;
use std::io;
use std::path::Path;

use crate::engine::{Board, CELLS};

/// One line of a state dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Board(Board),
    GameOver(String),
}

/// Parse a single dump line. Blank lines yield `None`; anything that is
/// not 9 integers is a game-over marker.
pub fn parse_line(line: &str) -> Option<Record> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() == CELLS {
        let mut cells = [0u8; CELLS];
        let mut ok = true;
        for (cell, field) in cells.iter_mut().zip(&fields) {
            match field.parse::<u8>() {
                Ok(v) => *cell = v,
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            return Some(Record::Board(Board::from_cells(cells)));
        }
    }
    Some(Record::GameOver(trimmed.to_string()))
}

/// Read every record of a dump file, in order.
pub fn read_records<P: AsRef<Path>>(path: P) -> io::Result<Vec<Record>> {
    let text = fs::read_to_string(path)?;
    Ok(text.lines().filter_map(parse_line).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_board_lines() {
        let rec = parse_line("0 1 2 0 0 1 0 0 0").unwrap();
        assert_eq!(
            rec,
            Record::Board(Board::from_cells([0, 1, 2, 0, 0, 1, 0, 0, 0]))
        );
    }

    #[test]
    fn parses_gameover_lines_verbatim() {
        let line = "gameover_turn: 57; game: 3; progress: 220; score: 1852";
        assert_eq!(parse_line(line), Some(Record::GameOver(line.to_string())));
    }

    #[test]
    fn skips_blank_lines() {
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn reads_mixed_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "0 0 0 0 1 0 0 0 1").unwrap();
        writeln!(f, "0 0 0 0 1 1 0 0 1").unwrap();
        writeln!(f, "gameover_turn: 2; game: 1; progress: 3; score: 4").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "1 1 0 0 0 0 0 0 0").unwrap();
        let records = read_records(f.path()).unwrap();
        assert_eq!(records.len(), 4);
        assert!(matches!(records[2], Record::GameOver(_)));
        assert!(matches!(records[3], Record::Board(_)));
    }
}
