//! Char-offset ↔ (line, column) translation over flat text.
//!
//! The replicated document addresses the text as a flat sequence of
//! `char`s; the editor surface addresses it as line/column pairs. Both
//! functions here are pure over the current buffer content and are exact
//! inverses of each other for any in-bounds input. Out-of-range input is a
//! caller error and is reported as [`PositionError`] — positions and
//! offsets must always be derived from a live snapshot of the same text.
//!
//! Columns count `char`s within a line; lines are `'\n'`-separated. The
//! offset of the position just past the final char equals the text's char
//! length, so a cursor may sit at end-of-buffer.

use std::fmt;

/// Line/column coordinate in a text buffer. Zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Out-of-range translation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    OffsetOutOfRange { offset: usize, len: usize },
    LineOutOfRange { line: usize, lines: usize },
    ColumnOutOfRange { line: usize, column: usize, line_len: usize },
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffsetOutOfRange { offset, len } => {
                write!(f, "offset {offset} out of range for length {len}")
            }
            Self::LineOutOfRange { line, lines } => {
                write!(f, "line {line} out of range for {lines} lines")
            }
            Self::ColumnOutOfRange { line, column, line_len } => {
                write!(
                    f,
                    "column {column} out of range on line {line} of length {line_len}"
                )
            }
        }
    }
}

impl std::error::Error for PositionError {}

/// Translate a line/column position into a flat char offset.
pub fn position_to_offset(text: &str, pos: Position) -> Result<usize, PositionError> {
    let mut offset = 0;
    for (index, line) in text.split('\n').enumerate() {
        if index == pos.line {
            let line_len = line.chars().count();
            if pos.column > line_len {
                return Err(PositionError::ColumnOutOfRange {
                    line: pos.line,
                    column: pos.column,
                    line_len,
                });
            }
            return Ok(offset + pos.column);
        }
        offset += line.chars().count() + 1;
    }
    Err(PositionError::LineOutOfRange {
        line: pos.line,
        lines: text.split('\n').count(),
    })
}

/// Translate a flat char offset into a line/column position.
pub fn offset_to_position(text: &str, offset: usize) -> Result<Position, PositionError> {
    let mut remaining = offset;
    for (index, line) in text.split('\n').enumerate() {
        let line_len = line.chars().count();
        if remaining <= line_len {
            return Ok(Position::new(index, remaining));
        }
        remaining -= line_len + 1;
    }
    Err(PositionError::OffsetOutOfRange {
        offset,
        len: text.chars().count(),
    })
}

/// Byte index of the char at `char_offset`, or the text's byte length when
/// `char_offset` is the end-of-text offset. Needed wherever a char-addressed
/// operation meets a byte-addressed string API.
pub fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "alpha\nbeta γδ\n\nlast";

    #[test]
    fn test_offset_of_origin() {
        assert_eq!(position_to_offset("abc", Position::new(0, 0)).unwrap(), 0);
        assert_eq!(offset_to_position("abc", 0).unwrap(), Position::new(0, 0));
    }

    #[test]
    fn test_offset_spans_lines() {
        // "alpha\n" is 6 chars, so line 1 column 0 sits at offset 6.
        assert_eq!(
            position_to_offset(SAMPLE, Position::new(1, 0)).unwrap(),
            6
        );
        assert_eq!(offset_to_position(SAMPLE, 6).unwrap(), Position::new(1, 0));
    }

    #[test]
    fn test_end_of_line_and_start_of_next_are_distinct_offsets() {
        let text = "ab\ncd";
        assert_eq!(position_to_offset(text, Position::new(0, 2)).unwrap(), 2);
        assert_eq!(position_to_offset(text, Position::new(1, 0)).unwrap(), 3);
        assert_eq!(offset_to_position(text, 2).unwrap(), Position::new(0, 2));
        assert_eq!(offset_to_position(text, 3).unwrap(), Position::new(1, 0));
    }

    #[test]
    fn test_end_of_buffer_offset_is_valid() {
        let len = SAMPLE.chars().count();
        let pos = offset_to_position(SAMPLE, len).unwrap();
        assert_eq!(position_to_offset(SAMPLE, pos).unwrap(), len);
    }

    #[test]
    fn test_round_trip_every_offset() {
        for offset in 0..=SAMPLE.chars().count() {
            let pos = offset_to_position(SAMPLE, offset).unwrap();
            assert_eq!(
                position_to_offset(SAMPLE, pos).unwrap(),
                offset,
                "round trip failed at offset {offset}"
            );
        }
    }

    #[test]
    fn test_round_trip_empty_text() {
        assert_eq!(offset_to_position("", 0).unwrap(), Position::new(0, 0));
        assert_eq!(position_to_offset("", Position::new(0, 0)).unwrap(), 0);
    }

    #[test]
    fn test_multibyte_chars_count_as_one_column() {
        // 'γ' and 'δ' are multi-byte but single-column.
        let text = "γδ\nx";
        assert_eq!(position_to_offset(text, Position::new(0, 2)).unwrap(), 2);
        assert_eq!(offset_to_position(text, 3).unwrap(), Position::new(1, 0));
    }

    #[test]
    fn test_offset_out_of_range() {
        let len = SAMPLE.chars().count();
        assert_eq!(
            offset_to_position(SAMPLE, len + 1),
            Err(PositionError::OffsetOutOfRange {
                offset: len + 1,
                len
            })
        );
    }

    #[test]
    fn test_line_out_of_range() {
        assert!(matches!(
            position_to_offset("one\ntwo", Position::new(2, 0)),
            Err(PositionError::LineOutOfRange { line: 2, lines: 2 })
        ));
    }

    #[test]
    fn test_column_out_of_range() {
        assert!(matches!(
            position_to_offset("one\ntwo", Position::new(0, 4)),
            Err(PositionError::ColumnOutOfRange {
                line: 0,
                column: 4,
                line_len: 3
            })
        ));
    }

    #[test]
    fn test_byte_index_multibyte() {
        let text = "aγb";
        assert_eq!(byte_index(text, 0), 0);
        assert_eq!(byte_index(text, 1), 1);
        assert_eq!(byte_index(text, 2), 3); // 'γ' is two bytes
        assert_eq!(byte_index(text, 3), 4); // end of text
    }
}
