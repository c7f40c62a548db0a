use std::fmt;

/// Source location of an input [`State`][crate::State].
///
/// Lines and columns follow the convention where the first line and the first column are `1`.
/// The column counts consumed units: bytes when advancing with [`State::byte`][crate::State::byte]
/// and scalar values when advancing with [`State::rune`][crate::State::rune]. Consuming a line feed
/// moves to column `1` of the next line.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Position {
    /// Number of bytes consumed since the start of the input.
    pub offset: usize,
    /// The source line, starting at `1`.
    pub line: usize,
    /// The source column, starting at `1`.
    pub column: usize,
}

impl Position {
    /// The position of the first byte of an input.
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };

    /// Returns the position after consuming `width` bytes making up the unit `unit`.
    #[inline]
    pub(crate) fn advance(self, width: usize, unit: u32) -> Position {
        if unit == u32::from(b'\n') {
            Position {
                offset: self.offset + width,
                line: self.line + 1,
                column: 1,
            }
        } else {
            Position {
                offset: self.offset + width,
                line: self.line,
                column: self.column + 1,
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_counts_columns() {
        let pos = Position::START.advance(1, u32::from(b'a')).advance(3, '∞' as u32);
        assert_eq!(
            pos,
            Position {
                offset: 4,
                line: 1,
                column: 3
            }
        );
    }

    #[test]
    fn line_feed_starts_new_line() {
        let pos = Position::START
            .advance(1, u32::from(b'a'))
            .advance(1, u32::from(b'\n'));
        assert_eq!(
            pos,
            Position {
                offset: 2,
                line: 2,
                column: 1
            }
        );
        assert_eq!(pos.to_string(), "2:1");
    }
}
