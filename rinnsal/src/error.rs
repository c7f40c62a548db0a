use std::{error::Error as StdError, fmt, io, sync::Arc};

use thiserror::Error;

use crate::{Position, State};

/// Errors reported when reading from a [`State`] or when a parser fails.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// There is no more input.
    ///
    /// This is the expected way for a traversal to finish and not a fault.
    #[error("end of input")]
    EndOfInput,
    /// The bytes starting at `position` are not a valid UTF-8 encoded scalar value.
    #[error("invalid UTF-8 sequence at {position}")]
    InvalidEncoding {
        /// Position of the first byte of the malformed sequence.
        position: Position,
    },
    /// The input does not match the expected input of a parser.
    #[error("no match")]
    NoMatch,
    /// Any other error, together with the position where it was detected.
    #[error(transparent)]
    Positioned(#[from] PositionedError),
}

impl Error {
    /// Returns whether this is [`Error::EndOfInput`].
    #[inline]
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Error::EndOfInput)
    }

    /// Returns whether this error allows trying an alternative parser at the same position.
    ///
    /// This is the case for [`Error::NoMatch`] and [`Error::EndOfInput`].
    #[inline]
    pub fn is_fallthrough(&self) -> bool {
        matches!(self, Error::NoMatch | Error::EndOfInput)
    }

    /// Returns the position attached to this error, if any.
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::InvalidEncoding { position } => Some(*position),
            Error::Positioned(err) => Some(err.position),
            Error::EndOfInput | Error::NoMatch => None,
        }
    }

    pub(crate) fn io(position: Position, err: Arc<io::Error>) -> Self {
        Error::Positioned(PositionedError {
            position,
            source: err,
        })
    }
}

/// Wraps an arbitrary error with the position at which it was detected.
#[derive(Error, Debug, Clone)]
#[error("error at {position}: {source}")]
pub struct PositionedError {
    /// Where the error was detected.
    pub position: Position,
    /// The underlying error.
    #[source]
    pub source: Arc<dyn StdError + Send + Sync>,
}

impl PositionedError {
    /// Wraps `err` with `position`.
    pub fn new(position: Position, err: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            position,
            source: Arc::new(err),
        }
    }

    /// Returns a reference to the wrapped error as `E`, if it has that type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref()
    }
}

/// Failed result of a [`Parser`][crate::Parser].
///
/// Besides the error, this contains the state from which parsing can continue. All parsers of this
/// crate return the state they were started from, so a failed parse never consumes input.
pub struct Failure<'a> {
    /// The reason parsing failed.
    pub error: Error,
    /// The state to continue from.
    pub state: State<'a>,
}

impl<'a> Failure<'a> {
    /// Creates a failure that continues at `state`.
    #[inline]
    pub fn new(error: Error, state: State<'a>) -> Self {
        Self { error, state }
    }

    /// Replaces the state to continue from, keeping the error.
    #[inline]
    pub fn rewind(self, state: State<'a>) -> Self {
        Self {
            error: self.error,
            state,
        }
    }
}

impl fmt::Debug for Failure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.error)
            .field("position", &self.state.position())
            .finish()
    }
}

impl fmt::Display for Failure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl StdError for Failure<'_> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

impl From<Failure<'_>> for Error {
    fn from(failure: Failure<'_>) -> Self {
        failure.error
    }
}
