//! Rinnsal provides persistent input states for writing backtracking recursive-descent parsers
//! over input that arrives incrementally.
//!
//! The central type is [`State`], an immutable cursor into the input. Reading a byte or a scalar
//! value from a `State` returns a new `State` positioned after it, leaving the original untouched.
//! Backtracking to an earlier position is as simple as holding on to an earlier `State`.
//!
//! Input can be in-memory text or bytes, or it can be pulled from a [`PullSource`] (or any
//! [`Read`][std::io::Read] instance) in chunks. Chunks are pulled on demand, one at a time, and
//! stored in a chain shared by all states derived from the same initial state. Scalar values whose
//! UTF-8 encoding is split across two chunks are decoded as a whole.
//!
//! ## Using Rinnsal
//!
//! Parsers implement the [`Parser`] trait, which is implemented for every closure taking a
//! `&State` and returning a [`Parsed`] value. Small parsers are combined into larger ones:
//!
//! ```rust
//! use rinnsal::{bind, capture_text, literal, many, parse_text, satisfy, Error, Parser};
//!
//! let greeting = bind(literal("hello "), |()| {
//!     capture_text(many(satisfy(|c| c.is_alphanumeric())))
//! });
//! assert_eq!(parse_text(&greeting, "hello wörld").unwrap(), "wörld");
//!
//! let either = literal("hello").map(|()| 1).or(literal("help").map(|()| 2));
//! assert_eq!(parse_text(&either, "help").unwrap(), 2);
//! assert!(matches!(parse_text(&either, "hex"), Err(Error::NoMatch)));
//! ```
//!
//! A failing parser returns a [`Failure`] which contains the [`Error`] together with the state it
//! was started from, so no input is consumed and another parser can be tried from the same state.

#![warn(missing_docs)]
mod chain;
mod error;
mod parser;
mod position;
mod state;
pub mod text;

pub use chain::{Config, PullSource, Pulled, ReadSource, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use error::{Error, Failure, PositionedError};
pub use parser::{
    bind, capture_bytes, capture_positions, capture_text, end_of_input, literal, literal_bytes,
    many, map, optional, or, parse, parse_bytes, parse_text, satisfy, satisfy_byte, sequence,
    Parsed, Parser,
};
pub use position::Position;
pub use state::State;
