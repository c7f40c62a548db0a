use crate::{Error, Failure, Position, PositionedError, State};

/// Result of running a [`Parser`].
///
/// On success this contains the parsed value and the state after the consumed input. On failure it
/// contains a [`Failure`], holding the error and the state to continue from. Parsers provided by
/// this crate always fail with the state they were started from.
pub type Parsed<'a, T> = std::result::Result<(T, State<'a>), Failure<'a>>;

/// A recursive-descent parser.
///
/// A parser takes an input [`State`] and returns the parsed value together with the state after
/// the consumed input. As states are immutable, the state passed to a parser remains valid after
/// the parser returns, which makes trying an alternative parser after a failure free.
///
/// Every closure of type `Fn(&State<'a>) -> Parsed<'a, T>` is a parser.
pub trait Parser<'a> {
    /// The type of the parsed values.
    type Output;

    /// Runs the parser starting at `state`.
    fn parse(&self, state: &State<'a>) -> Parsed<'a, Self::Output>;

    /// Replaces a successfully parsed value by applying `f` to it. See [`map`].
    fn map<U>(self, f: impl Fn(Self::Output) -> U) -> impl Parser<'a, Output = U>
    where
        Self: Sized,
    {
        map(self, f)
    }

    /// Continues with the parser returned by `f` for the parsed value. See [`bind`].
    fn bind<Q: Parser<'a>>(
        self,
        f: impl Fn(Self::Output) -> Q,
    ) -> impl Parser<'a, Output = Q::Output>
    where
        Self: Sized,
    {
        bind(self, f)
    }

    /// Tries `other` when this parser does not match. See [`or`].
    fn or<Q: Parser<'a, Output = Self::Output>>(
        self,
        other: Q,
    ) -> impl Parser<'a, Output = Self::Output>
    where
        Self: Sized,
    {
        or(self, other)
    }

    /// Returns the consumed input as text instead of the parsed value. See [`capture_text`].
    fn capture_text(self) -> impl Parser<'a, Output = String>
    where
        Self: Sized,
    {
        capture_text(self)
    }

    /// Returns the consumed input instead of the parsed value. See [`capture_bytes`].
    fn capture_bytes(self) -> impl Parser<'a, Output = Vec<u8>>
    where
        Self: Sized,
    {
        capture_bytes(self)
    }

    /// Returns the start and end positions of the consumed input. See [`capture_positions`].
    fn capture_positions(self) -> impl Parser<'a, Output = (Position, Position)>
    where
        Self: Sized,
    {
        capture_positions(self)
    }
}

impl<'a, T, F> Parser<'a> for F
where
    F: Fn(&State<'a>) -> Parsed<'a, T>,
{
    type Output = T;

    #[inline]
    fn parse(&self, state: &State<'a>) -> Parsed<'a, T> {
        self(state)
    }
}

#[inline]
fn fail<'a, T>(error: Error, state: &State<'a>) -> Parsed<'a, T> {
    Err(Failure::new(error, state.clone()))
}

/// Runs `parser` on `state`, returning only the parsed value.
pub fn parse<'a, P: Parser<'a>>(parser: &P, state: State<'a>) -> Result<P::Output, Error> {
    parser
        .parse(&state)
        .map(|(value, _)| value)
        .map_err(|failure| failure.error)
}

/// Runs `parser` on in-memory text.
pub fn parse_text<'a, P: Parser<'a>>(parser: &P, text: &str) -> Result<P::Output, Error> {
    parse(parser, State::from_text(text))
}

/// Runs `parser` on in-memory bytes.
pub fn parse_bytes<'a, P: Parser<'a>>(parser: &P, bytes: &[u8]) -> Result<P::Output, Error> {
    parse(parser, State::from_bytes(bytes))
}

/// Matches the exact text `token`, one scalar value at a time.
///
/// Fails with [`Error::NoMatch`] at the first differing scalar value, or with the error of the
/// failed read. In both cases no input is consumed.
pub fn literal<'a>(token: &str) -> impl Parser<'a, Output = ()> {
    let token = token.to_owned();
    move |state: &State<'a>| {
        let mut next = state.clone();
        for expected in token.chars() {
            let (c, after) = match next.rune() {
                Ok(read) => read,
                Err(error) => return fail(error, state),
            };
            if c != expected {
                return fail(Error::NoMatch, state);
            }
            next = after;
        }
        Ok(((), next))
    }
}

/// Matches the exact bytes `token`, one byte at a time.
///
/// Fails like [`literal`] without consuming input.
pub fn literal_bytes<'a>(token: impl Into<Vec<u8>>) -> impl Parser<'a, Output = ()> {
    let token = token.into();
    move |state: &State<'a>| {
        let mut next = state.clone();
        for &expected in &token {
            let (byte, after) = match next.byte() {
                Ok(read) => read,
                Err(error) => return fail(error, state),
            };
            if byte != expected {
                return fail(Error::NoMatch, state);
            }
            next = after;
        }
        Ok(((), next))
    }
}

/// Runs `parser`, then the parser returned by `f` for its value, starting where `parser` stopped.
///
/// If either parser fails, the combined parser fails with that error and the state it was started
/// from, so a failure in the second step does not leave the input after the first step.
pub fn bind<'a, P, Q, F>(parser: P, f: F) -> impl Parser<'a, Output = Q::Output>
where
    P: Parser<'a>,
    Q: Parser<'a>,
    F: Fn(P::Output) -> Q,
{
    move |state: &State<'a>| {
        let (value, next) = parser
            .parse(state)
            .map_err(|failure| failure.rewind(state.clone()))?;
        f(value)
            .parse(&next)
            .map_err(|failure| failure.rewind(state.clone()))
    }
}

/// Runs `first` and then `second`, combining both values using `mapper`.
///
/// An error returned by `mapper` is reported as [`Error::Positioned`] at the start of the combined
/// input. On any failure, no input is consumed.
pub fn sequence<'a, P, Q, R, E, F>(first: P, second: Q, mapper: F) -> impl Parser<'a, Output = R>
where
    P: Parser<'a>,
    Q: Parser<'a>,
    F: Fn(P::Output, Q::Output) -> Result<R, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    move |state: &State<'a>| {
        let (a, next) = first
            .parse(state)
            .map_err(|failure| failure.rewind(state.clone()))?;
        let (b, next) = second
            .parse(&next)
            .map_err(|failure| failure.rewind(state.clone()))?;
        match mapper(a, b) {
            Ok(value) => Ok((value, next)),
            Err(err) => fail(PositionedError::new(state.position(), err).into(), state),
        }
    }
}

/// Replaces a successfully parsed value with the result of applying `f` to it.
pub fn map<'a, P, U, F>(parser: P, f: F) -> impl Parser<'a, Output = U>
where
    P: Parser<'a>,
    F: Fn(P::Output) -> U,
{
    move |state: &State<'a>| {
        parser
            .parse(state)
            .map(|(value, next)| (f(value), next))
    }
}

/// Matches a single scalar value accepted by `predicate`.
///
/// A rejected scalar value fails with [`Error::NoMatch`] and remains unconsumed.
pub fn satisfy<'a>(predicate: impl Fn(char) -> bool) -> impl Parser<'a, Output = char> {
    move |state: &State<'a>| match state.rune() {
        Ok((c, next)) if predicate(c) => Ok((c, next)),
        Ok(_) => fail(Error::NoMatch, state),
        Err(error) => fail(error, state),
    }
}

/// Matches a single byte accepted by `predicate`.
pub fn satisfy_byte<'a>(predicate: impl Fn(u8) -> bool) -> impl Parser<'a, Output = u8> {
    move |state: &State<'a>| match state.byte() {
        Ok((byte, next)) if predicate(byte) => Ok((byte, next)),
        Ok(_) => fail(Error::NoMatch, state),
        Err(error) => fail(error, state),
    }
}

/// Tries `second` from the same state when `first` falls through.
///
/// `first` falls through when it fails with [`Error::NoMatch`] or [`Error::EndOfInput`]. Other
/// errors are returned without trying `second`.
pub fn or<'a, P, Q>(first: P, second: Q) -> impl Parser<'a, Output = P::Output>
where
    P: Parser<'a>,
    Q: Parser<'a, Output = P::Output>,
{
    move |state: &State<'a>| match first.parse(state) {
        Err(failure) if failure.error.is_fallthrough() => second
            .parse(state)
            .map_err(|failure| failure.rewind(state.clone())),
        Err(failure) => Err(failure.rewind(state.clone())),
        parsed => parsed,
    }
}

/// Makes `parser` optional, returning `None` when it falls through.
pub fn optional<'a, P: Parser<'a>>(parser: P) -> impl Parser<'a, Output = Option<P::Output>> {
    move |state: &State<'a>| match parser.parse(state) {
        Ok((value, next)) => Ok((Some(value), next)),
        Err(failure) if failure.error.is_fallthrough() => Ok((None, state.clone())),
        Err(failure) => Err(failure.rewind(state.clone())),
    }
}

/// Runs `parser` as often as it matches, collecting the values.
///
/// Stops at the first fall through. A match that consumes no input ends the repetition after
/// recording its value.
pub fn many<'a, P: Parser<'a>>(parser: P) -> impl Parser<'a, Output = Vec<P::Output>> {
    move |state: &State<'a>| {
        let mut values = vec![];
        let mut current = state.clone();
        loop {
            match parser.parse(&current) {
                Ok((value, next)) => {
                    let progressed = next.offset() > current.offset();
                    values.push(value);
                    current = next;
                    if !progressed {
                        break;
                    }
                }
                Err(failure) if failure.error.is_fallthrough() => break,
                Err(failure) => return Err(failure.rewind(state.clone())),
            }
        }
        Ok((values, current))
    }
}

/// Matches only at the end of the input.
pub fn end_of_input<'a>() -> impl Parser<'a, Output = ()> {
    |state: &State<'a>| match state.byte() {
        Err(Error::EndOfInput) => Ok(((), state.clone())),
        Ok(_) => fail(Error::NoMatch, state),
        Err(error) => fail(error, state),
    }
}

/// Runs `parser` and returns the consumed input as text.
///
/// Fails with [`Error::InvalidEncoding`] if the consumed input is not valid UTF-8.
pub fn capture_text<'a, P: Parser<'a>>(parser: P) -> impl Parser<'a, Output = String> {
    move |state: &State<'a>| {
        let (_, next) = parser
            .parse(state)
            .map_err(|failure| failure.rewind(state.clone()))?;
        match state.text_until(&next) {
            Ok(text) => Ok((text, next)),
            Err(error) => fail(error, state),
        }
    }
}

/// Runs `parser` and returns the consumed input.
pub fn capture_bytes<'a, P: Parser<'a>>(parser: P) -> impl Parser<'a, Output = Vec<u8>> {
    move |state: &State<'a>| {
        let (_, next) = parser
            .parse(state)
            .map_err(|failure| failure.rewind(state.clone()))?;
        Ok((state.bytes_until(&next), next))
    }
}

/// Runs `parser` and returns the positions before and after the consumed input.
pub fn capture_positions<'a, P: Parser<'a>>(
    parser: P,
) -> impl Parser<'a, Output = (Position, Position)> {
    move |state: &State<'a>| {
        let (_, next) = parser
            .parse(state)
            .map_err(|failure| failure.rewind(state.clone()))?;
        Ok(((state.position(), next.position()), next))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::Config;

    fn chunked(data: &str, chunk_size: usize) -> State<'_> {
        State::from_read_with_config(data.as_bytes(), Config::default().with_chunk_size(chunk_size))
    }

    #[derive(Debug, thiserror::Error)]
    #[error("sum too large")]
    struct TooLarge;

    #[test]
    fn literal_matches() {
        assert_matches!(parse_text(&literal("foo"), "foo"), Ok(()));

        let state = State::from_text("foo");
        let ((), next) = literal("foo").parse(&state).unwrap();
        assert_eq!(next.offset(), 3);
        assert_matches!(next.byte(), Err(Error::EndOfInput));
    }

    #[test]
    fn literal_mismatch_consumes_nothing() {
        let state = State::from_text("fob");
        let failure = literal("foo").parse(&state).unwrap_err();
        assert_matches!(failure.error, Error::NoMatch);
        assert_eq!(failure.state, state);

        let failure = literal("foobar").parse(&State::from_text("foo")).unwrap_err();
        assert_matches!(failure.error, Error::EndOfInput);
        assert_eq!(failure.state.offset(), 0);
    }

    #[test]
    fn literal_bytes_matches_binary_data() {
        let state = State::from_bytes(&b"\xff\x00\x01"[..]);
        let ((), next) = literal_bytes(&b"\xff\x00"[..]).parse(&state).unwrap();
        assert_eq!(next.offset(), 2);
        let failure = literal_bytes(&b"\xff\x01"[..]).parse(&state).unwrap_err();
        assert_matches!(failure.error, Error::NoMatch);
        assert_eq!(failure.state, state);
    }

    #[test]
    fn literal_reports_invalid_encoding() {
        let state = State::from_bytes(&b"fo\xff"[..]);
        let failure = literal("foo").parse(&state).unwrap_err();
        assert_matches!(
            failure.error,
            Error::InvalidEncoding { position } if position.offset == 2
        );
        assert_eq!(failure.state, state);
    }

    #[test]
    fn bind_sequences_parsers() {
        let parser = bind(literal("foo"), |()| literal_bytes("bar"));
        assert_matches!(parse_text(&parser, "foobar"), Ok(()));

        let state = State::from_text("foobaz");
        let failure = parser.parse(&state).unwrap_err();
        assert_matches!(failure.error, Error::NoMatch);
        assert_eq!(failure.state, state);
    }

    #[test]
    fn bind_passes_value() {
        let parser = satisfy(|c| c.is_ascii_digit()).bind(|digit| {
            let count = digit.to_digit(10).unwrap_or_default() as usize;
            many(satisfy(|c| c == 'x')).map(move |xs| xs.len() == count)
        });
        assert_matches!(parse_text(&parser, "3xxx"), Ok(true));
        assert_matches!(parse_text(&parser, "2xxx"), Ok(false));
    }

    #[test]
    fn sequence_combines_values() {
        let digit = || satisfy(|c| c.is_ascii_digit()).map(|c| c as u32 - '0' as u32);
        let parser = sequence(digit(), digit(), |a, b| {
            if a + b < 10 {
                Ok(a + b)
            } else {
                Err(TooLarge)
            }
        });
        assert_matches!(parse_text(&parser, "45"), Ok(9));

        let state = State::from_text("\n95");
        let (_, state) = state.byte().unwrap();
        let failure = parser.parse(&state).unwrap_err();
        assert_eq!(failure.state, state);
        assert_matches!(
            &failure.error,
            Error::Positioned(err)
                if err.position == Position { offset: 1, line: 2, column: 1 }
                    && err.downcast_ref::<TooLarge>().is_some()
        );
    }

    #[test]
    fn satisfy_keeps_rejected_scalar_value() {
        let state = State::from_text("∞a");
        let failure = satisfy(|c| c == 'a').parse(&state).unwrap_err();
        assert_matches!(failure.error, Error::NoMatch);
        assert_eq!(failure.state, state);

        let (c, next) = satisfy(|c| c == '∞').parse(&state).unwrap();
        assert_eq!(c, '∞');
        assert_eq!(next.offset(), 3);
        assert_matches!(satisfy_byte(|b| b == b'a').parse(&next), Ok((b'a', _)));
    }

    #[test]
    fn alternatives_backtrack() {
        let parser = or(
            bind(literal("foo"), |()| literal("bar")).map(|()| 1),
            literal("foobaz").map(|()| 2),
        );
        assert_matches!(parse_text(&parser, "foobar"), Ok(1));
        assert_matches!(parse_text(&parser, "foobaz"), Ok(2));
        assert_matches!(parse_text(&parser, "fooqux"), Err(Error::NoMatch));
        assert_matches!(parse_text(&parser, "fo"), Err(Error::EndOfInput));
    }

    #[test]
    fn alternatives_stop_at_hard_errors() {
        let parser = literal("a\u{e9}").or(literal("ab"));
        let failure = parser.parse(&State::from_bytes(&b"a\xc3("[..])).unwrap_err();
        assert_matches!(failure.error, Error::InvalidEncoding { .. });
    }

    #[test]
    fn optional_and_many() {
        let parser = bind(optional(literal("-")), |sign| {
            capture_text(many(satisfy(|c| c.is_ascii_digit())))
                .map(move |digits| (sign.is_some(), digits))
        });
        assert_eq!(
            parse_text(&parser, "-123x").unwrap(),
            (true, "123".to_owned())
        );
        assert_eq!(parse_text(&parser, "42").unwrap(), (false, "42".to_owned()));
        assert_eq!(parse_text(&parser, "").unwrap(), (false, String::new()));
    }

    #[test]
    fn many_stops_without_progress() {
        let parser = many(optional(literal("a")));
        let (values, next) = parser.parse(&State::from_text("aab")).unwrap();
        assert_eq!(values, [Some(()), Some(()), None]);
        assert_eq!(next.offset(), 2);
    }

    #[test]
    fn end_of_input_matches_only_at_end() {
        let parser = bind(literal("ab"), |()| end_of_input());
        assert_matches!(parse_text(&parser, "ab"), Ok(()));
        assert_matches!(parse_text(&parser, "abc"), Err(Error::NoMatch));
    }

    #[test]
    fn capture_text_across_chunks() {
        const INPUT: &str = "1234abcd5678efgh90";
        let parser = capture_text(literal(INPUT));
        let (text, next) = parser.parse(&chunked(INPUT, 8)).unwrap();
        assert_eq!(text, INPUT);
        assert_eq!(next.offset(), INPUT.len());

        let parser = capture_bytes(many(satisfy(|c| c != '5')));
        let (bytes, _) = parser.parse(&chunked(INPUT, 8)).unwrap();
        assert_eq!(bytes, b"1234abcd");
    }

    #[test]
    fn capture_text_with_split_scalar_values() {
        const INPUT: &str = "1234567∞∞∞∞∞ü";
        let parser = capture_text(many(satisfy(|c| c != 'ü')));
        let (text, next) = parser.parse(&chunked(INPUT, 8)).unwrap();
        assert_eq!(text, "1234567∞∞∞∞∞");
        assert_eq!(next.column(), 13);
    }

    #[test]
    fn capture_text_rejects_invalid_span() {
        let parser = capture_text(literal_bytes(&b"a\xff"[..]));
        let state = State::from_bytes(&b"a\xff"[..]);
        let failure = parser.parse(&state).unwrap_err();
        assert_matches!(
            failure.error,
            Error::InvalidEncoding { position } if position.offset == 1
        );
        assert_eq!(failure.state, state);
    }

    #[test]
    fn capture_positions_reports_span() {
        let parser = bind(literal("a\n"), |()| capture_positions(literal("bc")));
        let (start, end) = parse_text(&parser, "a\nbc").unwrap();
        assert_eq!(
            start,
            Position {
                offset: 2,
                line: 2,
                column: 1
            }
        );
        assert_eq!(
            end,
            Position {
                offset: 4,
                line: 2,
                column: 3
            }
        );
    }

    #[test]
    fn failed_capture_consumes_nothing() {
        let state = State::from_text("abd");
        let failure = capture_bytes(literal("abc")).parse(&state).unwrap_err();
        assert_eq!(failure.state, state);
        let failure = capture_positions(literal("abc")).parse(&state).unwrap_err();
        assert_eq!(failure.state, state);
    }
}
