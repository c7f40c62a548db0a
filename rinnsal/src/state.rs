use std::{fmt, io::Read, rc::Rc, str};

use bstr::BStr;

use crate::{
    chain::{Config, Node, PullSource, ReadSource},
    Error, Position,
};

/// An immutable cursor into buffered input.
///
/// Reading from a `State` using [`byte`][Self::byte] or [`rune`][Self::rune] returns the read
/// value together with a new `State` positioned after it. The receiver is never modified, so
/// keeping an earlier `State` around is all that is needed to backtrack to it. Cloning a `State` is
/// cheap and does not copy any input data.
///
/// When reading from a [`PullSource`], input is pulled in chunks only once a read reaches the end
/// of the already buffered data. All states derived from the same initial state share the buffered
/// chunks, so every chunk is pulled exactly once, no matter how often the input is traversed.
///
/// A `State` is confined to the thread that created it.
///
/// The [`Default`] value does not refer to any input. Reading from it panics.
#[derive(Clone, Default)]
pub struct State<'a> {
    node: Option<Rc<Node<'a>>>,
    index: usize,
    position: Position,
}

enum Decoded {
    Scalar(char, usize),
    Incomplete,
    Invalid,
}

/// Decodes the first UTF-8 sequence of `bytes`.
///
/// Returns `Incomplete` when `bytes` ends with a prefix of a sequence that could still become valid
/// when followed by more bytes.
fn decode(bytes: &[u8]) -> Decoded {
    let head = &bytes[..bytes.len().min(4)];
    let text = match str::from_utf8(head) {
        Ok(text) => text,
        Err(err) if err.valid_up_to() > 0 => {
            str::from_utf8(&head[..err.valid_up_to()]).unwrap_or_default()
        }
        Err(err) if err.error_len().is_none() => return Decoded::Incomplete,
        Err(_) => return Decoded::Invalid,
    };
    match text.chars().next() {
        Some(c) => Decoded::Scalar(c, c.len_utf8()),
        None => Decoded::Incomplete,
    }
}

impl<'a> State<'a> {
    /// Creates a state for in-memory text.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text)
    }

    /// Creates a state for in-memory binary or text data.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::at_start(Node::complete(bytes.into()))
    }

    /// Creates a state for the data of a [`PullSource`].
    ///
    /// Nothing is pulled until the first read.
    pub fn from_source(source: impl PullSource + 'a, config: Config) -> Self {
        Self::from_boxed_source(Box::new(source), config)
    }

    /// Creates a state for the data of a boxed [`PullSource`].
    #[inline(never)]
    pub fn from_boxed_source(source: Box<dyn PullSource + 'a>, config: Config) -> Self {
        Self::at_start(Node::streaming(source, config))
    }

    /// Creates a state for the data of a [`Read`] instance, using the default configuration.
    pub fn from_read(read: impl Read + 'a) -> Self {
        Self::from_read_with_config(read, Config::default())
    }

    /// Creates a state for the data of a [`Read`] instance.
    pub fn from_read_with_config(read: impl Read + 'a, config: Config) -> Self {
        Self::from_source(ReadSource::new(read), config)
    }

    fn at_start(node: Rc<Node<'a>>) -> Self {
        State {
            node: Some(node),
            index: 0,
            position: Position::START,
        }
    }

    /// The position of the next unread byte.
    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Number of bytes before the next unread byte.
    #[inline]
    pub fn offset(&self) -> usize {
        self.position.offset
    }

    /// Line of the next unread byte, starting at `1`.
    #[inline]
    pub fn line(&self) -> usize {
        self.position.line
    }

    /// Column of the next unread byte, starting at `1`.
    #[inline]
    pub fn column(&self) -> usize {
        self.position.column
    }

    #[inline]
    fn node(&self) -> &Rc<Node<'a>> {
        match &self.node {
            Some(node) => node,
            None => invalid_state(),
        }
    }

    /// Reads the next byte.
    ///
    /// Returns [`Error::EndOfInput`] when there are no more bytes. If pulling more data failed, the
    /// IO error is returned wrapped in [`Error::Positioned`].
    ///
    /// # Panics
    ///
    /// Panics when called on a [`State::default()`].
    #[inline]
    pub fn byte(&self) -> Result<(u8, State<'a>), Error> {
        let node = self.node();
        if let Some(&byte) = node.buf().get(self.index) {
            return Ok((byte, self.advanced(node.clone(), self.index + 1, 1, byte.into())));
        }
        self.byte_cold()
    }

    #[cold]
    #[inline(never)]
    fn byte_cold(&self) -> Result<(u8, State<'a>), Error> {
        let node = self.following_node()?;
        let byte = node.buf()[0];
        Ok((byte, self.advanced(node, 1, 1, byte.into())))
    }

    /// Reads the next UTF-8 encoded scalar value.
    ///
    /// A sequence split across two chunks of streamed input is decoded as a whole. Malformed
    /// sequences, including a sequence cut short by the end of the input, result in
    /// [`Error::InvalidEncoding`] carrying the position of the first byte of the sequence. A
    /// correctly encoded `U+FFFD` is returned like any other scalar value.
    ///
    /// Returns [`Error::EndOfInput`] when there are no more bytes.
    ///
    /// # Panics
    ///
    /// Panics when called on a [`State::default()`].
    pub fn rune(&self) -> Result<(char, State<'a>), Error> {
        let node = self.node();
        let ahead = &node.buf()[self.index..];
        if ahead.is_empty() {
            let node = self.following_node()?;
            return State {
                node: Some(node),
                index: 0,
                position: self.position,
            }
            .rune();
        }
        match decode(ahead) {
            Decoded::Scalar(c, width) => Ok((
                c,
                self.advanced(node.clone(), self.index + width, width, c.into()),
            )),
            Decoded::Incomplete if node.may_continue() => self.rune_across(),
            Decoded::Incomplete | Decoded::Invalid => Err(self.invalid_encoding()),
        }
    }

    /// Decodes a sequence whose first bytes end the current chunk.
    #[cold]
    #[inline(never)]
    fn rune_across(&self) -> Result<(char, State<'a>), Error> {
        let tail = &self.node().buf()[self.index..];
        let mut scratch = [0u8; 4];
        let mut len = tail.len();
        scratch[..len].copy_from_slice(tail);

        let mut last = self.node().clone();
        loop {
            let Some(next) = last.next() else {
                return Err(match last.error() {
                    Some(err) => Error::io(self.position, err.clone()),
                    None => self.invalid_encoding(),
                });
            };
            // Number of sequence bytes stored in chunks before `next`.
            let before = len;
            let take = next.buf().len().min(scratch.len() - len);
            scratch[len..len + take].copy_from_slice(&next.buf()[..take]);
            len += take;
            last = next;

            match decode(&scratch[..len]) {
                Decoded::Scalar(c, width) => {
                    debug_assert!(width > before);
                    return Ok((c, self.advanced(last, width - before, width, c.into())));
                }
                Decoded::Invalid => return Err(self.invalid_encoding()),
                Decoded::Incomplete => {}
            }
        }
    }

    /// Returns the first non-empty chunk following the current one.
    fn following_node(&self) -> Result<Rc<Node<'a>>, Error> {
        let mut node = self.node().clone();
        loop {
            match node.next() {
                Some(next) if !next.buf().is_empty() => return Ok(next),
                Some(next) => node = next,
                None => {
                    return Err(match node.error() {
                        Some(err) => Error::io(self.position, err.clone()),
                        None => Error::EndOfInput,
                    })
                }
            }
        }
    }

    #[inline]
    fn advanced(&self, node: Rc<Node<'a>>, index: usize, width: usize, unit: u32) -> State<'a> {
        State {
            node: Some(node),
            index,
            position: self.position.advance(width, unit),
        }
    }

    fn invalid_encoding(&self) -> Error {
        Error::InvalidEncoding {
            position: self.position,
        }
    }

    /// Returns the input between this state and a later state `end`.
    ///
    /// The span may cross any number of chunks.
    ///
    /// # Panics
    ///
    /// Panics if `end` was not reached by advancing from this state.
    pub fn bytes_until(&self, end: &State<'a>) -> Vec<u8> {
        assert!(
            end.position.offset >= self.position.offset,
            "span end lies before its start"
        );
        let len = end.position.offset - self.position.offset;
        let (start_node, end_node) = (self.node(), end.node());

        let mut bytes = Vec::with_capacity(len);
        if Rc::ptr_eq(start_node, end_node) && self.index <= end.index {
            bytes.extend_from_slice(&start_node.buf()[self.index..end.index]);
        } else {
            bytes.extend_from_slice(&start_node.buf()[self.index..]);
            let mut node = start_node;
            loop {
                let Some(next) = node.materialized_next() else {
                    panic!("span end is not reachable from its start");
                };
                node = next;
                if Rc::ptr_eq(node, end_node) {
                    break;
                }
                bytes.extend_from_slice(node.buf());
            }
            bytes.extend_from_slice(&end_node.buf()[..end.index]);
        }

        assert_eq!(
            bytes.len(),
            len,
            "span length does not match the consumed offsets"
        );
        bytes
    }

    /// Returns the text between this state and a later state `end`.
    ///
    /// Fails with [`Error::InvalidEncoding`] at the first malformed sequence if the span is not
    /// valid UTF-8.
    ///
    /// # Panics
    ///
    /// Panics if `end` was not reached by advancing from this state.
    pub fn text_until(&self, end: &State<'a>) -> Result<String, Error> {
        String::from_utf8(self.bytes_until(end)).map_err(|err| {
            let target = self.position.offset + err.utf8_error().valid_up_to();
            let mut state = self.clone();
            while state.position.offset < target {
                match state.rune() {
                    Ok((_, next)) => state = next,
                    Err(_) => break,
                }
            }
            state.invalid_encoding()
        })
    }
}

#[cold]
#[inline(never)]
fn invalid_state() -> ! {
    panic!("read from a State that does not refer to any input")
}

impl PartialEq for State<'_> {
    /// States are equal when they point at the same byte of the same input.
    fn eq(&self, other: &Self) -> bool {
        let same_node = match (&self.node, &other.node) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_node && self.index == other.index && self.position == other.position
    }
}

impl Eq for State<'_> {}

impl fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("position", &self.position)
            .field(
                "buffered",
                &self.node.as_ref().map(|node| BStr::new(&node.buf()[self.index..])),
            )
            .finish()
    }
}
