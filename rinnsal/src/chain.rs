//! Lazily extended chain of input chunks.
use std::{
    cell::{OnceCell, RefCell},
    io::{self, Read},
    rc::Rc,
    sync::Arc,
};

/// Number of bytes requested from a source at once, unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 10;

/// Smallest supported chunk size.
///
/// Smaller configured chunk sizes are raised to this value. With chunks of at least this size, a
/// UTF-8 sequence (at most 4 bytes) never spans more than two chunks of a regular stream.
pub const MIN_CHUNK_SIZE: usize = 8;

/// Configuration options for streaming input.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Number of bytes requested from the source per pull.
    ///
    /// Values below [`MIN_CHUNK_SIZE`] are raised to [`MIN_CHUNK_SIZE`].
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Sets the number of bytes that are requested from the source at once.
    ///
    /// Note that this is just an upper bound. Depending on the source, smaller amounts may be
    /// returned by a single pull.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// The chunk size after applying the [`MIN_CHUNK_SIZE`] floor.
    #[inline]
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(MIN_CHUNK_SIZE)
    }
}

/// Result of a single [`PullSource::pull`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Pulled {
    /// Number of bytes written to the start of the buffer.
    pub len: usize,
    /// Whether the source has no data beyond the returned bytes.
    pub exhausted: bool,
}

/// A pull-style provider of input bytes.
///
/// Each call to [`pull`][Self::pull] tries to fill the passed buffer, returning how many bytes were
/// written and whether the source is exhausted. Returning zero bytes without being exhausted is
/// allowed; the caller will pull again.
pub trait PullSource {
    /// Writes up to `buf.len()` bytes into `buf`.
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<Pulled>;
}

impl<S: PullSource + ?Sized> PullSource for Box<S> {
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<Pulled> {
        (**self).pull(buf)
    }
}

/// Adapts a [`Read`] instance to a [`PullSource`].
///
/// A read returning `0` bytes marks the source as exhausted. Reads failing with
/// [`io::ErrorKind::Interrupted`] are retried.
pub struct ReadSource<R> {
    read: R,
}

impl<R: Read> ReadSource<R> {
    /// Wraps a [`Read`] instance.
    pub fn new(read: R) -> Self {
        Self { read }
    }

    /// Returns the wrapped [`Read`] instance.
    pub fn into_inner(self) -> R {
        self.read
    }
}

impl<R: Read> PullSource for ReadSource<R> {
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<Pulled> {
        loop {
            match self.read.read(buf) {
                Ok(0) => {
                    return Ok(Pulled {
                        len: 0,
                        exhausted: true,
                    })
                }
                Ok(len) => {
                    assert!(
                        len <= buf.len(),
                        "invariant of std::io::Read trait violated"
                    );
                    return Ok(Pulled {
                        len,
                        exhausted: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

/// One chunk of input together with the link to the following chunk.
///
/// The buffer of a node never changes. The `next` link is set at most once, by the first call to
/// [`next`][Self::next] that needs it. Only the last materialized node of a chain holds the
/// source, so no two nodes ever pull from it.
pub(crate) struct Node<'a> {
    buf: Box<[u8]>,
    source: RefCell<Option<Box<dyn PullSource + 'a>>>,
    next: OnceCell<Rc<Node<'a>>>,
    error: Option<Arc<io::Error>>,
    /// Size of the pull performed by `next`. Unused by nodes that never hold a source.
    chunk_size: usize,
}

impl<'a> Node<'a> {
    /// Creates a terminal node holding all of the input.
    pub fn complete(buf: impl Into<Box<[u8]>>) -> Rc<Self> {
        Rc::new(Node {
            buf: buf.into(),
            source: RefCell::new(None),
            next: OnceCell::new(),
            error: None,
            // Placeholder, a node without source never pulls.
            chunk_size: MIN_CHUNK_SIZE,
        })
    }

    /// Creates an empty node that pulls from `source` when its successor is needed.
    pub fn streaming(source: Box<dyn PullSource + 'a>, config: Config) -> Rc<Self> {
        Rc::new(Node {
            buf: Box::default(),
            source: RefCell::new(Some(source)),
            next: OnceCell::new(),
            error: None,
            chunk_size: config.effective_chunk_size(),
        })
    }

    #[inline]
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    /// The IO error that ended the chain at this node, if any.
    #[inline]
    pub fn error(&self) -> Option<&Arc<io::Error>> {
        self.error.as_ref()
    }

    /// Returns whether a successor exists or may still be pulled.
    #[inline]
    pub fn may_continue(&self) -> bool {
        self.next.get().is_some() || self.source.borrow().is_some()
    }

    /// Returns the already materialized successor, without pulling.
    #[inline]
    pub fn materialized_next(&self) -> Option<&Rc<Node<'a>>> {
        self.next.get()
    }

    /// Returns the successor, pulling it from the source if necessary.
    ///
    /// Returns `None` at the end of the chain. Repeated calls return the same node and perform at
    /// most one pull in total.
    pub fn next(&self) -> Option<Rc<Node<'a>>> {
        if let Some(next) = self.next.get() {
            return Some(next.clone());
        }
        let source = self.source.borrow_mut().take()?;
        let node = Rc::new(self.pull(source));
        Some(self.next.get_or_init(|| node).clone())
    }

    #[cold]
    #[inline(never)]
    fn pull(&self, mut source: Box<dyn PullSource + 'a>) -> Node<'a> {
        let mut buf = vec![0; self.chunk_size];
        let mut empty_pulls = 0usize;
        let (len, source, error) = loop {
            match source.pull(&mut buf) {
                Ok(Pulled { len, exhausted }) => {
                    assert!(len <= buf.len(), "source reported more bytes than requested");
                    log::trace!("pulled {} of {} requested bytes", len, buf.len());
                    if exhausted {
                        log::debug!("source exhausted");
                        break (len, None, None);
                    }
                    if len == 0 {
                        empty_pulls += 1;
                        if empty_pulls.is_power_of_two() {
                            log::debug!("retrying after {} empty pulls", empty_pulls);
                        }
                        continue;
                    }
                    break (len, Some(source), None);
                }
                Err(err) => {
                    log::warn!("pulling input failed: {}", err);
                    break (0, None, Some(Arc::new(err)));
                }
            }
        };
        buf.truncate(len);
        Node {
            buf: buf.into_boxed_slice(),
            source: RefCell::new(source),
            next: OnceCell::new(),
            error,
            chunk_size: self.chunk_size,
        }
    }
}

impl Drop for Node<'_> {
    /// Unlinks the chain iteratively, so dropping a long chain does not recurse once per node.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Rc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                // Still referenced by a state further along.
                Err(_) => break,
            }
        }
    }
}
