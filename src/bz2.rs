//! Decoding of bzip2 files made of several concatenated streams.
//!
//! `bzip2_rs::DecoderReader` stops at the end of the first stream, and it
//! reads ahead into its own buffer, so the rest of the file cannot be
//! recovered from it afterwards. [`MultiBzDecoder`] instead splits the
//! compressed input at stream boundaries and feeds each stream to a fresh
//! decoder, the way `flate2::read::MultiGzDecoder` handles gzip members.
//!
//! A boundary is a byte-aligned stream header (`BZh1`..`BZh9`) immediately
//! followed by a block or end-of-stream magic, as written by `bzip2`,
//! `pbzip2` and plain `cat`.

use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

use bzip2_rs::DecoderReader;

const STREAM_MAGIC: &[u8; 3] = b"BZh";
const BLOCK_MAGIC: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];
const END_MAGIC: [u8; 6] = [0x17, 0x72, 0x45, 0x38, 0x50, 0x90];

/// Length of a stream header plus the magic of its first block.
const MARKER_LEN: usize = 10;

const CHUNK_SIZE: usize = 8 * 1024;

fn is_stream_start(bytes: &[u8]) -> bool {
    bytes.len() >= MARKER_LEN
        && bytes[..3] == STREAM_MAGIC[..]
        && (b'1'..=b'9').contains(&bytes[3])
        && (bytes[4..MARKER_LEN] == BLOCK_MAGIC || bytes[4..MARKER_LEN] == END_MAGIC)
}

/// Hands out the compressed bytes of one stream at a time.
struct StreamSplitter<R> {
    inner: R,
    buf: Vec<u8>,
    eof: bool,
    /// The current stream is exhausted; call `next_stream` to continue.
    boundary: bool,
    /// Bytes of the current stream handed out so far.
    consumed: usize,
}

impl<R: Read> StreamSplitter<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            eof: false,
            boundary: false,
            consumed: 0,
        }
    }

    fn fill_to(&mut self, len: usize) -> io::Result<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        while !self.eof && self.buf.len() < len {
            match self.inner.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Copy bytes of the current stream into `out`; 0 at its end.
    fn read_stream(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.boundary || out.is_empty() {
            return Ok(0);
        }
        self.fill_to(out.len() + MARKER_LEN)?;

        // The header of the current stream sits at offset 0 when nothing has
        // been handed out yet.
        let first = usize::from(self.consumed == 0);
        let window = out.len().min(self.buf.len());
        let mut n = window;
        if self.buf.len() >= MARKER_LEN {
            let last = (self.buf.len() - MARKER_LEN).min(window);
            if let Some(pos) = (first..=last).find(|&pos| is_stream_start(&self.buf[pos..])) {
                n = pos;
            }
        }

        if n == 0 {
            self.boundary = true;
            return Ok(0);
        }

        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf.drain(..n);
        self.consumed += n;
        Ok(n)
    }

    /// Move past a boundary. Returns false when no input is left.
    fn next_stream(&mut self) -> io::Result<bool> {
        self.boundary = false;
        self.consumed = 0;
        self.fill_to(MARKER_LEN)?;
        Ok(!self.buf.is_empty())
    }
}

/// The bytes of the current stream, as seen by one `DecoderReader`.
struct StreamReader<R>(Rc<RefCell<StreamSplitter<R>>>);

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.borrow_mut().read_stream(buf)
    }
}

/// A bzip2 decoder that continues past the end of each stream.
pub struct MultiBzDecoder<R> {
    splitter: Rc<RefCell<StreamSplitter<R>>>,
    decoder: DecoderReader<StreamReader<R>>,
}

impl<R: Read> MultiBzDecoder<R> {
    pub fn new(inner: R) -> Self {
        let splitter = Rc::new(RefCell::new(StreamSplitter::new(inner)));
        let decoder = DecoderReader::new(StreamReader(Rc::clone(&splitter)));
        Self { splitter, decoder }
    }
}

impl<R: Read> Read for MultiBzDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.decoder.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            if !self.splitter.borrow_mut().next_stream()? {
                return Ok(0);
            }
            self.decoder = DecoderReader::new(StreamReader(Rc::clone(&self.splitter)));
        }
    }
}
