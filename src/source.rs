//! Turning a path into a sequence of text lines.
//!
//! The compression scheme is chosen from the file name: `*.log.gz` is read
//! through gzip, `*.log.bz2` through bzip2, anything else as plain text. The
//! path `-` reads standard input.
//!
//! Lines are split on `\n` as raw bytes. A trailing `\r` is dropped and
//! bytes that are not valid UTF-8 are replaced with U+FFFD, so one damaged
//! line never ends the stream.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::bz2::MultiBzDecoder;
use crate::error::{Error, Result};

/// Path that designates standard input.
pub const STDIN_PATH: &str = "-";

/// How the bytes of a log file are encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Bzip2,
}

impl Compression {
    /// Pick a compression scheme from the file name.
    ///
    /// Everything after the first `.` of the file name counts as its
    /// extension, so `conn.00:00:00-01:00:00.log.gz` is gzip.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match extension(path.as_ref()) {
            Some(ext) if ext == "gz" || ext.ends_with(".gz") => Compression::Gzip,
            Some(ext) if ext == "bz2" || ext.ends_with(".bz2") => Compression::Bzip2,
            _ => Compression::Plain,
        }
    }
}

/// Everything after the first `.` in the file name.
pub fn extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.split_once('.').map(|(_, ext)| ext)
}

/// Iterator over the lines of a buffered reader, decoding UTF-8 lossily.
///
/// Only a failing read is an error; invalid UTF-8 is not.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

/// Split `reader` into lines the way [`LineSource`] does.
pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                let line = match String::from_utf8_lossy(&self.buf) {
                    Cow::Borrowed(text) => text.to_string(),
                    Cow::Owned(text) => {
                        debug!("replaced invalid UTF-8 in line {:?}", text);
                        text
                    }
                };
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// An owned stream of lines; the underlying file is closed when it is dropped.
pub struct LineSource {
    origin: PathBuf,
    lines: LossyLines<Box<dyn BufRead>>,
}

impl LineSource {
    /// Open a path, decompressing according to its file name.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str() == STDIN_PATH {
            return Ok(Self::stdin());
        }
        Self::open_with(path, Compression::from_path(path))
    }

    /// Open a path with an explicit compression scheme.
    pub fn open_with<P: AsRef<Path>>(path: P, compression: Compression) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        debug!("opening {} as {:?}", path.display(), compression);

        let reader: Box<dyn BufRead> = match compression {
            Compression::Plain => Box::new(BufReader::new(file)),
            Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
            Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(file))),
        };

        Ok(Self::from_reader(reader, path))
    }

    /// Wrap any buffered reader.
    pub fn from_reader<R: BufRead + 'static>(reader: R, origin: impl Into<PathBuf>) -> Self {
        let reader: Box<dyn BufRead> = Box::new(reader);
        Self {
            origin: origin.into(),
            lines: lossy_lines(reader),
        }
    }

    pub fn stdin() -> Self {
        Self::from_reader(io::stdin().lock(), STDIN_PATH)
    }

    /// The path (or pseudo path) this source reads from.
    pub fn origin(&self) -> &Path {
        &self.origin
    }
}

impl Iterator for LineSource {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

impl fmt::Debug for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSource")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
