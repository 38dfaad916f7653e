//! High-level API for reading a Bro log in a single pass.

use std::io::BufRead;
use std::path::Path;

use crate::error::Result;
use crate::row::Rows;
use crate::source::{Compression, LineSource};
use crate::spec::LogSpec;
use crate::types::{self, TypeRegistry};

/// A log whose header has been parsed and whose data lines are still unread.
///
/// Unlike [`LogSpec::load`] followed by [`LogSpec::open`], the file is opened
/// only once, which also makes standard input usable. The rows can be
/// traversed a single time.
///
/// # Examples
///
/// ```no_run
/// use brolog::LogReader;
///
/// let mut reader = LogReader::open("conn.log.gz")?;
/// println!("#path {}", reader.spec().path());
///
/// for row in reader.rows() {
///     let row = row?;
///     println!("{:?}", row.get("id.orig_h"));
/// }
/// # Ok::<(), brolog::Error>(())
/// ```
#[derive(Debug)]
pub struct LogReader {
    spec: LogSpec,
    lines: LineSource,
}

impl LogReader {
    /// Open a log file, decompressing by file name, and parse its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, the header is
    /// malformed, or a field has an unknown type.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        LogReaderBuilder::new().open(path)
    }

    /// Read a log from any buffered reader.
    pub fn from_reader<R: BufRead + 'static>(reader: R, origin: &str) -> Result<Self> {
        LogReaderBuilder::new().from_reader(reader, origin)
    }

    /// Read a log from standard input.
    pub fn stdin() -> Result<Self> {
        LogReaderBuilder::new().from_source(LineSource::stdin())
    }

    pub fn spec(&self) -> &LogSpec {
        &self.spec
    }

    /// Iterate the remaining data rows.
    pub fn rows(&mut self) -> Rows<'_, &mut LineSource> {
        Rows::new(&self.spec, &mut self.lines)
    }

    /// Split into the `LogSpec` and the unread lines.
    pub fn into_parts(self) -> (LogSpec, LineSource) {
        (self.spec, self.lines)
    }
}

/// Builder for configuring how a log is opened.
///
/// # Examples
///
/// ```no_run
/// use brolog::{Compression, LogReaderBuilder};
///
/// let reader = LogReaderBuilder::new()
///     .compression(Compression::Gzip)
///     .open("rotated-conn-log")?;
/// # Ok::<(), brolog::Error>(())
/// ```
pub struct LogReaderBuilder<'r> {
    compression: Option<Compression>,
    registry: &'r TypeRegistry,
}

impl<'r> LogReaderBuilder<'r> {
    /// Create a builder that guesses compression from the file name and uses
    /// the built-in types.
    pub fn new() -> Self {
        Self {
            compression: None,
            registry: types::builtin(),
        }
    }

    /// Force a compression scheme instead of guessing it from the file name.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Resolve field types through a custom registry.
    pub fn registry(mut self, registry: &'r TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<LogReader> {
        let source = match self.compression {
            Some(compression) => LineSource::open_with(path, compression)?,
            None => LineSource::open(path)?,
        };
        self.from_source(source)
    }

    pub fn from_reader<R: BufRead + 'static>(self, reader: R, origin: &str) -> Result<LogReader> {
        self.from_source(LineSource::from_reader(reader, origin))
    }

    pub fn from_source(self, mut lines: LineSource) -> Result<LogReader> {
        let origin = lines.origin().display().to_string();
        let spec = LogSpec::from_lines(&mut lines, origin, self.registry)?;
        Ok(LogReader { spec, lines })
    }
}

impl Default for LogReaderBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
