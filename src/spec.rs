//! `LogSpec`: header metadata plus the bound per-field pipelines.

use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::header::{self, FieldSpec, Header, HeaderMetadata, COMMENT_MARKER, HEADER_LINES};
use crate::options::FormatOptions;
use crate::row::{Row, Rows};
use crate::source::{lossy_lines, LineSource};
use crate::stats::FieldStats;
use crate::types::{self, FieldType, TypeRegistry, Value};

/// The parsed header of one log file with a decode pipeline bound to each field.
///
/// A `LogSpec` only exists for a header that parsed completely and whose
/// types all resolved; there is no partially loaded state.
///
/// # Examples
///
/// ```no_run
/// use brolog::LogSpec;
///
/// let spec = LogSpec::load("conn.log")?;
/// for field in spec.fields() {
///     println!("{} ({})", field.name, field.type_name);
/// }
///
/// for row in spec.open("conn.log")? {
///     let row = row?;
///     println!("{:?}", row.get("ts"));
/// }
/// # Ok::<(), brolog::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct LogSpec {
    origin: String,
    header: Header,
    names: Arc<[String]>,
    types: Vec<FieldType>,
}

impl LogSpec {
    /// Read and validate the header of the log at `path` using the built-in types.
    ///
    /// The file is closed again once the header has been read.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, types::builtin())
    }

    /// Like [`LogSpec::load`], resolving field types through `registry`.
    pub fn load_with<P: AsRef<Path>>(path: P, registry: &TypeRegistry) -> Result<Self> {
        let mut source = LineSource::open(path.as_ref())?;
        Self::from_lines(&mut source, path.as_ref().display().to_string(), registry)
    }

    /// Read the header from a buffered reader.
    pub fn from_reader<R: BufRead>(reader: R, origin: impl Into<String>) -> Result<Self> {
        Self::from_lines(&mut lossy_lines(reader), origin, types::builtin())
    }

    /// Consume exactly the header lines from `lines` and build the `LogSpec`.
    ///
    /// The remaining lines can then be handed to [`LogSpec::rows`].
    pub fn from_lines<I>(lines: &mut I, origin: impl Into<String>, registry: &TypeRegistry) -> Result<Self>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let origin = origin.into();

        let mut header_lines = Vec::with_capacity(HEADER_LINES);
        for line in lines.by_ref().take(HEADER_LINES) {
            header_lines.push(line.map_err(|e| Error::io(origin.as_str(), e))?);
        }

        let header = header::parse(&header_lines).map_err(|e| Error::Header {
            origin: origin.clone(),
            marker: e.marker,
            reason: e.reason,
        })?;

        Self::from_header(header, origin, registry)
    }

    /// Bind pipelines to an already parsed header.
    pub fn from_header(header: Header, origin: impl Into<String>, registry: &TypeRegistry) -> Result<Self> {
        let origin = origin.into();

        let types = header
            .fields
            .iter()
            .map(|field| {
                registry.resolve(&field.type_name).map_err(|_| Error::UnknownType {
                    origin: origin.clone(),
                    field: field.name.clone(),
                    type_name: field.type_name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let names: Arc<[String]> = header.fields.iter().map(|f| f.name.clone()).collect();

        debug!(
            "{}: loaded #path {} with {} fields",
            origin,
            header.metadata.path,
            names.len()
        );

        Ok(Self {
            origin,
            header,
            names,
            types,
        })
    }

    /// Declared fields in column order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.header.fields
    }

    /// Declared field names in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn field_type(&self, index: usize) -> Option<&FieldType> {
        self.types.get(index)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn metadata(&self) -> &HeaderMetadata {
        &self.header.metadata
    }

    /// The file (or pseudo path) this spec was read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Logical log stream name, e.g. `conn`.
    pub fn path(&self) -> &str {
        &self.header.metadata.path
    }

    pub fn open_timestamp(&self) -> &str {
        &self.header.metadata.open
    }

    /// Fingerprint of the logical path and field layout.
    ///
    /// Two files with equal ids can be decoded with the same spec.
    pub fn id(&self) -> String {
        // FNV-1a, 64 bit
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let mut feed = |bytes: &[u8]| {
            for b in bytes {
                hash ^= u64::from(*b);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            hash ^= 0xff;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        };

        feed(self.path().as_bytes());
        for field in self.fields() {
            feed(field.name.as_bytes());
            feed(field.type_name.as_bytes());
        }
        format!("{:016x}", hash)
    }

    /// Fresh accumulators, one per field.
    pub fn accumulators(&self) -> FieldStats {
        FieldStats::new(
            self.names.to_vec(),
            self.types.iter().map(FieldType::accumulator).collect(),
        )
    }

    /// Re-open the log at `path` and iterate its rows.
    ///
    /// The header of the file is parsed again and must match this spec in
    /// everything but `#open`, so a rotated file of the same log can be
    /// opened with the `LogSpec` of another. Every call starts from the beginning
    /// of the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Header`] naming the first marker that differs.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Rows<'_, LineSource>> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let mut source = LineSource::open(path)?;

        let mut header_lines = Vec::with_capacity(HEADER_LINES);
        for line in source.by_ref().take(HEADER_LINES) {
            header_lines.push(line.map_err(|e| Error::io(path, e))?);
        }
        let header = header::parse(&header_lines).map_err(|e| Error::Header {
            origin: origin.clone(),
            marker: e.marker,
            reason: e.reason,
        })?;

        if let Some(marker) = self.header.first_mismatch(&header) {
            return Err(Error::Header {
                origin,
                marker,
                reason: format!("does not match the header of {}", self.origin),
            });
        }
        Ok(Rows::new(self, source))
    }

    /// Iterate rows from lines that follow the header.
    pub fn rows<I>(&self, lines: I) -> Rows<'_, I>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        Rows::new(self, lines)
    }

    /// Decode one data line.
    ///
    /// Returns `None` for blank lines and for lines starting with the comment
    /// marker.
    pub fn decode_line(&self, text: &str, line: usize) -> Option<Result<Row>> {
        if text.is_empty() || text.starts_with(COMMENT_MARKER) {
            return None;
        }

        let metadata = &self.header.metadata;
        let tokens: Vec<&str> = text.split(metadata.separator.as_str()).collect();
        if tokens.len() != self.types.len() {
            return Some(Err(Error::RowShape {
                origin: self.origin.clone(),
                line,
                expected: self.types.len(),
                found: tokens.len(),
            }));
        }

        let ctx = metadata.decode_context();
        let values = tokens
            .iter()
            .zip(self.types.iter())
            .enumerate()
            .map(|(index, (token, field_type))| {
                if *token == metadata.unset_field {
                    return Ok(Value::Unset);
                }
                if *token == metadata.empty_field {
                    return Ok(field_type.empty_value());
                }
                field_type.translate(token, &ctx).map_err(|reason| Error::Decode {
                    origin: self.origin.clone(),
                    line,
                    field: self.names[index].clone(),
                    type_name: field_type.type_name().to_string(),
                    token: token.to_string(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>>>();

        Some(values.map(|values| Row::new(line, Arc::clone(&self.names), values)))
    }

    /// Render the value of field `index` for display.
    pub fn format_value(&self, index: usize, value: &Value, options: &FormatOptions) -> String {
        match self.types.get(index) {
            Some(field_type) => field_type.format(value, &self.header.metadata.decode_context(), options),
            None => options.get_null_string().to_string(),
        }
    }
}
