//! Parsing of the eight-line metadata header of a Bro ASCII log.
//!
//! ```text
//! #separator \x09
//! #set_separator	,
//! #empty_field	(empty)
//! #unset_field	-
//! #path	conn
//! #open	2020-01-01-00-00-00
//! #fields	ts	uid	id.orig_h
//! #types	time	string	addr
//! ```
//!
//! The separator line is whitespace-delimited and its value is escaped. Every
//! later line is split on that separator: the first token is the marker, the
//! rest is the value.

use thiserror::Error;

use crate::types::DecodeContext;

/// Character that starts every header, footer and comment line.
pub const COMMENT_MARKER: char = '#';

/// Number of lines making up the header.
pub const HEADER_LINES: usize = 8;

/// The header markers, in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Separator,
    SetSeparator,
    EmptyField,
    UnsetField,
    Path,
    Open,
    Fields,
    Types,
}

impl Marker {
    pub const ALL: [Marker; HEADER_LINES] = [
        Marker::Separator,
        Marker::SetSeparator,
        Marker::EmptyField,
        Marker::UnsetField,
        Marker::Path,
        Marker::Open,
        Marker::Fields,
        Marker::Types,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Marker::Separator => "separator",
            Marker::SetSeparator => "set_separator",
            Marker::EmptyField => "empty_field",
            Marker::UnsetField => "unset_field",
            Marker::Path => "path",
            Marker::Open => "open",
            Marker::Fields => "fields",
            Marker::Types => "types",
        }
    }

    /// Zero-based line position of this marker within the header.
    pub fn position(self) -> usize {
        self as usize
    }
}

/// A declared column: its name and type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub name: String,
    pub type_name: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Separators, sentinels and provenance declared by the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMetadata {
    pub separator: String,
    pub set_separator: String,
    pub empty_field: String,
    pub unset_field: String,
    /// Logical log stream name, e.g. `conn`.
    pub path: String,
    pub open: String,
}

impl HeaderMetadata {
    pub fn decode_context(&self) -> DecodeContext<'_> {
        DecodeContext {
            set_separator: &self.set_separator,
            empty_field: &self.empty_field,
            unset_field: &self.unset_field,
        }
    }
}

/// A fully parsed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub metadata: HeaderMetadata,
    pub fields: Vec<FieldSpec>,
}

impl Header {
    /// The first marker whose value differs from `other`, ignoring `#open`.
    ///
    /// Rotated files of one log share everything but their open timestamp.
    pub fn first_mismatch(&self, other: &Header) -> Option<Marker> {
        let (a, b) = (&self.metadata, &other.metadata);
        let names = |h: &Header| h.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
        let types = |h: &Header| h.fields.iter().map(|f| f.type_name.clone()).collect::<Vec<_>>();

        Marker::ALL.into_iter().find(|marker| match marker {
            Marker::Separator => a.separator != b.separator,
            Marker::SetSeparator => a.set_separator != b.set_separator,
            Marker::EmptyField => a.empty_field != b.empty_field,
            Marker::UnsetField => a.unset_field != b.unset_field,
            Marker::Path => a.path != b.path,
            Marker::Open => false,
            Marker::Fields => names(self) != names(other),
            Marker::Types => types(self) != types(other),
        })
    }
}

/// The first header marker that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("#{}: {reason}", .marker.keyword())]
pub struct HeaderError {
    pub marker: Marker,
    pub reason: String,
}

impl HeaderError {
    fn new(marker: Marker, reason: impl Into<String>) -> Self {
        Self {
            marker,
            reason: reason.into(),
        }
    }
}

/// Parse the eight header lines.
///
/// Parsing stops at the first missing or malformed marker. A header that
/// declares no fields, or a different number of types than fields, is
/// rejected as well.
pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Header, HeaderError> {
    let lines: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
    let line = |marker: Marker| {
        lines
            .get(marker.position())
            .copied()
            .ok_or_else(|| HeaderError::new(marker, "line is missing"))
    };

    let separator = parse_separator(line(Marker::Separator)?)?;
    let split = MarkerSplitter::new(&separator);

    let set_separator = split.value(Marker::SetSeparator, line(Marker::SetSeparator)?)?;
    if set_separator.is_empty() {
        return Err(HeaderError::new(Marker::SetSeparator, "set separator is empty"));
    }
    let empty_field = split.value(Marker::EmptyField, line(Marker::EmptyField)?)?;
    let unset_field = split.value(Marker::UnsetField, line(Marker::UnsetField)?)?;
    let path = split.value(Marker::Path, line(Marker::Path)?)?;
    let open = split.value(Marker::Open, line(Marker::Open)?)?;
    let names = split.list(Marker::Fields, line(Marker::Fields)?)?;
    let types = split.list(Marker::Types, line(Marker::Types)?)?;

    if names.is_empty() {
        return Err(HeaderError::new(Marker::Fields, "no fields declared"));
    }
    if names.len() != types.len() {
        return Err(HeaderError::new(
            Marker::Types,
            format!("{} types declared for {} fields", types.len(), names.len()),
        ));
    }

    let fields = names
        .into_iter()
        .zip(types)
        .map(|(name, type_name)| FieldSpec::new(name, type_name))
        .collect();

    Ok(Header {
        metadata: HeaderMetadata {
            separator,
            set_separator: set_separator.to_string(),
            empty_field: empty_field.to_string(),
            unset_field: unset_field.to_string(),
            path: path.to_string(),
            open: open.to_string(),
        },
        fields,
    })
}

/// Strip `#<keyword>` from the start of a line, allowing whitespace around `#`.
fn strip_marker<'a>(line: &'a str, marker: Marker) -> Option<&'a str> {
    line.trim_start()
        .strip_prefix(COMMENT_MARKER)?
        .trim_start()
        .strip_prefix(marker.keyword())
}

fn parse_separator(line: &str) -> Result<String, HeaderError> {
    let marker = Marker::Separator;
    let rest = strip_marker(line, marker)
        .ok_or_else(|| HeaderError::new(marker, format!("expected #separator, found {:?}", line)))?;

    if !rest.starts_with(char::is_whitespace) {
        return Err(HeaderError::new(marker, format!("malformed separator line {:?}", line)));
    }

    let separator = unescape(rest.trim()).map_err(|reason| HeaderError::new(marker, reason))?;
    if separator.is_empty() {
        return Err(HeaderError::new(marker, "separator is empty"));
    }
    Ok(separator)
}

/// Splits marker lines on the already established field separator.
struct MarkerSplitter<'a> {
    separator: &'a str,
}

impl<'a> MarkerSplitter<'a> {
    fn new(separator: &'a str) -> Self {
        Self { separator }
    }

    /// Check the marker token and return everything after the first separator.
    ///
    /// `Ok(None)` means the marker stands alone on its line.
    fn payload<'l>(&self, marker: Marker, line: &'l str) -> Result<Option<&'l str>, HeaderError> {
        let (head, payload) = match line.split_once(self.separator) {
            Some((head, payload)) => (head, Some(payload)),
            None => (line, None),
        };

        match strip_marker(head, marker) {
            Some(rest) if rest.trim().is_empty() => Ok(payload),
            _ => Err(HeaderError::new(
                marker,
                format!("expected #{}, found {:?}", marker.keyword(), head),
            )),
        }
    }

    fn value<'l>(&self, marker: Marker, line: &'l str) -> Result<&'l str, HeaderError> {
        self.payload(marker, line)?
            .ok_or_else(|| HeaderError::new(marker, "value is missing"))
    }

    fn list<'l>(&self, marker: Marker, line: &'l str) -> Result<Vec<&'l str>, HeaderError> {
        Ok(match self.payload(marker, line)? {
            Some(payload) => payload.split(self.separator).collect(),
            None => Vec::new(),
        })
    }
}

/// Expand `\xHH`, `\t`, `\n`, `\r` and `\\` escapes.
pub fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u8::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .ok_or_else(|| format!("invalid escape \\x{}", hex))?;
                out.push(char::from(code));
            }
            Some(other) => return Err(format!("invalid escape \\{}", other)),
            None => return Err("dangling escape at end of value".to_string()),
        }
    }

    Ok(out)
}
