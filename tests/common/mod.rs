/// Test utilities for building Bro ASCII logs
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;

/// Builder for creating Bro ASCII log text
pub struct ZeekLogBuilder {
    separator: String,
    set_separator: String,
    empty_field: String,
    unset_field: String,
    path: String,
    open: String,
    fields: Vec<(String, String)>,
    rows: Vec<String>,
    footer: Option<String>,
}

#[allow(dead_code)]
impl ZeekLogBuilder {
    /// Create a builder with the standard tab / comma / `(empty)` / `-` header
    pub fn new(path: &str) -> Self {
        Self {
            separator: "\t".to_string(),
            set_separator: ",".to_string(),
            empty_field: "(empty)".to_string(),
            unset_field: "-".to_string(),
            path: path.to_string(),
            open: "2020-01-01-00-00-00".to_string(),
            fields: Vec::new(),
            rows: Vec::new(),
            footer: None,
        }
    }

    /// Use a different field separator
    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn set_separator(mut self, set_separator: &str) -> Self {
        self.set_separator = set_separator.to_string();
        self
    }

    pub fn unset_field(mut self, unset: &str) -> Self {
        self.unset_field = unset.to_string();
        self
    }

    pub fn empty_field(mut self, empty: &str) -> Self {
        self.empty_field = empty.to_string();
        self
    }

    /// Use a different `#open` timestamp
    pub fn open(mut self, ts: &str) -> Self {
        self.open = ts.to_string();
        self
    }

    /// Declare a column
    pub fn field(mut self, name: &str, type_name: &str) -> Self {
        self.fields.push((name.to_string(), type_name.to_string()));
        self
    }

    /// Add a data row from its tokens, joined with the field separator
    pub fn row(mut self, tokens: &[&str]) -> Self {
        self.rows.push(tokens.join(&self.separator));
        self
    }

    /// Add a raw line verbatim (comments, malformed rows, ...)
    pub fn raw(mut self, line: &str) -> Self {
        self.rows.push(line.to_string());
        self
    }

    /// Finish with a `#close` footer
    pub fn close(mut self, ts: &str) -> Self {
        self.footer = Some(format!("#close{}{}", self.separator, ts));
        self
    }

    /// The eight header lines
    pub fn header_lines(&self) -> Vec<String> {
        let sep = &self.separator;
        let escaped: String = sep.bytes().map(|b| format!("\\x{:02x}", b)).collect();
        let names: Vec<&str> = self.fields.iter().map(|(n, _)| n.as_str()).collect();
        let types: Vec<&str> = self.fields.iter().map(|(_, t)| t.as_str()).collect();

        let mut fields_line = "#fields".to_string();
        let mut types_line = "#types".to_string();
        if !names.is_empty() {
            fields_line = format!("{}{}{}", fields_line, sep, names.join(sep));
            types_line = format!("{}{}{}", types_line, sep, types.join(sep));
        }

        vec![
            format!("#separator {}", escaped),
            format!("#set_separator{}{}", sep, self.set_separator),
            format!("#empty_field{}{}", sep, self.empty_field),
            format!("#unset_field{}{}", sep, self.unset_field),
            format!("#path{}{}", sep, self.path),
            format!("#open{}{}", sep, self.open),
            fields_line,
            types_line,
        ]
    }

    /// Build the complete log text
    pub fn build(&self) -> String {
        let mut lines = self.header_lines();
        lines.extend(self.rows.iter().cloned());
        if let Some(footer) = &self.footer {
            lines.push(footer.clone());
        }
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Write the log to `dir/name`
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path)
            .unwrap()
            .write_all(self.build().as_bytes())
            .unwrap();
        path
    }

    /// Write the log gzip-compressed to `dir/name`
    pub fn write_gz_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(self.build().as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }
}

/// Copy the bzip2 fixture `tests/data/<fixture>` to `dir/name`
///
/// `conn.log.bz2` and `conn-multi.log.bz2` hold exactly `conn_log().build()`,
/// the latter as two concatenated streams (header plus first row, then the
/// remaining rows). `conn-large.log.bz2` holds 3000 rows in three streams that
/// split mid-line.
#[allow(dead_code)]
pub fn write_bz2_to(fixture: &str, dir: &Path, name: &str) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(fixture);
    let path = dir.join(name);
    std::fs::copy(&source, &path).unwrap();
    path
}

/// A small conn log with the columns used across tests
#[allow(dead_code)]
pub fn conn_log() -> ZeekLogBuilder {
    ZeekLogBuilder::new("conn")
        .field("ts", "time")
        .field("uid", "string")
        .field("id.orig_h", "addr")
        .field("id.orig_p", "port")
        .field("proto", "enum")
        .field("duration", "interval")
        .field("orig_bytes", "count")
        .field("tunnel_parents", "set[string]")
        .row(&["1577836800.123456", "CHhAvVGS1DHFjwGM9", "10.0.0.1", "443", "tcp", "0.500000", "120", "(empty)"])
        .row(&["1577836801.000000", "ClEkJM2Vm5giqnMf4h", "10.0.0.2", "53", "udp", "-", "-", "-"])
        .row(&["1577836802.250000", "C4J4Th3PJpwUYZZ6gc", "192.168.1.7", "443", "tcp", "1.000000", "80", "Cx1,Cx2"])
}
