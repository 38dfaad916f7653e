//! Rendering selected columns of decoded rows.

use std::io::Write;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::cut::Cut;
use crate::error::Result;
use crate::options::FormatOptions;
use crate::row::Row;
use crate::spec::LogSpec;

/// A sink for decoded rows.
pub trait RowWriter {
    /// Write one row.
    fn write_row(&mut self, spec: &LogSpec, row: &Row) -> Result<()>;

    /// Flush buffered output and report what was written.
    fn finish(&mut self) -> Result<WriteStats>;
}

/// Statistics about a completed write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Number of rows written
    pub rows_written: usize,
    /// Number of columns per row
    pub columns: usize,
}

impl WriteStats {
    pub fn summary(&self) -> String {
        format!("{} rows x {} columns", self.rows_written, self.columns)
    }
}

/// Writes selected columns as delimited text, the way `bro-cut` prints them.
///
/// # Examples
///
/// ```
/// use brolog::{Cut, CutWriter, FormatOptions, LogReader, RowWriter};
/// use std::io::Cursor;
///
/// let log = "#separator \\x09\n#set_separator\t,\n#empty_field\t(empty)\n#unset_field\t-\n\
///            #path\tconn\n#open\t2020-01-01-00-00-00\n#fields\tts\tid.orig_p\n#types\ttime\tport\n\
///            1577836800.000000\t443\n";
/// let mut reader = LogReader::from_reader(Cursor::new(log), "inline")?;
/// let cut = Cut::new(reader.spec().fields(), &["id.orig_p"], false)?;
///
/// let mut out = Vec::new();
/// let spec = reader.spec().clone();
/// let mut writer = CutWriter::new(&mut out, cut, FormatOptions::new());
/// for row in reader.rows() {
///     writer.write_row(&spec, &row?)?;
/// }
/// writer.finish()?;
/// drop(writer);
/// assert_eq!(String::from_utf8(out).unwrap(), "443\n");
/// # Ok::<(), brolog::Error>(())
/// ```
pub struct CutWriter<W: Write> {
    out: W,
    cut: Cut,
    options: FormatOptions,
    separator: String,
    rows_written: usize,
}

impl<W: Write> CutWriter<W> {
    pub fn new(out: W, cut: Cut, options: FormatOptions) -> Self {
        Self {
            out,
            cut,
            options,
            separator: "\t".to_string(),
            rows_written: 0,
        }
    }

    /// Set the string placed between output columns. Default is a tab.
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Write a line naming the selected columns.
    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.out, "{}", self.cut.names().join(&self.separator))?;
        Ok(())
    }

    /// Render the selected columns of a row without writing it.
    pub fn render(&self, spec: &LogSpec, row: &Row) -> String {
        self.cut
            .select(row)
            .map(|(index, value)| spec.format_value(index, value, &self.options))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

impl<W: Write> RowWriter for CutWriter<W> {
    fn write_row(&mut self, spec: &LogSpec, row: &Row) -> Result<()> {
        let line = self.render(spec, row);
        writeln!(self.out, "{}", line)?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<WriteStats> {
        self.out.flush()?;
        Ok(WriteStats {
            rows_written: self.rows_written,
            columns: self.cut.indices().len(),
        })
    }
}

/// Writes selected columns as one JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    out: W,
    cut: Cut,
    rows_written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W, cut: Cut) -> Self {
        Self {
            out,
            cut,
            rows_written: 0,
        }
    }
}

impl<W: Write> RowWriter for JsonLinesWriter<W> {
    fn write_row(&mut self, _spec: &LogSpec, row: &Row) -> Result<()> {
        serde_json::to_writer(&mut self.out, &Selected { cut: &self.cut, row })?;
        self.out.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<WriteStats> {
        self.out.flush()?;
        Ok(WriteStats {
            rows_written: self.rows_written,
            columns: self.cut.indices().len(),
        })
    }
}

/// The selected columns of a row, serialized as a map in selection order.
struct Selected<'a> {
    cut: &'a Cut,
    row: &'a Row,
}

impl Serialize for Selected<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cut.indices().len()))?;
        for (index, value) in self.cut.select(self.row) {
            map.serialize_entry(&self.row.names()[index], value)?;
        }
        map.end()
    }
}
