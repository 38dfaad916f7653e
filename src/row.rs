//! Decoded rows and the lazy iterator producing them.

use std::io;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};
use crate::header::HEADER_LINES;
use crate::spec::LogSpec;
use crate::types::Value;

/// One decoded data line: field values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    line: usize,
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(line: usize, names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { line, names, values }
    }

    /// 1-based line number of this row in its source.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.names.iter().position(|n| n == name)?;
        self.values.get(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Lazy, single-pass iterator over the data rows of a log.
///
/// Comment and footer lines are skipped. Rows that fail to decode are
/// yielded as errors and iteration continues with the next line; an I/O
/// error ends the iteration.
pub struct Rows<'a, I> {
    spec: &'a LogSpec,
    lines: I,
    line: usize,
    done: bool,
}

impl<'a, I> Rows<'a, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    /// Iterate `lines`, which must start right after the header.
    pub fn new(spec: &'a LogSpec, lines: I) -> Self {
        Self::starting_at(spec, lines, HEADER_LINES)
    }

    /// Iterate `lines`, numbering the first one `consumed + 1`.
    pub fn starting_at(spec: &'a LogSpec, lines: I, consumed: usize) -> Self {
        Self {
            spec,
            lines,
            line: consumed,
            done: false,
        }
    }

    pub fn spec(&self) -> &'a LogSpec {
        self.spec
    }

    /// Line number of the most recently read line.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<'a, I> Iterator for Rows<'a, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let text = match self.lines.next() {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(Error::io(self.spec.origin(), e)));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };
            self.line += 1;

            if let Some(row) = self.spec.decode_line(&text, self.line) {
                return Some(row);
            }
        }
    }
}

impl<'a, I> std::iter::FusedIterator for Rows<'a, I> where I: Iterator<Item = io::Result<String>> {}
