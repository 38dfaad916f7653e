//! Selecting columns out of decoded rows.

use crate::error::{Error, Result};
use crate::header::FieldSpec;
use crate::row::Row;
use crate::types::Value;

/// A validated selection of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cut {
    indices: Vec<usize>,
    names: Vec<String>,
}

impl Cut {
    /// Select `requested` fields, in the requested order.
    ///
    /// With `negate`, every declared field except the requested ones is
    /// selected, in declaration order. An empty request selects every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] for the first requested name the log
    /// does not declare.
    pub fn new<S: AsRef<str>>(fields: &[FieldSpec], requested: &[S], negate: bool) -> Result<Self> {
        let mut indices = Vec::with_capacity(requested.len());
        for name in requested {
            let name = name.as_ref();
            let index = fields
                .iter()
                .position(|f| f.name == name)
                .ok_or_else(|| Error::UnknownField(name.to_string()))?;
            indices.push(index);
        }

        if requested.is_empty() {
            return Ok(Self::all(fields));
        }

        if negate {
            indices = (0..fields.len()).filter(|i| !indices.contains(i)).collect();
        }

        let names = indices.iter().map(|&i| fields[i].name.clone()).collect();
        Ok(Self { indices, names })
    }

    /// Select every field.
    pub fn all(fields: &[FieldSpec]) -> Self {
        Self {
            indices: (0..fields.len()).collect(),
            names: fields.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The selected `(column index, value)` pairs of a row.
    pub fn select<'r>(&'r self, row: &'r Row) -> impl Iterator<Item = (usize, &'r Value)> + 'r {
        self.indices
            .iter()
            .filter_map(move |&i| row.value(i).map(|value| (i, value)))
    }
}
