//! Per-field aggregation across the rows of a log.
//!
//! Numeric fields gather running statistics, categorical fields count
//! occurrences of each distinct value, and everything else is ignored.
//! Unset values never contribute.

use std::collections::HashMap;

use crate::row::Row;
use crate::types::Value;

/// Running state for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Stats(StatsAccumulator),
    Group(GroupAccumulator),
    None,
}

impl Accumulator {
    pub fn stats() -> Self {
        Accumulator::Stats(StatsAccumulator::default())
    }

    pub fn group() -> Self {
        Accumulator::Group(GroupAccumulator::default())
    }

    pub fn none() -> Self {
        Accumulator::None
    }

    /// Fold one value into the running state.
    ///
    /// Container values contribute each of their elements.
    pub fn accumulate(&mut self, value: &Value) {
        match value {
            Value::Unset => {}
            Value::Set(items) | Value::Vector(items) => {
                for item in items {
                    self.accumulate(item);
                }
            }
            scalar => match self {
                Accumulator::Stats(stats) => {
                    if let Some(x) = scalar.as_f64() {
                        stats.add(x);
                    }
                }
                Accumulator::Group(group) => {
                    if let Some(key) = scalar.group_key() {
                        group.add(key);
                    }
                }
                Accumulator::None => {}
            },
        }
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        match self {
            Accumulator::Stats(stats) => stats.summary(),
            Accumulator::Group(group) => group.summary(),
            Accumulator::None => "no statistics for this type".to_string(),
        }
    }
}

/// Count, sum, range, mean and spread of numeric values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsAccumulator {
    count: u64,
    sum: f64,
    sum_of_squares: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl StatsAccumulator {
    pub fn add(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_of_squares += x * x;
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Smallest value seen, 0 when nothing was accumulated.
    pub fn min(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }

    /// Largest value seen, 0 when nothing was accumulated.
    pub fn max(&self) -> f64 {
        self.max.unwrap_or(0.0)
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_of_squares / self.count as f64 - mean * mean).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn summary(&self) -> String {
        format!(
            "count={} mean={:.3} std_dev={:.3} range=[{:.3}, {:.3}]",
            self.count,
            self.mean(),
            self.std_dev(),
            self.min(),
            self.max()
        )
    }
}

/// Occurrence counts per distinct value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAccumulator {
    groups: HashMap<String, u64>,
    total: u64,
}

impl GroupAccumulator {
    pub fn add(&mut self, key: String) {
        *self.groups.entry(key).or_insert(0) += 1;
        self.total += 1;
    }

    /// Number of values accumulated.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn count_of(&self, key: &str) -> u64 {
        self.groups.get(key).copied().unwrap_or(0)
    }

    /// Distinct values, most frequent first; ties are ordered by value.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .groups
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn summary(&self) -> String {
        let top = self
            .ranked()
            .into_iter()
            .take(3)
            .map(|(key, count)| format!("{} ({})", key, count))
            .collect::<Vec<_>>()
            .join(", ");
        format!("count={} groups={} top=[{}]", self.total, self.groups.len(), top)
    }
}

/// The accumulators of every field of one log, seeded fresh per file.
#[derive(Debug, Clone)]
pub struct FieldStats {
    names: Vec<String>,
    accumulators: Vec<Accumulator>,
    rows: u64,
}

impl FieldStats {
    pub(crate) fn new(names: Vec<String>, accumulators: Vec<Accumulator>) -> Self {
        Self {
            names,
            accumulators,
            rows: 0,
        }
    }

    /// Fold every field of a row into its accumulator.
    pub fn accumulate_row(&mut self, row: &Row) {
        for (accumulator, value) in self.accumulators.iter_mut().zip(row.values()) {
            accumulator.accumulate(value);
        }
        self.rows += 1;
    }

    /// Rows accumulated so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn get(&self, name: &str) -> Option<&Accumulator> {
        let index = self.names.iter().position(|n| n == name)?;
        self.accumulators.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Accumulator)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.accumulators.iter())
    }
}
