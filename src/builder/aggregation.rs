//! Collapsing parallel relationships.
//!
//! Parallel relationships are entries with the same (source, target) pair.
//! With a merging aggregation they collapse into one entry whose property
//! values are folded with each property's own aggregation.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    /// Placeholder resolved to [`Aggregation::None`] before use.
    #[default]
    Default,
    /// Keep parallel relationships.
    None,
    /// Keep the first of the parallel relationships.
    Single,
    Sum,
    Min,
    Max,
    /// Collapse and count the parallel relationships.
    Count,
}

impl Aggregation {
    pub fn resolve(self) -> Self {
        match self {
            Aggregation::Default => Aggregation::None,
            concrete => concrete,
        }
    }

    /// Whether parallel relationships collapse into one.
    pub fn merges(self) -> bool {
        !matches!(self.resolve(), Aggregation::None)
    }

    /// Running value for the first relationship of a group.
    #[inline]
    pub fn initial(self, value: f64) -> f64 {
        match self {
            Aggregation::Count => 1.0,
            _ => value,
        }
    }

    /// Fold `value` into `running`.
    #[inline]
    pub fn merge(self, running: f64, value: f64) -> Result<f64> {
        match self {
            Aggregation::Default => Err(Error::Aggregation(
                "DEFAULT has to be resolved before merging".into(),
            )),
            Aggregation::None => Err(Error::Aggregation(
                "NONE keeps parallel relationships and never merges".into(),
            )),
            Aggregation::Single => Ok(running),
            Aggregation::Sum => Ok(running + value),
            Aggregation::Min => Ok(running.min(value)),
            Aggregation::Max => Ok(running.max(value)),
            Aggregation::Count => Ok(running + 1.0),
        }
    }
}

/// Aggregate one node's relationships.
///
/// `entries` holds `(target, row)` pairs and is sorted in place; `row`
/// indexes `property_rows`, which stores `aggregations.len()` values per row.
/// Writes the surviving targets and one column per property.
pub(crate) fn aggregate_run(
    entries: &mut [(u64, usize)],
    property_rows: &[f64],
    relationship_aggregation: Aggregation,
    aggregations: &[Aggregation],
    targets: &mut Vec<u64>,
    columns: &mut [Vec<f64>],
) -> Result<()> {
    let width = aggregations.len();
    debug_assert_eq!(columns.len(), width);
    entries.sort_unstable();
    targets.clear();
    columns.iter_mut().for_each(Vec::clear);

    if !relationship_aggregation.merges() {
        for &(target, row) in entries.iter() {
            targets.push(target);
            for (column, value) in columns.iter_mut().zip(&property_rows[row * width..(row + 1) * width]) {
                column.push(*value);
            }
        }
        return Ok(());
    }

    let mut start = 0;
    while start < entries.len() {
        let (target, first_row) = entries[start];
        targets.push(target);
        let first = &property_rows[first_row * width..(first_row + 1) * width];
        for ((column, aggregation), value) in columns.iter_mut().zip(aggregations).zip(first) {
            column.push(aggregation.initial(*value));
        }

        let mut end = start + 1;
        while end < entries.len() && entries[end].0 == target {
            let row = entries[end].1;
            let values = &property_rows[row * width..(row + 1) * width];
            for ((column, aggregation), value) in columns.iter_mut().zip(aggregations).zip(values) {
                if let Some(running) = column.last_mut() {
                    *running = aggregation.merge(*running, *value)?;
                }
            }
            end += 1;
        }
        start = end;
    }
    Ok(())
}
