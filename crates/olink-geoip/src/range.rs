//! Sorted range tables
//!
//! Each table is a list of disjoint `[start, end]` ranges sorted by
//! `start`, answering point queries by binary search.

use std::cmp::Ordering;

/// One address range and its country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRange<K> {
    pub start: K,
    pub end: K,
    pub country_code: String,
}

impl<K: Ord> GeoRange<K> {
    pub fn contains(&self, key: &K) -> bool {
        self.start <= *key && *key <= self.end
    }
}

/// Sorted, non-overlapping ranges.
///
/// Sorting and disjointness come from the source data and are not
/// checked; overlapping input gives unspecified matches.
#[derive(Debug, Clone, Default)]
pub struct RangeTable<K> {
    ranges: Vec<GeoRange<K>>,
}

impl<K: Ord> RangeTable<K> {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Build from ranges already in ascending order
    pub fn from_sorted(ranges: Vec<GeoRange<K>>) -> Self {
        Self { ranges }
    }

    /// Country code of the range containing `key`
    pub fn lookup(&self, key: &K) -> Option<&str> {
        self.ranges
            .binary_search_by(|range| {
                if range.contains(key) {
                    Ordering::Equal
                } else if *key < range.start {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            })
            .ok()
            .map(|idx| self.ranges[idx].country_code.as_str())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
