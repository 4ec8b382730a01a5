//! Drill classifier: buckets holes by exact drill type.

use std::collections::BTreeMap;

use super::{DrillType, HoleRecord};
use crate::geometry::{Point, Size};

/// Hole positions keyed by drill type, iterated in sorted key order.
///
/// Keys are compared exactly: 0.799mm and 0.800mm are two different types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillGroups {
    groups: BTreeMap<DrillType, Vec<Point>>,
}

impl DrillGroups {
    /// Group holes by drill type, keeping input order within each group.
    pub fn classify<I>(records: I) -> Self
    where
        I: IntoIterator<Item = HoleRecord>,
    {
        let mut groups: BTreeMap<DrillType, Vec<Point>> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.drill_type())
                .or_default()
                .push(record.position);
        }
        Self { groups }
    }

    /// Number of distinct drill types.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of holes across all groups.
    pub fn hole_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn get(&self, drill_type: &DrillType) -> Option<&[Point]> {
        self.groups.get(drill_type).map(Vec::as_slice)
    }

    /// Groups in ascending drill type order.
    pub fn iter(&self) -> impl Iterator<Item = (&DrillType, &[Point])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn drill_types(&self) -> impl Iterator<Item = &DrillType> {
        self.groups.keys()
    }

    /// Every hole as `(position, size)`, groups in sorted order.
    pub fn flatten(&self) -> Vec<(Point, Size)> {
        self.groups
            .iter()
            .flat_map(|(dt, positions)| positions.iter().map(move |p| (*p, dt.size)))
            .collect()
    }
}
