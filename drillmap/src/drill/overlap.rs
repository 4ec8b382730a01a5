//! Overlapping drill detection.
//!
//! Two holes overlap when their centres are closer than the sum of their
//! half-sizes along both axes. This treats every hole as its bounding box,
//! so two round holes touching only at the corners of their boxes are still
//! reported.

use serde::Serialize;

use super::DrillGroups;
use crate::geometry::{iu_to_mm, Point, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverlapPair {
    pub first: (Point, Size),
    pub second: (Point, Size),
}

impl OverlapPair {
    /// Log line in millimetres
    pub fn describe(&self) -> String {
        format!(
            "Found drills overlap at (mm): ({:.3}:{:.3}) and ({:.3}:{:.3})",
            iu_to_mm(self.first.0.x),
            iu_to_mm(self.first.0.y),
            iu_to_mm(self.second.0.x),
            iu_to_mm(self.second.0.y),
        )
    }
}

/// `|dx| < (w1 + w2) / 2` and `|dy| < (h1 + h2) / 2`, evaluated without division.
pub fn holes_overlap(a: (Point, Size), b: (Point, Size)) -> bool {
    let (pa, sa) = a;
    let (pb, sb) = b;
    2 * (pa.x - pb.x).abs() < sa.width + sb.width
        && 2 * (pa.y - pb.y).abs() < sa.height + sb.height
}

/// Check every pair of holes across all groups.
pub fn find_overlaps(groups: &DrillGroups) -> Vec<OverlapPair> {
    let holes = groups.flatten();
    let mut overlaps = Vec::new();
    for (i, first) in holes.iter().enumerate() {
        for second in &holes[i + 1..] {
            if holes_overlap(*first, *second) {
                overlaps.push(OverlapPair {
                    first: *first,
                    second: *second,
                });
            }
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill::{HoleRecord, HoleShape};
    use crate::geometry::mm_to_iu;

    fn hole(plated: bool, w_mm: f64, h_mm: f64, x_mm: f64, y_mm: f64) -> HoleRecord {
        HoleRecord {
            plated,
            size: Size::new(mm_to_iu(w_mm), mm_to_iu(h_mm)),
            shape: if w_mm == h_mm {
                HoleShape::Circle
            } else {
                HoleShape::Oblong
            },
            position: Point::from_mm(x_mm, y_mm),
        }
    }

    #[test]
    fn test_cross_group_overlap_at_same_position() {
        let groups = DrillGroups::classify(vec![
            hole(true, 0.8, 0.8, 0.0, 0.0),
            hole(false, 0.6, 1.2, 0.0, 0.0),
        ]);
        assert_eq!(groups.len(), 2);
        let overlaps = find_overlaps(&groups);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(
            overlaps[0].describe(),
            "Found drills overlap at (mm): (0.000:0.000) and (0.000:0.000)"
        );
    }

    #[test]
    fn test_predicate_is_symmetric() {
        let cases = [
            ((0.8, 0.8, 0.0, 0.0), (0.6, 1.2, 0.65, 0.9)),
            ((1.0, 1.0, 0.0, 0.0), (1.0, 1.0, 1.0, 0.0)),
            ((1.0, 1.0, 0.0, 0.0), (1.0, 1.0, 0.99, 0.99)),
            ((3.2, 3.2, 5.0, 5.0), (0.4, 0.4, 6.5, 3.5)),
        ];
        for ((w1, h1, x1, y1), (w2, h2, x2, y2)) in cases {
            let a = hole(true, w1, h1, x1, y1);
            let b = hole(true, w2, h2, x2, y2);
            assert_eq!(
                holes_overlap((a.position, a.size), (b.position, b.size)),
                holes_overlap((b.position, b.size), (a.position, a.size)),
            );
        }
    }

    #[test]
    fn test_touching_holes_do_not_overlap() {
        // Centres exactly one diameter apart: strict inequality fails
        let a = hole(true, 1.0, 1.0, 0.0, 0.0);
        let b = hole(true, 1.0, 1.0, 1.0, 0.0);
        assert!(!holes_overlap((a.position, a.size), (b.position, b.size)));
    }

    #[test]
    fn test_box_approximation_flags_diagonal_neighbours() {
        // True circles 1.4mm apart would not touch, their boxes do
        let a = hole(true, 1.0, 1.0, 0.0, 0.0);
        let b = hole(true, 1.0, 1.0, 0.99, 0.99);
        assert!(holes_overlap((a.position, a.size), (b.position, b.size)));
    }

    #[test]
    fn test_pairs_are_reported_once() {
        let groups = DrillGroups::classify(vec![
            hole(true, 1.0, 1.0, 0.0, 0.0),
            hole(true, 1.0, 1.0, 0.5, 0.0),
            hole(true, 1.0, 1.0, 0.25, 0.0),
            hole(true, 1.0, 1.0, 10.0, 0.0),
        ]);
        let overlaps = find_overlaps(&groups);
        assert_eq!(overlaps.len(), 3);
        for pair in &overlaps {
            assert_ne!(pair.first.0, pair.second.0);
        }
    }

    #[test]
    fn test_no_holes_no_overlaps() {
        assert!(find_overlaps(&DrillGroups::default()).is_empty());
    }
}
