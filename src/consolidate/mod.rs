//! Region consolidation.
//!
//! Detections arrive from many pyramid levels and overlapping windows, so the
//! same feature is usually reported several times. This module reduces a
//! list of ROI to fewer regions, either by merging overlapping boxes under a
//! [`MergePolicy`] or by Non-Maximum Suppression.
//!
//! Both operate on [`Coords`] decoded from each ROI's metadata against the
//! original dataset dimensions.
//!
//! # Order sensitivity
//!
//! Merging is a single left-to-right pass: each incoming box is compared once
//! against every box merged so far, and earlier boxes are not re-examined
//! after their geometry changes. Depending on input order this can leave
//! transitively overlapping boxes unmerged.

mod render;

pub use render::RenderMode;

use crate::roi::{Coords, Rectangle, Roi};

/// Default multiplier applied to region interiors when enhancing.
pub const DEFAULT_ENHANCE_FACTOR: f64 = 1.5;
/// Default overlap ratio above which regions are merged or suppressed.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.25;

/// How two overlapping boxes are combined while merging.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MergePolicy {
    /// Boxes that intersect are replaced by their union.
    Union,
    /// Boxes that intersect are replaced by their intersection, or by the
    /// outer box when one wholly contains the other.
    Intersection,
    /// Boxes whose intersection covers more than the given fraction of the
    /// existing box are replaced by the intersection.
    Overlap(f64),
}

impl MergePolicy {
    /// Combines an existing merged box with an incoming one.
    ///
    /// Returns `None` when the boxes should stay separate.
    pub fn combine(&self, current: &Rectangle, incoming: &Rectangle) -> Option<Rectangle> {
        match *self {
            MergePolicy::Union => {
                if current.intersects(incoming)
                    || current.contains(incoming)
                    || incoming.contains(current)
                {
                    Some(current.union(incoming))
                } else {
                    None
                }
            }
            MergePolicy::Intersection => {
                if current.contains(incoming) {
                    Some(*current)
                } else if incoming.contains(current) {
                    Some(*incoming)
                } else if current.intersects(incoming) {
                    Some(current.intersection(incoming))
                } else {
                    None
                }
            }
            MergePolicy::Overlap(threshold) => {
                if !current.intersects(incoming) {
                    return None;
                }
                let intersection = current.intersection(incoming);
                let ratio = intersection.area() as f64 / current.area() as f64;
                (ratio > threshold).then_some(intersection)
            }
        }
    }
}

/// Merges boxes in a single pass under `policy`.
///
/// Every incoming box is compared against each box merged so far; each box
/// it combines with is replaced by the combination. A box that combines with
/// none is appended as a new region.
pub fn merge_boxes<I>(boxes: I, policy: MergePolicy) -> Vec<Rectangle>
where
    I: IntoIterator<Item = Rectangle>,
{
    let mut merged: Vec<Rectangle> = Vec::new();
    for incoming in boxes {
        let mut absorbed = false;
        for current in merged.iter_mut() {
            if let Some(combined) = policy.combine(current, &incoming) {
                *current = combined;
                absorbed = true;
            }
        }
        if !absorbed {
            merged.push(incoming);
        }
    }
    merged
}

/// Runs Non-Maximum Suppression over decoded boxes and returns the picked
/// indices in pick order.
///
/// Boxes are visited from the largest `high_y` down (ties keep input order).
/// After each pick, every remaining box `j` whose overlap with the pick,
/// normalized by `j`'s own area, exceeds `threshold` is discarded.
pub fn suppress_indices(coords: &[Coords], threshold: f64) -> Vec<usize> {
    let area: Vec<f64> = coords.iter().map(Coords::area).collect();
    let mut order: Vec<usize> = (0..coords.len()).collect();
    order.sort_by_key(|&i| coords[i].high_y);

    let mut picks = Vec::with_capacity(coords.len());
    while let Some(i) = order.pop() {
        picks.push(i);
        let picked = coords[i];
        order.retain(|&j| {
            let other = coords[j];
            let w = (picked.high_x.min(other.high_x) as i64 - picked.low_x.max(other.low_x) as i64).max(0);
            let h = (picked.high_y.min(other.high_y) as i64 - picked.low_y.max(other.low_y) as i64).max(0);
            // A zero-area candidate yields NaN and is never suppressed
            let overlap = (w * h) as f64 / area[j];
            !(overlap > threshold)
        });
    }
    picks
}

/// Merges, suppresses and renders ROI against an original dataset.
#[derive(Clone, Debug)]
pub struct RegionConsolidator {
    /// Multiplier applied to samples inside enhanced regions.
    pub enhance_factor: f64,
    /// Threshold used by the overlap policy and by NMS.
    pub overlap_threshold: f64,
}

impl Default for RegionConsolidator {
    fn default() -> Self {
        Self::new(DEFAULT_ENHANCE_FACTOR, DEFAULT_OVERLAP_THRESHOLD)
    }
}

impl RegionConsolidator {
    pub fn new(enhance_factor: f64, overlap_threshold: f64) -> Self {
        Self {
            enhance_factor,
            overlap_threshold,
        }
    }

    /// Decodes every ROI against a `width x height` dataset.
    pub fn decode_all(regions: &[Roi], width: usize, height: usize) -> Vec<Coords> {
        regions.iter().map(|r| r.coords(width, height)).collect()
    }

    /// Merges ROI into fewer rectangles under `policy`.
    pub fn merge(&self, regions: &[Roi], width: usize, height: usize, policy: MergePolicy) -> Vec<Rectangle> {
        merge_boxes(
            regions
                .iter()
                .map(|r| Rectangle::from(r.coords(width, height))),
            policy,
        )
    }

    /// Non-Maximum Suppression of ROI.
    ///
    /// Returns the retained ROI in pick order (largest bottom edge first),
    /// not in input order.
    pub fn non_max_suppression(&self, regions: &[Roi], width: usize, height: usize) -> Vec<Roi> {
        let coords = Self::decode_all(regions, width, height);
        suppress_indices(&coords, self.overlap_threshold)
            .into_iter()
            .map(|i| regions[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Metadata, PyramidTag, RegionBox, WindowTag, PYRAMID_KEY, WINDOW_KEY};

    fn roi(x: i64, y: i64, w: i64, h: i64) -> Roi {
        let pyramid = PyramidTag {
            scale_factor: 1,
            window_size: 1,
            step: 1,
        };
        let window = WindowTag {
            x_offset: x,
            y_offset: y,
            width: w,
            height: h,
        };
        let metadata = Metadata::new()
            .with_tag(PYRAMID_KEY, pyramid.to_string())
            .unwrap()
            .with_tag(WINDOW_KEY, window.to_string())
            .unwrap();
        Roi::new(RegionBox::new(0, 0, w as usize, h as usize), metadata)
    }

    #[test]
    fn test_overlap_policy_replaces_with_intersection() {
        // intersection covers half of the first box
        let a = Rectangle::new(0, 0, 10, 10);
        let b = Rectangle::new(5, 0, 10, 10);
        let merged = merge_boxes([a, b], MergePolicy::Overlap(0.25));
        assert_eq!(merged, vec![Rectangle::new(5, 0, 5, 10)]);
    }

    #[test]
    fn test_overlap_policy_below_threshold_keeps_both() {
        let a = Rectangle::new(0, 0, 10, 10);
        let b = Rectangle::new(9, 9, 10, 10);
        let merged = merge_boxes([a, b], MergePolicy::Overlap(0.25));
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_union_policy() {
        let a = Rectangle::new(0, 0, 4, 4);
        let b = Rectangle::new(2, 2, 4, 4);
        let c = Rectangle::new(20, 20, 2, 2);
        let merged = merge_boxes([a, b, c], MergePolicy::Union);
        assert_eq!(merged, vec![Rectangle::new(0, 0, 6, 6), c]);
    }

    #[test]
    fn test_intersection_policy_prefers_containing_box() {
        let outer = Rectangle::new(0, 0, 10, 10);
        let inner = Rectangle::new(2, 2, 3, 3);
        assert_eq!(merge_boxes([inner, outer], MergePolicy::Intersection), vec![outer]);

        let a = Rectangle::new(0, 0, 4, 4);
        let b = Rectangle::new(2, 2, 4, 4);
        assert_eq!(
            merge_boxes([a, b], MergePolicy::Intersection),
            vec![Rectangle::new(2, 2, 2, 2)]
        );
    }

    #[test]
    fn test_incoming_box_absorbed_by_any_match() {
        // c overlaps a but not b: it must be absorbed, not appended
        let a = Rectangle::new(0, 0, 4, 4);
        let b = Rectangle::new(10, 10, 4, 4);
        let c = Rectangle::new(1, 1, 2, 2);
        let merged = merge_boxes([a, b, c], MergePolicy::Union);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_merge_is_order_sensitive() {
        // a and c only connect through b; arriving before b leaves them apart
        let a = Rectangle::new(0, 0, 4, 4);
        let b = Rectangle::new(3, 0, 4, 4);
        let c = Rectangle::new(6, 0, 4, 4);
        assert_eq!(merge_boxes([a, b, c], MergePolicy::Union).len(), 1);
        assert_eq!(merge_boxes([a, c, b], MergePolicy::Union).len(), 2);
    }

    #[test]
    fn test_nms_empty() {
        let consolidator = RegionConsolidator::default();
        assert!(consolidator.non_max_suppression(&[], 100, 100).is_empty());
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes_by_descending_bottom() {
        let regions = vec![roi(0, 0, 10, 10), roi(50, 50, 10, 10)];
        let kept = RegionConsolidator::default().non_max_suppression(&regions, 100, 100);
        assert_eq!(kept, vec![regions[1].clone(), regions[0].clone()]);
    }

    #[test]
    fn test_nms_suppresses_with_candidate_normalized_overlap() {
        // small box sits inside the big one: overlap / area(small) == 1
        let big = roi(0, 0, 20, 20);
        let small = roi(2, 2, 4, 4);
        let kept = RegionConsolidator::default().non_max_suppression(&[small.clone(), big.clone()], 100, 100);
        assert_eq!(kept, vec![big]);

        let wide = roi(0, 0, 20, 4);
        let tall = roi(0, 0, 4, 30);
        let kept = RegionConsolidator::default().non_max_suppression(&[wide.clone(), tall.clone()], 100, 100);
        // overlap(tall, wide) = 16 / 80 = 0.2 is below the threshold
        assert_eq!(kept, vec![tall, wide]);
    }

    #[test]
    fn test_nms_ties_keep_input_stability() {
        let coords = vec![
            Coords {
                low_x: 0,
                low_y: 0,
                high_x: 2,
                high_y: 5,
            },
            Coords {
                low_x: 10,
                low_y: 0,
                high_x: 12,
                high_y: 5,
            },
        ];
        // stable ascending sort keeps [0, 1]; popping from the end picks 1 first
        assert_eq!(suppress_indices(&coords, 0.25), vec![1, 0]);
    }

    #[test]
    fn test_nms_zero_area_candidate_survives() {
        let coords = vec![
            Coords {
                low_x: 3,
                low_y: 3,
                high_x: 3,
                high_y: 3,
            },
            Coords {
                low_x: 0,
                low_y: 0,
                high_x: 10,
                high_y: 10,
            },
        ];
        assert_eq!(suppress_indices(&coords, 0.25), vec![1, 0]);
    }
}
