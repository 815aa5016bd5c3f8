//! Property tests for coordinate decoding, merging and suppression.

mod proptest_helpers;

use std::collections::HashSet;

use proptest::prelude::*;
use roimill::consolidate::{merge_boxes, suppress_indices, MergePolicy, RegionConsolidator};
use roimill::roi::{Coords, Rectangle};

fn overlap(a: &Coords, b: &Coords) -> f64 {
    let w = (a.high_x.min(b.high_x) as i64 - a.low_x.max(b.low_x) as i64).max(0);
    let h = (a.high_y.min(b.high_y) as i64 - a.low_y.max(b.low_y) as i64).max(0);
    (w * h) as f64
}

fn encloses(outer: &Rectangle, inner: &Rectangle) -> bool {
    outer.x <= inner.x && outer.y <= inner.y && outer.right() >= inner.right() && outer.bottom() >= inner.bottom()
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn decode_stays_inside_dataset(
        pyramid in proptest_helpers::arb_pyramid_tag(),
        window in proptest_helpers::arb_window_tag(),
        (width, height) in proptest_helpers::arb_dims(),
    ) {
        let coords = Coords::from_tags(&pyramid, &window, width, height);
        prop_assert!(coords.low_x <= coords.high_x);
        prop_assert!(coords.low_y <= coords.high_y);
        if width == 0 {
            prop_assert_eq!(coords.high_x, 0);
        } else {
            prop_assert!(coords.high_x < width);
        }
        if height == 0 {
            prop_assert_eq!(coords.high_y, 0);
        } else {
            prop_assert!(coords.high_y < height);
        }
    }

    #[test]
    fn decode_is_deterministic(
        roi in proptest_helpers::arb_roi(),
        (width, height) in proptest_helpers::arb_dims(),
    ) {
        let first = roi.coords(width, height);
        let again = Coords::decode(&roi.metadata, width, height);
        prop_assert_eq!(first, again);
    }

    #[test]
    fn nms_picks_a_subset_without_repeats(
        rois in proptest_helpers::arb_rois(24),
        (width, height) in proptest_helpers::arb_dims(),
    ) {
        let coords = RegionConsolidator::decode_all(&rois, width, height);
        let picks = suppress_indices(&coords, 0.25);
        prop_assert!(picks.len() <= rois.len());
        prop_assert_eq!(picks.is_empty(), rois.is_empty());

        let unique: HashSet<usize> = picks.iter().copied().collect();
        prop_assert_eq!(unique.len(), picks.len());
        prop_assert!(picks.iter().all(|&i| i < rois.len()));

        let kept = RegionConsolidator::default().non_max_suppression(&rois, width, height);
        prop_assert_eq!(kept.len(), picks.len());
    }

    #[test]
    fn nms_survivors_do_not_overlap_earlier_picks(
        rois in proptest_helpers::arb_rois(24),
        (width, height) in proptest_helpers::arb_dims(),
        threshold in 0.0f64..1.0,
    ) {
        let coords = RegionConsolidator::decode_all(&rois, width, height);
        let picks = suppress_indices(&coords, threshold);
        for (n, &later) in picks.iter().enumerate() {
            for &earlier in &picks[..n] {
                let ratio = overlap(&coords[earlier], &coords[later]) / coords[later].area();
                prop_assert!(!(ratio > threshold), "pick {} overlaps {} by {}", later, earlier, ratio);
            }
        }
    }

    #[test]
    fn nms_visits_bottom_edges_in_descending_order(
        rois in proptest_helpers::arb_rois(24),
        (width, height) in proptest_helpers::arb_dims(),
    ) {
        let coords = RegionConsolidator::decode_all(&rois, width, height);
        let picks = suppress_indices(&coords, 0.25);
        for pair in picks.windows(2) {
            prop_assert!(coords[pair[0]].high_y >= coords[pair[1]].high_y);
        }
    }

    #[test]
    fn union_merge_covers_every_input(
        boxes in prop::collection::vec(proptest_helpers::arb_rectangle(), 0..16),
    ) {
        let merged = merge_boxes(boxes.iter().copied(), MergePolicy::Union);
        prop_assert!(merged.len() <= boxes.len());
        for input in &boxes {
            prop_assert!(
                merged.iter().any(|m| encloses(m, input)),
                "{:?} is not covered by {:?}", input, merged
            );
        }
    }

    #[test]
    fn intersection_merge_never_grows_past_inputs(
        boxes in prop::collection::vec(proptest_helpers::arb_rectangle(), 0..16),
    ) {
        let merged = merge_boxes(boxes.iter().copied(), MergePolicy::Intersection);
        prop_assert!(merged.len() <= boxes.len());
        let largest = boxes.iter().map(Rectangle::area).max().unwrap_or(0);
        for m in &merged {
            prop_assert!(m.area() <= largest);
        }
    }
}
