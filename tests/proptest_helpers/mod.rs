#![allow(dead_code)]

use roimill::roi::{Metadata, PyramidTag, Rectangle, RegionBox, Roi, WindowTag, PYRAMID_KEY, SOURCE_KEY, WINDOW_KEY};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_pyramid_tag() -> BoxedStrategy<PyramidTag> {
    (0i64..=8, 1i64..=64, 0i64..=6)
        .prop_map(|(scale_factor, window_size, step)| PyramidTag {
            scale_factor,
            window_size,
            step,
        })
        .boxed()
}

pub fn arb_window_tag() -> BoxedStrategy<WindowTag> {
    (0i64..=400, 0i64..=400, 0i64..=80, 0i64..=80)
        .prop_map(|(x_offset, y_offset, width, height)| WindowTag {
            x_offset,
            y_offset,
            width,
            height,
        })
        .boxed()
}

/// Dataset dimensions, including degenerate ones.
pub fn arb_dims() -> BoxedStrategy<(usize, usize)> {
    (0usize..=300, 0usize..=300).boxed()
}

pub fn roi_from_tags(pyramid: &PyramidTag, window: &WindowTag) -> Roi {
    let metadata = Metadata::new()
        .with_tag(SOURCE_KEY, "prop")
        .unwrap()
        .with_tag(PYRAMID_KEY, pyramid.to_string())
        .unwrap()
        .with_tag(WINDOW_KEY, window.to_string())
        .unwrap();
    Roi::new(
        RegionBox::new(0, 0, window.width as usize, window.height as usize),
        metadata,
    )
}

pub fn arb_roi() -> BoxedStrategy<Roi> {
    (arb_pyramid_tag(), arb_window_tag())
        .prop_map(|(p, w)| roi_from_tags(&p, &w))
        .boxed()
}

pub fn arb_rois(max: usize) -> BoxedStrategy<Vec<Roi>> {
    prop::collection::vec(arb_roi(), 0..=max).boxed()
}

pub fn arb_rectangle() -> BoxedStrategy<Rectangle> {
    (0i64..=100, 0i64..=100, 1i64..=40, 1i64..=40)
        .prop_map(|(x, y, w, h)| Rectangle::new(x, y, w, h))
        .boxed()
}
