//! Rendering consolidated regions onto a copy of the original dataset.

use std::fmt;
use std::str::FromStr;

use super::{MergePolicy, RegionConsolidator};
use crate::error::RoiMillError;
use crate::roi::{Coords, Dataset, Rectangle, Roi};

/// How a set of ROI is turned into an output dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Draw the border of every region.
    #[default]
    All,
    /// Multiply region interiors by the enhancement factor.
    Enhance,
    /// Borders, then enhancement.
    AllEnhance,
    /// Merge with [`MergePolicy::Union`] and draw the merged boxes.
    Union,
    /// Merge with [`MergePolicy::Intersection`] and draw the merged boxes.
    Intersection,
    /// Merge with [`MergePolicy::Overlap`] and draw the merged boxes.
    Overlap,
    /// Non-Maximum Suppression, then draw the survivors.
    NonMaxSuppress,
    /// Non-Maximum Suppression, then borders and enhancement of the survivors.
    NmsEnhance,
}

impl RenderMode {
    pub const ALL_MODES: [RenderMode; 8] = [
        RenderMode::All,
        RenderMode::Enhance,
        RenderMode::AllEnhance,
        RenderMode::Union,
        RenderMode::Intersection,
        RenderMode::Overlap,
        RenderMode::NonMaxSuppress,
        RenderMode::NmsEnhance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::All => "all",
            RenderMode::Enhance => "enhance",
            RenderMode::AllEnhance => "all-enhance",
            RenderMode::Union => "union",
            RenderMode::Intersection => "intersection",
            RenderMode::Overlap => "overlap",
            RenderMode::NonMaxSuppress => "nms",
            RenderMode::NmsEnhance => "nms-enhance",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = RoiMillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL_MODES
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| RoiMillError::UnsupportedMode(s.to_string()))
    }
}

impl RegionConsolidator {
    /// Renders `regions` onto a copy of `input` according to `mode`.
    ///
    /// `input` is never modified. With no regions the result is an exact copy.
    pub fn generate(&self, input: &Dataset, regions: &[Roi], mode: RenderMode) -> Dataset {
        let (w, h) = (input.width(), input.height());
        match mode {
            RenderMode::All => self.all(input, regions),
            RenderMode::Enhance => self.enhance(input, regions),
            RenderMode::AllEnhance => {
                let bordered = self.all(input, regions);
                self.enhance(&bordered, regions)
            }
            RenderMode::Union => self.draw_merged(input, regions, MergePolicy::Union),
            RenderMode::Intersection => self.draw_merged(input, regions, MergePolicy::Intersection),
            RenderMode::Overlap => {
                self.draw_merged(input, regions, MergePolicy::Overlap(self.overlap_threshold))
            }
            RenderMode::NonMaxSuppress => {
                let kept = self.non_max_suppression(regions, w, h);
                self.all(input, &kept)
            }
            RenderMode::NmsEnhance => {
                let kept = self.non_max_suppression(regions, w, h);
                let bordered = self.all(input, &kept);
                self.enhance(&bordered, &kept)
            }
        }
    }

    /// Draws the one-sample border of each decoded region at the dataset's
    /// maximum value.
    pub fn all(&self, input: &Dataset, regions: &[Roi]) -> Dataset {
        let mut out = input.clone();
        let Some(peak) = input.max() else {
            return out;
        };
        for roi in regions {
            let c = roi.coords(input.width(), input.height());
            draw_border(&mut out, c.low_x, c.low_y, c.high_x, c.high_y, peak);
        }
        out
    }

    /// Multiplies the interior of each decoded region by the enhancement
    /// factor. Overlapping regions compound.
    pub fn enhance(&self, input: &Dataset, regions: &[Roi]) -> Dataset {
        let mut out = input.clone();
        for roi in regions {
            let Coords {
                low_x,
                low_y,
                high_x,
                high_y,
            } = roi.coords(input.width(), input.height());
            for y in low_y..high_y {
                for x in low_x..high_x {
                    if let Some(v) = out.get(x, y) {
                        out.set(x, y, v * self.enhance_factor);
                    }
                }
            }
        }
        out
    }

    fn draw_merged(&self, input: &Dataset, regions: &[Roi], policy: MergePolicy) -> Dataset {
        let mut out = input.clone();
        let Some(peak) = input.max() else {
            return out;
        };
        for rect in self.merge(regions, input.width(), input.height(), policy) {
            if rect.is_empty() {
                continue;
            }
            let (lx, ly, hx, hy) = corners(&rect);
            draw_border(&mut out, lx, ly, hx, hy, peak);
        }
        out
    }
}

fn corners(rect: &Rectangle) -> (usize, usize, usize, usize) {
    let idx = |v: i64| v.max(0) as usize;
    (idx(rect.x), idx(rect.y), idx(rect.right()), idx(rect.bottom()))
}

// Edges are inclusive of both corners.
fn draw_border(out: &mut Dataset, low_x: usize, low_y: usize, high_x: usize, high_y: usize, value: f64) {
    for x in low_x..=high_x {
        out.set(x, low_y, value);
        out.set(x, high_y, value);
    }
    for y in low_y..=high_y {
        out.set(low_x, y, value);
        out.set(high_x, y, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Metadata, PyramidTag, RegionBox, WindowTag, PYRAMID_KEY, WINDOW_KEY};

    fn roi(x: i64, y: i64, w: i64, h: i64) -> Roi {
        let metadata = Metadata::new()
            .with_tag(
                PYRAMID_KEY,
                PyramidTag {
                    scale_factor: 1,
                    window_size: 1,
                    step: 1,
                }
                .to_string(),
            )
            .unwrap()
            .with_tag(
                WINDOW_KEY,
                WindowTag {
                    x_offset: x,
                    y_offset: y,
                    width: w,
                    height: h,
                }
                .to_string(),
            )
            .unwrap();
        Roi::new(RegionBox::default(), metadata)
    }

    fn flat(width: usize, height: usize, value: f64) -> Dataset {
        Dataset::from_rows(vec![vec![value; width]; height]).unwrap()
    }

    fn peak_canvas() -> Dataset {
        let mut ds = flat(10, 10, 1.0);
        ds.set(9, 9, 7.0);
        ds
    }

    #[test]
    fn test_no_regions_yields_identical_copy() {
        let input = peak_canvas();
        let consolidator = RegionConsolidator::default();
        for mode in RenderMode::ALL_MODES {
            assert_eq!(consolidator.generate(&input, &[], mode), input, "mode {mode}");
        }
    }

    #[test]
    fn test_all_draws_exactly_the_border() {
        let input = peak_canvas();
        let out = RegionConsolidator::default().all(&input, &[roi(2, 3, 3, 2)]);
        for y in 0..10 {
            for x in 0..10 {
                let on_border = (2..=5).contains(&x) && (3..=5).contains(&y)
                    && (x == 2 || x == 5 || y == 3 || y == 5);
                let expected = if on_border || (x, y) == (9, 9) { 7.0 } else { 1.0 };
                assert_eq!(out.get(x, y), Some(expected), "({x}, {y})");
            }
        }
        assert_eq!(input.get(2, 3), Some(1.0));
    }

    #[test]
    fn test_enhance_touches_interior_only_and_compounds() {
        let input = flat(10, 10, 2.0);
        let consolidator = RegionConsolidator::new(2.0, 0.25);
        let out = consolidator.enhance(&input, &[roi(1, 1, 3, 3), roi(2, 2, 1, 1)]);
        assert_eq!(out.get(1, 1), Some(4.0));
        assert_eq!(out.get(3, 3), Some(4.0));
        // upper bounds are exclusive
        assert_eq!(out.get(4, 4), Some(2.0));
        assert_eq!(out.get(4, 1), Some(2.0));
        // both boxes cover (2, 2)
        assert_eq!(out.get(2, 2), Some(8.0));
        assert_eq!(input.get(2, 2), Some(2.0));
    }

    #[test]
    fn test_union_draws_merged_box() {
        let input = peak_canvas();
        let out = RegionConsolidator::default().generate(
            &input,
            &[roi(1, 1, 3, 3), roi(2, 2, 3, 3)],
            RenderMode::Union,
        );
        // merged box spans (1,1)..(5,5)
        assert_eq!(out.get(1, 1), Some(7.0));
        assert_eq!(out.get(5, 5), Some(7.0));
        assert_eq!(out.get(5, 1), Some(7.0));
        assert_eq!(out.get(3, 3), Some(1.0));
        // the inner corner of the second box is not drawn
        assert_eq!(out.get(2, 4), Some(1.0));
    }

    #[test]
    fn test_nms_enhance_uses_survivors() {
        let mut input = flat(20, 20, 1.0);
        input.set(19, 19, 5.0);
        let consolidator = RegionConsolidator::new(3.0, 0.25);
        let big = roi(0, 0, 10, 10);
        let small = roi(2, 2, 2, 2);
        let out = consolidator.generate(&input, &[small, big], RenderMode::NmsEnhance);
        // the suppressed box's border would sit at (4, 2)
        assert_eq!(out.get(4, 2), Some(3.0));
        assert_eq!(out.get(0, 0), Some(15.0));
        assert_eq!(out.get(10, 10), Some(5.0));
    }

    #[test]
    fn test_mode_names() {
        for mode in RenderMode::ALL_MODES {
            assert_eq!(mode.as_str().parse::<RenderMode>().unwrap(), mode);
        }
        assert_eq!("NMS_ENHANCE".parse::<RenderMode>().unwrap(), RenderMode::NmsEnhance);
        assert!(matches!(
            "sparkle".parse::<RenderMode>(),
            Err(RoiMillError::UnsupportedMode(_))
        ));
    }
}
