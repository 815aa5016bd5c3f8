//! Data model shared by every stage of the pipeline.
//!
//! Work units carry an opaque payload and a textual [`Metadata`] bag. Each
//! stage appends the positional tags it is responsible for, so that the
//! consolidation stage can map a detection found in a window of a reduced
//! pyramid level back to the coordinates of the original dataset.
//!
//! # Example
//!
//! ```
//! use roimill::roi::{Coords, Metadata, PyramidTag, WindowTag, PYRAMID_KEY, WINDOW_KEY};
//!
//! let pyramid = PyramidTag { scale_factor: 2, window_size: 5, step: 1 };
//! let window = WindowTag { x_offset: 3, y_offset: 4, width: 5, height: 6 };
//! let metadata = Metadata::new()
//!     .with_tag(PYRAMID_KEY, pyramid.to_string()).unwrap()
//!     .with_tag(WINDOW_KEY, window.to_string()).unwrap();
//!
//! let coords = Coords::decode(&metadata, 100, 100);
//! assert_eq!((coords.low_x, coords.low_y, coords.high_x, coords.high_y), (6, 8, 16, 20));
//! ```

mod coords;
mod dataset;
mod metadata;
mod model;
mod rect;

pub use coords::{Coords, PyramidTag, TagParseError, WindowTag};
pub use dataset::{read_dataset, write_dataset, Dataset};
#[cfg(feature = "fuzzing")]
pub use dataset::fuzz_parse_dataset;
pub use metadata::{Metadata, MetadataError, PYRAMID_KEY, SOURCE_KEY, WINDOW_KEY};
pub use model::{Payload, RegionBox, Roi, WorkUnit};
pub use rect::Rectangle;
