//! Reconstruction of absolute ROI coordinates from positional metadata.
//!
//! Upstream stages record where a unit came from with two tags:
//!
//! - `pyramid`: `pscale<int>pwsize<int>pstep<int>`, the pyramid level
//! - `window`: `xoff<int>yoff<int>w<int>h<int>`, the window within that level
//!
//! Decoding multiplies the window geometry by `pscale * pstep` and clamps the
//! result to the valid index range of the original dataset. It is pure: the
//! same metadata and dimensions always produce the same [`Coords`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use super::metadata::{Metadata, PYRAMID_KEY, WINDOW_KEY};

static PYRAMID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pscale([0-9]+)pwsize([0-9]+)pstep([0-9]+)$").expect("valid regex"));

static WINDOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^xoff([0-9]+)yoff([0-9]+)w([0-9]+)h([0-9]+)$").expect("valid regex"));

/// A positional tag value that does not match its grammar.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{value}' does not match the {kind} tag grammar")]
pub struct TagParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Parameters of the pyramid level a unit was cut from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PyramidTag {
    pub scale_factor: i64,
    pub window_size: i64,
    pub step: i64,
}

impl PyramidTag {
    /// Factor converting level coordinates back to the original dataset.
    #[inline]
    pub fn scaler(&self) -> i64 {
        self.scale_factor.saturating_mul(self.step)
    }
}

impl fmt::Display for PyramidTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pscale{}pwsize{}pstep{}",
            self.scale_factor, self.window_size, self.step
        )
    }
}

impl FromStr for PyramidTag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TagParseError {
            kind: PYRAMID_KEY,
            value: s.to_string(),
        };
        let caps = PYRAMID_RE.captures(s).ok_or_else(err)?;
        let num = |i: usize| caps[i].parse::<i64>().map_err(|_| err());
        Ok(PyramidTag {
            scale_factor: num(1)?,
            window_size: num(2)?,
            step: num(3)?,
        })
    }
}

/// Position and size of a sliding window within its pyramid level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WindowTag {
    pub x_offset: i64,
    pub y_offset: i64,
    pub width: i64,
    pub height: i64,
}

impl fmt::Display for WindowTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "xoff{}yoff{}w{}h{}",
            self.x_offset, self.y_offset, self.width, self.height
        )
    }
}

impl FromStr for WindowTag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TagParseError {
            kind: WINDOW_KEY,
            value: s.to_string(),
        };
        let caps = WINDOW_RE.captures(s).ok_or_else(err)?;
        let num = |i: usize| caps[i].parse::<i64>().map_err(|_| err());
        Ok(WindowTag {
            x_offset: num(1)?,
            y_offset: num(2)?,
            width: num(3)?,
            height: num(4)?,
        })
    }
}

/// An absolute bounding box in original-dataset coordinates.
///
/// Every component is a valid index: `low_x, high_x < width` and
/// `low_y, high_y < height` (or zero for an empty dimension).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Coords {
    pub low_x: usize,
    pub low_y: usize,
    pub high_x: usize,
    pub high_y: usize,
}

impl Coords {
    /// Decodes the `pyramid` and `window` tags of `metadata` against a
    /// `width x height` dataset.
    ///
    /// Missing or malformed tags contribute zeros (malformed ones are logged).
    pub fn decode(metadata: &Metadata, width: usize, height: usize) -> Coords {
        let pyramid = read_tag::<PyramidTag>(metadata, PYRAMID_KEY);
        let window = read_tag::<WindowTag>(metadata, WINDOW_KEY);
        Self::from_tags(&pyramid, &window, width, height)
    }

    /// Reconstructs coordinates from already-parsed tags.
    pub fn from_tags(pyramid: &PyramidTag, window: &WindowTag, width: usize, height: usize) -> Coords {
        let scaler = pyramid.scaler();
        let low_x = safe_idx(scaler.saturating_mul(window.x_offset), width);
        let low_y = safe_idx(scaler.saturating_mul(window.y_offset), height);
        let high_x = safe_idx(
            (low_x as i64).saturating_add(scaler.saturating_mul(window.width)),
            width,
        );
        let high_y = safe_idx(
            (low_y as i64).saturating_add(scaler.saturating_mul(window.height)),
            height,
        );
        Coords {
            low_x,
            low_y,
            high_x,
            high_y,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.high_x.saturating_sub(self.low_x)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.high_y.saturating_sub(self.low_y)
    }

    /// Area of the box, used to normalize overlaps.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }
}

fn read_tag<T>(metadata: &Metadata, key: &str) -> T
where
    T: FromStr<Err = TagParseError> + Default,
{
    match metadata.get(key) {
        None => T::default(),
        Some(raw) => raw.parse().unwrap_or_else(|err: TagParseError| {
            warn!(key, error = %err, "Unparseable positional tag, defaulting to zero");
            T::default()
        }),
    }
}

/// Saturates `value` to the valid index range `[0, dim)`.
#[inline]
fn safe_idx(value: i64, dim: usize) -> usize {
    if dim == 0 || value <= 0 {
        return 0;
    }
    (value as u64).min(dim as u64 - 1) as usize
}
