//! Fuzz target for metadata parsing and coordinate decoding.
//!
//! The first four bytes pick the dataset dimensions; the rest is parsed as
//! a metadata string and decoded. Decoded coordinates must always be valid
//! indices.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roimill::roi::{Coords, Metadata};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 || data.len() > 1024 * 1024 {
        return;
    }

    let width = u16::from_le_bytes([data[0], data[1]]) as usize;
    let height = u16::from_le_bytes([data[2], data[3]]) as usize;
    let Ok(text) = std::str::from_utf8(&data[4..]) else {
        return;
    };

    let metadata = Metadata::parse(text);
    let coords = Coords::decode(&metadata, width, height);
    assert!(coords.high_x < width.max(1));
    assert!(coords.high_y < height.max(1));
    assert!(coords.low_x <= coords.high_x);
    assert!(coords.low_y <= coords.high_y);
});
