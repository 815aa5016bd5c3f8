//! Fuzz target for delimited dataset parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the dataset reader,
//! checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roimill::roi::fuzz_parse_dataset;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = fuzz_parse_dataset(data);
});
