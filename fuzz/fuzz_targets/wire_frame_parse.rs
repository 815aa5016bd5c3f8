//! Fuzz target for endpoint frame decoding.
//!
//! This fuzzer feeds arbitrary UTF-8 lines to the frame decoder, checking
//! for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roimill::remote::Frame;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let _ = Frame::decode(line);
});
