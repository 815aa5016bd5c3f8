//! Fuzz target for remote pool address parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roimill::remote::Address;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(address) = text.parse::<Address>() {
        let reparsed: Address = address.to_string().parse().expect("display output parses");
        assert_eq!(reparsed, address);
    }
});
