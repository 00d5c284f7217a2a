#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate lsml;

// Parse with a buffer smaller than the input so allocation failure
// paths get exercised too.
fuzz_target!(|data: &[u8]| {
    if let Ok(mut doc) = lsml::Document::with_capacity(data.len() / 2 + 64) {
        let _ = doc.parse_bytes(data);
    }
});
