#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate lsml;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut doc) = lsml::Document::with_capacity(1 << 16) {
        let _ = doc.parse_bytes(data);
    }
});
