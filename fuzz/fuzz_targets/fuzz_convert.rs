#![no_main]

use libfuzzer_sys::fuzz_target;
use notafiscal::core::LayoutConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(layout) = LayoutConfig::load("local_v400") else {
        return;
    };
    // Errors are fine, panics are bugs. Every produced document must be UTF-8.
    if let Ok(result) = notafiscal::xml::xml_converter(layout).convert(data) {
        for xml in &result.outputs {
            assert!(std::str::from_utf8(xml).is_ok());
        }
    }
});
