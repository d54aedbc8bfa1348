#![no_main]

use libfuzzer_sys::fuzz_target;
use notafiscal::core::LayoutConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(layout) = LayoutConfig::load("local_v400") else {
        return;
    };
    // Must not panic; findings are fine.
    let _ = notafiscal::convert::validate_only(data, &layout);
});
