#![no_main]

use libfuzzer_sys::fuzz_target;
use orbit_activities::specsync::detect_spec_type;

fuzz_target!(|data: &str| {
    // Classification is total over arbitrary text.
    let kind = detect_spec_type(data);
    assert!(matches!(kind, "openapi" | "swagger" | "asyncapi" | "unknown"));
});
