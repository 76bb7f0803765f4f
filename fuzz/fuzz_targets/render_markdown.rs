#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(compare) = serde_json::from_slice::<benchgate_types::CompareReceipt>(data) {
        let _ = benchgate_app::render_markdown(&compare);
        let _ = benchgate_app::github_annotations(&compare);
    }
});
