#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(receipt) = serde_json::from_slice::<benchgate_types::CompareReceipt>(data) {
        // Anything we accept must serialize back out.
        let _ = serde_json::to_vec(&receipt).expect("serialize accepted receipt");
        let _ = receipt.statuses();
    }
});
