#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Client frames are untrusted; decoding must never panic, whatever arrives.
    let _ = serde_json::from_slice::<uno_server::protocol::ClientMessage>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(msg) = serde_json::from_str::<uno_server::protocol::ClientMessage>(s) {
            // Anything that decodes must encode again.
            let _ = serde_json::to_string(&msg);
        }
    }
});
