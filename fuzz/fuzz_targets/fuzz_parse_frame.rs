#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Completion detection and parsing must never panic on arbitrary
    // byte streams, including every prefix of the input
    for len in 0..=data.len() {
        let _ = helios::frame::frame_complete(&data[..len]);
    }
    let _ = helios::frame::parse_response(data);
    let _ = helios::frame::decode_registers(data);
});
