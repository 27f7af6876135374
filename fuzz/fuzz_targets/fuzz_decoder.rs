#![no_main]

use libfuzzer_sys::fuzz_target;
use icy_hdr::hdr_decode_bytes;

fuzz_target!(|data: &[u8]| {
    // The decoder should never panic, regardless of input
    if let Ok(image) = hdr_decode_bytes(data) {
        assert_eq!(image.pixels.len(), image.width * image.height);
    }
});
