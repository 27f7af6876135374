#![no_main]

use libfuzzer_sys::fuzz_target;
use icy_hdr::{hdr_decode_bytes, hdr_encode_to_vec, EncodeOptions};
use arbitrary::Arbitrary;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<[u16; 3]>,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).max(1);
    let height = (input.height as usize).max(1).min(32);

    let expected_size = width * height;
    if input.pixels.len() < expected_size {
        return;
    }

    // finite, non-negative values
    let pixels: Vec<[f32; 3]> = input.pixels[..expected_size]
        .iter()
        .map(|p| p.map(|c| c as f32 / 256.0))
        .collect();

    let encoded = hdr_encode_to_vec(width, height, &pixels, &EncodeOptions::default())
        .expect("valid input must encode");
    let decoded = hdr_decode_bytes(&encoded).expect("encoder output must decode");

    assert_eq!(decoded.width, width);
    assert_eq!(decoded.height, height);
    for (orig, got) in pixels.iter().zip(&decoded.pixels) {
        let max = orig[0].max(orig[1]).max(orig[2]);
        for c in 0..3 {
            assert!(got[c] <= orig[c] && orig[c] - got[c] <= max / 128.0);
        }
    }
});
