#![no_main]

use libfuzzer_sys::fuzz_target;
use icy_hdr::{hdr_encode_to_vec, EncodeOptions};
use arbitrary::Arbitrary;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<[f32; 3]>,
    use_rle: bool,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).max(1);
    let height = (input.height as usize).max(1).min(64);

    let expected_size = width * height;
    if input.pixels.len() < expected_size {
        return;
    }

    let opts = EncodeOptions {
        use_rle: input.use_rle,
        ..Default::default()
    };

    // NaN, infinities and negative values must not panic
    let _ = hdr_encode_to_vec(width, height, &input.pixels[..expected_size], &opts);
});
