//! Conversion between shared-exponent RGBE quads and linear float RGB.
//!
//! An RGBE pixel stores three 8-bit mantissas and one 8-bit exponent shared by
//! all channels. Exponent byte `0` is reserved for black; any other value `e`
//! scales the mantissas by `2^(e - 136)`.

/// Bias added to the frexp exponent when it is stored in the exponent byte.
const EXPONENT_BIAS: i32 = 128;
/// Bits of precision in one mantissa byte.
const MANTISSA_BITS: i32 = 8;
/// Largest frexp exponent that still fits the exponent byte.
const MAX_EXPONENT: i32 = u8::MAX as i32 - EXPONENT_BIAS;
/// Pixels whose brightest channel is below this encode as black.
const BLACK_THRESHOLD: f32 = 1e-32;

/// One RGBE pixel: three mantissa bytes and a shared exponent byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgbe {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub e: u8,
}

impl Rgbe {
    /// The reserved black pixel (exponent byte 0).
    pub const BLACK: Rgbe = Rgbe {
        r: 0,
        g: 0,
        b: 0,
        e: 0,
    };

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, e: u8) -> Self {
        Self { r, g, b, e }
    }
}

impl From<[u8; 4]> for Rgbe {
    #[inline]
    fn from([r, g, b, e]: [u8; 4]) -> Self {
        Self { r, g, b, e }
    }
}

impl From<Rgbe> for [u8; 4] {
    #[inline]
    fn from(Rgbe { r, g, b, e }: Rgbe) -> Self {
        [r, g, b, e]
    }
}

/// Expand an RGBE quad into linear float RGB.
///
/// A pixel of `1.0` encodes as mantissa 128 with exponent 129 and comes back
/// as exactly `1.0`, so unit-range images stay inside `[0, 1]`.
#[inline]
pub fn rgbe_to_float(rgbe: Rgbe) -> [f32; 3] {
    if rgbe.e == 0 {
        return [0.0; 3];
    }
    let scale = ldexp_one(i32::from(rgbe.e) - (EXPONENT_BIAS + MANTISSA_BITS)) as f32;
    [
        f32::from(rgbe.r) * scale,
        f32::from(rgbe.g) * scale,
        f32::from(rgbe.b) * scale,
    ]
}

/// Compress linear float RGB into an RGBE quad.
///
/// Mantissas are truncated, not rounded. Out-of-range products saturate:
/// negative or NaN channels store 0, anything at or above 256 stores 255, and
/// magnitudes whose exponent does not fit the exponent byte clamp to the
/// brightest encodable scale instead of wrapping to black.
#[inline]
pub fn float_to_rgbe([r, g, b]: [f32; 3]) -> Rgbe {
    let v = r.max(g).max(b);
    if v.is_nan() || v < BLACK_THRESHOLD {
        return Rgbe::BLACK;
    }

    let (mantissa, exponent) = if v.is_finite() {
        frexp(f64::from(v))
    } else {
        (1.0, i32::MAX)
    };

    if exponent > MAX_EXPONENT {
        let scale = ldexp_one(MANTISSA_BITS - MAX_EXPONENT) as f32;
        return Rgbe::new(
            (r * scale) as u8,
            (g * scale) as u8,
            (b * scale) as u8,
            u8::MAX,
        );
    }

    let scale = mantissa as f32 * 256.0 / v;
    Rgbe::new(
        (r * scale) as u8,
        (g * scale) as u8,
        (b * scale) as u8,
        (exponent + EXPONENT_BIAS) as u8,
    )
}

/// Split `x` into a mantissa in `[0.5, 1)` and a power of two, `x = m * 2^e`.
///
/// Zero, infinities and NaN come back unchanged with exponent 0.
pub fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // subnormal
        let (m, e) = frexp(x * ldexp_one(54));
        return (m, e - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (mantissa, biased - 1022)
}

/// `2^exp` for exponents inside the normal f64 range.
#[inline]
fn ldexp_one(exp: i32) -> f64 {
    debug_assert!((-1022..=1023).contains(&exp));
    f64::from_bits(((exp + 1023) as u64) << 52)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_sentinel() {
        assert_eq!(float_to_rgbe([0.0, 0.0, 0.0]), Rgbe::BLACK);
        assert_eq!(float_to_rgbe([1e-33, 5e-33, 0.0]), Rgbe::BLACK);
        assert_eq!(float_to_rgbe([f32::NAN; 3]), Rgbe::BLACK);

        for quad in [[0, 0, 0, 0], [255, 17, 3, 0], [128, 128, 128, 0]] {
            assert_eq!(rgbe_to_float(Rgbe::from(quad)), [0.0; 3]);
        }
    }

    #[test]
    fn test_unit_pixel() {
        let rgbe = float_to_rgbe([1.0, 1.0, 1.0]);
        assert_eq!(rgbe, Rgbe::new(128, 128, 128, 129));
        assert_eq!(rgbe_to_float(rgbe), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_shared_exponent() {
        let rgbe = float_to_rgbe([0.5, 0.25, 0.0]);
        assert_eq!(rgbe, Rgbe::new(128, 64, 0, 128));
        assert_eq!(rgbe_to_float(rgbe), [0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_truncates_mantissa() {
        // 0.3 * 256 / 0.5 * 0.5 = 153.6
        let rgbe = float_to_rgbe([0.3, 0.0, 0.0]);
        assert_eq!(rgbe.e, 127);
        assert_eq!(rgbe.r, 153);
    }

    #[test]
    fn test_smallest_exponent_decodes() {
        let [r, g, b] = rgbe_to_float(Rgbe::new(1, 2, 0, 1));
        assert_eq!(r, 2f64.powi(-135) as f32);
        assert_eq!(g, 2f64.powi(-134) as f32);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_roundtrip_precision() {
        for &v in &[1e-20f32, 0.001, 0.7, 1.0, 3.5, 1234.5, 1e10, 1e29] {
            let pixel = [v, v * 0.5, v * 0.01];
            let back = rgbe_to_float(float_to_rgbe(pixel));
            for (orig, got) in pixel.iter().zip(back.iter()) {
                assert!(*got <= *orig, "{got} > {orig}");
                assert!(orig - got <= v / 128.0, "{orig} vs {got}");
            }
        }
    }

    #[test]
    fn test_saturates_negative_and_nan_channels() {
        let rgbe = float_to_rgbe([-1.0, 2.0, f32::NAN]);
        assert_eq!(rgbe, Rgbe::new(0, 128, 0, 130));
    }

    #[test]
    fn test_saturates_infinite_channel() {
        let rgbe = float_to_rgbe([f32::INFINITY, 1.0, 0.0]);
        assert_eq!(rgbe, Rgbe::new(255, 0, 0, 255));
    }

    #[test]
    fn test_saturates_exponent_overflow() {
        // 2^127 needs frexp exponent 128, one more than the byte holds
        let rgbe = float_to_rgbe([2f32.powi(127), 0.0, 0.0]);
        assert_eq!(rgbe, Rgbe::new(255, 0, 0, 255));

        let rgbe = float_to_rgbe([f32::MAX, f32::MAX, 2f32.powi(126)]);
        assert_eq!(rgbe, Rgbe::new(255, 255, 128, 255));
    }

    #[test]
    fn test_largest_exact_exponent() {
        // just below 2^127 still fits exponent byte 255
        let v = 2f32.powi(126);
        let rgbe = float_to_rgbe([v, 0.0, 0.0]);
        assert_eq!(rgbe, Rgbe::new(128, 0, 0, 255));
        assert_eq!(rgbe_to_float(rgbe)[0], v);
    }

    #[test]
    fn test_frexp() {
        assert_eq!(frexp(1.0), (0.5, 1));
        assert_eq!(frexp(0.75), (0.75, 0));
        assert_eq!(frexp(-6.0), (-0.75, 3));
        assert_eq!(frexp(0.0), (0.0, 0));
        assert_eq!(frexp(f64::MIN_POSITIVE / 4.0), (0.5, -1023));
        let (m, e) = frexp(f64::INFINITY);
        assert!(m.is_infinite());
        assert_eq!(e, 0);
    }
}
