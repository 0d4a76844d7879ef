use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Packed floating-point colour layouts a renderer hands over after readback.
///
/// All layouts are little-endian. Alpha, where present, is ignored: captured
/// frames are always encoded fully opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelPacking {
    /// Unsigned 11/11/10-bit mini-floats, red in the low bits.
    R11G11B10Float,
    /// Three 9-bit mantissas sharing one 5-bit exponent.
    R9G9B9E5SharedExp,
    /// IEEE half floats, RGBA order.
    R16G16B16A16Float,
    /// IEEE single floats, RGBA order.
    R32G32B32A32Float,
}

impl PixelPacking {
    pub const ALL: &[PixelPacking] = &[
        PixelPacking::R11G11B10Float,
        PixelPacking::R9G9B9E5SharedExp,
        PixelPacking::R16G16B16A16Float,
        PixelPacking::R32G32B32A32Float,
    ];

    pub fn bytes_per_texel(self) -> usize {
        match self {
            PixelPacking::R11G11B10Float | PixelPacking::R9G9B9E5SharedExp => 4,
            PixelPacking::R16G16B16A16Float => 8,
            PixelPacking::R32G32B32A32Float => 16,
        }
    }

    /// Decodes one texel (exactly [`bytes_per_texel`](Self::bytes_per_texel)
    /// bytes) into linear RGB.
    pub fn unpack(self, texel: &[u8]) -> [f32; 3] {
        match self {
            PixelPacking::R11G11B10Float => {
                let bits = le_u32(texel);
                [
                    decode_mini_float(bits & 0x7ff, 6),
                    decode_mini_float((bits >> 11) & 0x7ff, 6),
                    decode_mini_float((bits >> 22) & 0x3ff, 5),
                ]
            }
            PixelPacking::R9G9B9E5SharedExp => decode_rgb9e5(le_u32(texel)),
            PixelPacking::R16G16B16A16Float => [
                decode_half(le_u16(&texel[0..2])),
                decode_half(le_u16(&texel[2..4])),
                decode_half(le_u16(&texel[4..6])),
            ],
            PixelPacking::R32G32B32A32Float => [
                f32::from_bits(le_u32(&texel[0..4])),
                f32::from_bits(le_u32(&texel[4..8])),
                f32::from_bits(le_u32(&texel[8..12])),
            ],
        }
    }

    /// Encodes linear RGB into `out`, which must hold one texel.
    /// Values the layout cannot represent saturate (negatives become zero
    /// for the unsigned layouts).
    pub fn pack_into(self, rgb: [f32; 3], out: &mut [u8]) {
        let [r, g, b] = rgb;
        match self {
            PixelPacking::R11G11B10Float => {
                let bits = encode_mini_float(r, 6)
                    | (encode_mini_float(g, 6) << 11)
                    | (encode_mini_float(b, 5) << 22);
                out[0..4].copy_from_slice(&bits.to_le_bytes());
            }
            PixelPacking::R9G9B9E5SharedExp => {
                out[0..4].copy_from_slice(&encode_rgb9e5(rgb).to_le_bytes());
            }
            PixelPacking::R16G16B16A16Float => {
                for (i, value) in [r, g, b, 1.0].into_iter().enumerate() {
                    out[i * 2..i * 2 + 2].copy_from_slice(&encode_half(value).to_le_bytes());
                }
            }
            PixelPacking::R32G32B32A32Float => {
                for (i, value) in [r, g, b, 1.0].into_iter().enumerate() {
                    out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
}

impl fmt::Display for PixelPacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelPacking::R11G11B10Float => write!(f, "r11g11b10"),
            PixelPacking::R9G9B9E5SharedExp => write!(f, "r9g9b9e5"),
            PixelPacking::R16G16B16A16Float => write!(f, "rgba16f"),
            PixelPacking::R32G32B32A32Float => write!(f, "rgba32f"),
        }
    }
}

impl FromStr for PixelPacking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelPacking::ALL
            .iter()
            .copied()
            .find(|p| p.to_string() == s.to_lowercase())
            .ok_or_else(|| {
                format!("Unknown pixel packing '{s}', expected one of: r11g11b10, r9g9b9e5, rgba16f, rgba32f")
            })
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Unsigned float with a 5-bit exponent (bias 15) and `mantissa_bits` of
/// mantissa. Covers the 11- and 10-bit channels and the magnitude of a half.
fn decode_mini_float(bits: u32, mantissa_bits: u32) -> f32 {
    let scale = (1u32 << mantissa_bits) as f32;
    let mantissa = (bits & ((1 << mantissa_bits) - 1)) as f32 / scale;
    match (bits >> mantissa_bits) & 0x1f {
        0 => mantissa * 2f32.powi(-14),
        0x1f if mantissa == 0.0 => f32::INFINITY,
        0x1f => f32::NAN,
        exponent => 2f32.powi(exponent as i32 - 15) * (1.0 + mantissa),
    }
}

fn encode_mini_float(value: f32, mantissa_bits: u32) -> u32 {
    let max_mantissa = (1u32 << mantissa_bits) - 1;
    let infinity = 0x1f << mantissa_bits;
    let max_finite = (0x1e << mantissa_bits) | max_mantissa;

    if value.is_nan() {
        return infinity | 1;
    }
    if value <= 0.0 {
        return 0;
    }
    if value.is_infinite() {
        return infinity;
    }

    let bits = value.to_bits();
    let exponent = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    if exponent <= 0 {
        // Subnormal in the target; rounding up to 1 << mantissa_bits lands on
        // the smallest normal, which is the same bit pattern.
        let scaled = value / 2f32.powi(-14) * (1u32 << mantissa_bits) as f32;
        return scaled.round() as u32;
    }
    if exponent >= 0x1f {
        return max_finite;
    }

    let shift = 23 - mantissa_bits;
    let mut mantissa = ((bits & 0x7f_ffff) + (1 << (shift - 1))) >> shift;
    let mut exponent = exponent as u32;
    if mantissa > max_mantissa {
        mantissa = 0;
        exponent += 1;
    }
    if exponent >= 0x1f {
        return max_finite;
    }
    (exponent << mantissa_bits) | mantissa
}

fn decode_half(bits: u16) -> f32 {
    let magnitude = decode_mini_float(u32::from(bits & 0x7fff), 10);
    if bits & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn encode_half(value: f32) -> u16 {
    let sign = if value.is_sign_negative() && !value.is_nan() {
        0x8000
    } else {
        0
    };
    sign | encode_mini_float(value.abs(), 10) as u16
}

/// Largest value representable with a 9-bit mantissa and exponent 31.
const RGB9E5_MAX: f32 = 511.0 / 512.0 * 65536.0;

fn decode_rgb9e5(bits: u32) -> [f32; 3] {
    let exponent = (bits >> 27) as i32;
    let scale = 2f32.powi(exponent - 15 - 9);
    [
        (bits & 0x1ff) as f32 * scale,
        ((bits >> 9) & 0x1ff) as f32 * scale,
        ((bits >> 18) & 0x1ff) as f32 * scale,
    ]
}

fn encode_rgb9e5(rgb: [f32; 3]) -> u32 {
    let [r, g, b] = rgb.map(|c| if c.is_nan() { 0.0 } else { c.max(0.0).min(RGB9E5_MAX) });
    let max = r.max(g).max(b);
    if max == 0.0 {
        return 0;
    }

    let mut exponent = (max.log2().floor() as i32).max(-16) + 1 + 15;
    let mut denom = 2f32.powi(exponent - 15 - 9);
    if (max / denom + 0.5).floor() as u32 == 512 {
        exponent += 1;
        denom *= 2.0;
    }

    let mantissa = |c: f32| ((c / denom + 0.5).floor() as u32).min(0x1ff);
    ((exponent as u32) << 27) | (mantissa(b) << 18) | (mantissa(g) << 9) | mantissa(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn round_trip(packing: PixelPacking, rgb: [f32; 3]) -> [f32; 3] {
        let mut texel = vec![0u8; packing.bytes_per_texel()];
        packing.pack_into(rgb, &mut texel);
        packing.unpack(&texel)
    }

    #[rstest]
    #[case::r11g11b10(PixelPacking::R11G11B10Float)]
    #[case::r9g9b9e5(PixelPacking::R9G9B9E5SharedExp)]
    #[case::rgba16f(PixelPacking::R16G16B16A16Float)]
    #[case::rgba32f(PixelPacking::R32G32B32A32Float)]
    fn test_black_and_white_are_exact(#[case] packing: PixelPacking) {
        assert_eq!(round_trip(packing, [0.0; 3]), [0.0; 3]);
        assert_eq!(round_trip(packing, [1.0; 3]), [1.0; 3]);
    }

    #[rstest]
    #[case::r11g11b10(PixelPacking::R11G11B10Float, 0.02)]
    #[case::r9g9b9e5(PixelPacking::R9G9B9E5SharedExp, 0.01)]
    #[case::rgba16f(PixelPacking::R16G16B16A16Float, 0.001)]
    #[case::rgba32f(PixelPacking::R32G32B32A32Float, 0.0)]
    fn test_mid_tones_survive_packing(#[case] packing: PixelPacking, #[case] tolerance: f32) {
        let rgb = [0.25, 0.5, 0.75];
        let decoded = round_trip(packing, rgb);
        for (got, want) in decoded.iter().zip(rgb) {
            assert_relative_eq!(*got, want, epsilon = tolerance);
        }
    }

    #[test]
    fn test_r11g11b10_channel_layout() {
        // Red = 1.0 (exponent 15, mantissa 0) in the low 11 bits only.
        let bits: u32 = 15 << 6;
        let rgb = PixelPacking::R11G11B10Float.unpack(&bits.to_le_bytes());
        assert_eq!(rgb, [1.0, 0.0, 0.0]);

        // Blue = 2.0 (exponent 16, mantissa 0) in the top 10 bits.
        let bits: u32 = (16 << 5) << 22;
        let rgb = PixelPacking::R11G11B10Float.unpack(&bits.to_le_bytes());
        assert_eq!(rgb, [0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_r11g11b10_negative_saturates_to_zero() {
        assert_eq!(
            round_trip(PixelPacking::R11G11B10Float, [-3.0, 0.5, -0.1]),
            [0.0, 0.5, 0.0]
        );
    }

    #[test]
    fn test_r11g11b10_keeps_hdr_overshoot() {
        let decoded = round_trip(PixelPacking::R11G11B10Float, [4.0, 16.0, 1.5]);
        assert_eq!(decoded, [4.0, 16.0, 1.5]);
    }

    #[test]
    fn test_mini_float_infinity_and_nan() {
        assert!(decode_mini_float(0x1f << 6, 6).is_infinite());
        assert!(decode_mini_float((0x1f << 6) | 3, 6).is_nan());
        assert_eq!(encode_mini_float(f32::INFINITY, 6), 0x1f << 6);
    }

    #[test]
    fn test_mini_float_subnormal() {
        let smallest = 2f32.powi(-14) / 64.0;
        assert_eq!(encode_mini_float(smallest, 6), 1);
        assert_relative_eq!(decode_mini_float(1, 6), smallest);
    }

    #[test]
    fn test_half_sign() {
        let decoded = round_trip(PixelPacking::R16G16B16A16Float, [-0.5, -2.0, 0.125]);
        assert_eq!(decoded, [-0.5, -2.0, 0.125]);
    }

    #[test]
    fn test_rgb9e5_shared_exponent_for_bright_channel() {
        let decoded = round_trip(PixelPacking::R9G9B9E5SharedExp, [8.0, 1.0, 0.0]);
        assert_relative_eq!(decoded[0], 8.0);
        assert_relative_eq!(decoded[1], 1.0, epsilon = 0.02);
        assert_eq!(decoded[2], 0.0);
    }

    #[test]
    fn test_rgb9e5_clamps_to_representable_range() {
        let decoded = round_trip(PixelPacking::R9G9B9E5SharedExp, [1.0e9, -1.0, f32::NAN]);
        assert_relative_eq!(decoded[0], RGB9E5_MAX);
        assert_eq!(decoded[1], 0.0);
        assert_eq!(decoded[2], 0.0);
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(PixelPacking::R11G11B10Float.bytes_per_texel(), 4);
        assert_eq!(PixelPacking::R9G9B9E5SharedExp.bytes_per_texel(), 4);
        assert_eq!(PixelPacking::R16G16B16A16Float.bytes_per_texel(), 8);
        assert_eq!(PixelPacking::R32G32B32A32Float.bytes_per_texel(), 16);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for packing in PixelPacking::ALL {
            assert_eq!(packing.to_string().parse::<PixelPacking>(), Ok(*packing));
        }
        assert_eq!(
            "RGBA16F".parse::<PixelPacking>(),
            Ok(PixelPacking::R16G16B16A16Float)
        );
        assert!("bgra8".parse::<PixelPacking>().is_err());
    }
}
