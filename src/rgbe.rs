//! Shared-exponent HDR texels (Radiance RGBE).
//!
//! Three 8-bit mantissas share one exponent byte biased by 128. The all-zero
//! texel is exact black and decodes without touching the exponent.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

const EXPONENT_BIAS: i32 = 128;
const BLACK_THRESHOLD: f32 = 1e-32;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rgbe(pub [u8; 4]);

impl Rgbe {
    pub const BLACK: Rgbe = Rgbe([0, 0, 0, 0]);
    pub const SATURATED: Rgbe = Rgbe([255, 255, 255, 255]);

    pub fn encode(rgb: Vec3) -> Self {
        let d = rgb.max_element();
        if d.is_nan() || d <= BLACK_THRESHOLD {
            return Self::BLACK;
        }
        if d.is_infinite() {
            return Self::SATURATED;
        }
        let (mantissa, exponent) = frexp(d);
        if exponent > 127 {
            return Self::SATURATED;
        }
        let scale = 255.999 * (mantissa / d);
        let channel = |c: f32| (c * scale).clamp(0.0, 255.0) as u8;
        Rgbe([channel(rgb.x), channel(rgb.y), channel(rgb.z), (exponent + EXPONENT_BIAS) as u8])
    }

    /// Only the all-zero texel is special; a zero exponent byte with non-zero mantissas still
    /// decodes through `ldexp` to a tiny positive value.
    pub fn decode(self) -> Vec3 {
        if self == Self::BLACK {
            return Vec3::ZERO;
        }
        let [r, g, b, e] = self.0;
        let exponent = e as i32 - EXPONENT_BIAS;
        let channel = |c: u8| ldexp((c as f32 + 0.5) / 256.0, exponent);
        Vec3::new(channel(r), channel(g), channel(b))
    }
}

pub fn encode_slice(pixels: &[Vec3]) -> Vec<Rgbe> {
    pixels.iter().map(|&p| Rgbe::encode(p)).collect()
}

pub fn decode_slice(texels: &[Rgbe]) -> Vec<Vec3> {
    texels.iter().map(|&t| t.decode()).collect()
}

/// Splits a positive finite value into `mantissa * 2^exponent` with mantissa in `[0.5, 1)`.
fn frexp(value: f32) -> (f32, i32) {
    let bits = value.to_bits();
    let biased = ((bits >> 23) & 0xFF) as i32;
    if biased == 0 {
        // Subnormal: renormalise first.
        let (mantissa, exponent) = frexp(value * 2f32.powi(64));
        return (mantissa, exponent - 64);
    }
    let mantissa = f32::from_bits((bits & 0x807F_FFFF) | (126 << 23));
    (mantissa, biased - 126)
}

fn ldexp(value: f32, exponent: i32) -> f32 {
    (value as f64 * 2f64.powi(exponent)) as f32
}
