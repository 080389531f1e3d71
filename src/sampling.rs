use glam::{Vec2, Vec3};
use std::f32::consts::TAU;

/// 2^-32, maps a bit-reversed `u32` into `[0, 1)`.
const RADICAL_INVERSE_SCALE: f32 = 2.328_306_4e-10;

/// Point `i` of an `n`-point Hammersley set: `(i / n, radical_inverse_vdc(i))`.
#[inline]
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

/// Base-2 Van der Corput radical inverse.
#[inline]
pub fn radical_inverse_vdc(bits: u32) -> f32 {
    let mut b = bits;
    b = (b << 16) | (b >> 16);
    b = ((b & 0x5555_5555) << 1) | ((b & 0xAAAA_AAAA) >> 1);
    b = ((b & 0x3333_3333) << 2) | ((b & 0xCCCC_CCCC) >> 2);
    b = ((b & 0x0F0F_0F0F) << 4) | ((b & 0xF0F0_F0F0) >> 4);
    b = ((b & 0x00FF_00FF) << 8) | ((b & 0xFF00_FF00) >> 8);
    // Clamp below 1.0: rounding to f32 would otherwise map indices near u32::MAX onto 1.0.
    ((b as f64) * (RADICAL_INVERSE_SCALE as f64)).min(f32::from_bits(0x3F7F_FFFF) as f64) as f32
}

/// Orthonormal frame around a normal. Columns are `(tangent, bitangent, normal)`.
#[derive(Debug, Clone, Copy)]
pub struct TangentFrame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

impl TangentFrame {
    pub fn new(normal: Vec3) -> Self {
        let up = if normal.z.abs() < 0.99 { Vec3::Z } else { Vec3::X };
        let tangent = normal.cross(up).normalize();
        let bitangent = normal.cross(tangent);
        Self { tangent, bitangent, normal }
    }

    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }
}

/// Cosine-weighted hemisphere direction in tangent space (+Z up).
#[inline]
pub fn cosine_sample_hemisphere(xi: Vec2) -> Vec3 {
    // theta = acos(sqrt(1 - u2)), so sin(theta) = sqrt(u2).
    let cos_theta = (1.0 - xi.y).max(0.0).sqrt();
    let sin_theta = xi.y.max(0.0).sqrt();
    let phi = TAU * xi.x;
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

/// GGX half vector in tangent space. `roughness` is perceptual; alpha is its square.
#[inline]
pub fn importance_sample_ggx(xi: Vec2, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

/// Mirrors `v` about `h`: `2 (v.h) h - v`. Both point away from the surface.
#[inline]
pub fn reflect(v: Vec3, h: Vec3) -> Vec3 {
    2.0 * v.dot(h) * h - v
}
