//! Split-sum BRDF lookup table.
//!
//! Entry `(n_dot_v, roughness)` holds the scale `A` and bias `B` applied to F0 at shading
//! time: `specular = prefiltered * (F0 * A + B)`. Rows are roughness, columns are NdotV, both
//! sampled at cell centres.

use crate::sampling::{hammersley, importance_sample_ggx, reflect, TangentFrame};
use glam::{Vec2, Vec3};
use half::f16;
use image::RgbaImage;
use rayon::prelude::*;

/// Largest LUT side accepted from configs.
pub const MAX_LUT_RESOLUTION: u32 = 8192;

#[derive(Debug, Clone, PartialEq)]
pub struct BrdfLut {
    resolution: u32,
    data: Vec<Vec2>,
}

impl BrdfLut {
    /// Entries in row-major order, roughness outer and NdotV inner.
    pub fn data(&self) -> &[Vec2] {
        &self.data
    }

    pub fn get(&self, n_dot_v_index: u32, roughness_index: u32) -> Vec2 {
        self.data[(roughness_index * self.resolution + n_dot_v_index) as usize]
    }

    /// A and B scaled by 255 into red and green; blue 0, alpha opaque.
    pub fn to_rgba8(&self) -> RgbaImage {
        let to_byte = |v: f32| (v * 255.0).clamp(0.0, 255.0) as u8;
        RgbaImage::from_fn(self.resolution, self.resolution, |x, y| {
            let entry = self.get(x, y);
            image::Rgba([to_byte(entry.x), to_byte(entry.y), 0, 255])
        })
    }

    /// `2 * resolution^2` little-endian f32 values.
    pub fn to_le_f32_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 8);
        for entry in &self.data {
            bytes.extend_from_slice(&entry.x.to_le_bytes());
            bytes.extend_from_slice(&entry.y.to_le_bytes());
        }
        bytes
    }

    /// Same layout as [`Self::to_le_f32_bytes`] with half floats.
    pub fn to_le_f16_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for entry in &self.data {
            bytes.extend_from_slice(&f16::from_f32(entry.x).to_le_bytes());
            bytes.extend_from_slice(&f16::from_f32(entry.y).to_le_bytes());
        }
        bytes
    }
}

pub fn compute_brdf_lut(resolution: u32, samples: u32) -> BrdfLut {
    let size = resolution as usize;
    let mut data = vec![Vec2::ZERO; size * size];
    if size > 0 {
        data.par_chunks_mut(size).enumerate().for_each(|(y, row)| {
            let roughness = (y as f32 + 0.5) / resolution as f32;
            for (x, entry) in row.iter_mut().enumerate() {
                let n_dot_v = (x as f32 + 0.5) / resolution as f32;
                *entry = integrate_brdf(n_dot_v, roughness, samples);
            }
        });
    }
    BrdfLut { resolution, data }
}

/// Returns `(A, B)` for one LUT cell as a plain mean over `samples`.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> Vec2 {
    if samples == 0 {
        return Vec2::ZERO;
    }
    let normal = Vec3::Z;
    let frame = TangentFrame::new(normal);
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let mut a = 0.0f32;
    let mut b = 0.0f32;
    for i in 0..samples {
        let h = frame.to_world(importance_sample_ggx(hammersley(i, samples), roughness));
        let l = reflect(v, h);
        let n_dot_l = l.z;
        if n_dot_l > 0.0 {
            // NdotL > 0 implies VdotH > 0; GGX keeps NdotH > 0 for every u2 < 1.
            let n_dot_h = h.z;
            let v_dot_h = v.dot(h);
            let g = geometry_smith(n_dot_v, n_dot_l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    let scale = 1.0 / samples as f32;
    Vec2::new(a * scale, b * scale)
}

fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    // IBL remapping: k = alpha^2 / 2 on perceptual roughness.
    let k = roughness * roughness * 0.5;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

fn geometry_schlick_ggx(n_dot: f32, k: f32) -> f32 {
    n_dot / (n_dot * (1.0 - k) + k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_head_on_is_pure_scale() {
        let entry = integrate_brdf(0.999, 0.001, 256);
        assert!(entry.x > 0.98, "scale at grazing-free smooth cell: {entry:?}");
        assert!(entry.y < 0.01, "bias at grazing-free smooth cell: {entry:?}");
    }

    #[test]
    fn smooth_cells_conserve_energy() {
        for n_dot_v in [0.1, 0.4, 0.9] {
            let entry = integrate_brdf(n_dot_v, 0.01, 128);
            assert!((entry.x + entry.y - 1.0).abs() < 0.02, "n_dot_v {n_dot_v}: {entry:?}");
        }
    }

    #[test]
    fn rough_cells_lose_energy() {
        let smooth = integrate_brdf(0.5, 0.05, 512);
        let rough = integrate_brdf(0.5, 0.95, 512);
        assert!(rough.x + rough.y < smooth.x + smooth.y);
    }

    #[test]
    fn grazing_rough_cell_keeps_full_visibility_term() {
        // First column, last row of a 512 LUT: NdotV and NdotH are both tiny here.
        let entry = integrate_brdf(0.5 / 512.0, 511.5 / 512.0, 1024);
        assert!((entry.x - 0.593_932_9).abs() < 1e-3, "grazing scale {entry:?}");
        assert!(entry.is_finite());
        let png_byte = (entry.x * 255.0) as u8;
        assert_eq!(png_byte, 151);
    }

    #[test]
    fn lut_layout_is_roughness_major() {
        let lut = compute_brdf_lut(4, 64);
        assert_eq!(lut.data().len(), 16);
        let expected = integrate_brdf(0.375, 0.125, 64);
        assert_eq!(lut.get(1, 0), expected);
        assert_eq!(lut.data()[1], expected);
        let expected = integrate_brdf(0.125, 0.375, 64);
        assert_eq!(lut.data()[4], expected);
    }

    #[test]
    fn packed_outputs_match_layout() {
        let lut = compute_brdf_lut(2, 32);
        let raw = lut.to_le_f32_bytes();
        assert_eq!(raw.len(), 2 * 2 * 2 * 4);
        let first = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        assert_eq!(first, lut.data()[0].x);
        assert_eq!(lut.to_le_f16_bytes().len(), 2 * 2 * 2 * 2);

        let png = lut.to_rgba8();
        assert_eq!(png.dimensions(), (2, 2));
        let pixel = png.get_pixel(1, 0);
        assert_eq!(pixel.0[0], (lut.get(1, 0).x * 255.0) as u8);
        assert_eq!(pixel.0[2], 0);
        assert_eq!(pixel.0[3], 255);
    }
}
