use super::integrate_rows;
use crate::config::DegeneratePolicy;
use crate::cubemap::{texel_direction, Cubemap};
use crate::sampling::{hammersley, importance_sample_ggx, reflect, TangentFrame};
use anyhow::{bail, Result};
use glam::Vec3;
use serde::Serialize;

/// One level of the roughness mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MipLevel {
    pub level: u32,
    pub size: u32,
    pub roughness: f32,
}

pub struct SpecularLevel {
    pub mip: MipLevel,
    pub cubemap: Cubemap,
    /// Texels where every sample fell below the horizon.
    pub degenerate_texels: usize,
}

/// Descriptors for `count` levels starting at `base_size`, roughness 0 at level 0 and 1 at the last.
pub fn mip_levels(base_size: u32, count: u32) -> Vec<MipLevel> {
    let last = count.saturating_sub(1).max(1) as f32;
    (0..count)
        .map(|level| MipLevel { level, size: (base_size >> level).max(1), roughness: level as f32 / last })
        .collect()
}

/// Prefilters every level and applies `policy` to texels whose total weight is zero.
pub fn prefilter_specular(
    source: &Cubemap,
    base_size: u32,
    level_count: u32,
    samples: u32,
    policy: DegeneratePolicy,
) -> Result<Vec<SpecularLevel>> {
    let mut levels = Vec::with_capacity(level_count as usize);
    for mip in mip_levels(base_size, level_count) {
        let level = prefilter_specular_level(source, mip, samples);
        log::debug!(
            "specular mip {} ({}x{}, roughness {:.3}) done",
            mip.level,
            mip.size,
            mip.size,
            mip.roughness
        );
        if level.degenerate_texels > 0 {
            match policy {
                DegeneratePolicy::Black => log::warn!(
                    "specular mip {}: {} texel(s) had no samples above the horizon; written as black",
                    mip.level,
                    level.degenerate_texels
                ),
                DegeneratePolicy::Error => bail!(
                    "specular mip {} (roughness {:.3}): {} texel(s) had zero total sample weight",
                    mip.level,
                    mip.roughness,
                    level.degenerate_texels
                ),
            }
        }
        levels.push(level);
    }
    Ok(levels)
}

pub fn prefilter_specular_level(source: &Cubemap, mip: MipLevel, samples: u32) -> SpecularLevel {
    let mut cubemap = Cubemap::new(mip.size);
    let degenerate_texels = integrate_rows(&mut cubemap, |face, row, texels| {
        let mut degenerate = 0;
        for (x, texel) in texels.iter_mut().enumerate() {
            let normal = texel_direction(face, x as u32, row, mip.size);
            *texel = match prefiltered_radiance(source, normal, mip.roughness, samples) {
                Some(radiance) => radiance,
                None => {
                    degenerate += 1;
                    Vec3::ZERO
                }
            };
        }
        degenerate
    });
    SpecularLevel { mip, cubemap, degenerate_texels }
}

/// NdotL-weighted GGX estimate around `normal` with `N = V = R`.
///
/// Returns `None` when no sample lands above the horizon.
pub fn prefiltered_radiance(source: &Cubemap, normal: Vec3, roughness: f32, samples: u32) -> Option<Vec3> {
    let frame = TangentFrame::new(normal);
    let view = normal;
    let mut color = Vec3::ZERO;
    let mut total_weight = 0.0f32;
    for i in 0..samples {
        let half = frame.to_world(importance_sample_ggx(hammersley(i, samples), roughness));
        let light = reflect(view, half);
        let n_dot_l = normal.dot(light);
        if n_dot_l > 0.0 {
            color += source.lookup(light) * n_dot_l;
            total_weight += n_dot_l;
        }
    }
    if total_weight > 0.0 && total_weight.is_finite() {
        Some(color / total_weight)
    } else {
        None
    }
}
