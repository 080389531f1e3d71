mod diffuse;
mod specular;

pub use diffuse::{irradiance, prefilter_diffuse};
pub use specular::{
    mip_levels, prefilter_specular, prefilter_specular_level, prefiltered_radiance, MipLevel, SpecularLevel,
};

use crate::cubemap::{CubeFace, Cubemap};
use glam::Vec3;
use rayon::prelude::*;

/// Runs `integrate` once per strip row of `target` on the current rayon pool.
///
/// Every call gets a disjoint `&mut` row so no synchronisation is needed; the returned
/// per-row counts are summed.
fn integrate_rows<F>(target: &mut Cubemap, integrate: F) -> usize
where
    F: Fn(CubeFace, u32, &mut [Vec3]) -> usize + Sync,
{
    let size = target.size() as usize;
    if size == 0 {
        return 0;
    }
    target
        .texels_mut()
        .par_chunks_mut(size)
        .enumerate()
        .map(|(strip_row, texels)| {
            let face = CubeFace::ALL[strip_row / size];
            let row = (strip_row % size) as u32;
            integrate(face, row, texels)
        })
        .sum()
}
