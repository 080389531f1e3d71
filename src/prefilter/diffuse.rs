use super::integrate_rows;
use crate::cubemap::{texel_direction, Cubemap};
use crate::sampling::{cosine_sample_hemisphere, hammersley, TangentFrame};
use glam::Vec3;

/// Lambertian convolution of `source` into a `size`-sided irradiance cubemap.
pub fn prefilter_diffuse(source: &Cubemap, size: u32, samples: u32) -> Cubemap {
    let mut target = Cubemap::new(size);
    integrate_rows(&mut target, |face, row, texels| {
        for (x, texel) in texels.iter_mut().enumerate() {
            let normal = texel_direction(face, x as u32, row, size);
            *texel = irradiance(source, normal, samples);
        }
        0
    });
    target
}

/// Cosine-weighted mean of `source` over the hemisphere around `normal`.
///
/// The cosine-weighted pdf cancels the cosine term, so this is a plain average.
pub fn irradiance(source: &Cubemap, normal: Vec3, samples: u32) -> Vec3 {
    if samples == 0 {
        return Vec3::ZERO;
    }
    let frame = TangentFrame::new(normal);
    let mut sum = Vec3::ZERO;
    for i in 0..samples {
        let local = cosine_sample_hemisphere(hammersley(i, samples));
        sum += source.lookup(frame.to_world(local));
    }
    sum / samples as f32
}
