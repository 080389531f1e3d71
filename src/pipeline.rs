use crate::brdf::compute_brdf_lut;
use crate::config::{BakeConfig, BrdfConfig, DiffuseConfig, LutFormat, SpecularConfig};
use crate::cubemap::{strip_face_size, Cubemap};
use crate::prefilter::{prefilter_diffuse, prefilter_specular, MipLevel};
use crate::rgbe::Rgbe;
use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use image::{ImageFormat, ImageReader, RgbaImage};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeMode {
    Diffuse,
    Specular,
    BrdfLut,
}

impl BakeMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "diffuse" | "irradiance" => Ok(BakeMode::Diffuse),
            "specular" | "prefilter" => Ok(BakeMode::Specular),
            "lut" | "brdf" => Ok(BakeMode::BrdfLut),
            other => bail!("Unknown mode '{other}'. Supported modes: diffuse, specular, lut."),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BakeMode::Diffuse => "diffuse",
            BakeMode::Specular => "specular",
            BakeMode::BrdfLut => "lut",
        }
    }
}

#[derive(Serialize)]
struct SpecularManifest {
    source: String,
    samples: u32,
    levels: Vec<ManifestLevel>,
}

#[derive(Serialize)]
struct ManifestLevel {
    #[serde(flatten)]
    mip: MipLevel,
    path: String,
}

/// Runs one bake on a freshly built worker pool and returns every file written.
pub fn run(mode: BakeMode, input: &Path, output: &Path, config: &BakeConfig) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let pool = build_worker_pool(config.threads)?;
    log::info!(
        "baking {} from {} on {} worker(s)",
        mode.label(),
        input.display(),
        pool.current_num_threads()
    );
    let started = Instant::now();
    let written = pool.install(|| -> Result<Vec<PathBuf>> {
        let source = load_source_cubemap(input)?;
        match mode {
            BakeMode::Diffuse => Ok(vec![bake_diffuse(&source, output, &config.diffuse)?]),
            BakeMode::Specular => bake_specular(&source, input, output, &config.specular),
            BakeMode::BrdfLut => {
                log::debug!("BRDF LUT does not depend on the source environment");
                Ok(vec![bake_brdf_lut(output, &config.brdf)?])
            }
        }
    })?;
    log::info!("{} bake finished in {:.2?}", mode.label(), started.elapsed());
    Ok(written)
}

pub fn build_worker_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    let threads = threads.unwrap_or_else(|| std::thread::available_parallelism().map(usize::from).unwrap_or(1));
    rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("ibl-bake-{i}"))
        .num_threads(threads)
        .build()
        .context("Failed to start bake worker pool")
}

/// Loads a six-face strip. Radiance HDR content is read as linear float, anything else as RGBA8
/// RGBE texels. The format is sniffed from the file, not taken from its extension.
pub fn load_source_cubemap(path: &Path) -> Result<Cubemap> {
    let reader = ImageReader::open(path)
        .with_context(|| format!("Failed to open source cubemap {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read source cubemap {}", path.display()))?;
    let format = reader.format();
    let image = reader.decode().with_context(|| format!("Failed to decode source cubemap {}", path.display()))?;
    let cubemap = if format == Some(ImageFormat::Hdr) {
        let rgb = image.to_rgb32f();
        let size = strip_face_size(rgb.width(), rgb.height())?;
        let texels = rgb.pixels().map(|p| Vec3::from_array(p.0)).collect();
        Cubemap::from_texels(size, texels)?
    } else {
        let rgba = image.to_rgba8();
        let texels: &[Rgbe] = bytemuck::cast_slice(rgba.as_raw());
        Cubemap::from_rgbe_strip(rgba.width(), rgba.height(), texels)?
    };
    log::info!("loaded {} ({}px faces)", path.display(), cubemap.size());
    Ok(cubemap)
}

pub fn bake_diffuse(source: &Cubemap, output: &Path, config: &DiffuseConfig) -> Result<PathBuf> {
    ensure_png_output(output)?;
    log::info!("diffuse: {}px faces, {} samples per texel", config.size, config.samples);
    let irradiance = prefilter_diffuse(source, config.size, config.samples);
    save_cubemap(&irradiance, output)?;
    Ok(output.to_path_buf())
}

pub fn bake_specular(
    source: &Cubemap,
    input: &Path,
    output: &Path,
    config: &SpecularConfig,
) -> Result<Vec<PathBuf>> {
    ensure_png_output(output)?;
    let base_size = config.resolved_base_size(source.size());
    config.validate_base_size(base_size)?;
    log::info!(
        "specular: {} mip level(s) from {}px, {} samples per texel, degenerate texels -> {}",
        config.mip_levels,
        base_size,
        config.samples,
        config.degenerate_policy.label()
    );
    let levels = prefilter_specular(source, base_size, config.mip_levels, config.samples, config.degenerate_policy)?;

    let mut written = Vec::with_capacity(levels.len() + 1);
    let mut manifest_levels = Vec::with_capacity(levels.len());
    for level in &levels {
        let path = mip_output_path(output, level.mip.level)?;
        save_cubemap(&level.cubemap, &path)?;
        manifest_levels.push(ManifestLevel { mip: level.mip, path: file_name(&path)? });
        written.push(path);
    }
    if config.write_manifest {
        let manifest = SpecularManifest {
            source: input.display().to_string(),
            samples: config.samples,
            levels: manifest_levels,
        };
        let path = manifest_path(output)?;
        let json = serde_json::to_vec_pretty(&manifest)?;
        fs::write(&path, json).with_context(|| format!("Failed to write manifest {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

pub fn bake_brdf_lut(output: &Path, config: &BrdfConfig) -> Result<PathBuf> {
    if config.format == LutFormat::Png {
        ensure_png_output(output)?;
    } else {
        file_name(output)?;
    }
    log::info!(
        "brdf lut: {res}x{res}, {} samples per cell, {}",
        config.samples,
        config.format.label(),
        res = config.resolution
    );
    let lut = compute_brdf_lut(config.resolution, config.samples);
    match config.format {
        LutFormat::Png => lut
            .to_rgba8()
            .save_with_format(output, ImageFormat::Png)
            .with_context(|| format!("Failed to write BRDF LUT {}", output.display()))?,
        LutFormat::Raw => fs::write(output, lut.to_le_f32_bytes())
            .with_context(|| format!("Failed to write BRDF LUT {}", output.display()))?,
        LutFormat::Raw16 => fs::write(output, lut.to_le_f16_bytes())
            .with_context(|| format!("Failed to write BRDF LUT {}", output.display()))?,
    }
    Ok(output.to_path_buf())
}

/// Writes `cubemap` as an RGBA8 PNG strip of RGBE texels.
pub fn save_cubemap(cubemap: &Cubemap, path: &Path) -> Result<()> {
    if !cubemap.is_finite() {
        bail!("refusing to write non-finite radiance to {}", path.display());
    }
    let (width, height) = cubemap.strip_dimensions()?;
    let texels = cubemap.to_rgbe();
    let bytes = bytemuck::cast_slice::<Rgbe, u8>(&texels).to_vec();
    let image = RgbaImage::from_raw(width, height, bytes)
        .ok_or_else(|| anyhow!("RGBE buffer does not match {width}x{height}"))?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to write cubemap {}", path.display()))?;
    Ok(())
}

/// `dir/name.png` -> `dir/name_mip{level}.png`.
pub fn mip_output_path(output: &Path, level: u32) -> Result<PathBuf> {
    sibling_path(output, &format!("_mip{level}"), "png")
}

/// `dir/name.png` -> `dir/name_manifest.json`.
pub fn manifest_path(output: &Path) -> Result<PathBuf> {
    sibling_path(output, "_manifest", "json")
}

fn sibling_path(output: &Path, suffix: &str, extension: &str) -> Result<PathBuf> {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Output path '{}' has no usable file name", output.display()))?;
    Ok(output.with_file_name(format!("{stem}{suffix}.{extension}")))
}

fn ensure_png_output(output: &Path) -> Result<()> {
    file_name(output)?;
    match ImageFormat::from_path(output) {
        Ok(ImageFormat::Png) => Ok(()),
        _ => bail!("Unsupported output '{}': cubemaps and PNG LUTs are written as .png", output.display()),
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Output path '{}' has no usable file name", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!(BakeMode::parse("Diffuse").expect("diffuse"), BakeMode::Diffuse);
        assert_eq!(BakeMode::parse("specular").expect("specular"), BakeMode::Specular);
        assert_eq!(BakeMode::parse("LUT").expect("lut"), BakeMode::BrdfLut);
        let err = BakeMode::parse("ambient").unwrap_err();
        assert!(err.to_string().contains("Unknown mode"), "unexpected error: {err}");
    }

    #[test]
    fn mip_paths_embed_the_level() {
        let path = mip_output_path(Path::new("out/env_specular.png"), 3).expect("mip path");
        assert_eq!(path, PathBuf::from("out/env_specular_mip3.png"));
        let manifest = manifest_path(Path::new("out/env_specular.png")).expect("manifest path");
        assert_eq!(manifest, PathBuf::from("out/env_specular_manifest.json"));
    }

    #[test]
    fn non_png_outputs_are_rejected() {
        assert!(ensure_png_output(Path::new("irradiance.png")).is_ok());
        assert!(ensure_png_output(Path::new("irradiance.PNG")).is_ok());
        assert!(ensure_png_output(Path::new("irradiance.exr")).is_err());
        assert!(ensure_png_output(Path::new("..")).is_err());
    }

    #[test]
    fn worker_pool_honours_thread_count() {
        let pool = build_worker_pool(Some(3)).expect("pool");
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn png_content_is_read_as_rgbe_whatever_the_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("mislabelled.hdr");
        let white = Rgbe::encode(Vec3::ONE);
        RgbaImage::from_pixel(2, 12, image::Rgba(white.0))
            .save_with_format(&path, ImageFormat::Png)
            .expect("save strip");

        let source = load_source_cubemap(&path).expect("load strip");
        assert_eq!(source.size(), 2);
        assert!(source.texels().iter().all(|t| *t == white.decode()), "{:?}", source.texels()[0]);
    }

    #[test]
    fn non_finite_cubemaps_are_not_written() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cubemap = Cubemap::uniform(1, Vec3::new(f32::NAN, 0.0, 0.0));
        let err = save_cubemap(&cubemap, &dir.path().join("bad.png")).unwrap_err();
        assert!(err.to_string().contains("non-finite"), "unexpected error: {err}");
    }
}
