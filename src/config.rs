use crate::brdf::MAX_LUT_RESOLUTION;
use crate::cubemap::check_face_size;
use crate::pipeline::BakeMode;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// What the specular integrator writes for a texel whose samples all fell below the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    #[default]
    Black,
    Error,
}

impl DegeneratePolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "black" => Ok(DegeneratePolicy::Black),
            "error" => Ok(DegeneratePolicy::Error),
            other => bail!("Invalid degenerate policy '{other}'. Use black or error."),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DegeneratePolicy::Black => "black",
            DegeneratePolicy::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LutFormat {
    /// 8-bit RGBA, A and B scaled by 255 into R and G.
    #[default]
    Png,
    /// Little-endian f32 pairs.
    Raw,
    /// Little-endian f16 pairs.
    Raw16,
}

impl LutFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Ok(LutFormat::Png),
            "raw" | "f32" => Ok(LutFormat::Raw),
            "raw16" | "f16" => Ok(LutFormat::Raw16),
            other => bail!("Invalid LUT format '{other}'. Use png, raw or raw16."),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LutFormat::Png => "png",
            LutFormat::Raw => "raw f32",
            LutFormat::Raw16 => "raw f16",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiffuseConfig {
    #[serde(default = "DiffuseConfig::default_size")]
    pub size: u32,
    #[serde(default = "DiffuseConfig::default_samples")]
    pub samples: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecularConfig {
    /// Side of mip 0. `None` uses the source face size.
    #[serde(default)]
    pub base_size: Option<u32>,
    #[serde(default = "SpecularConfig::default_mip_levels")]
    pub mip_levels: u32,
    #[serde(default = "SpecularConfig::default_samples")]
    pub samples: u32,
    #[serde(default)]
    pub degenerate_policy: DegeneratePolicy,
    #[serde(default = "SpecularConfig::default_write_manifest")]
    pub write_manifest: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrdfConfig {
    #[serde(default = "BrdfConfig::default_resolution")]
    pub resolution: u32,
    #[serde(default = "BrdfConfig::default_samples")]
    pub samples: u32,
    #[serde(default)]
    pub format: LutFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BakeConfig {
    /// Worker threads; `None` uses the available parallelism.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub diffuse: DiffuseConfig,
    #[serde(default)]
    pub specular: SpecularConfig,
    #[serde(default)]
    pub brdf: BrdfConfig,
}

/// Command-line values layered over a [`BakeConfig`]. `samples` and `size` target the selected mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakeOverrides {
    pub threads: Option<usize>,
    pub samples: Option<u32>,
    pub size: Option<u32>,
    pub mip_levels: Option<u32>,
    pub lut_format: Option<LutFormat>,
    pub degenerate_policy: Option<DegeneratePolicy>,
}

impl DiffuseConfig {
    const fn default_size() -> u32 {
        32
    }

    const fn default_samples() -> u32 {
        131_072
    }
}

impl Default for DiffuseConfig {
    fn default() -> Self {
        Self { size: Self::default_size(), samples: Self::default_samples() }
    }
}

impl SpecularConfig {
    const fn default_mip_levels() -> u32 {
        5
    }

    const fn default_samples() -> u32 {
        1024
    }

    const fn default_write_manifest() -> bool {
        true
    }

    /// Mip 0 side for a source whose faces are `source_size` wide.
    pub fn resolved_base_size(&self, source_size: u32) -> u32 {
        self.base_size.unwrap_or(source_size)
    }

    pub fn validate_base_size(&self, base_size: u32) -> Result<()> {
        check_face_size(base_size).context("Invalid specular base size")?;
        let last = self.mip_levels.saturating_sub(1);
        if last >= u32::BITS || base_size >> last == 0 {
            bail!(
                "specular chain of {} levels does not fit base size {base_size}; the last level would be empty",
                self.mip_levels
            );
        }
        Ok(())
    }
}

impl Default for SpecularConfig {
    fn default() -> Self {
        Self {
            base_size: None,
            mip_levels: Self::default_mip_levels(),
            samples: Self::default_samples(),
            degenerate_policy: DegeneratePolicy::default(),
            write_manifest: Self::default_write_manifest(),
        }
    }
}

impl BrdfConfig {
    const fn default_resolution() -> u32 {
        512
    }

    const fn default_samples() -> u32 {
        1024
    }
}

impl Default for BrdfConfig {
    fn default() -> Self {
        Self {
            resolution: Self::default_resolution(),
            samples: Self::default_samples(),
            format: LutFormat::default(),
        }
    }
}

impl BakeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read bake config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse bake config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, mode: BakeMode, overrides: &BakeOverrides) {
        if let Some(threads) = overrides.threads {
            self.threads = Some(threads);
        }
        if let Some(samples) = overrides.samples {
            match mode {
                BakeMode::Diffuse => self.diffuse.samples = samples,
                BakeMode::Specular => self.specular.samples = samples,
                BakeMode::BrdfLut => self.brdf.samples = samples,
            }
        }
        if let Some(size) = overrides.size {
            match mode {
                BakeMode::Diffuse => self.diffuse.size = size,
                BakeMode::Specular => self.specular.base_size = Some(size),
                BakeMode::BrdfLut => self.brdf.resolution = size,
            }
        }
        if let Some(levels) = overrides.mip_levels {
            self.specular.mip_levels = levels;
        }
        if let Some(format) = overrides.lut_format {
            self.brdf.format = format;
        }
        if let Some(policy) = overrides.degenerate_policy {
            self.specular.degenerate_policy = policy;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            bail!("threads must be at least 1");
        }
        if self.diffuse.samples == 0 {
            bail!("diffuse samples must be non-zero");
        }
        check_face_size(self.diffuse.size).context("Invalid diffuse size")?;
        if self.specular.mip_levels == 0 || self.specular.samples == 0 {
            bail!("specular mip_levels and samples must be non-zero");
        }
        if let Some(base_size) = self.specular.base_size {
            self.specular.validate_base_size(base_size)?;
        }
        if self.brdf.resolution == 0 || self.brdf.samples == 0 {
            bail!("brdf resolution and samples must be non-zero");
        }
        if self.brdf.resolution > MAX_LUT_RESOLUTION {
            bail!("brdf resolution {} exceeds the maximum of {MAX_LUT_RESOLUTION}", self.brdf.resolution);
        }
        Ok(())
    }
}

impl BakeOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: BakeConfig = serde_json::from_str(r#"{ "specular": { "samples": 64 } }"#).expect("parse");
        assert_eq!(cfg.specular.samples, 64);
        assert_eq!(cfg.specular.mip_levels, 5);
        assert_eq!(cfg.specular.base_size, None);
        assert!(cfg.specular.write_manifest);
        assert_eq!(cfg.diffuse.size, 32);
        assert_eq!(cfg.diffuse.samples, 131_072);
        assert_eq!(cfg.brdf.resolution, 512);
        assert_eq!(cfg.brdf.format, LutFormat::Png);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn enums_use_snake_case() {
        let cfg: BakeConfig = serde_json::from_str(
            r#"{ "specular": { "degenerate_policy": "error" }, "brdf": { "format": "raw16" } }"#,
        )
        .expect("parse");
        assert_eq!(cfg.specular.degenerate_policy, DegeneratePolicy::Error);
        assert_eq!(cfg.brdf.format, LutFormat::Raw16);
    }

    #[test]
    fn load_reports_the_path() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"{ not json").expect("write");
        let err = BakeConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:?}").contains("Failed to parse bake config"), "unexpected error: {err:?}");
    }

    #[test]
    fn overrides_target_the_selected_mode() {
        let overrides = BakeOverrides { samples: Some(256), size: Some(8), ..Default::default() };
        let mut cfg = BakeConfig::default();
        cfg.apply_overrides(BakeMode::Diffuse, &overrides);
        assert_eq!((cfg.diffuse.samples, cfg.diffuse.size), (256, 8));
        assert_eq!(cfg.specular.samples, 1024);

        let mut cfg = BakeConfig::default();
        cfg.apply_overrides(BakeMode::Specular, &overrides);
        assert_eq!(cfg.specular.base_size, Some(8));
        assert_eq!(cfg.diffuse.size, 32);

        let mut cfg = BakeConfig::default();
        cfg.apply_overrides(BakeMode::BrdfLut, &overrides);
        assert_eq!((cfg.brdf.samples, cfg.brdf.resolution), (256, 8));
    }

    #[test]
    fn validate_rejects_empty_work() {
        let mut cfg = BakeConfig::default();
        cfg.diffuse.samples = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = BakeConfig::default();
        cfg.threads = Some(0);
        assert!(cfg.validate().is_err());

        let mut cfg = BakeConfig::default();
        cfg.specular.base_size = Some(8);
        cfg.specular.mip_levels = 5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("does not fit"), "unexpected error: {err}");
        cfg.specular.mip_levels = 4;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_sizes_too_large_to_allocate() {
        let mut cfg = BakeConfig::default();
        cfg.apply_overrides(BakeMode::Diffuse, &BakeOverrides { size: Some(1_000_000), ..Default::default() });
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:?}").contains("exceeds the maximum"), "unexpected error: {err:?}");

        let mut cfg = BakeConfig::default();
        cfg.specular.base_size = Some(u32::MAX);
        assert!(cfg.validate().is_err());

        let mut cfg = BakeConfig::default();
        cfg.brdf.resolution = MAX_LUT_RESOLUTION + 1;
        assert!(cfg.validate().is_err());
        cfg.brdf.resolution = MAX_LUT_RESOLUTION;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn policy_and_format_parse() {
        assert_eq!(DegeneratePolicy::parse("Black").expect("black"), DegeneratePolicy::Black);
        assert!(DegeneratePolicy::parse("nan").is_err());
        assert_eq!(LutFormat::parse("f32").expect("raw"), LutFormat::Raw);
        assert!(LutFormat::parse("exr").is_err());
    }
}
