use crate::config::{BakeConfig, BakeOverrides, DegeneratePolicy, LutFormat};
use crate::pipeline::BakeMode;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage:
  kestrel_ibl <diffuse|specular|lut> <input> <output> [flags]
  kestrel_ibl help

Flags:
  --config <file.json>          Bake configuration (defaults apply to missing fields)
  --samples <n>                 Samples per texel for the selected mode
  --size <n>                    Output face size (specular: mip 0 size, lut: resolution)
  --mip-levels <n>              Specular mip chain length
  --lut-format <png|raw|raw16>  BRDF LUT encoding
  --policy <black|error>        Specular texels with zero sample weight
  --threads <n>                 Worker threads
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeCommand {
    pub mode: BakeMode,
    pub input: PathBuf,
    pub output: PathBuf,
    pub config_path: Option<PathBuf>,
    pub overrides: BakeOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Bake(BakeCommand),
    Help,
}

impl CliCommand {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        let Some(mode) = iter.next() else {
            return Ok(CliCommand::Help);
        };
        let mode = mode.as_ref();
        if matches!(mode, "help" | "--help" | "-h") {
            return Ok(CliCommand::Help);
        }
        let mode = BakeMode::parse(mode)?;

        let mut positional = Vec::with_capacity(2);
        let mut config_path = None;
        let mut overrides = BakeOverrides::default();
        while let Some(raw) = iter.next() {
            let arg = raw.as_ref();
            let Some(key) = arg.strip_prefix("--") else {
                positional.push(PathBuf::from(arg));
                continue;
            };
            let value = iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "config" => config_path = Some(PathBuf::from(value)),
                "samples" => overrides.samples = Some(parse_count("samples", &value)?),
                "size" => overrides.size = Some(parse_count("size", &value)?),
                "mip-levels" => overrides.mip_levels = Some(parse_count("mip-levels", &value)?),
                "threads" => overrides.threads = Some(parse_count("threads", &value)? as usize),
                "lut-format" => overrides.lut_format = Some(LutFormat::parse(&value)?),
                "policy" => overrides.degenerate_policy = Some(DegeneratePolicy::parse(&value)?),
                _ => bail!(
                    "Unknown flag '{arg}'. Supported flags: --config, --samples, --size, --mip-levels, \
                     --lut-format, --policy, --threads."
                ),
            }
        }

        let mut positional = positional.into_iter();
        let input = positional.next().ok_or_else(|| anyhow!("{} requires an input path", mode.label()))?;
        let output = positional.next().ok_or_else(|| anyhow!("{} requires an output path", mode.label()))?;
        if let Some(extra) = positional.next() {
            bail!("Unexpected argument '{}'", extra.display());
        }
        Ok(CliCommand::Bake(BakeCommand { mode, input, output, config_path, overrides }))
    }
}

impl BakeCommand {
    /// Loads `--config` (or defaults) and layers the command-line overrides on top.
    pub fn resolve_config(&self) -> Result<BakeConfig> {
        let mut config = match &self.config_path {
            Some(path) => BakeConfig::load(path)?,
            None => BakeConfig::default(),
        };
        config.apply_overrides(self.mode, &self.overrides);
        Ok(config)
    }
}

fn parse_count(flag: &str, value: &str) -> Result<u32> {
    let parsed = value.parse::<u32>().with_context(|| format!("Invalid {flag} '{value}'"))?;
    if parsed == 0 {
        bail!("--{flag} must be at least 1");
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bake(args: &[&str]) -> BakeCommand {
        match CliCommand::parse(args.iter().copied()).expect("parse command") {
            CliCommand::Bake(command) => command,
            CliCommand::Help => panic!("expected a bake command"),
        }
    }

    #[test]
    fn parses_mode_paths_and_flags() {
        let command = bake(&["app", "specular", "in.png", "out.png", "--samples", "64", "--mip-levels", "3"]);
        assert_eq!(command.mode, BakeMode::Specular);
        assert_eq!(command.input, PathBuf::from("in.png"));
        assert_eq!(command.output, PathBuf::from("out.png"));
        assert_eq!(command.overrides.samples, Some(64));
        assert_eq!(command.overrides.mip_levels, Some(3));
        assert_eq!(command.config_path, None);
    }

    #[test]
    fn flags_may_precede_paths_and_latest_wins() {
        let command = bake(&["app", "lut", "--size", "32", "in.png", "--size", "128", "lut.bin", "--lut-format", "raw"]);
        assert_eq!(command.overrides.size, Some(128));
        assert_eq!(command.overrides.lut_format, Some(LutFormat::Raw));
        assert_eq!(command.output, PathBuf::from("lut.bin"));
    }

    #[test]
    fn no_arguments_prints_help() {
        assert_eq!(CliCommand::parse(["app"]).expect("parse"), CliCommand::Help);
        assert_eq!(CliCommand::parse(["app", "--help"]).expect("parse"), CliCommand::Help);
    }

    #[test]
    fn rejects_unknown_modes() {
        let err = CliCommand::parse(["app", "ambient", "in.png", "out.png"]).unwrap_err();
        assert!(err.to_string().contains("Unknown mode"), "unknown modes should error");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliCommand::parse(["app", "diffuse", "in.png", "out.png", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }

    #[test]
    fn missing_value_errors() {
        let err = CliCommand::parse(["app", "diffuse", "in.png", "out.png", "--samples"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn missing_output_errors() {
        let err = CliCommand::parse(["app", "diffuse", "in.png"]).unwrap_err();
        assert!(err.to_string().contains("output path"), "unexpected error: {err}");
    }

    #[test]
    fn zero_counts_are_rejected() {
        let err = CliCommand::parse(["app", "diffuse", "in.png", "out.png", "--samples", "0"]).unwrap_err();
        assert!(err.to_string().contains("at least 1"), "unexpected error: {err}");
    }

    #[test]
    fn overrides_reach_the_config() {
        let command = bake(&["app", "diffuse", "in.png", "out.png", "--samples", "256", "--size", "8"]);
        let config = command.resolve_config().expect("config");
        assert_eq!(config.diffuse.samples, 256);
        assert_eq!(config.diffuse.size, 8);
    }
}
