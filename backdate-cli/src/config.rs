//! Configuration file loading for backdate.
//!
//! Discovers and loads `backdate.toml` from the project root and merges it
//! with CLI arguments (CLI takes precedence).

use anyhow::Context;
use backdate_core::settings::GenerateSettings;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "backdate.toml";

/// Top-level configuration from backdate.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackdateConfig {
    pub paths: PathsConfig,
    pub output: OutputConfig,
}

/// Where HEAD, the manifest and generated output live, relative to the root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub head: Option<Utf8PathBuf>,
    pub versions: Option<Utf8PathBuf>,
    pub out: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Prefix generated modules with a do-not-edit comment.
    pub banner: Option<bool>,
}

/// Returns `None` if `root` has no config file.
pub fn discover_config(root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<BackdateConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<BackdateConfig> {
    let config: BackdateConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project root, or return default if not found.
pub fn load_or_default(root: &Utf8Path) -> anyhow::Result<BackdateConfig> {
    match discover_config(root) {
        Some(path) => load_config(&path),
        None => Ok(BackdateConfig::default()),
    }
}

/// Path overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub head: Option<Utf8PathBuf>,
    pub versions: Option<Utf8PathBuf>,
    pub out: Option<Utf8PathBuf>,
    pub no_banner: bool,
}

/// Merge the config file with CLI overrides into generation settings.
///
/// Precedence: CLI, then config file, then built-in defaults. Relative paths
/// are resolved against `root`.
pub fn merge(root: &Utf8Path, config: &BackdateConfig, cli: &PathOverrides) -> GenerateSettings {
    let defaults = GenerateSettings::default();
    let pick = |flag: &Option<Utf8PathBuf>, file: &Option<Utf8PathBuf>, default: Utf8PathBuf| {
        let chosen = flag.clone().or_else(|| file.clone()).unwrap_or(default);
        if chosen.is_absolute() {
            chosen
        } else {
            root.join(chosen)
        }
    };

    GenerateSettings {
        head_dir: pick(&cli.head, &config.paths.head, defaults.head_dir),
        versions_file: pick(&cli.versions, &config.paths.versions, defaults.versions_file),
        out_dir: pick(&cli.out, &config.paths.out, defaults.out_dir),
        banner: !cli.no_banner && config.output.banner.unwrap_or(defaults.banner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = parse_config("").unwrap();
        assert!(config.paths.head.is_none());
        assert!(config.output.banner.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("[paths]\nheads = \"x\"\n").is_err());
    }

    #[test]
    fn cli_beats_file_beats_default() {
        let config = parse_config(
            r#"
            [paths]
            head = "api/head"
            out = "api/generated"

            [output]
            banner = false
            "#,
        )
        .unwrap();
        let cli = PathOverrides {
            out: Some("/tmp/elsewhere".into()),
            ..PathOverrides::default()
        };
        let settings = merge(Utf8Path::new("proj"), &config, &cli);
        assert_eq!(settings.head_dir, Utf8PathBuf::from("proj/api/head"));
        assert_eq!(settings.versions_file, Utf8PathBuf::from("proj/versions.toml"));
        assert_eq!(settings.out_dir, Utf8PathBuf::from("/tmp/elsewhere"));
        assert!(!settings.banner);
    }

    #[test]
    fn no_banner_flag_wins() {
        let cli = PathOverrides {
            no_banner: true,
            ..PathOverrides::default()
        };
        let settings = merge(Utf8Path::new("."), &BackdateConfig::default(), &cli);
        assert!(!settings.banner);
    }
}
