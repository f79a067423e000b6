// SPDX-License-Identifier: GPL-2.0-or-later

use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Per-path configuration: where recordings live on disk and how their
/// filenames encode the segment start time.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PathConfig {
    pub record_path_template: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct RawConfig {
    address: SocketAddr,
    #[serde(default = "default_read_timeout_secs")]
    read_timeout_secs: u64,
    recordings_dir: PathBuf,
    #[serde(default)]
    paths: HashMap<String, PathConfig>,
}

fn default_read_timeout_secs() -> u64 {
    10
}

/// Main config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub address: SocketAddr,
    pub read_timeout: Duration,
    pub recordings_dir: PathBuf,
    pub paths: HashMap<String, PathConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    ReadFile(std::io::Error),

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("recordings_dir is not absolute: {0}")]
    RecordingsDirNotAbsolute(PathBuf),

    #[error("path '{0}' has no record_path_template token for %Y")]
    TemplateMissingYear(String),
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        parse_config(&raw)
    }
}

fn parse_config(raw_toml: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(raw_toml)?;

    if !raw.recordings_dir.is_absolute() {
        return Err(ConfigError::RecordingsDirNotAbsolute(raw.recordings_dir));
    }
    for (name, path_conf) in &raw.paths {
        if !path_conf.record_path_template.contains("%Y") {
            return Err(ConfigError::TemplateMissingYear(name.clone()));
        }
    }

    Ok(Config {
        address: raw.address,
        read_timeout: Duration::from_secs(raw.read_timeout_secs),
        recordings_dir: raw.recordings_dir,
        paths: raw.paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config_ok() {
        let config = r#"
            address = "127.0.0.1:8080"
            recordings_dir = "/recordings"

            [paths.driveway]
            record_path_template = "%Y-%m-%d_%H-%M-%S-%f"
        "#;

        let got = parse_config(config).unwrap();
        assert_eq!(got.address, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(got.read_timeout, Duration::from_secs(10));
        assert_eq!(got.recordings_dir, PathBuf::from("/recordings"));
        assert_eq!(
            got.paths.get("driveway").unwrap().record_path_template,
            "%Y-%m-%d_%H-%M-%S-%f"
        );
    }

    #[test]
    fn test_parse_config_deserialize_error() {
        assert!(matches!(
            parse_config("&"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_config_recordings_dir_not_absolute() {
        let config = r#"
            address = "127.0.0.1:8080"
            recordings_dir = "relative"
        "#;
        assert!(matches!(
            parse_config(config),
            Err(ConfigError::RecordingsDirNotAbsolute(_))
        ));
    }

    #[test]
    fn test_parse_config_template_missing_year() {
        let config = r#"
            address = "127.0.0.1:8080"
            recordings_dir = "/recordings"

            [paths.driveway]
            record_path_template = "%m-%d"
        "#;
        assert!(matches!(
            parse_config(config),
            Err(ConfigError::TemplateMissingYear(_))
        ));
    }
}
