//! Machine defaults loaded from `millstream.toml`, overridable per run
//! from the command line.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Toml(#[from] toml::de::Error),
}

pub const DEFAULT_PATH: &str = "millstream.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_arc_deviation")]
    pub max_arc_deviation: f64,
    #[serde(default = "default_min_arc_line_length")]
    pub min_arc_line_length: f64,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_precision() -> usize {
    4
}

fn default_tolerance() -> f64 {
    0.001
}

fn default_max_arc_deviation() -> f64 {
    0.002
}

fn default_min_arc_line_length() -> f64 {
    0.01
}

fn default_baud() -> u32 {
    115_200
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            tolerance: default_tolerance(),
            max_arc_deviation: default_max_arc_deviation(),
            min_arc_line_length: default_min_arc_line_length(),
            baud: default_baud(),
        }
    }
}

/// Loads the explicit file when given, the default file when present, and
/// built-in defaults otherwise.
pub fn load(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    match path {
        Some(path) => Ok(toml::from_str(&std::fs::read_to_string(path)?)?),
        None => match std::fs::read_to_string(DEFAULT_PATH) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(err) => Err(err.into()),
        },
    }
}

/// The effective run parameters after CLI flags override the file.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub precision: usize,
    pub tolerance: f64,
    pub max_arc_deviation: f64,
    pub min_arc_line_length: f64,
    pub baud: u32,
}

pub fn resolve(file: &FileConfig, args: &Args) -> Settings {
    Settings {
        precision: args.precision.unwrap_or(file.precision),
        tolerance: args.tolerance.unwrap_or(file.tolerance),
        max_arc_deviation: args.max_arc_deviation.unwrap_or(file.max_arc_deviation),
        min_arc_line_length: args
            .min_arc_line_length
            .unwrap_or(file.min_arc_line_length),
        baud: args.baud.unwrap_or(file.baud),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_files() {
        let config: FileConfig = toml::from_str("precision = 3\nbaud = 9600").unwrap();
        assert_eq!(config.precision, 3);
        assert_eq!(config.baud, 9600);
        assert_eq!(config.tolerance, default_tolerance());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("presicion = 3").is_err());
    }
}
