//! CLI + layered TOML configuration.
//!
//! An embedded default `config.toml` is used whenever no `--config` path is
//! given, or the given path can't be read; `clap`-parsed CLI flags then
//! override individual fields. This is the same embedded-default-fallback
//! idiom the hardware simulator uses for its own config loading.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml");

#[derive(Debug, Parser)]
#[command(name = "formation-controller", about = "Vision-in-the-loop formation controller")]
pub struct Args {
    /// Path to a TOML config file. Falls back to the embedded default if
    /// unreadable or omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the calibration .npz file.
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Serial port device name (e.g. /dev/ttyUSB0, COM3).
    #[arg(long)]
    pub port: Option<String>,

    /// Capture device index.
    #[arg(long)]
    pub camera_index: Option<usize>,

    /// Disable PathCrossingResolver.
    #[arg(long)]
    pub no_path_crossing: bool,

    /// Disable the APF collision-avoidance layer.
    #[arg(long)]
    pub no_apf: bool,

    /// Enable safety-stop hold records for agents with unknown pose.
    #[arg(long)]
    pub safety_stop: bool,

    /// Bind address for a synthetic `MarkerDetection` source (dev/test mode),
    /// e.g. 127.0.0.1:5555. When set, the Observer ignores the local camera
    /// and reads frames from this UDP socket instead.
    #[arg(long)]
    pub synthetic_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub calibration_path: String,
    pub serial_port: Option<String>,
    pub camera_index: usize,
    pub path_crossing_enabled: bool,
    pub apf_enabled: bool,
    pub safety_stop_enabled: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("embedded config.toml must parse")
    }
}

/// The fully resolved runtime configuration: file defaults overridden by
/// whatever was explicitly passed on the CLI.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub calibration_path: PathBuf,
    pub serial_port: Option<String>,
    pub camera_index: usize,
    pub path_crossing_enabled: bool,
    pub apf_enabled: bool,
    pub safety_stop_enabled: bool,
    pub synthetic_source: Option<String>,
}

pub fn load_file_config(path: Option<&std::path::Path>) -> FileConfig {
    match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(text) => parse_or_default(&text),
            Err(e) => {
                tracing::warn!("config: could not read {}: {e}; using embedded default", p.display());
                FileConfig::default()
            }
        },
        None => FileConfig::default(),
    }
}

fn parse_or_default(text: &str) -> FileConfig {
    match toml::from_str::<FileConfig>(text).map_err(ConfigError::from) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("config: failed to parse config file ({e}); using embedded default");
            FileConfig::default()
        }
    }
}

pub fn resolve(args: &Args) -> ResolvedConfig {
    let file = load_file_config(args.config.as_deref());

    ResolvedConfig {
        calibration_path: args
            .calibration
            .clone()
            .unwrap_or_else(|| PathBuf::from(&file.calibration_path)),
        serial_port: args.port.clone().or(file.serial_port),
        camera_index: args.camera_index.unwrap_or(file.camera_index),
        path_crossing_enabled: !args.no_path_crossing && file.path_crossing_enabled,
        apf_enabled: !args.no_apf && file.apf_enabled,
        safety_stop_enabled: args.safety_stop || file.safety_stop_enabled,
        synthetic_source: args.synthetic_source.clone(),
    }
}
