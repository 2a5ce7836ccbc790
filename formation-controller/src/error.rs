//! Typed errors for the controller's setup path.
//!
//! Per-cycle stage bodies never propagate `Err` — they catch, log, and fall
//! back to a safe default. These types exist only for startup/config
//! failures, which `main` is allowed to surface and act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration file not found at {0}")]
    NotFound(std::path::PathBuf),
    #[error("failed to read calibration archive: {0}")]
    Read(#[from] std::io::Error),
    #[error("calibration archive missing required array {0:?}")]
    MissingArray(&'static str),
    #[error("calibration array {0:?} has unexpected shape {1:?}")]
    BadShape(&'static str, Vec<usize>),
}

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("write to serial port failed: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
