//! Error types for the motion canvas engine.

use std::io;
use thiserror::Error;

/// Errors that stop the engine from starting or from being configured.
#[derive(Debug, Error)]
pub enum Error {
    /// The capture device could not be opened.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The depth backend answered, but no sensor is connected.
    #[error("No depth sensor devices found")]
    NoDevicesFound,

    /// The capture worker is already running.
    #[error("Detector already started")]
    AlreadyStarted,

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A pattern name in the configuration is not one we can render.
    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    /// The configuration file is not valid TOML for `EngineConfig`.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-tick read failures. These never leave the detector; they only fade
/// the intensity.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The device did not deliver a frame within the read timeout.
    #[error("Frame read timed out")]
    Timeout,

    /// The capture worker is not running or has shut down.
    #[error("Capture worker is gone")]
    WorkerGone,

    /// The backend reported a failed grab.
    #[error("Backend read failed: {0}")]
    Backend(String),

    /// The frame kind does not match what the motion source segments.
    #[error("Unexpected frame kind for this motion source")]
    UnexpectedFrame,
}

pub type Result<T> = std::result::Result<T, Error>;
