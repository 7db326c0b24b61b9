//! Error types for the swerve core.

use thiserror::Error;

use crate::hardware::HardwareError;

/// Swerve core error type.
///
/// Only construction and configuration paths are fatal. Per-cycle calls report
/// through this type so the caller can log, but never stop the cycle.
#[derive(Error, Debug)]
pub enum SwerveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Expected 4 swerve modules, found {found}")]
    ModuleCount { found: usize },

    #[error("Module geometry is degenerate, chassis velocity cannot be recovered")]
    DegenerateGeometry,

    #[error("Rejected non-finite {what}")]
    NonFinite { what: &'static str },

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwerveError>;
