//! Application-level error type.

use thiserror::Error;

/// Error type shared by the application-facing crates.
///
/// The renderer reports through its own error enum and converts from this
/// one at the crate boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or surface errors
    #[error("Window error: {0}")]
    Window(String),

    /// Invalid or unparsable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the shared [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
