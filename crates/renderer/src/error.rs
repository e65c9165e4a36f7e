//! Error type of the submission engine.

use batcher_rhi::RhiError;
use thiserror::Error;

/// Every failure the engine reports. None of them is retried internally;
/// the embedding application decides whether to tear down.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Invalid batch size or other configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A single mesh does not fit into one batch.
    #[error("Mesh needs {requested} {resource} but a batch holds at most {capacity}")]
    Capacity {
        resource: &'static str,
        requested: usize,
        capacity: usize,
    },

    /// Fence timeout or an acquire/present result the engine cannot continue from.
    #[error("GPU synchronization failure: {0}")]
    Sync(String),

    /// Host or device memory ran out.
    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// An operation was called in the wrong phase of the frame.
    #[error("Invalid frame state: {0}")]
    FrameState(String),

    #[error("RHI error: {0}")]
    Rhi(#[source] RhiError),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RhiError> for RendererError {
    fn from(error: RhiError) -> Self {
        if error.is_out_of_memory() {
            RendererError::ResourceExhaustion(error.to_string())
        } else {
            RendererError::Rhi(error)
        }
    }
}

impl From<batcher_core::Error> for RendererError {
    fn from(error: batcher_core::Error) -> Self {
        match error {
            batcher_core::Error::Config(msg) => RendererError::Config(msg),
            batcher_core::Error::Io(e) => RendererError::Io(e),
            other => RendererError::Platform(other.to_string()),
        }
    }
}

pub type RendererResult<T> = std::result::Result<T, RendererError>;
