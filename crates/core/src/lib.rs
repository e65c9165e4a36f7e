//! Shared foundations for the batch submission engine.
//!
//! This crate provides the pieces every other crate leans on:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Runtime configuration read from the environment

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{FrameReport, FrameTimer};
