//! Scene values owned by the caller.
//!
//! The engine never owns scene content: meshes, transforms and cameras
//! live in the application and are borrowed for the duration of a draw.
//! This crate provides:
//! - [`Mesh`] and its position-only [`Vertex`]
//! - [`Transform`] (translate / Euler rotate / scale)
//! - [`Camera`] producing view and Vulkan-ready projection matrices

pub mod camera;
pub mod mesh;
pub mod transform;

pub use camera::Camera;
pub use mesh::{Mesh, Vertex};
pub use transform::Transform;
