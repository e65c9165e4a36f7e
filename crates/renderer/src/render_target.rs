//! Caller-selectable render targets.
//!
//! A frame renders into the acquired swapchain image plus the depth
//! attachment of one render target, cleared to that target's
//! [`ClearValues`]. The target with [`RenderTargetId::DEFAULT`] exists for
//! the renderer's whole lifetime; further targets are created and destroyed
//! by the caller between frames.

use std::fmt;

use tracing::debug;

use crate::backend::{ClearValues, GpuBackend};
use crate::error::{RendererError, RendererResult};

/// Handle to a render target owned by a [`crate::Renderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetId(usize);

impl RenderTargetId {
    /// Created with the renderer; can not be destroyed.
    pub const DEFAULT: RenderTargetId = RenderTargetId(0);
}

impl fmt::Display for RenderTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render target {}", self.0)
    }
}

struct Entry<T> {
    target: T,
    clear: ClearValues,
}

/// Targets indexed by id. Freed ids are reused.
pub struct RenderTargets<B: GpuBackend> {
    entries: Vec<Option<Entry<B::RenderTarget>>>,
}

impl<B: GpuBackend> RenderTargets<B> {
    /// Creates the registry holding only the default target.
    pub fn new(backend: &B, clear: ClearValues) -> RendererResult<Self> {
        let mut targets = Self { entries: Vec::new() };
        let id = targets.create(backend, clear)?;
        debug_assert_eq!(id, RenderTargetId::DEFAULT);
        Ok(targets)
    }

    pub fn create(&mut self, backend: &B, clear: ClearValues) -> RendererResult<RenderTargetId> {
        let entry = Entry {
            target: backend.create_render_target()?,
            clear,
        };

        let index = match self.entries.iter().position(Option::is_none) {
            Some(index) => {
                self.entries[index] = Some(entry);
                index
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };

        let id = RenderTargetId(index);
        debug!("Created {} ({:?})", id, clear);
        Ok(id)
    }

    /// Removes `id`, handing the target back so the caller decides when it
    /// is released.
    pub fn remove(&mut self, id: RenderTargetId) -> RendererResult<B::RenderTarget> {
        if id == RenderTargetId::DEFAULT {
            return Err(RendererError::Config(
                "the default render target can not be destroyed".to_string(),
            ));
        }
        let entry = self
            .entries
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| unknown(id))?;
        Ok(entry.target)
    }

    pub fn contains(&self, id: RenderTargetId) -> bool {
        matches!(self.entries.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: RenderTargetId) -> RendererResult<(&B::RenderTarget, ClearValues)> {
        self.entry(id).map(|entry| (&entry.target, entry.clear))
    }

    pub fn clear_values(&self, id: RenderTargetId) -> RendererResult<ClearValues> {
        self.entry(id).map(|entry| entry.clear)
    }

    pub fn set_clear_values(&mut self, id: RenderTargetId, clear: ClearValues) -> RendererResult<()> {
        let entry = self
            .entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| unknown(id))?;
        entry.clear = clear;
        Ok(())
    }

    /// Resizes every live target to the backend's current extent.
    pub fn resize_all(&mut self, backend: &B) -> RendererResult<()> {
        for entry in self.entries.iter_mut().flatten() {
            backend.resize_render_target(&mut entry.target)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: RenderTargetId) -> RendererResult<&Entry<B::RenderTarget>> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| unknown(id))
    }
}

fn unknown(id: RenderTargetId) -> RendererError {
    RendererError::Config(format!("{} does not exist", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_id_display() {
        assert_eq!(RenderTargetId::DEFAULT.to_string(), "render target 0");
    }

    #[test]
    fn test_default_clear_values() {
        let clear = ClearValues::default();
        assert_eq!(clear.color, [0.1, 0.1, 0.15, 1.0]);
        assert_eq!(clear.depth, 1.0);
    }
}
