//! Per-frame submission counters.

/// Counters for the frame currently being recorded.
///
/// Reset by `begin_frame`; read them after `end_frame` for the totals of the
/// last completed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Number of non-empty batches submitted.
    pub draw_calls: u32,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl RendererStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Accounts for one flushed batch. Empty batches are not draw calls.
    pub fn record(&mut self, vertex_count: usize, index_count: usize) {
        if index_count > 0 {
            self.draw_calls += 1;
        }
        self.vertex_count += vertex_count as u32;
        self.index_count += index_count as u32;
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}
