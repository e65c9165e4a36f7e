//! Recording GPU backend for driving the renderer without a device.
//!
//! Submissions complete instantly: a fence attached to a submission is
//! signaled as soon as it is submitted. Waiting on a fence that is not
//! signaled reports a timeout, so a protocol bug that would hang a real GPU
//! surfaces as a sync error here.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batcher_renderer::{
    AcquireOutcome, BatchPass, BatchPolicy, BatchUpload, CameraViewData, CommandBufferLevel,
    FenceWait, GpuBackend, ObjectMetadata, PresentOutcome, RendererConfig, RendererError,
    RendererResult, Submission,
};
use batcher_scene::Vertex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockSemaphore {
    pub id: u64,
    pub label: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockFence {
    pub id: u64,
    pub label: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockCommandPool {
    pub id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockCommandBuffer {
    pub id: u64,
    pub pool: u64,
    pub level: CommandBufferLevel,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockRenderTarget {
    pub id: u64,
    pub extent: (u32, u32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateSemaphore { id: u64, label: &'static str },
    CreateFence { id: u64, signaled: bool, label: &'static str },
    WaitFence { id: u64 },
    ResetFence { id: u64 },
    CreateCommandPool { id: u64 },
    AllocateCommandBuffer { id: u64, pool: u64, level: CommandBufferLevel },
    ResetCommandPool { id: u64 },
    Acquire { semaphore: u64 },
    Present { image_index: u32, wait: u64 },
    UploadCamera { slot: usize, camera: CameraViewData },
    WriteBatch(WrittenBatch),
    CreateRenderTarget { id: u64, extent: (u32, u32) },
    ResizeRenderTarget { id: u64, extent: (u32, u32) },
    RecordBatch { command_buffer: u64, target: u64, pass: BatchPass },
    Submit { command_buffer: u64, wait: u64, signal: u64, fence: u64 },
    RecreateBatchBuffers { max_triangles: usize, max_objects: usize },
    WaitIdle,
    Resize { width: u32, height: u32 },
}

/// Owned copy of the data written to the mirror buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct WrittenBatch {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub metadata: Vec<ObjectMetadata>,
    pub tags: Vec<i32>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    fences: HashMap<u64, bool>,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    fence_script: VecDeque<FenceWait>,
    failing_camera_uploads: usize,
    failing_submits: usize,
    next_image: u32,
    extent: (u32, u32),
}

/// Cloning shares the call log and scripts, so a test can keep a handle
/// after moving the backend into a renderer.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    next_id: Arc<AtomicU64>,
    image_count: usize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_image_count(3)
    }

    pub fn with_image_count(image_count: usize) -> Self {
        let state = MockState {
            extent: (800, 600),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            next_id: Arc::new(AtomicU64::new(1)),
            image_count,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn log(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn submits(&self) -> Vec<(u64, u64, u64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Submit {
                    command_buffer,
                    wait,
                    signal,
                    fence,
                } => Some((command_buffer, wait, signal, fence)),
                _ => None,
            })
            .collect()
    }

    pub fn written_batches(&self) -> Vec<WrittenBatch> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::WriteBatch(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    pub fn recorded_passes(&self) -> Vec<BatchPass> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RecordBatch { pass, .. } => Some(pass),
                _ => None,
            })
            .collect()
    }

    /// Target id of every recorded batch, in order.
    pub fn recorded_targets(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RecordBatch { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    pub fn created_targets(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateRenderTarget { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.state.lock().unwrap().acquire_script.push_back(outcome);
    }

    pub fn script_present(&self, outcome: PresentOutcome) {
        self.state.lock().unwrap().present_script.push_back(outcome);
    }

    /// Overrides the result of the next fence wait.
    pub fn script_fence_wait(&self, outcome: FenceWait) {
        self.state.lock().unwrap().fence_script.push_back(outcome);
    }

    /// Makes the next camera upload report an error.
    pub fn fail_next_camera_upload(&self) {
        self.state.lock().unwrap().failing_camera_uploads += 1;
    }

    /// Makes the next submission report an error without signaling anything.
    pub fn fail_next_submit(&self) {
        self.state.lock().unwrap().failing_submits += 1;
    }

    pub fn is_signaled(&self, fence: u64) -> bool {
        self.state
            .lock()
            .unwrap()
            .fences
            .get(&fence)
            .copied()
            .unwrap_or(false)
    }
}

impl GpuBackend for MockBackend {
    type Semaphore = MockSemaphore;
    type Fence = MockFence;
    type CommandPool = MockCommandPool;
    type CommandBuffer = MockCommandBuffer;
    type RenderTarget = MockRenderTarget;

    fn create_semaphore(&self, label: &'static str) -> RendererResult<MockSemaphore> {
        let id = self.next_id();
        self.log(Call::CreateSemaphore { id, label });
        Ok(MockSemaphore { id, label })
    }

    fn create_fence(&self, signaled: bool, label: &'static str) -> RendererResult<MockFence> {
        let id = self.next_id();
        self.state.lock().unwrap().fences.insert(id, signaled);
        self.log(Call::CreateFence { id, signaled, label });
        Ok(MockFence { id, label })
    }

    fn wait_for_fence(&self, fence: &MockFence, _timeout: Duration) -> RendererResult<FenceWait> {
        self.log(Call::WaitFence { id: fence.id });
        let mut state = self.state.lock().unwrap();
        if let Some(outcome) = state.fence_script.pop_front() {
            return Ok(outcome);
        }
        Ok(if state.fences.get(&fence.id).copied().unwrap_or(false) {
            FenceWait::Signaled
        } else {
            FenceWait::TimedOut
        })
    }

    fn reset_fence(&self, fence: &MockFence) -> RendererResult<()> {
        self.state.lock().unwrap().fences.insert(fence.id, false);
        self.log(Call::ResetFence { id: fence.id });
        Ok(())
    }

    fn create_command_pool(&self) -> RendererResult<MockCommandPool> {
        let id = self.next_id();
        self.log(Call::CreateCommandPool { id });
        Ok(MockCommandPool { id })
    }

    fn allocate_command_buffer(
        &self,
        pool: &MockCommandPool,
        level: CommandBufferLevel,
    ) -> RendererResult<MockCommandBuffer> {
        let id = self.next_id();
        self.log(Call::AllocateCommandBuffer {
            id,
            pool: pool.id,
            level,
        });
        Ok(MockCommandBuffer {
            id,
            pool: pool.id,
            level,
        })
    }

    fn reset_command_pool(&self, pool: &MockCommandPool) -> RendererResult<()> {
        self.log(Call::ResetCommandPool { id: pool.id });
        Ok(())
    }

    fn acquire_next_image(&self, signal: &MockSemaphore) -> AcquireOutcome {
        self.log(Call::Acquire {
            semaphore: signal.id,
        });
        let mut state = self.state.lock().unwrap();
        if let Some(outcome) = state.acquire_script.pop_front() {
            return outcome;
        }
        let index = state.next_image;
        state.next_image = (index + 1) % self.image_count as u32;
        AcquireOutcome::Success(index)
    }

    fn present(&self, image_index: u32, wait: &MockSemaphore) -> PresentOutcome {
        self.log(Call::Present {
            image_index,
            wait: wait.id,
        });
        self.state
            .lock()
            .unwrap()
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Success)
    }

    fn upload_camera(&self, slot: usize, camera: &CameraViewData) -> RendererResult<()> {
        self.log(Call::UploadCamera {
            slot,
            camera: *camera,
        });
        let mut state = self.state.lock().unwrap();
        if state.failing_camera_uploads > 0 {
            state.failing_camera_uploads -= 1;
            return Err(RendererError::ResourceExhaustion(
                "camera buffer unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn write_batch(&self, batch: &BatchUpload<'_>) -> RendererResult<()> {
        self.log(Call::WriteBatch(WrittenBatch {
            vertices: batch.vertices.to_vec(),
            indices: batch.indices.to_vec(),
            metadata: batch.metadata.to_vec(),
            tags: batch.tags.to_vec(),
        }));
        Ok(())
    }

    fn create_render_target(&self) -> RendererResult<MockRenderTarget> {
        let id = self.next_id();
        let extent = self.extent();
        self.log(Call::CreateRenderTarget { id, extent });
        Ok(MockRenderTarget { id, extent })
    }

    fn resize_render_target(&self, target: &mut MockRenderTarget) -> RendererResult<()> {
        target.extent = self.extent();
        self.log(Call::ResizeRenderTarget {
            id: target.id,
            extent: target.extent,
        });
        Ok(())
    }

    fn record_batch(
        &self,
        command_buffer: &MockCommandBuffer,
        target: &MockRenderTarget,
        pass: &BatchPass,
    ) -> RendererResult<()> {
        self.log(Call::RecordBatch {
            command_buffer: command_buffer.id,
            target: target.id,
            pass: *pass,
        });
        Ok(())
    }

    fn submit(&self, submission: Submission<'_, Self>) -> RendererResult<()> {
        let fence = submission.fence.id;
        {
            let mut state = self.state.lock().unwrap();
            if state.failing_submits > 0 {
                state.failing_submits -= 1;
                return Err(RendererError::Sync("queue submission failed".to_string()));
            }
            state.fences.insert(fence, true);
        }
        self.log(Call::Submit {
            command_buffer: submission.command_buffer.id,
            wait: submission.wait.id,
            signal: submission.signal.id,
            fence,
        });
        Ok(())
    }

    fn recreate_batch_buffers(&mut self, policy: &BatchPolicy) -> RendererResult<()> {
        self.log(Call::RecreateBatchBuffers {
            max_triangles: policy.max_triangles(),
            max_objects: policy.max_objects(),
        });
        Ok(())
    }

    fn wait_idle(&self) -> RendererResult<()> {
        self.log(Call::WaitIdle);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.state.lock().unwrap().extent = (width, height);
        self.log(Call::Resize { width, height });
        Ok(())
    }

    fn extent(&self) -> (u32, u32) {
        self.state.lock().unwrap().extent
    }

    fn image_count(&self) -> usize {
        self.image_count
    }
}

pub fn config(max_triangles: u32, max_objects: u32) -> RendererConfig {
    RendererConfig {
        max_triangles_per_batch: max_triangles,
        max_objects_per_batch: max_objects,
        ..RendererConfig::default()
    }
}

pub fn camera() -> CameraViewData {
    CameraViewData::default()
}
