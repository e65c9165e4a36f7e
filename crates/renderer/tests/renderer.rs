mod common;

use batcher_renderer::{
    AcquireOutcome, AttachmentLoad, ClearValues, FenceWait, GpuBackend, PresentOutcome,
    RenderTargetId, Renderer, RendererConfig, RendererError, SlotState,
};
use batcher_scene::{Mesh, Transform, Vertex};
use glam::Vec3;

use common::{Call, MockBackend, camera, config};

fn triangle() -> Mesh {
    Mesh::new(
        vec![
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
        ],
        vec![0, 1, 2],
    )
}

fn renderer(max_triangles: u32, max_objects: u32) -> (Renderer<MockBackend>, MockBackend) {
    let backend = MockBackend::new();
    let gpu = backend.clone();
    let renderer = Renderer::new(backend, &config(max_triangles, max_objects)).unwrap();
    (renderer, gpu)
}

fn draw_cubes(renderer: &mut Renderer<MockBackend>, count: usize) {
    let cube = Mesh::cube();
    for i in 0..count {
        let transform = Transform::new().with_translate(Vec3::new(i as f32 * 2.0, 0.0, 0.0));
        renderer.draw_mesh(&cube, &transform).unwrap();
    }
}

#[test]
fn test_new_creates_one_slot_per_image() {
    let (renderer, gpu) = renderer(500, 32);

    assert_eq!(renderer.frame_slots().len(), 3);
    assert_eq!(
        gpu.count(|c| matches!(c, Call::RecreateBatchBuffers { max_triangles: 500, max_objects: 32 })),
        1
    );
    assert_eq!(gpu.count(|c| matches!(c, Call::CreateCommandPool { .. })), 3);
}

#[test]
fn test_new_rejects_zero_batch_size() {
    let result = Renderer::new(MockBackend::new(), &config(0, 32));
    assert!(matches!(result, Err(RendererError::Config(_))));

    let result = Renderer::new(MockBackend::new(), &config(500, 0));
    assert!(matches!(result, Err(RendererError::Config(_))));
}

#[test]
fn test_single_cube_frame() {
    let (mut renderer, gpu) = renderer(500, 32);

    renderer.begin_frame(&camera()).unwrap();
    renderer.draw_mesh(&Mesh::cube(), &Transform::new()).unwrap();
    renderer.end_frame().unwrap();

    let stats = renderer.stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertex_count, 8);
    assert_eq!(stats.index_count, 36);

    let batches = gpu.written_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].vertices.len(), 8);
    assert_eq!(batches[0].indices, Mesh::cube().indices);
    assert!(batches[0].tags.iter().all(|&tag| tag == 0));
    assert_eq!(batches[0].metadata.len(), 1);

    let slot = renderer.frame_slots().get(0).unwrap();
    let submits = gpu.submits();
    assert_eq!(submits.len(), 1);
    let (_, wait, signal, fence) = submits[0];
    assert_eq!(wait, slot.image_acquired().id);
    assert_eq!(signal, slot.render_finished().id);
    assert_eq!(fence, slot.in_flight().id);

    assert_eq!(
        gpu.count(|c| matches!(c, Call::Present { wait, .. } if *wait == slot.render_finished().id)),
        1
    );
}

#[test]
fn test_flush_count_is_ceil_of_triangles_over_batch_limit() {
    // 5 cubes of 12 triangles with room for 24 per batch.
    let (mut renderer, gpu) = renderer(24, 32);

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();

    assert_eq!(gpu.submits().len(), 3);
    assert_eq!(renderer.stats().draw_calls, 3);
    assert_eq!(renderer.stats().index_count, 5 * 36);
    assert!(renderer.staging().is_empty());

    let batches = gpu.written_batches();
    let objects: Vec<usize> = batches.iter().map(|b| b.metadata.len()).collect();
    assert_eq!(objects, vec![2, 2, 1]);
}

#[test]
fn test_thirty_third_object_flushes() {
    let (mut renderer, gpu) = renderer(500, 32);
    let mesh = triangle();

    renderer.begin_frame(&camera()).unwrap();
    for _ in 0..32 {
        renderer.draw_mesh(&mesh, &Transform::new()).unwrap();
    }
    assert!(gpu.submits().is_empty());

    renderer.draw_mesh(&mesh, &Transform::new()).unwrap();
    assert_eq!(gpu.submits().len(), 1);
    assert_eq!(renderer.staging().object_count(), 1);

    renderer.end_frame().unwrap();

    let batches = gpu.written_batches();
    assert_eq!(batches[0].metadata.len(), 32);
    assert_eq!(batches[0].tags.last(), Some(&31));
    assert_eq!(batches[1].metadata.len(), 1);
}

#[test]
fn test_batches_are_chained_with_semaphores() {
    let (mut renderer, gpu) = renderer(24, 32);

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();

    let slot = renderer.frame_slots().get(0).unwrap();
    let batch: Vec<u64> = slot.batch_semaphores().iter().map(|s| s.id).collect();
    assert_eq!(batch.len(), 2);

    let submits = gpu.submits();
    let chain: Vec<(u64, u64, u64)> = submits
        .iter()
        .map(|&(_, wait, signal, fence)| (wait, signal, fence))
        .collect();
    assert_eq!(
        chain,
        vec![
            (slot.image_acquired().id, batch[0], slot.upload().id),
            (batch[0], batch[1], slot.upload().id),
            (batch[1], slot.render_finished().id, slot.in_flight().id),
        ]
    );
}

#[test]
fn test_batch_semaphores_are_reused_across_frames() {
    let (mut renderer, gpu) = renderer(24, 32);

    for _ in 0..4 {
        renderer.begin_frame(&camera()).unwrap();
        draw_cubes(&mut renderer, 5);
        renderer.end_frame().unwrap();
    }

    // Two per slot; slot 0 ran twice.
    let created = gpu.count(|c| matches!(c, Call::CreateSemaphore { label: "batch", .. }));
    assert_eq!(created, 6);
    assert_eq!(renderer.frame_slots().get(0).unwrap().batch_semaphores().len(), 2);
}

#[test]
fn test_first_batch_clears_and_final_batch_presents() {
    let (mut renderer, gpu) = renderer(24, 32);

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();

    let passes = gpu.recorded_passes();
    let loads: Vec<AttachmentLoad> = passes.iter().map(|p| p.load).collect();
    let presents: Vec<bool> = passes.iter().map(|p| p.present).collect();
    assert_eq!(
        loads,
        vec![AttachmentLoad::Clear, AttachmentLoad::Load, AttachmentLoad::Load]
    );
    assert_eq!(presents, vec![false, false, true]);
    assert!(passes.iter().all(|p| p.slot == 0 && p.image_index == 0));
}

#[test]
fn test_empty_frame_still_submits_final_batch() {
    let (mut renderer, gpu) = renderer(500, 32);

    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();

    let passes = gpu.recorded_passes();
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].index_count, 0);
    assert_eq!(passes[0].load, AttachmentLoad::Clear);
    assert!(passes[0].present);
    assert_eq!(renderer.stats().draw_calls, 0);
    assert_eq!(gpu.count(|c| matches!(c, Call::Present { .. })), 1);
}

#[test]
fn test_slots_advance_round_robin() {
    let (mut renderer, gpu) = renderer(500, 32);

    for frame in 0..4 {
        assert_eq!(renderer.frame_slots().current_index(), frame % 3);
        renderer.begin_frame(&camera()).unwrap();
        renderer.end_frame().unwrap();
    }
    assert_eq!(renderer.frame_slots().current_index(), 1);

    let uploads: Vec<usize> = gpu
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::UploadCamera { slot, .. } => Some(slot),
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec![0, 1, 2, 0]);
}

#[test]
fn test_in_flight_fence_is_reset_right_before_final_submit() {
    let (mut renderer, gpu) = renderer(24, 32);
    let in_flight = renderer.frame_slots().get(0).unwrap().in_flight().id;
    gpu.clear_calls();

    renderer.begin_frame(&camera()).unwrap();
    assert!(gpu.calls().contains(&Call::WaitFence { id: in_flight }));
    assert!(!gpu.calls().contains(&Call::ResetFence { id: in_flight }));
    assert!(gpu.is_signaled(in_flight));

    draw_cubes(&mut renderer, 5);
    assert!(!gpu.calls().contains(&Call::ResetFence { id: in_flight }));
    renderer.end_frame().unwrap();

    let calls = gpu.calls();
    let resets: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == Call::ResetFence { id: in_flight })
        .map(|(i, _)| i)
        .collect();
    assert_eq!(resets.len(), 1);
    assert!(matches!(
        &calls[resets[0] + 1],
        Call::Submit { fence, .. } if *fence == in_flight
    ));
}

#[test]
fn test_mirror_guard_waits_on_upload_fence() {
    let (mut renderer, gpu) = renderer(24, 32);
    let upload = renderer.frame_slots().get(0).unwrap().upload().id;
    gpu.clear_calls();

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();

    let calls = gpu.calls();
    let writes: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::WriteBatch(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(writes.len(), 3);

    // Batches 1 and 2 overwrite the mirrors only after the previous upload
    // fence has signaled and been reset.
    for &write in &writes[1..] {
        assert_eq!(calls[write - 2], Call::WaitFence { id: upload });
        assert_eq!(calls[write - 1], Call::ResetFence { id: upload });
    }
    assert!(!gpu.is_signaled(upload));
}

#[test]
fn test_next_frame_waits_on_previous_final_batch() {
    let (mut renderer, gpu) = renderer(500, 32);
    let previous = renderer.frame_slots().get(0).unwrap().in_flight().id;

    renderer.begin_frame(&camera()).unwrap();
    renderer.draw_mesh(&Mesh::cube(), &Transform::new()).unwrap();
    renderer.end_frame().unwrap();
    gpu.clear_calls();

    renderer.begin_frame(&camera()).unwrap();
    renderer.draw_mesh(&Mesh::cube(), &Transform::new()).unwrap();
    renderer.end_frame().unwrap();

    let calls = gpu.calls();
    let write = calls
        .iter()
        .position(|c| matches!(c, Call::WriteBatch(_)))
        .unwrap();
    assert_eq!(calls[write - 1], Call::WaitFence { id: previous });
    // Left signaled for slot 0's own final flush to reset.
    assert!(!calls.contains(&Call::ResetFence { id: previous }));
}

#[test]
fn test_mirror_round_trip_matches_cpu_transform() {
    let (mut renderer, gpu) = renderer(500, 32);
    let transforms = [
        Transform::new().with_translate(Vec3::new(3.0, -1.0, 2.0)),
        Transform::new()
            .with_rotate(Vec3::new(0.3, 1.1, -0.4))
            .with_scale(Vec3::splat(0.5)),
    ];

    renderer.begin_frame(&camera()).unwrap();
    for transform in &transforms {
        renderer.draw_mesh(&Mesh::cube(), transform).unwrap();
    }
    renderer.end_frame().unwrap();

    let batch = &gpu.written_batches()[0];
    let expected: Vec<Vec3> = transforms
        .iter()
        .flat_map(|t| Mesh::cube().transformed(t).vertices)
        .map(|v| v.position)
        .collect();

    for (i, (vertex, &tag)) in batch.vertices.iter().zip(&batch.tags).enumerate() {
        let model = batch.metadata[tag as usize].model;
        let world = model.transform_point3(vertex.position);
        assert!(
            world.abs_diff_eq(expected[i], 1e-5),
            "vertex {}: {:?} != {:?}",
            i,
            world,
            expected[i]
        );
    }

    // Indices of the second cube are rebased past the first one.
    assert_eq!(batch.indices[36], Mesh::cube().indices[0] + 8);
}

#[test]
fn test_set_batch_size_idles_before_recreating() {
    let (mut renderer, gpu) = renderer(500, 32);
    gpu.clear_calls();

    renderer.set_batch_size(100, 8).unwrap();

    let calls = gpu.calls();
    let idle = calls.iter().position(|c| *c == Call::WaitIdle).unwrap();
    let recreate = calls
        .iter()
        .position(|c| {
            matches!(c, Call::RecreateBatchBuffers { max_triangles: 100, max_objects: 8 })
        })
        .unwrap();
    assert!(idle < recreate);

    let policy = renderer.batch_policy();
    assert_eq!(policy.vertex_capacity(), 300);
    assert_eq!(policy.metadata_bytes(), 8 * 64);
    assert_eq!(renderer.staging().vertex_capacity(), 300);
    assert_eq!(renderer.staging().object_capacity(), 8);
}

#[test]
fn test_set_batch_size_applies_to_next_frame() {
    let (mut renderer, gpu) = renderer(500, 32);
    renderer.set_batch_size(12, 32).unwrap();

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 3);
    renderer.end_frame().unwrap();

    assert_eq!(gpu.submits().len(), 3);
}

#[test]
fn test_set_batch_size_rejects_zero_without_side_effects() {
    let (mut renderer, gpu) = renderer(500, 32);
    gpu.clear_calls();

    assert!(matches!(
        renderer.set_batch_size(0, 32),
        Err(RendererError::Config(_))
    ));
    assert!(matches!(
        renderer.set_batch_size(500, 0),
        Err(RendererError::Config(_))
    ));
    assert!(gpu.calls().is_empty());
    assert_eq!(renderer.batch_policy().max_triangles(), 500);
}

#[test]
fn test_set_batch_size_inside_frame_is_rejected() {
    let (mut renderer, _gpu) = renderer(500, 32);
    renderer.begin_frame(&camera()).unwrap();

    assert!(matches!(
        renderer.set_batch_size(100, 8),
        Err(RendererError::FrameState(_))
    ));
    renderer.end_frame().unwrap();
}

#[test]
fn test_resize_is_idempotent() {
    let (mut renderer, gpu) = renderer(500, 32);

    renderer.resize(800, 600).unwrap();
    renderer.resize(1024, 768).unwrap();
    renderer.resize(1024, 768).unwrap();
    renderer.resize(0, 768).unwrap();
    renderer.resize(1024, 0).unwrap();

    assert_eq!(
        gpu.count(|c| matches!(c, Call::Resize { .. })),
        1
    );
    assert_eq!(renderer.extent(), (1024, 768));
}

#[test]
fn test_resize_keeps_staging() {
    let (mut renderer, _gpu) = renderer(500, 32);
    renderer.resize(640, 480).unwrap();

    assert_eq!(renderer.staging().vertex_capacity(), 1500);
    renderer.begin_frame(&camera()).unwrap();
    renderer.draw_mesh(&Mesh::cube(), &Transform::new()).unwrap();
    renderer.end_frame().unwrap();
}

#[test]
fn test_draw_outside_frame_is_rejected() {
    let (mut renderer, _gpu) = renderer(500, 32);

    assert!(matches!(
        renderer.draw_mesh(&Mesh::cube(), &Transform::new()),
        Err(RendererError::FrameState(_))
    ));
    assert!(matches!(
        renderer.end_frame(),
        Err(RendererError::FrameState(_))
    ));
}

#[test]
fn test_nested_begin_frame_is_rejected() {
    let (mut renderer, _gpu) = renderer(500, 32);
    renderer.begin_frame(&camera()).unwrap();

    assert!(matches!(
        renderer.begin_frame(&camera()),
        Err(RendererError::FrameState(_))
    ));
    assert!(renderer.is_recording());
}

#[test]
fn test_oversized_mesh_is_capacity_error() {
    let (mut renderer, gpu) = renderer(10, 32);
    renderer.begin_frame(&camera()).unwrap();
    renderer.draw_mesh(&triangle(), &Transform::new()).unwrap();

    let result = renderer.draw_mesh(&Mesh::cube(), &Transform::new());
    assert!(matches!(
        result,
        Err(RendererError::Capacity { resource: "triangles", requested: 12, capacity: 10 })
    ));

    // Nothing was flushed and the staged triangle is intact.
    assert!(gpu.submits().is_empty());
    assert_eq!(renderer.staging().object_count(), 1);
    renderer.end_frame().unwrap();
}

#[test]
fn test_fence_timeout_is_sync_error() {
    let (mut renderer, gpu) = renderer(500, 32);
    gpu.script_fence_wait(FenceWait::TimedOut);

    assert!(matches!(
        renderer.begin_frame(&camera()),
        Err(RendererError::Sync(_))
    ));
    assert_eq!(renderer.frame_slots().current().state(), SlotState::Idle);
    assert_eq!(gpu.count(|c| matches!(c, Call::Acquire { .. })), 0);

    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();
}

#[test]
fn test_failed_acquire_is_sync_error() {
    let (mut renderer, gpu) = renderer(500, 32);
    let in_flight = renderer.frame_slots().get(0).unwrap().in_flight().id;
    gpu.script_acquire(AcquireOutcome::Failed("ERROR_OUT_OF_DATE_KHR".to_string()));

    assert!(matches!(
        renderer.begin_frame(&camera()),
        Err(RendererError::Sync(_))
    ));
    assert_eq!(renderer.frame_slots().current().state(), SlotState::Idle);
    // The fence was not reset, so the slot can be retried.
    assert!(gpu.is_signaled(in_flight));
}

#[test]
fn test_failed_camera_upload_acquires_nothing() {
    let (mut renderer, gpu) = renderer(500, 32);
    let in_flight = renderer.frame_slots().get(0).unwrap().in_flight().id;
    gpu.fail_next_camera_upload();

    assert!(matches!(
        renderer.begin_frame(&camera()),
        Err(RendererError::ResourceExhaustion(_))
    ));
    assert_eq!(gpu.count(|c| matches!(c, Call::Acquire { .. })), 0);
    assert_eq!(renderer.frame_slots().current_index(), 0);
    assert_eq!(renderer.frame_slots().current().state(), SlotState::Idle);
    assert!(gpu.is_signaled(in_flight));

    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();
}

#[test]
fn test_timed_out_final_flush_leaves_slot_usable() {
    // Two cubes at 12 triangles per batch: the final flush has to wait on
    // the upload fence of the first batch, and that wait times out.
    let (mut renderer, gpu) = renderer(12, 32);
    let stale = renderer.frame_slots().get(0).unwrap().in_flight().id;

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 2);
    gpu.script_fence_wait(FenceWait::TimedOut);
    assert!(matches!(renderer.end_frame(), Err(RendererError::Sync(_))));

    assert_eq!(renderer.frame_slots().current_index(), 1);
    assert!(gpu.calls().contains(&Call::WaitIdle));
    let slot = renderer.frame_slots().get(0).unwrap();
    assert_eq!(slot.state(), SlotState::Idle);
    assert_ne!(slot.in_flight().id, stale);
    assert!(gpu.is_signaled(slot.in_flight().id));
    assert!(slot.batch_semaphores().is_empty());

    // Every slot, slot 0 included, runs normal frames again.
    for _ in 0..4 {
        renderer.begin_frame(&camera()).unwrap();
        draw_cubes(&mut renderer, 2);
        renderer.end_frame().unwrap();
    }
    assert_eq!(renderer.frame_slots().current_index(), 2);
    assert_eq!(renderer.stats().draw_calls, 2);
}

#[test]
fn test_failed_final_submit_leaves_slot_usable() {
    let (mut renderer, gpu) = renderer(500, 32);
    let stale = renderer.frame_slots().get(0).unwrap().in_flight().id;

    renderer.begin_frame(&camera()).unwrap();
    renderer.draw_mesh(&Mesh::cube(), &Transform::new()).unwrap();
    gpu.fail_next_submit();
    assert!(matches!(renderer.end_frame(), Err(RendererError::Sync(_))));

    // Reset for a submission that never happened.
    assert!(!gpu.is_signaled(stale));
    assert_eq!(gpu.count(|c| matches!(c, Call::Present { .. })), 0);
    let fresh = renderer.frame_slots().get(0).unwrap().in_flight().id;
    assert!(gpu.is_signaled(fresh));

    for _ in 0..3 {
        renderer.begin_frame(&camera()).unwrap();
        renderer.end_frame().unwrap();
    }
    assert_eq!(renderer.frame_slots().current_index(), 1);
}

#[test]
fn test_suboptimal_acquire_continues() {
    let (mut renderer, gpu) = renderer(500, 32);
    gpu.script_acquire(AcquireOutcome::Suboptimal(2));

    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();

    assert_eq!(gpu.recorded_passes()[0].image_index, 2);
    assert!(gpu.calls().contains(&Call::Present {
        image_index: 2,
        wait: renderer.frame_slots().get(0).unwrap().render_finished().id,
    }));
}

#[test]
fn test_failed_present_is_sync_error_and_advances() {
    let (mut renderer, gpu) = renderer(500, 32);
    gpu.script_present(PresentOutcome::Failed("ERROR_SURFACE_LOST_KHR".to_string()));

    renderer.begin_frame(&camera()).unwrap();
    assert!(matches!(renderer.end_frame(), Err(RendererError::Sync(_))));

    assert_eq!(renderer.frame_slots().current_index(), 1);
    assert_eq!(renderer.frame_slots().get(0).unwrap().state(), SlotState::Idle);
}

#[test]
fn test_suboptimal_present_is_success() {
    let (mut renderer, gpu) = renderer(500, 32);
    gpu.script_present(PresentOutcome::Suboptimal);

    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();
}

#[test]
fn test_command_buffers_grow_and_are_recycled() {
    let (mut renderer, gpu) = renderer(24, 32);
    let allocations = |p: &MockBackend| p.count(|c| matches!(c, Call::AllocateCommandBuffer { .. }));

    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();
    assert_eq!(allocations(&gpu), 3);

    // Visit the other two slots with single-batch frames.
    for _ in 0..2 {
        renderer.begin_frame(&camera()).unwrap();
        renderer.end_frame().unwrap();
    }
    assert_eq!(allocations(&gpu), 5);

    // Slot 0 again: its three buffers are reused after the pool reset.
    let slot0_pool_resets = |p: &MockBackend| p.count(|c| matches!(c, Call::ResetCommandPool { .. }));
    let resets_before = slot0_pool_resets(&gpu);
    renderer.begin_frame(&camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();

    assert_eq!(allocations(&gpu), 5);
    assert_eq!(slot0_pool_resets(&gpu), resets_before + 1);
    let commands = renderer.frame_slots().get(0).unwrap().commands();
    assert_eq!(commands.allocated_primaries(), 3);
    assert_eq!(commands.primaries_in_use(), 3);
}

#[test]
fn test_drop_waits_for_idle() {
    let (renderer, gpu) = renderer(500, 32);
    gpu.clear_calls();

    drop(renderer);

    assert_eq!(gpu.calls(), vec![Call::WaitIdle]);
}

#[test]
fn test_default_config_matches_default_policy() {
    let config = RendererConfig::default();
    assert_eq!(config.max_triangles_per_batch, 500);
    assert_eq!(config.max_objects_per_batch, 32);
    assert_eq!(config.shader_dir, std::path::PathBuf::from("shaders/spirv"));
}

#[test]
fn test_mock_extent() {
    let backend = MockBackend::new();
    assert_eq!(backend.extent(), (800, 600));
}

#[test]
fn test_default_render_target_is_created_with_renderer() {
    let (mut renderer, gpu) = renderer(500, 32);
    let created = gpu.created_targets();
    assert_eq!(created.len(), 1);
    assert_eq!(renderer.render_target_count(), 1);
    assert_eq!(
        renderer.clear_values(RenderTargetId::DEFAULT).unwrap(),
        ClearValues::default()
    );

    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();

    assert_eq!(gpu.recorded_targets(), created);
    assert_eq!(gpu.recorded_passes()[0].clear, ClearValues::default());
}

#[test]
fn test_frame_renders_into_selected_target() {
    let (mut renderer, gpu) = renderer(24, 32);
    let red = ClearValues {
        color: [1.0, 0.0, 0.0, 1.0],
        depth: 0.5,
    };
    let target = renderer.create_render_target(red).unwrap();
    assert_ne!(target, RenderTargetId::DEFAULT);
    let created = gpu.created_targets();
    assert_eq!(created.len(), 2);

    renderer.begin_frame_with_target(target, &camera()).unwrap();
    draw_cubes(&mut renderer, 5);
    renderer.end_frame().unwrap();

    assert_eq!(gpu.recorded_targets(), vec![created[1]; 3]);
    assert!(gpu.recorded_passes().iter().all(|p| p.clear == red));

    // The next plain frame is back on the default target.
    gpu.clear_calls();
    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();
    assert_eq!(gpu.recorded_targets(), vec![created[0]]);
    assert_eq!(gpu.recorded_passes()[0].clear, ClearValues::default());
}

#[test]
fn test_set_clear_values_applies_to_next_frame() {
    let (mut renderer, gpu) = renderer(500, 32);
    let black = ClearValues {
        color: [0.0, 0.0, 0.0, 1.0],
        depth: 1.0,
    };

    renderer.set_clear_values(RenderTargetId::DEFAULT, black).unwrap();
    renderer.begin_frame(&camera()).unwrap();
    renderer.end_frame().unwrap();

    assert_eq!(gpu.recorded_passes()[0].clear, black);
    assert_eq!(renderer.clear_values(RenderTargetId::DEFAULT).unwrap(), black);
}

#[test]
fn test_resize_resizes_every_render_target() {
    let (mut renderer, gpu) = renderer(500, 32);
    renderer.create_render_target(ClearValues::default()).unwrap();
    gpu.clear_calls();

    renderer.resize(1024, 768).unwrap();

    let calls = gpu.calls();
    let resize = calls
        .iter()
        .position(|c| matches!(c, Call::Resize { .. }))
        .unwrap();
    let resized: Vec<(usize, (u32, u32))> = calls
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            Call::ResizeRenderTarget { extent, .. } => Some((i, *extent)),
            _ => None,
        })
        .collect();
    assert_eq!(resized.len(), 2);
    assert!(resized.iter().all(|&(i, extent)| i > resize && extent == (1024, 768)));
}

#[test]
fn test_destroy_render_target() {
    let (mut renderer, gpu) = renderer(500, 32);
    let target = renderer.create_render_target(ClearValues::default()).unwrap();
    gpu.clear_calls();

    renderer.destroy_render_target(target).unwrap();
    assert_eq!(gpu.calls(), vec![Call::WaitIdle]);
    assert_eq!(renderer.render_target_count(), 1);

    assert!(matches!(
        renderer.destroy_render_target(target),
        Err(RendererError::Config(_))
    ));
    assert!(matches!(
        renderer.begin_frame_with_target(target, &camera()),
        Err(RendererError::Config(_))
    ));
    assert_eq!(renderer.frame_slots().current().state(), SlotState::Idle);

    // The freed id is handed out again.
    assert_eq!(
        renderer.create_render_target(ClearValues::default()).unwrap(),
        target
    );
}

#[test]
fn test_default_render_target_cannot_be_destroyed() {
    let (mut renderer, _gpu) = renderer(500, 32);

    assert!(matches!(
        renderer.destroy_render_target(RenderTargetId::DEFAULT),
        Err(RendererError::Config(_))
    ));
    assert_eq!(renderer.render_target_count(), 1);
}

#[test]
fn test_destroy_render_target_inside_frame_is_rejected() {
    let (mut renderer, _gpu) = renderer(500, 32);
    let target = renderer.create_render_target(ClearValues::default()).unwrap();

    renderer.begin_frame_with_target(target, &camera()).unwrap();
    assert!(matches!(
        renderer.destroy_render_target(target),
        Err(RendererError::FrameState(_))
    ));
    renderer.end_frame().unwrap();
    assert_eq!(renderer.render_target_count(), 2);
}
