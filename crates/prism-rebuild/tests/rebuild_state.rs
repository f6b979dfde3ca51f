mod common;

use common::*;
use prism_rebuild::{
    rebuild_state, Call, ObjectOutcome, Rebuild, RebuildOptions, SkipReason,
};

fn rebuild() -> Rebuild {
    rebuild_state(&sample_snapshot(), &RebuildOptions::default()).expect("rebuild succeeds")
}

fn call_names(rebuild: &Rebuild) -> Vec<&'static str> {
    rebuild.commands.iter().map(|c| c.call.name()).collect()
}

fn first_index(rebuild: &Rebuild, pred: impl Fn(&Call) -> bool) -> usize {
    rebuild
        .commands
        .iter()
        .position(|c| pred(&c.call))
        .expect("expected call not emitted")
}

#[test]
fn rebuild_is_deterministic() {
    let a = rebuild();
    let b = rebuild();

    assert_eq!(call_names(&a), call_names(&b));
    for (x, y) in a.commands.iter().zip(&b.commands) {
        assert_eq!(x.reads, y.reads, "read observations diverge");
        assert_eq!(x.writes, y.writes, "write observations diverge");
    }
    assert_eq!(a.ranges.as_slice(), b.ranges.as_slice());
}

#[test]
fn creation_follows_the_fixed_category_order() {
    let r = rebuild();

    let instance = first_index(&r, |c| matches!(c, Call::CreateInstance { .. }));
    let enumerate = first_index(&r, |c| matches!(c, Call::EnumeratePhysicalDevices { .. }));
    let surface = first_index(&r, |c| matches!(c, Call::CreateSurface { .. }));
    let device = first_index(&r, |c| matches!(c, Call::CreateDevice { .. }));
    let queue = first_index(&r, |c| matches!(c, Call::GetDeviceQueue { .. }));
    let swapchain = first_index(&r, |c| matches!(c, Call::CreateSwapchain { .. }));
    let memory = first_index(
        &r,
        |c| matches!(c, Call::AllocateMemory { memory, .. } if *memory == MEMORY),
    );
    let buffer = first_index(
        &r,
        |c| matches!(c, Call::CreateBuffer { buffer, .. } if *buffer == BUFFER),
    );
    let image = first_index(
        &r,
        |c| matches!(c, Call::CreateImage { image, .. } if *image == IMAGE),
    );
    let sampler = first_index(
        &r,
        |c| matches!(c, Call::CreateSampler { sampler, .. } if *sampler == SAMPLER),
    );
    let compute = first_index(&r, |c| matches!(c, Call::CreateComputePipeline { .. }));
    let graphics = first_index(&r, |c| matches!(c, Call::CreateGraphicsPipeline { .. }));
    let view = first_index(
        &r,
        |c| matches!(c, Call::CreateImageView { view, .. } if *view == IMAGE_VIEW),
    );
    let descriptor_set = first_index(
        &r,
        |c| matches!(c, Call::AllocateDescriptorSets { sets, .. } if sets.contains(&DESCRIPTOR_SET)),
    );
    let command_buffer = first_index(
        &r,
        |c| matches!(c, Call::AllocateCommandBuffers { buffers, .. } if buffers.contains(&PRIMARY_CB)),
    );

    let order = [
        instance,
        enumerate,
        surface,
        device,
        queue,
        swapchain,
        memory,
        buffer,
        image,
        sampler,
        compute,
        graphics,
        view,
        descriptor_set,
        command_buffer,
    ];
    assert!(
        order.windows(2).all(|w| w[0] < w[1]),
        "stage order violated: {order:?}"
    );
}

#[test]
fn derived_pipeline_is_created_after_its_base() {
    let r = rebuild();
    let base = first_index(
        &r,
        |c| matches!(c, Call::CreateGraphicsPipeline { pipeline, .. } if *pipeline == GRAPHICS_PIPELINE),
    );
    let derived = first_index(
        &r,
        |c| matches!(c, Call::CreateGraphicsPipeline { pipeline, .. } if *pipeline == DERIVED_PIPELINE),
    );
    assert!(base < derived);

    let Call::CreateGraphicsPipeline { info, .. } = &r.commands[derived].call else {
        unreachable!();
    };
    assert_eq!(info.base_pipeline, GRAPHICS_PIPELINE);
}

#[test]
fn dead_compute_shader_module_is_recreated_as_a_temporary() {
    let r = rebuild();
    let created = first_index(
        &r,
        |c| matches!(c, Call::CreateShaderModule { module, .. } if *module == DEAD_SHADER_MODULE),
    );
    let pipeline = first_index(&r, |c| matches!(c, Call::CreateComputePipeline { .. }));
    let destroyed = first_index(
        &r,
        |c| matches!(c, Call::DestroyShaderModule { module, .. } if *module == DEAD_SHADER_MODULE),
    );
    assert!(created < pipeline && pipeline < destroyed);
}

#[test]
fn dead_framebuffer_render_pass_is_recreated_as_a_temporary() {
    let r = rebuild();
    let created = first_index(
        &r,
        |c| matches!(c, Call::CreateRenderPass { render_pass, .. } if *render_pass == DEAD_RENDER_PASS),
    );
    let framebuffer = first_index(
        &r,
        |c| matches!(c, Call::CreateFramebuffer { framebuffer, .. } if *framebuffer == FRAMEBUFFER),
    );
    let destroyed = first_index(
        &r,
        |c| matches!(c, Call::DestroyRenderPass { render_pass, .. } if *render_pass == DEAD_RENDER_PASS),
    );
    assert!(created < framebuffer && framebuffer < destroyed);
}

#[test]
fn buffer_content_is_primed_through_a_scratch_copy() {
    let r = rebuild();

    // Scratch staging: one extra buffer created and destroyed around the
    // one-shot copy submission.
    let copy = first_index(&r, |c| {
        matches!(
            c,
            Call::Record {
                command: prism_capture::RecordedCommand::CopyBuffer { dst, .. },
                ..
            } if *dst == BUFFER
        )
    });
    let submit = r.commands[copy..]
        .iter()
        .position(|c| matches!(c.call, Call::QueueSubmit { .. }))
        .expect("copy must be submitted");
    let wait = r.commands[copy + submit..]
        .iter()
        .position(|c| matches!(c.call, Call::QueueWaitIdle { .. }))
        .expect("submission must be waited on");
    assert!(wait > 0);

    let scratch_destroys = r
        .commands
        .iter()
        .filter(|c| matches!(c.call, Call::DestroyBuffer { .. }))
        .count();
    assert!(scratch_destroys >= 1, "scratch buffer never destroyed");
}

#[test]
fn signaled_sync_objects_are_restored() {
    let r = rebuild();

    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::CreateFence { signaled: true, fence, .. } if *fence == FENCE
    )));
    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::QueueSubmit { signal_semaphores, .. } if signal_semaphores.contains(&SEMAPHORE)
    )));
    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::SetEvent { event, .. } if *event == EVENT
    )));
}

#[test]
fn query_pool_status_is_replayed() {
    let r = rebuild();
    let begins: Vec<u32> = r
        .commands
        .iter()
        .filter_map(|c| match &c.call {
            Call::Record {
                command: prism_capture::RecordedCommand::BeginQuery { pool, query, .. },
                ..
            } if *pool == QUERY_POOL => Some(*query),
            _ => None,
        })
        .collect();
    let ends: Vec<u32> = r
        .commands
        .iter()
        .filter_map(|c| match &c.call {
            Call::Record {
                command: prism_capture::RecordedCommand::EndQuery { pool, query },
                ..
            } if *pool == QUERY_POOL => Some(*query),
            _ => None,
        })
        .collect();
    assert_eq!(begins, vec![0]);
    assert_eq!(ends, vec![0]);
}

#[test]
fn swapchain_image_is_skipped_in_the_image_pass_but_fetched_from_the_swapchain() {
    let r = rebuild();

    assert!(
        !r.commands.iter().any(|c| matches!(
            &c.call,
            Call::CreateImage { image, .. } if *image == SWAPCHAIN_IMAGE
        )),
        "swapchain image must not be created directly"
    );
    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::GetSwapchainImages { images: Some(images), .. } if images.contains(&SWAPCHAIN_IMAGE)
    )));
    assert!(r
        .report
        .outcomes
        .iter()
        .any(|o: &ObjectOutcome| o.handle == SWAPCHAIN_IMAGE.raw()
            && matches!(&o.result, prism_rebuild::ObjectResult::Skipped(SkipReason::SwapchainImage))));
}

#[test]
fn orphan_descriptor_set_is_skipped_not_fatal() {
    let r = rebuild();

    assert!(
        !r.commands.iter().any(|c| matches!(
            &c.call,
            Call::AllocateDescriptorSets { sets, .. } if sets.contains(&ORPHAN_DESCRIPTOR_SET)
        )),
        "orphan set must not be allocated"
    );
    let skipped = r
        .report
        .outcomes
        .iter()
        .find(|o| o.handle == ORPHAN_DESCRIPTOR_SET.raw())
        .expect("orphan set must be reported");
    assert!(matches!(
        &skipped.result,
        prism_rebuild::ObjectResult::Skipped(SkipReason::MissingDependency { dependency, .. })
            if *dependency == "descriptor pool"
    ));

    // Later categories still ran.
    assert!(r
        .commands
        .iter()
        .any(|c| matches!(c.call, Call::CreateQueryPool { .. })));
}

#[test]
fn every_observation_lands_in_the_merged_range_set() {
    let r = rebuild();
    assert!(!r.ranges.is_empty());
    for cmd in &r.commands {
        for range in cmd.reads.iter().chain(&cmd.writes) {
            assert!(
                r.ranges.covers(range),
                "observation {range:?} of {} not covered",
                cmd.call.name()
            );
        }
    }
}

#[test]
fn unrecordable_command_buffer_stops_recording_without_aborting() {
    use prism_capture::*;

    let mut snapshot = sample_snapshot();
    let dead_buffer = BufferHandle(90);
    let broken = CommandBufferHandle(91);
    snapshot.command_buffers.insert(
        broken,
        CommandBufferObject {
            handle: broken,
            device: DEVICE,
            pool: COMMAND_POOL,
            level: CommandBufferLevel::Primary,
            recording: RecordingState::Completed,
            begin_info: CommandBufferBeginInfo::default(),
            commands: vec![RecordedCommand::CopyBuffer {
                src: dead_buffer,
                dst: BUFFER,
                regions: vec![BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: 0x10,
                }],
            }],
        },
    );

    let r = rebuild_state(&snapshot, &RebuildOptions::default()).expect("rebuild still succeeds");

    // The buffer is allocated and begun, but the bad copy is never recorded
    // and the recording is not ended.
    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::BeginCommandBuffer { buffer, .. } if *buffer == broken
    )));
    assert!(!r.commands.iter().any(|c| matches!(
        &c.call,
        Call::Record { buffer, .. } if *buffer == broken
    )));
    assert!(!r.commands.iter().any(|c| matches!(
        &c.call,
        Call::EndCommandBuffer { buffer } if *buffer == broken
    )));
    assert!(r.report.outcomes.iter().any(|o| {
        o.handle == broken.raw()
            && matches!(
                &o.result,
                prism_rebuild::ObjectResult::Skipped(SkipReason::NotRecordable)
            )
    }));
}

#[test]
fn secondary_buffers_are_allocated_before_primary_ones() {
    let r = rebuild();
    let secondary = first_index(
        &r,
        |c| matches!(c, Call::AllocateCommandBuffers { buffers, .. } if buffers.contains(&SECONDARY_CB)),
    );
    let primary = first_index(
        &r,
        |c| matches!(c, Call::AllocateCommandBuffers { buffers, .. } if buffers.contains(&PRIMARY_CB)),
    );
    assert!(secondary < primary);

    // The completed primary recording is re-recorded and ended; the
    // never-started secondary is not begun.
    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::EndCommandBuffer { buffer } if *buffer == PRIMARY_CB
    )));
    assert!(!r.commands.iter().any(|c| matches!(
        &c.call,
        Call::BeginCommandBuffer { buffer, .. } if *buffer == SECONDARY_CB
    )));
}
