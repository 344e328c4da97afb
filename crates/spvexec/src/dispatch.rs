//! Recording, submission and bounded waits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_intrusive::channel::shared::oneshot_channel;
use tracing::{debug, warn};

use crate::binder::{BoundInvocation, BoundPipeline};
use crate::context::ExecutionContext;
use crate::error::DeviceError;

/// Device progress as seen by the wait loop.
pub trait DevicePoll {
    /// Drives pending callbacks without blocking.
    fn poll(&self);

    /// Fails once the device is lost.
    fn health(&self) -> Result<(), DeviceError>;
}

impl DevicePoll for ExecutionContext {
    fn poll(&self) {
        let _ = self.device().poll(wgpu::Maintain::Poll);
    }

    fn health(&self) -> Result<(), DeviceError> {
        self.check_health()
    }
}

/// Flag raised by `on_submitted_work_done` once the queue has drained a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFence {
    signaled: Arc<AtomicBool>,
}

impl SubmissionFence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_queue(queue: &wgpu::Queue) -> Self {
        let fence = Self::new();
        let signal = fence.clone();
        queue.on_submitted_work_done(move || signal.signal());
        fence
    }

    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls `device` until `done` holds, the device is lost, or `timeout` elapses.
pub fn wait_until(
    device: &impl DevicePoll,
    timeout: Duration,
    done: impl Fn() -> bool,
) -> Result<Duration, DeviceError> {
    let start = Instant::now();
    loop {
        device.health()?;
        device.poll();
        if done() {
            return Ok(start.elapsed());
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            warn!(?elapsed, "device wait timed out");
            return Err(DeviceError::Timeout { elapsed });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

struct Staging {
    buffer: wgpu::Buffer,
    byte_len: usize,
}

/// Outputs copied to mappable staging buffers by a finished submission.
pub struct Completion {
    pub elapsed: Duration,
    staging: Vec<Staging>,
}

impl Completion {
    /// Maps every staging buffer and returns the output bytes in output order.
    pub fn read_back(
        self,
        context: &ExecutionContext,
        timeout: Duration,
    ) -> Result<Vec<Vec<u8>>, DeviceError> {
        let mut receivers = Vec::with_capacity(self.staging.len());
        let mapped = Arc::new(AtomicUsize::new(0));
        for staging in &self.staging {
            let (sender, receiver) = oneshot_channel();
            let mapped = Arc::clone(&mapped);
            staging
                .buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |res| {
                    sender.send(res).ok();
                    mapped.fetch_add(1, Ordering::AcqRel);
                });
            receivers.push(receiver);
        }

        let expected = self.staging.len();
        wait_until(context, timeout, || mapped.load(Ordering::Acquire) == expected)?;

        let mut outputs = Vec::with_capacity(expected);
        for (staging, receiver) in self.staging.iter().zip(receivers) {
            pollster::block_on(receiver.receive())
                .ok_or(DeviceError::MapAsyncDropped)?
                .map_err(|err| DeviceError::MapAsync(format!("{err:?}")))?;

            let slice = staging.buffer.slice(..);
            let view = slice.get_mapped_range();
            outputs.push(view[..staging.byte_len].to_vec());
            drop(view);
            staging.buffer.unmap();
        }
        Ok(outputs)
    }
}

/// Records the invocation, copies outputs to staging buffers, submits once and waits for the
/// queue to drain.
pub fn run(
    context: &ExecutionContext,
    bound: &BoundInvocation,
    timeout: Duration,
) -> Result<Completion, DeviceError> {
    context.check_health()?;
    let device = context.device();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("spvexec encoder"),
    });

    match &bound.pipeline {
        BoundPipeline::Compute {
            pipeline,
            workgroups,
        } => {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("spvexec compute pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            for (set, group) in bound.bind_groups.iter().enumerate() {
                pass.set_bind_group(set as u32, group, &[]);
            }
            if let Some((_, data)) = &bound.push_constants {
                pass.set_push_constants(0, data);
            }
            let [x, y, z] = *workgroups;
            pass.dispatch_workgroups(x, y, z);
        }
        BoundPipeline::Draw {
            pipeline,
            view,
            vertex_count,
            instance_count,
            ..
        } => {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("spvexec render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            for (set, group) in bound.bind_groups.iter().enumerate() {
                pass.set_bind_group(set as u32, group, &[]);
            }
            if let Some((stages, data)) = &bound.push_constants {
                pass.set_push_constants(*stages, 0, data);
            }
            pass.draw(0..*vertex_count, 0..*instance_count);
        }
    }

    let staging: Vec<Staging> = bound
        .outputs
        .iter()
        .map(|output| {
            let size = output.buffer.size();
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("spvexec staging"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            encoder.copy_buffer_to_buffer(&output.buffer, 0, &buffer, 0, size);
            Staging {
                buffer,
                byte_len: output.byte_len,
            }
        })
        .collect();

    context.queue().submit(Some(encoder.finish()));
    let fence = SubmissionFence::on_queue(context.queue());
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(DeviceError::Validation(err.to_string()));
    }

    let elapsed = wait_until(context, timeout, || fence.is_signaled())?;
    debug!(?elapsed, outputs = staging.len(), "submission complete");
    Ok(Completion { elapsed, staging })
}
