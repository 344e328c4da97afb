//! Turns an assembled module and a test's resources into wgpu objects.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use spvexec_asm::BinaryModule;
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::caps::{DeviceCaps, DeviceFeatures};
use crate::context::ExecutionContext;
use crate::error::ResourceError;
use crate::resource::{BindingCoords, ResourceDescriptor, ResourceKind};
use crate::spec::{all_resources, DrawParameters, Invocation, TestSpec};

/// Byte value every output buffer is filled with before the invocation runs.
pub const OUTPUT_SENTINEL: u8 = 0xff;

pub(crate) const RENDER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Buffer size for `len` bytes: never zero, a multiple of [`wgpu::COPY_BUFFER_ALIGNMENT`].
pub(crate) fn padded_len(len: usize) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    (len as u64).max(align).div_ceil(align) * align
}

/// Stages a binding of `kind` is visible to.
///
/// Draws expose writable storage to the vertex stage only when the device allows vertex stores;
/// fragment-only writes are the common case and need nothing beyond fragment stores.
pub(crate) fn binding_visibility(
    invocation: &Invocation,
    kind: ResourceKind,
    caps: &DeviceCaps,
) -> wgpu::ShaderStages {
    match invocation {
        Invocation::Compute { .. } => wgpu::ShaderStages::COMPUTE,
        Invocation::Draw(_)
            if kind.is_writable() && !caps.features.contains(DeviceFeatures::VERTEX_STORES) =>
        {
            wgpu::ShaderStages::FRAGMENT
        }
        Invocation::Draw(_) => wgpu::ShaderStages::VERTEX_FRAGMENT,
    }
}

/// Bindings of one descriptor set: `(binding, resource position, kind)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SetPlan {
    pub entries: Vec<(u32, usize, ResourceKind)>,
}

/// Groups resources by descriptor set, one plan per set index up to the highest used. Unused
/// sets get empty plans.
pub(crate) fn plan_sets(spec: &TestSpec, caps: &DeviceCaps) -> Result<Vec<SetPlan>, ResourceError> {
    let mut sets: BTreeMap<u32, SetPlan> = BTreeMap::new();
    let mut seen = HashSet::new();

    for (index, is_output, desc) in all_resources(spec) {
        let coords = desc.binding();
        if is_output && desc.kind == ResourceKind::Uniform {
            return Err(ResourceError::UnsupportedKind {
                index,
                coords,
                kind: desc.kind,
                reason: "uniform buffers cannot be written by the shader",
            });
        }
        if !seen.insert(coords) {
            return Err(ResourceError::DuplicateBinding { coords });
        }
        if coords.set >= caps.max_bind_groups {
            return Err(ResourceError::UnsupportedBinding {
                coords,
                reason: format!("device supports {} descriptor sets", caps.max_bind_groups),
            });
        }
        sets.entry(coords.set)
            .or_default()
            .entries
            .push((coords.binding, index, desc.kind));
    }

    let count = sets.keys().next_back().map_or(0, |max| max + 1);
    Ok((0..count)
        .map(|set| sets.remove(&set).unwrap_or_default())
        .collect())
}

pub(crate) enum BoundPipeline {
    Compute {
        pipeline: wgpu::ComputePipeline,
        workgroups: [u32; 3],
    },
    Draw {
        pipeline: wgpu::RenderPipeline,
        // Kept alive for the view.
        _target: wgpu::Texture,
        view: wgpu::TextureView,
        vertex_count: u32,
        instance_count: u32,
    },
}

pub(crate) struct BoundOutput {
    pub buffer: wgpu::Buffer,
    pub byte_len: usize,
}

/// Device objects for one test. Dropped as soon as the results are read back.
pub struct BoundInvocation {
    pub(crate) pipeline: BoundPipeline,
    pub(crate) bind_groups: Vec<wgpu::BindGroup>,
    pub(crate) outputs: Vec<BoundOutput>,
    pub(crate) push_constants: Option<(wgpu::ShaderStages, Vec<u8>)>,
    _inputs: Vec<wgpu::Buffer>,
}

impl BoundInvocation {
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
}

enum ScopeError {
    OutOfMemory(String),
    Validation(String),
}

/// Runs `f` inside out-of-memory and validation error scopes.
fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, ScopeError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    if let Some(err) = oom {
        return Err(ScopeError::OutOfMemory(err.to_string()));
    }
    if let Some(err) = validation {
        return Err(ScopeError::Validation(err.to_string()));
    }
    Ok(value)
}

fn stage_error(err: ScopeError, validation: impl FnOnce(String) -> ResourceError) -> ResourceError {
    match err {
        ScopeError::OutOfMemory(msg) => ResourceError::OutOfMemory(msg),
        ScopeError::Validation(msg) => validation(msg),
    }
}

fn buffer_error(err: ScopeError, index: usize, desc: &ResourceDescriptor) -> ResourceError {
    stage_error(err, |reason| ResourceError::BufferCreation {
        index,
        coords: desc.binding(),
        reason,
    })
}

fn check_entry_points(module: &BinaryModule, names: &[&str]) -> Result<(), ResourceError> {
    let declared = module.entry_points();
    for name in names {
        if !declared.iter().any(|ep| ep.name == *name) {
            let available: Vec<&str> = declared.iter().map(|ep| ep.name.as_str()).collect();
            return Err(ResourceError::PipelineCreation(format!(
                "entry point {name:?} not declared (module declares {available:?})"
            )));
        }
    }
    Ok(())
}

fn create_shader_module(
    context: &ExecutionContext,
    words: &[u32],
    label: &str,
) -> Result<wgpu::ShaderModule, ResourceError> {
    let device = context.device();
    let passthrough = context
        .caps()
        .features
        .contains(DeviceFeatures::SPIRV_PASSTHROUGH);
    trace!(passthrough, words = words.len(), "creating shader module");

    scoped(device, || {
        if passthrough {
            // SAFETY: the words form a structurally valid module (header and instruction
            // lengths are checked by `BinaryModule`); validating the semantics is the driver's
            // job under test.
            unsafe {
                device.create_shader_module_spirv(&wgpu::ShaderModuleDescriptorSpirV {
                    label: Some(label),
                    source: Cow::Borrowed(words),
                })
            }
        } else {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::SpirV(Cow::Borrowed(words)),
            })
        }
    })
    .map_err(|e| stage_error(e, ResourceError::ShaderModule))
}

/// Creates every device object the test needs.
///
/// Specialization values are patched into the module first. Inputs are uploaded at creation;
/// outputs start out filled with [`OUTPUT_SENTINEL`].
pub fn bind(
    context: &ExecutionContext,
    module: &BinaryModule,
    spec: &TestSpec,
) -> Result<BoundInvocation, ResourceError> {
    let device = context.device();
    let caps = context.caps();
    let sets = plan_sets(spec, caps)?;

    let module = if spec.specialization().is_empty() {
        Cow::Borrowed(module)
    } else {
        let constants = spec.specialization().to_spec_constants();
        Cow::Owned(spvexec_asm::specialize(module, &constants)?)
    };

    let stages = match spec.invocation() {
        Invocation::Compute { .. } => {
            check_entry_points(&module, &[spec.entry_point()])?;
            wgpu::ShaderStages::COMPUTE
        }
        Invocation::Draw(draw) => {
            check_entry_points(
                &module,
                &[draw.vertex_entry.as_str(), draw.fragment_entry.as_str()],
            )?;
            wgpu::ShaderStages::VERTEX_FRAGMENT
        }
    };

    let push_constants = match spec.push_constants() {
        Some(data) => {
            let size = data.byte_len() as u32;
            if size > caps.max_push_constant_size {
                return Err(ResourceError::PushConstants {
                    size,
                    max: caps.max_push_constant_size,
                });
            }
            Some((stages, data.bytes().to_vec()))
        }
        None => None,
    };

    let shader = create_shader_module(context, module.words(), spec.name())?;

    // Buffers, in binding order.
    let buffers = all_resources(spec)
        .map(|(index, is_output, desc)| {
            scoped(device, || {
                let size = padded_len(desc.buffer.byte_len()) as usize;
                let contents = if is_output {
                    vec![OUTPUT_SENTINEL; size]
                } else {
                    let mut bytes = desc.buffer.bytes().to_vec();
                    bytes.resize(size, 0);
                    bytes
                };
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} resource {index}", spec.name())),
                    contents: &contents,
                    usage: desc.kind.usage(),
                })
            })
            .map_err(|e| buffer_error(e, index, desc))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut layouts = Vec::with_capacity(sets.len());
    let mut bind_groups = Vec::with_capacity(sets.len());
    for (set, plan) in sets.iter().enumerate() {
        let coords = BindingCoords::new(
            set as u32,
            plan.entries.first().map_or(0, |(binding, _, _)| *binding),
        );
        let (layout, group) = scoped(device, || {
            let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = plan
                .entries
                .iter()
                .map(|&(binding, _, kind)| wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: binding_visibility(spec.invocation(), kind, caps),
                    ty: wgpu::BindingType::Buffer {
                        ty: kind.binding_type(),
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                })
                .collect();
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("spvexec set layout"),
                entries: &layout_entries,
            });
            let group_entries: Vec<wgpu::BindGroupEntry> = plan
                .entries
                .iter()
                .map(|&(binding, index, _)| wgpu::BindGroupEntry {
                    binding,
                    resource: buffers[index].as_entire_binding(),
                })
                .collect();
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("spvexec set"),
                layout: &layout,
                entries: &group_entries,
            });
            (layout, group)
        })
        .map_err(|e| stage_error(e, |reason| ResourceError::UnsupportedBinding { coords, reason }))?;
        layouts.push(layout);
        bind_groups.push(group);
    }

    let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().collect();
    let push_constant_ranges: Vec<wgpu::PushConstantRange> = push_constants
        .iter()
        .map(|(stages, data)| wgpu::PushConstantRange {
            stages: *stages,
            range: 0..data.len() as u32,
        })
        .collect();

    let pipeline = scoped(device, || {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spvexec pipeline layout"),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &push_constant_ranges,
        });
        match spec.invocation() {
            Invocation::Compute { workgroups } => BoundPipeline::Compute {
                pipeline: device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(spec.name()),
                    layout: Some(&layout),
                    module: &shader,
                    entry_point: spec.entry_point(),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                workgroups: *workgroups,
            },
            Invocation::Draw(draw) => create_draw(device, &layout, &shader, spec.name(), draw),
        }
    })
    .map_err(|e| stage_error(e, ResourceError::PipelineCreation))?;

    let inputs_len = spec.inputs().len();
    let mut buffers = buffers.into_iter();
    let inputs: Vec<wgpu::Buffer> = buffers.by_ref().take(inputs_len).collect();
    let outputs = buffers
        .zip(spec.outputs())
        .map(|(buffer, desc)| BoundOutput {
            buffer,
            byte_len: desc.buffer.byte_len(),
        })
        .collect::<Vec<_>>();

    debug!(
        test = spec.name(),
        sets = bind_groups.len(),
        inputs = inputs.len(),
        outputs = outputs.len(),
        "bound invocation"
    );

    Ok(BoundInvocation {
        pipeline,
        bind_groups,
        outputs,
        push_constants,
        _inputs: inputs,
    })
}

fn create_draw(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    draw: &DrawParameters,
) -> BoundPipeline {
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("spvexec render target"),
        size: wgpu::Extent3d {
            width: draw.width,
            height: draw.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: RENDER_TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: &draw.vertex_entry,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: &draw.fragment_entry,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: RENDER_TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    });

    BoundPipeline::Draw {
        pipeline,
        _target: target,
        view,
        vertex_count: draw.vertex_count,
        instance_count: draw.instance_count,
    }
}
