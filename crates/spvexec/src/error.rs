use std::time::Duration;

use spvexec_asm::AssemblyError;
use thiserror::Error;

use crate::buffer::BufferError;
use crate::resource::{BindingCoords, ResourceKind};

/// A test specification that cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("no invocation set (call `compute` or `draw`)")]
    MissingInvocation,
    #[error("invocation already set; a workgroup extent or draw is fixed once chosen")]
    InvocationAlreadySet,
    #[error("workgroup extent {0:?} has a zero component")]
    ZeroWorkgroupExtent([u32; 3]),
    #[error("output {index} has zero byte length")]
    EmptyOutput { index: usize },
    #[error("{coords} is used by more than one resource")]
    DuplicateBinding { coords: BindingCoords },
    #[error("SPIR-V {0} is outside the supported range")]
    UnsupportedVersion(spvexec_asm::ModuleVersion),
    #[error("push constant block is {0} bytes; it must be a non-zero multiple of 4")]
    PushConstantSize(usize),
    #[error("specialization block is {actual} bytes but its entries add up to {expected}")]
    SpecializationLength { expected: usize, actual: usize },
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Failure to turn an assembled module and its resources into device objects. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("out of device memory: {0}")]
    OutOfMemory(String),
    #[error("resource {index} ({coords}): kind {kind:?} is not supported here: {reason}")]
    UnsupportedKind {
        index: usize,
        coords: BindingCoords,
        kind: ResourceKind,
        reason: &'static str,
    },
    #[error("{coords}: {reason}")]
    UnsupportedBinding {
        coords: BindingCoords,
        reason: String,
    },
    #[error("resource {index} ({coords}): buffer creation failed: {reason}")]
    BufferCreation {
        index: usize,
        coords: BindingCoords,
        reason: String,
    },
    #[error("{coords} is bound more than once")]
    DuplicateBinding { coords: BindingCoords },
    #[error("push constant block of {size} bytes exceeds the device limit of {max}")]
    PushConstants { size: u32, max: u32 },
    #[error("specialization failed: {0}")]
    Specialization(#[from] spvexec_asm::SpecializeError),
    #[error("shader module creation failed: {0}")]
    ShaderModule(String),
    #[error("pipeline creation failed: {0}")]
    PipelineCreation(String),
}

/// Device misbehavior during or after submission. Always fatal for the specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device did not complete the submission within {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("device lost: {reason}")]
    Lost { reason: String },
    #[error("map_async callback dropped unexpectedly")]
    MapAsyncDropped,
    #[error("map_async failed: {0}")]
    MapAsync(String),
    #[error("command submission rejected: {0}")]
    Validation(String),
}

/// Failure to bring up the shared execution context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("wgpu adapter not found (backends: {0:?})")]
    AdapterNotFound(wgpu::Backends),
    #[error("request_device failed: {0}")]
    RequestDevice(String),
}

/// Fatal errors from the pipeline stages, each routed straight to a failing verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("resource binding failed: {0}")]
    Resource(#[from] ResourceError),
    #[error("dispatch failed: {0}")]
    Device(#[from] DeviceError),
}
