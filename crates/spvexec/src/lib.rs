//! Execution harness for SPIR-V assembly conformance tests.
//!
//! A [`TestSpec`] describes one case: assembly text, typed input and expected output buffers,
//! specialization constants and device requirements. [`Harness::run`] gates the case against the
//! device's capabilities, assembles it, binds and dispatches it on a shared wgpu device, reads the
//! outputs back and turns the comparison into a [`Verdict`].
//!
//! Device access goes through the [`ExecutionBackend`] seam so orchestration can be exercised
//! without a GPU.

pub mod backend;
pub mod binder;
pub mod buffer;
pub mod caps;
pub mod classify;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod harness;
pub mod report;
pub mod resource;
pub mod spec;
pub mod specialization;
pub mod verify;

pub use backend::{Execution, ExecutionBackend, GpuBackend};
pub use buffer::{Element, ElementType, ScalarType, ScalarValue, TypedBuffer};
pub use caps::{is_supported, DeviceCaps, DeviceFeatures, GateDecision, Requirements};
pub use classify::{classify, MismatchPolicy, Severity, Verdict, VerdictKind};
pub use config::HarnessConfig;
pub use context::ExecutionContext;
pub use error::{ContextError, DeviceError, HarnessError, ResourceError, SpecError};
pub use harness::{CaseOutcome, Harness, Stage};
pub use report::{RunReport, RunSummary};
pub use resource::{BindingCoords, ResourceDescriptor, ResourceKind};
pub use spec::{DrawParameters, Invocation, TestSpec, TestSpecBuilder};
pub use specialization::SpecializationBlock;
pub use verify::{
    BinaryVerifier, ByteExact, DiagnosticLog, OutputVerifier, StringsInOrder, VerifyOutcome,
};

pub use spvexec_asm as asm;
