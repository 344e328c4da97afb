use std::sync::Arc;
use std::time::Duration;

use spvexec_asm::BinaryModule;
use tracing::trace;

use crate::binder;
use crate::caps::DeviceCaps;
use crate::context::ExecutionContext;
use crate::dispatch;
use crate::error::HarnessError;
use crate::spec::TestSpec;

/// Read-back of one executed specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Output bytes, one entry per declared output, each exactly its declared length.
    pub outputs: Vec<Vec<u8>>,
    pub device_time: Duration,
}

/// Where assembled modules run.
pub trait ExecutionBackend {
    fn caps(&self) -> &DeviceCaps;

    /// Binds, dispatches and reads back `module` for `spec`. All device objects are released
    /// before this returns.
    fn execute(&self, module: &BinaryModule, spec: &TestSpec) -> Result<Execution, HarnessError>;
}

impl<B: ExecutionBackend + ?Sized> ExecutionBackend for &B {
    fn caps(&self) -> &DeviceCaps {
        (**self).caps()
    }

    fn execute(&self, module: &BinaryModule, spec: &TestSpec) -> Result<Execution, HarnessError> {
        (**self).execute(module, spec)
    }
}

/// Runs on the shared wgpu device.
#[derive(Debug, Clone)]
pub struct GpuBackend {
    context: Arc<ExecutionContext>,
}

impl GpuBackend {
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }
}

impl ExecutionBackend for GpuBackend {
    fn caps(&self) -> &DeviceCaps {
        self.context.caps()
    }

    fn execute(&self, module: &BinaryModule, spec: &TestSpec) -> Result<Execution, HarnessError> {
        let context = &*self.context;
        let _exclusive = context.lock();
        let timeout = context.config().dispatch_timeout;

        let bound = binder::bind(context, module, spec)?;
        let completion = dispatch::run(context, &bound, timeout)?;
        let device_time = completion.elapsed;
        let outputs = completion.read_back(context, timeout)?;
        drop(bound);

        trace!(test = spec.name(), ?device_time, "execution finished");
        Ok(Execution {
            outputs,
            device_time,
        })
    }
}
