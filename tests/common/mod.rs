//! Shared helpers for the GPU end-to-end tests.

use std::sync::{Arc, OnceLock};

use spvexec::{ExecutionContext, HarnessConfig};

pub fn skip_or_panic(test_name: &str, reason: &str) {
    if spvexec::config::require_gpu() {
        panic!("SPVEXEC_REQUIRE_GPU is enabled but {test_name} cannot run: {reason}");
    }
    eprintln!("skipping {test_name}: {reason}");
}

/// One device per test binary. Some drivers misbehave when devices are created and dropped
/// repeatedly within a process.
pub fn shared_context(test_name: &str) -> Option<Arc<ExecutionContext>> {
    static CONTEXT: OnceLock<Result<Arc<ExecutionContext>, String>> = OnceLock::new();

    let context = CONTEXT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
        ExecutionContext::new_blocking(HarnessConfig::from_env())
            .map(Arc::new)
            .map_err(|err| err.to_string())
    });
    match context {
        Ok(context) => Some(Arc::clone(context)),
        Err(reason) => {
            skip_or_panic(test_name, reason);
            None
        }
    }
}

#[allow(dead_code)]
/// `out[i] = -in[i]` over `BufferBlock` storage, one invocation per element.
pub const NEGATE_F32: &str = r#"
               OpCapability Shader
               OpMemoryModel Logical GLSL450
               OpEntryPoint GLCompute %main "main" %id
               OpExecutionMode %main LocalSize 1 1 1
               OpSource GLSL 430
               OpName %main "main"
               OpName %id "gl_GlobalInvocationID"
               OpDecorate %id BuiltIn GlobalInvocationId
               OpDecorate %buf BufferBlock
               OpDecorate %indata DescriptorSet 0
               OpDecorate %indata Binding 0
               OpDecorate %outdata DescriptorSet 0
               OpDecorate %outdata Binding 1
               OpDecorate %f32arr ArrayStride 4
               OpMemberDecorate %buf 0 Offset 0
       %void = OpTypeVoid
      %voidf = OpTypeFunction %void
        %u32 = OpTypeInt 32 0
        %i32 = OpTypeInt 32 1
        %f32 = OpTypeFloat 32
      %uvec3 = OpTypeVector %u32 3
   %uvec3ptr = OpTypePointer Input %uvec3
     %f32ptr = OpTypePointer Uniform %f32
     %f32arr = OpTypeRuntimeArray %f32
        %buf = OpTypeStruct %f32arr
     %bufptr = OpTypePointer Uniform %buf
     %indata = OpVariable %bufptr Uniform
    %outdata = OpVariable %bufptr Uniform
         %id = OpVariable %uvec3ptr Input
       %zero = OpConstant %i32 0
       %main = OpFunction %void None %voidf
      %label = OpLabel
      %idval = OpLoad %uvec3 %id
          %x = OpCompositeExtract %u32 %idval 0
      %inloc = OpAccessChain %f32ptr %indata %zero %x
      %inval = OpLoad %f32 %inloc
        %neg = OpFNegate %f32 %inval
     %outloc = OpAccessChain %f32ptr %outdata %zero %x
               OpStore %outloc %neg
               OpReturn
               OpFunctionEnd
"#;

#[allow(dead_code)]
/// Deterministic inputs in `[-50, 50)` with a fractional part.
pub fn sample_floats(count: usize) -> Vec<f32> {
    (0..count).map(|i| (i as f32 - 50.0) + 0.25).collect()
}
