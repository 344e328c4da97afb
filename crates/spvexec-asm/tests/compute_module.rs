use pretty_assertions::assert_eq;
use spvexec_asm::{
    assemble, specialize, Assemble, BinaryModule, CachingAssembler, ModuleVersion, SpecConstant,
    SpecValue, TextAssembler, MAGIC,
};

const NEGATE: &str = r#"
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

#[test]
fn negate_shader_assembles_to_a_well_formed_module() {
    let module = assemble(NEGATE, ModuleVersion::V1_0).expect("assemble negate shader");
    assert_eq!(module.words()[0], MAGIC);
    assert_eq!(module.version(), ModuleVersion::V1_0);

    // Every instruction's opcode must be re-readable by a fresh parse.
    let reparsed = BinaryModule::from_bytes(&module.to_bytes()).expect("reparse");
    assert_eq!(reparsed.instructions().count(), module.instructions().count());

    let entries = module.entry_points();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "main");

    // 23 distinct names, numbered from 1.
    assert_eq!(module.bound(), 24);
    assert_eq!(
        module.string_literals(),
        vec!["main", "main", "gl_GlobalInvocationID"]
    );
}

#[test]
fn assembly_is_deterministic_across_calls_and_assemblers() {
    let a = TextAssembler.assemble(NEGATE, ModuleVersion::V1_3).unwrap();
    let b = TextAssembler.assemble(NEGATE, ModuleVersion::V1_3).unwrap();
    assert_eq!(a.words(), b.words());

    let cached = CachingAssembler::new(TextAssembler, 8);
    let c = cached.assemble(NEGATE, ModuleVersion::V1_3).unwrap();
    let d = cached.assemble(NEGATE, ModuleVersion::V1_3).unwrap();
    assert_eq!(a, c);
    assert_eq!(c, d);
    assert_eq!(cached.stats().hits, 1);
}

#[test]
fn version_only_changes_the_header_version_word() {
    let v10 = assemble(NEGATE, ModuleVersion::V1_0).unwrap();
    let v13 = assemble(NEGATE, ModuleVersion::V1_3).unwrap();
    assert_eq!(v10.words()[1], 0x0001_0000);
    assert_eq!(v13.words()[1], 0x0001_0300);
    assert_eq!(&v10.words()[2..], &v13.words()[2..]);
}

#[test]
fn assembly_errors_point_at_the_offending_line() {
    let broken = NEGATE.replace("OpFNegate %f32 %inval", "OpFNegate %f32 %inval %extra");
    let err = assemble(&broken, ModuleVersion::V1_0).unwrap_err();
    assert!(err.source_line.contains("OpFNegate"), "{err:?}");
    assert!(err.message.contains("%extra"), "{err:?}");
}

#[test]
fn specialization_patches_a_compute_workgroup_constant() {
    let source = r#"
               OpCapability Shader
               OpMemoryModel Logical GLSL450
               OpDecorate %count SpecId 0
        %u32 = OpTypeInt 32 0
      %count = OpSpecConstant %u32 1
"#;
    let module = assemble(source, ModuleVersion::V1_0).unwrap();
    let patched = specialize(
        &module,
        &[SpecConstant {
            spec_id: 0,
            value: SpecValue::Words(vec![64]),
        }],
    )
    .unwrap();
    let constant = patched
        .instructions()
        .find(|inst| inst.is(spirv::Op::SpecConstant))
        .unwrap();
    assert_eq!(constant.operands[2], 64);
}
