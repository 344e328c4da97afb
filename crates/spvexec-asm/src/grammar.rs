//! Instruction and operand tables for the core SPIR-V subset accepted by the text assembler.
//!
//! Opcode numbers come from [`spirv::Op`]. Enumerant values are listed explicitly.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::version::ModuleVersion;

/// Logical operand kinds, in the order they appear in an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperandKind {
    ResultType,
    Result,
    Id,
    OptionalId,
    /// Zero or more ids until the end of the instruction.
    IdList,
    LiteralInt,
    /// Zero or more literal integers until the end of the instruction.
    LiteralIntList,
    LiteralString,
    OptionalLiteralString,
    /// A number whose width and encoding follow the instruction's result type.
    ContextNumber,
    Enum(EnumKind),
    Mask(MaskKind),
    OptionalMask(MaskKind),
    /// Instruction number within an imported extended instruction set.
    ExtInstOp,
    /// `OpSwitch` literal/label pairs, typed by the selector.
    SwitchTargets,
    /// The opcode operated on by `OpSpecConstantOp`.
    SpecOpcode,
    /// Remaining ids or literals of `OpSpecConstantOp`.
    IdOrLiteralList,
}

/// Extra operands introduced by an enumerant or mask bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Param {
    Literal,
    Id,
    Enum(EnumKind),
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EnumKind {
    Capability,
    SourceLanguage,
    ExecutionModel,
    AddressingModel,
    MemoryModel,
    ExecutionMode,
    StorageClass,
    Decoration,
    BuiltIn,
    FpRoundingMode,
    GroupOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MaskKind {
    FunctionControl,
    SelectionControl,
    LoopControl,
    MemoryAccess,
}

#[derive(Debug)]
pub(crate) struct Enumerant {
    pub name: &'static str,
    pub value: u32,
    pub params: &'static [Param],
}

#[derive(Debug)]
pub(crate) struct OpInfo {
    /// Name without the `Op` prefix.
    pub name: &'static str,
    pub opcode: u16,
    pub operands: &'static [OperandKind],
    /// First module version containing the instruction.
    pub since: ModuleVersion,
}

macro_rules! enumerants {
    ($($name:literal = $value:expr $(=> [$($param:expr),* $(,)?])?),* $(,)?) => {
        &[$(Enumerant {
            name: $name,
            value: $value,
            params: &[$($($param),*)?],
        }),*]
    };
}

use OperandKind as K;
use Param as P;

const RT_R_ID: &[OperandKind] = &[K::ResultType, K::Result, K::Id];
const RT_R_ID_ID: &[OperandKind] = &[K::ResultType, K::Result, K::Id, K::Id];
const RT_R_ID_ID_ID: &[OperandKind] = &[K::ResultType, K::Result, K::Id, K::Id, K::Id];
const ATOMIC_RMW: &[OperandKind] = &[K::ResultType, K::Result, K::Id, K::Id, K::Id, K::Id];
const GROUP_ARITH: &[OperandKind] = &[
    K::ResultType,
    K::Result,
    K::Id,
    K::Enum(EnumKind::GroupOperation),
    K::OptionalId,
];

macro_rules! op {
    ($name:ident, $operands:expr) => {
        op!($name, $operands, ModuleVersion::V1_0)
    };
    ($name:ident, $operands:expr, $since:expr) => {
        OpInfo {
            name: stringify!($name),
            opcode: spirv::Op::$name as u16,
            operands: $operands,
            since: $since,
        }
    };
}

static OPS: &[OpInfo] = &[
    op!(Nop, &[]),
    op!(Undef, &[K::ResultType, K::Result]),
    op!(
        Source,
        &[
            K::Enum(EnumKind::SourceLanguage),
            K::LiteralInt,
            K::OptionalId,
            K::OptionalLiteralString
        ]
    ),
    op!(SourceExtension, &[K::LiteralString]),
    op!(Name, &[K::Id, K::LiteralString]),
    op!(MemberName, &[K::Id, K::LiteralInt, K::LiteralString]),
    op!(String, &[K::Result, K::LiteralString]),
    op!(Line, &[K::Id, K::LiteralInt, K::LiteralInt]),
    op!(NoLine, &[]),
    op!(Extension, &[K::LiteralString]),
    op!(ExtInstImport, &[K::Result, K::LiteralString]),
    op!(
        ExtInst,
        &[K::ResultType, K::Result, K::Id, K::ExtInstOp, K::IdList]
    ),
    op!(
        MemoryModel,
        &[
            K::Enum(EnumKind::AddressingModel),
            K::Enum(EnumKind::MemoryModel)
        ]
    ),
    op!(
        EntryPoint,
        &[
            K::Enum(EnumKind::ExecutionModel),
            K::Id,
            K::LiteralString,
            K::IdList
        ]
    ),
    op!(ExecutionMode, &[K::Id, K::Enum(EnumKind::ExecutionMode)]),
    op!(
        ExecutionModeId,
        &[K::Id, K::Enum(EnumKind::ExecutionMode)],
        ModuleVersion::V1_2
    ),
    op!(Capability, &[K::Enum(EnumKind::Capability)]),
    op!(TypeVoid, &[K::Result]),
    op!(TypeBool, &[K::Result]),
    op!(TypeInt, &[K::Result, K::LiteralInt, K::LiteralInt]),
    op!(TypeFloat, &[K::Result, K::LiteralInt]),
    op!(TypeVector, &[K::Result, K::Id, K::LiteralInt]),
    op!(TypeMatrix, &[K::Result, K::Id, K::LiteralInt]),
    op!(TypeArray, &[K::Result, K::Id, K::Id]),
    op!(TypeRuntimeArray, &[K::Result, K::Id]),
    op!(TypeStruct, &[K::Result, K::IdList]),
    op!(
        TypePointer,
        &[K::Result, K::Enum(EnumKind::StorageClass), K::Id]
    ),
    op!(TypeFunction, &[K::Result, K::Id, K::IdList]),
    op!(
        TypeForwardPointer,
        &[K::Id, K::Enum(EnumKind::StorageClass)]
    ),
    op!(ConstantTrue, &[K::ResultType, K::Result]),
    op!(ConstantFalse, &[K::ResultType, K::Result]),
    op!(Constant, &[K::ResultType, K::Result, K::ContextNumber]),
    op!(ConstantComposite, &[K::ResultType, K::Result, K::IdList]),
    op!(ConstantNull, &[K::ResultType, K::Result]),
    op!(SpecConstantTrue, &[K::ResultType, K::Result]),
    op!(SpecConstantFalse, &[K::ResultType, K::Result]),
    op!(SpecConstant, &[K::ResultType, K::Result, K::ContextNumber]),
    op!(SpecConstantComposite, &[K::ResultType, K::Result, K::IdList]),
    op!(
        SpecConstantOp,
        &[K::ResultType, K::Result, K::SpecOpcode, K::IdOrLiteralList]
    ),
    op!(
        Function,
        &[
            K::ResultType,
            K::Result,
            K::Mask(MaskKind::FunctionControl),
            K::Id
        ]
    ),
    op!(FunctionParameter, &[K::ResultType, K::Result]),
    op!(FunctionEnd, &[]),
    op!(FunctionCall, &[K::ResultType, K::Result, K::Id, K::IdList]),
    op!(
        Variable,
        &[
            K::ResultType,
            K::Result,
            K::Enum(EnumKind::StorageClass),
            K::OptionalId
        ]
    ),
    op!(
        Load,
        &[
            K::ResultType,
            K::Result,
            K::Id,
            K::OptionalMask(MaskKind::MemoryAccess)
        ]
    ),
    op!(
        Store,
        &[K::Id, K::Id, K::OptionalMask(MaskKind::MemoryAccess)]
    ),
    op!(
        CopyMemory,
        &[K::Id, K::Id, K::OptionalMask(MaskKind::MemoryAccess)]
    ),
    op!(AccessChain, &[K::ResultType, K::Result, K::Id, K::IdList]),
    op!(
        InBoundsAccessChain,
        &[K::ResultType, K::Result, K::Id, K::IdList]
    ),
    op!(
        PtrAccessChain,
        &[K::ResultType, K::Result, K::Id, K::Id, K::IdList]
    ),
    op!(ArrayLength, &[K::ResultType, K::Result, K::Id, K::LiteralInt]),
    op!(Decorate, &[K::Id, K::Enum(EnumKind::Decoration)]),
    op!(
        MemberDecorate,
        &[K::Id, K::LiteralInt, K::Enum(EnumKind::Decoration)]
    ),
    op!(
        DecorateId,
        &[K::Id, K::Enum(EnumKind::Decoration)],
        ModuleVersion::V1_2
    ),
    op!(DecorationGroup, &[K::Result]),
    op!(GroupDecorate, &[K::Id, K::IdList]),
    op!(VectorExtractDynamic, RT_R_ID_ID),
    op!(VectorInsertDynamic, RT_R_ID_ID_ID),
    op!(
        VectorShuffle,
        &[K::ResultType, K::Result, K::Id, K::Id, K::LiteralIntList]
    ),
    op!(CompositeConstruct, &[K::ResultType, K::Result, K::IdList]),
    op!(
        CompositeExtract,
        &[K::ResultType, K::Result, K::Id, K::LiteralIntList]
    ),
    op!(
        CompositeInsert,
        &[K::ResultType, K::Result, K::Id, K::Id, K::LiteralIntList]
    ),
    op!(CopyObject, RT_R_ID),
    op!(Transpose, RT_R_ID),
    op!(ConvertFToU, RT_R_ID),
    op!(ConvertFToS, RT_R_ID),
    op!(ConvertSToF, RT_R_ID),
    op!(ConvertUToF, RT_R_ID),
    op!(UConvert, RT_R_ID),
    op!(SConvert, RT_R_ID),
    op!(FConvert, RT_R_ID),
    op!(QuantizeToF16, RT_R_ID),
    op!(Bitcast, RT_R_ID),
    op!(SNegate, RT_R_ID),
    op!(FNegate, RT_R_ID),
    op!(IAdd, RT_R_ID_ID),
    op!(FAdd, RT_R_ID_ID),
    op!(ISub, RT_R_ID_ID),
    op!(FSub, RT_R_ID_ID),
    op!(IMul, RT_R_ID_ID),
    op!(FMul, RT_R_ID_ID),
    op!(UDiv, RT_R_ID_ID),
    op!(SDiv, RT_R_ID_ID),
    op!(FDiv, RT_R_ID_ID),
    op!(UMod, RT_R_ID_ID),
    op!(SRem, RT_R_ID_ID),
    op!(SMod, RT_R_ID_ID),
    op!(FRem, RT_R_ID_ID),
    op!(FMod, RT_R_ID_ID),
    op!(VectorTimesScalar, RT_R_ID_ID),
    op!(MatrixTimesScalar, RT_R_ID_ID),
    op!(VectorTimesMatrix, RT_R_ID_ID),
    op!(MatrixTimesVector, RT_R_ID_ID),
    op!(MatrixTimesMatrix, RT_R_ID_ID),
    op!(OuterProduct, RT_R_ID_ID),
    op!(Dot, RT_R_ID_ID),
    op!(IAddCarry, RT_R_ID_ID),
    op!(ISubBorrow, RT_R_ID_ID),
    op!(UMulExtended, RT_R_ID_ID),
    op!(SMulExtended, RT_R_ID_ID),
    op!(Any, RT_R_ID),
    op!(All, RT_R_ID),
    op!(IsNan, RT_R_ID),
    op!(IsInf, RT_R_ID),
    op!(LogicalEqual, RT_R_ID_ID),
    op!(LogicalNotEqual, RT_R_ID_ID),
    op!(LogicalOr, RT_R_ID_ID),
    op!(LogicalAnd, RT_R_ID_ID),
    op!(LogicalNot, RT_R_ID),
    op!(Select, RT_R_ID_ID_ID),
    op!(IEqual, RT_R_ID_ID),
    op!(INotEqual, RT_R_ID_ID),
    op!(UGreaterThan, RT_R_ID_ID),
    op!(SGreaterThan, RT_R_ID_ID),
    op!(UGreaterThanEqual, RT_R_ID_ID),
    op!(SGreaterThanEqual, RT_R_ID_ID),
    op!(ULessThan, RT_R_ID_ID),
    op!(SLessThan, RT_R_ID_ID),
    op!(ULessThanEqual, RT_R_ID_ID),
    op!(SLessThanEqual, RT_R_ID_ID),
    op!(FOrdEqual, RT_R_ID_ID),
    op!(FUnordEqual, RT_R_ID_ID),
    op!(FOrdNotEqual, RT_R_ID_ID),
    op!(FUnordNotEqual, RT_R_ID_ID),
    op!(FOrdLessThan, RT_R_ID_ID),
    op!(FUnordLessThan, RT_R_ID_ID),
    op!(FOrdGreaterThan, RT_R_ID_ID),
    op!(FUnordGreaterThan, RT_R_ID_ID),
    op!(FOrdLessThanEqual, RT_R_ID_ID),
    op!(FUnordLessThanEqual, RT_R_ID_ID),
    op!(FOrdGreaterThanEqual, RT_R_ID_ID),
    op!(FUnordGreaterThanEqual, RT_R_ID_ID),
    op!(ShiftRightLogical, RT_R_ID_ID),
    op!(ShiftRightArithmetic, RT_R_ID_ID),
    op!(ShiftLeftLogical, RT_R_ID_ID),
    op!(BitwiseOr, RT_R_ID_ID),
    op!(BitwiseXor, RT_R_ID_ID),
    op!(BitwiseAnd, RT_R_ID_ID),
    op!(Not, RT_R_ID),
    op!(
        BitFieldInsert,
        &[K::ResultType, K::Result, K::Id, K::Id, K::Id, K::Id]
    ),
    op!(BitFieldSExtract, RT_R_ID_ID_ID),
    op!(BitFieldUExtract, RT_R_ID_ID_ID),
    op!(BitReverse, RT_R_ID),
    op!(BitCount, RT_R_ID),
    op!(DPdx, RT_R_ID),
    op!(DPdy, RT_R_ID),
    op!(Fwidth, RT_R_ID),
    op!(ControlBarrier, &[K::Id, K::Id, K::Id]),
    op!(MemoryBarrier, &[K::Id, K::Id]),
    op!(AtomicLoad, RT_R_ID_ID_ID),
    op!(AtomicStore, &[K::Id, K::Id, K::Id, K::Id]),
    op!(AtomicExchange, ATOMIC_RMW),
    op!(
        AtomicCompareExchange,
        &[K::ResultType, K::Result, K::Id, K::Id, K::Id, K::Id, K::Id, K::Id]
    ),
    op!(AtomicIIncrement, RT_R_ID_ID_ID),
    op!(AtomicIDecrement, RT_R_ID_ID_ID),
    op!(AtomicIAdd, ATOMIC_RMW),
    op!(AtomicISub, ATOMIC_RMW),
    op!(AtomicSMin, ATOMIC_RMW),
    op!(AtomicUMin, ATOMIC_RMW),
    op!(AtomicSMax, ATOMIC_RMW),
    op!(AtomicUMax, ATOMIC_RMW),
    op!(AtomicAnd, ATOMIC_RMW),
    op!(AtomicOr, ATOMIC_RMW),
    op!(AtomicXor, ATOMIC_RMW),
    op!(Phi, &[K::ResultType, K::Result, K::IdList]),
    op!(
        LoopMerge,
        &[K::Id, K::Id, K::Mask(MaskKind::LoopControl)]
    ),
    op!(
        SelectionMerge,
        &[K::Id, K::Mask(MaskKind::SelectionControl)]
    ),
    op!(Label, &[K::Result]),
    op!(Branch, &[K::Id]),
    op!(
        BranchConditional,
        &[K::Id, K::Id, K::Id, K::LiteralIntList]
    ),
    op!(Switch, &[K::Id, K::Id, K::SwitchTargets]),
    op!(Kill, &[]),
    op!(Return, &[]),
    op!(ReturnValue, &[K::Id]),
    op!(Unreachable, &[]),
    op!(ModuleProcessed, &[K::LiteralString], ModuleVersion::V1_1),
    op!(
        GroupNonUniformElect,
        &[K::ResultType, K::Result, K::Id],
        ModuleVersion::V1_3
    ),
    op!(GroupNonUniformAll, RT_R_ID_ID, ModuleVersion::V1_3),
    op!(GroupNonUniformAny, RT_R_ID_ID, ModuleVersion::V1_3),
    op!(GroupNonUniformBroadcast, RT_R_ID_ID_ID, ModuleVersion::V1_3),
    op!(GroupNonUniformIAdd, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformFAdd, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformIMul, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformFMul, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformSMin, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformUMin, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformFMin, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformSMax, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformUMax, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformFMax, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformBitwiseAnd, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformBitwiseOr, GROUP_ARITH, ModuleVersion::V1_3),
    op!(GroupNonUniformBitwiseXor, GROUP_ARITH, ModuleVersion::V1_3),
];

static CAPABILITIES: &[Enumerant] = enumerants![
    "Matrix" = 0,
    "Shader" = 1,
    "Geometry" = 2,
    "Tessellation" = 3,
    "Addresses" = 4,
    "Linkage" = 5,
    "Kernel" = 6,
    "Float16" = 9,
    "Float64" = 10,
    "Int64" = 11,
    "Int64Atomics" = 12,
    "Int16" = 22,
    "ClipDistance" = 32,
    "CullDistance" = 33,
    "SampleRateShading" = 35,
    "Int8" = 39,
    "StorageImageExtendedFormats" = 49,
    "ImageQuery" = 50,
    "DerivativeControl" = 51,
    "StorageImageReadWithoutFormat" = 55,
    "StorageImageWriteWithoutFormat" = 56,
    "GroupNonUniform" = 61,
    "GroupNonUniformVote" = 62,
    "GroupNonUniformArithmetic" = 63,
    "GroupNonUniformBallot" = 64,
    "GroupNonUniformShuffle" = 65,
    "GroupNonUniformShuffleRelative" = 66,
    "GroupNonUniformClustered" = 67,
    "GroupNonUniformQuad" = 68,
    "DrawParameters" = 4427,
    "StorageBuffer16BitAccess" = 4433,
    "UniformAndStorageBuffer16BitAccess" = 4434,
    "StoragePushConstant16" = 4435,
    "StorageInputOutput16" = 4436,
    "DeviceGroup" = 4437,
    "MultiView" = 4439,
    "VariablePointersStorageBuffer" = 4441,
    "VariablePointers" = 4442,
    "StorageBuffer8BitAccess" = 4448,
    "UniformAndStorageBuffer8BitAccess" = 4449,
    "StoragePushConstant8" = 4450,
    "DenormPreserve" = 4464,
    "DenormFlushToZero" = 4465,
    "SignedZeroInfNanPreserve" = 4466,
    "RoundingModeRTE" = 4467,
    "RoundingModeRTZ" = 4468,
    "ShaderNonUniform" = 5301,
    "RuntimeDescriptorArray" = 5302,
    "VulkanMemoryModel" = 5345,
    "VulkanMemoryModelDeviceScope" = 5346,
    "PhysicalStorageBufferAddresses" = 5347,
];

static SOURCE_LANGUAGES: &[Enumerant] = enumerants![
    "Unknown" = 0,
    "ESSL" = 1,
    "GLSL" = 2,
    "OpenCL_C" = 3,
    "OpenCL_CPP" = 4,
    "HLSL" = 5,
];

static EXECUTION_MODELS: &[Enumerant] = enumerants![
    "Vertex" = 0,
    "TessellationControl" = 1,
    "TessellationEvaluation" = 2,
    "Geometry" = 3,
    "Fragment" = 4,
    "GLCompute" = 5,
    "Kernel" = 6,
];

static ADDRESSING_MODELS: &[Enumerant] = enumerants![
    "Logical" = 0,
    "Physical32" = 1,
    "Physical64" = 2,
    "PhysicalStorageBuffer64" = 5348,
];

static MEMORY_MODELS: &[Enumerant] = enumerants![
    "Simple" = 0,
    "GLSL450" = 1,
    "OpenCL" = 2,
    "Vulkan" = 3,
];

static EXECUTION_MODES: &[Enumerant] = enumerants![
    "Invocations" = 0 => [P::Literal],
    "SpacingEqual" = 1,
    "SpacingFractionalEven" = 2,
    "SpacingFractionalOdd" = 3,
    "VertexOrderCw" = 4,
    "VertexOrderCcw" = 5,
    "PixelCenterInteger" = 6,
    "OriginUpperLeft" = 7,
    "OriginLowerLeft" = 8,
    "EarlyFragmentTests" = 9,
    "PointMode" = 10,
    "Xfb" = 11,
    "DepthReplacing" = 12,
    "DepthGreater" = 14,
    "DepthLess" = 15,
    "DepthUnchanged" = 16,
    "LocalSize" = 17 => [P::Literal, P::Literal, P::Literal],
    "LocalSizeHint" = 18 => [P::Literal, P::Literal, P::Literal],
    "InputPoints" = 19,
    "InputLines" = 20,
    "InputLinesAdjacency" = 21,
    "Triangles" = 22,
    "InputTrianglesAdjacency" = 23,
    "Quads" = 24,
    "Isolines" = 25,
    "OutputVertices" = 26 => [P::Literal],
    "OutputPoints" = 27,
    "OutputLineStrip" = 28,
    "OutputTriangleStrip" = 29,
    "ContractionOff" = 31,
    "SubgroupSize" = 35 => [P::Literal],
    "SubgroupsPerWorkgroup" = 36 => [P::Literal],
    "SubgroupsPerWorkgroupId" = 37 => [P::Id],
    "LocalSizeId" = 38 => [P::Id, P::Id, P::Id],
    "LocalSizeHintId" = 39 => [P::Id, P::Id, P::Id],
    "DenormPreserve" = 4459 => [P::Literal],
    "DenormFlushToZero" = 4460 => [P::Literal],
    "SignedZeroInfNanPreserve" = 4461 => [P::Literal],
    "RoundingModeRTE" = 4462 => [P::Literal],
    "RoundingModeRTZ" = 4463 => [P::Literal],
];

static STORAGE_CLASSES: &[Enumerant] = enumerants![
    "UniformConstant" = 0,
    "Input" = 1,
    "Uniform" = 2,
    "Output" = 3,
    "Workgroup" = 4,
    "CrossWorkgroup" = 5,
    "Private" = 6,
    "Function" = 7,
    "Generic" = 8,
    "PushConstant" = 9,
    "AtomicCounter" = 10,
    "Image" = 11,
    "StorageBuffer" = 12,
    "PhysicalStorageBuffer" = 5349,
];

static DECORATIONS: &[Enumerant] = enumerants![
    "RelaxedPrecision" = 0,
    "SpecId" = 1 => [P::Literal],
    "Block" = 2,
    "BufferBlock" = 3,
    "RowMajor" = 4,
    "ColMajor" = 5,
    "ArrayStride" = 6 => [P::Literal],
    "MatrixStride" = 7 => [P::Literal],
    "GLSLShared" = 8,
    "GLSLPacked" = 9,
    "CPacked" = 10,
    "BuiltIn" = 11 => [P::Enum(EnumKind::BuiltIn)],
    "NoPerspective" = 13,
    "Flat" = 14,
    "Patch" = 15,
    "Centroid" = 16,
    "Sample" = 17,
    "Invariant" = 18,
    "Restrict" = 19,
    "Aliased" = 20,
    "Volatile" = 21,
    "Constant" = 22,
    "Coherent" = 23,
    "NonWritable" = 24,
    "NonReadable" = 25,
    "Uniform" = 26,
    "UniformId" = 27 => [P::Id],
    "SaturatedConversion" = 28,
    "Stream" = 29 => [P::Literal],
    "Location" = 30 => [P::Literal],
    "Component" = 31 => [P::Literal],
    "Index" = 32 => [P::Literal],
    "Binding" = 33 => [P::Literal],
    "DescriptorSet" = 34 => [P::Literal],
    "Offset" = 35 => [P::Literal],
    "XfbBuffer" = 36 => [P::Literal],
    "XfbStride" = 37 => [P::Literal],
    "FuncParamAttr" = 38 => [P::Literal],
    "FPRoundingMode" = 39 => [P::Enum(EnumKind::FpRoundingMode)],
    "FPFastMathMode" = 40 => [P::Literal],
    "LinkageAttributes" = 41 => [P::String, P::Literal],
    "NoContraction" = 42,
    "InputAttachmentIndex" = 43 => [P::Literal],
    "Alignment" = 44 => [P::Literal],
    "MaxByteOffset" = 45 => [P::Literal],
    "AlignmentId" = 46 => [P::Id],
    "MaxByteOffsetId" = 47 => [P::Id],
    "NoSignedWrap" = 4469,
    "NoUnsignedWrap" = 4470,
    "NonUniform" = 5300,
    "RestrictPointer" = 5355,
    "AliasedPointer" = 5356,
];

static BUILT_INS: &[Enumerant] = enumerants![
    "Position" = 0,
    "PointSize" = 1,
    "ClipDistance" = 3,
    "CullDistance" = 4,
    "VertexId" = 5,
    "InstanceId" = 6,
    "PrimitiveId" = 7,
    "InvocationId" = 8,
    "Layer" = 9,
    "ViewportIndex" = 10,
    "TessLevelOuter" = 11,
    "TessLevelInner" = 12,
    "TessCoord" = 13,
    "PatchVertices" = 14,
    "FragCoord" = 15,
    "PointCoord" = 16,
    "FrontFacing" = 17,
    "SampleId" = 18,
    "SamplePosition" = 19,
    "SampleMask" = 20,
    "FragDepth" = 22,
    "HelperInvocation" = 23,
    "NumWorkgroups" = 24,
    "WorkgroupSize" = 25,
    "WorkgroupId" = 26,
    "LocalInvocationId" = 27,
    "GlobalInvocationId" = 28,
    "LocalInvocationIndex" = 29,
    "SubgroupSize" = 36,
    "NumSubgroups" = 38,
    "SubgroupId" = 40,
    "SubgroupLocalInvocationId" = 41,
    "VertexIndex" = 42,
    "InstanceIndex" = 43,
    "SubgroupEqMask" = 4416,
    "SubgroupGeMask" = 4417,
    "SubgroupGtMask" = 4418,
    "SubgroupLeMask" = 4419,
    "SubgroupLtMask" = 4420,
    "BaseVertex" = 4424,
    "BaseInstance" = 4425,
    "DrawIndex" = 4426,
    "DeviceIndex" = 4438,
    "ViewIndex" = 4440,
];

static FP_ROUNDING_MODES: &[Enumerant] = enumerants![
    "RTE" = 0,
    "RTZ" = 1,
    "RTP" = 2,
    "RTN" = 3,
];

static GROUP_OPERATIONS: &[Enumerant] = enumerants![
    "Reduce" = 0,
    "InclusiveScan" = 1,
    "ExclusiveScan" = 2,
    "ClusteredReduce" = 3,
];

static FUNCTION_CONTROL: &[Enumerant] = enumerants![
    "None" = 0,
    "Inline" = 0x1,
    "DontInline" = 0x2,
    "Pure" = 0x4,
    "Const" = 0x8,
];

static SELECTION_CONTROL: &[Enumerant] = enumerants![
    "None" = 0,
    "Flatten" = 0x1,
    "DontFlatten" = 0x2,
];

static LOOP_CONTROL: &[Enumerant] = enumerants![
    "None" = 0,
    "Unroll" = 0x1,
    "DontUnroll" = 0x2,
    "DependencyInfinite" = 0x4,
    "DependencyLength" = 0x8 => [P::Literal],
    "MinIterations" = 0x10 => [P::Literal],
    "MaxIterations" = 0x20 => [P::Literal],
    "IterationMultiple" = 0x40 => [P::Literal],
    "PeelCount" = 0x80 => [P::Literal],
    "PartialCount" = 0x100 => [P::Literal],
];

static MEMORY_ACCESS: &[Enumerant] = enumerants![
    "None" = 0,
    "Volatile" = 0x1,
    "Aligned" = 0x2 => [P::Literal],
    "Nontemporal" = 0x4,
    "MakePointerAvailable" = 0x8 => [P::Id],
    "MakePointerVisible" = 0x10 => [P::Id],
    "NonPrivatePointer" = 0x20,
];

/// `GLSL.std.450` instruction names; the instruction number is the position plus one.
static GLSL_STD_450: &[&str] = &[
    "Round",
    "RoundEven",
    "Trunc",
    "FAbs",
    "SAbs",
    "FSign",
    "SSign",
    "Floor",
    "Ceil",
    "Fract",
    "Radians",
    "Degrees",
    "Sin",
    "Cos",
    "Tan",
    "Asin",
    "Acos",
    "Atan",
    "Sinh",
    "Cosh",
    "Tanh",
    "Asinh",
    "Acosh",
    "Atanh",
    "Atan2",
    "Pow",
    "Exp",
    "Log",
    "Exp2",
    "Log2",
    "Sqrt",
    "InverseSqrt",
    "Determinant",
    "MatrixInverse",
    "Modf",
    "ModfStruct",
    "FMin",
    "UMin",
    "SMin",
    "FMax",
    "UMax",
    "SMax",
    "FClamp",
    "UClamp",
    "SClamp",
    "FMix",
    "IMix",
    "Step",
    "SmoothStep",
    "Fma",
    "Frexp",
    "FrexpStruct",
    "Ldexp",
    "PackSnorm4x8",
    "PackUnorm4x8",
    "PackSnorm2x16",
    "PackUnorm2x16",
    "PackHalf2x16",
    "PackDouble2x32",
    "UnpackSnorm2x16",
    "UnpackUnorm2x16",
    "UnpackHalf2x16",
    "UnpackSnorm4x8",
    "UnpackUnorm4x8",
    "UnpackDouble2x32",
    "Length",
    "Distance",
    "Cross",
    "Normalize",
    "FaceForward",
    "Reflect",
    "Refract",
    "FindILsb",
    "FindSMsb",
    "FindUMsb",
    "InterpolateAtCentroid",
    "InterpolateAtSample",
    "InterpolateAtOffset",
    "NMin",
    "NMax",
    "NClamp",
];

pub(crate) const GLSL_STD_450_SET: &str = "GLSL.std.450";

fn op_index() -> &'static HashMap<&'static str, &'static OpInfo> {
    static INDEX: OnceLock<HashMap<&'static str, &'static OpInfo>> = OnceLock::new();
    INDEX.get_or_init(|| OPS.iter().map(|op| (op.name, op)).collect())
}

/// Looks up an instruction by name, with or without the `Op` prefix.
pub(crate) fn lookup_op(name: &str) -> Option<&'static OpInfo> {
    let bare = name.strip_prefix("Op").unwrap_or(name);
    op_index().get(bare).copied()
}

pub(crate) fn enumerants(kind: EnumKind) -> &'static [Enumerant] {
    match kind {
        EnumKind::Capability => CAPABILITIES,
        EnumKind::SourceLanguage => SOURCE_LANGUAGES,
        EnumKind::ExecutionModel => EXECUTION_MODELS,
        EnumKind::AddressingModel => ADDRESSING_MODELS,
        EnumKind::MemoryModel => MEMORY_MODELS,
        EnumKind::ExecutionMode => EXECUTION_MODES,
        EnumKind::StorageClass => STORAGE_CLASSES,
        EnumKind::Decoration => DECORATIONS,
        EnumKind::BuiltIn => BUILT_INS,
        EnumKind::FpRoundingMode => FP_ROUNDING_MODES,
        EnumKind::GroupOperation => GROUP_OPERATIONS,
    }
}

pub(crate) fn mask_bits(kind: MaskKind) -> &'static [Enumerant] {
    match kind {
        MaskKind::FunctionControl => FUNCTION_CONTROL,
        MaskKind::SelectionControl => SELECTION_CONTROL,
        MaskKind::LoopControl => LOOP_CONTROL,
        MaskKind::MemoryAccess => MEMORY_ACCESS,
    }
}

pub(crate) fn lookup_enumerant(kind: EnumKind, name: &str) -> Option<&'static Enumerant> {
    enumerants(kind).iter().find(|e| e.name == name)
}

pub(crate) fn lookup_enumerant_value(kind: EnumKind, value: u32) -> Option<&'static Enumerant> {
    enumerants(kind).iter().find(|e| e.value == value)
}

pub(crate) fn lookup_glsl_std_450(name: &str) -> Option<u32> {
    GLSL_STD_450
        .iter()
        .position(|n| *n == name)
        .map(|idx| idx as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_lookup_accepts_prefixed_and_bare_names() {
        let fneg = lookup_op("OpFNegate").expect("OpFNegate");
        assert_eq!(fneg.opcode, 127);
        assert_eq!(lookup_op("FNegate").map(|op| op.opcode), Some(127));
        assert!(lookup_op("OpDoesNotExist").is_none());
    }

    #[test]
    fn well_known_opcodes_match_the_core_numbering() {
        for (name, opcode) in [
            ("OpCapability", 17),
            ("OpEntryPoint", 15),
            ("OpDecorate", 71),
            ("OpTypeInt", 21),
            ("OpConstant", 43),
            ("OpSpecConstant", 50),
            ("OpLoad", 61),
            ("OpStore", 62),
            ("OpAccessChain", 65),
            ("OpReturn", 253),
            ("OpModuleProcessed", 330),
        ] {
            assert_eq!(lookup_op(name).map(|op| op.opcode), Some(opcode), "{name}");
        }
    }

    #[test]
    fn op_names_are_unique() {
        assert_eq!(op_index().len(), OPS.len());
    }

    #[test]
    fn glsl_std_450_numbering_is_one_based() {
        assert_eq!(lookup_glsl_std_450("Round"), Some(1));
        assert_eq!(lookup_glsl_std_450("FAbs"), Some(4));
        assert_eq!(lookup_glsl_std_450("Fma"), Some(50));
        assert_eq!(lookup_glsl_std_450("NClamp"), Some(81));
    }

    #[test]
    fn decoration_parameters_are_declared() {
        let binding = lookup_enumerant(EnumKind::Decoration, "Binding").unwrap();
        assert_eq!(binding.value, 33);
        assert_eq!(binding.params, &[Param::Literal]);
        let builtin = lookup_enumerant(EnumKind::Decoration, "BuiltIn").unwrap();
        assert_eq!(builtin.params, &[Param::Enum(EnumKind::BuiltIn)]);
    }
}
