//! Immutable test specifications and their builder.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use spvexec_asm::ModuleVersion;

use crate::buffer::TypedBuffer;
use crate::caps::{DeviceFeatures, Requirements};
use crate::classify::MismatchPolicy;
use crate::error::SpecError;
use crate::resource::{BindingCoords, ResourceDescriptor};
use crate::specialization::SpecializationBlock;
use crate::verify::{BinaryVerifier, OutputVerifier};

/// A full-screen draw. The module must declare both entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawParameters {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for DrawParameters {
    fn default() -> Self {
        Self {
            vertex_entry: "main_vs".to_string(),
            fragment_entry: "main_fs".to_string(),
            vertex_count: 4,
            instance_count: 1,
            width: 16,
            height: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Compute { workgroups: [u32; 3] },
    Draw(DrawParameters),
}

/// Everything needed to run one conformance case. Built once, never mutated.
#[derive(Clone)]
pub struct TestSpec {
    name: String,
    source: Arc<str>,
    entry_point: String,
    module_version: ModuleVersion,
    invocation: Invocation,
    inputs: Vec<ResourceDescriptor>,
    outputs: Vec<ResourceDescriptor>,
    push_constants: Option<TypedBuffer>,
    specialization: SpecializationBlock,
    requirements: Requirements,
    verifier: Option<Arc<dyn OutputVerifier>>,
    binary_verifier: Option<Arc<dyn BinaryVerifier>>,
    mismatch_policy: MismatchPolicy,
}

impl fmt::Debug for TestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSpec")
            .field("name", &self.name)
            .field("entry_point", &self.entry_point)
            .field("module_version", &self.module_version)
            .field("invocation", &self.invocation)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("requirements", &self.requirements)
            .field("custom_verifier", &self.verifier.is_some())
            .field("binary_verifier", &self.binary_verifier.is_some())
            .field("mismatch_policy", &self.mismatch_policy)
            .finish_non_exhaustive()
    }
}

impl TestSpec {
    pub fn builder(name: impl Into<String>, source: impl Into<String>) -> TestSpecBuilder {
        TestSpecBuilder::new(name, source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn module_version(&self) -> ModuleVersion {
        self.module_version
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn inputs(&self) -> &[ResourceDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ResourceDescriptor] {
        &self.outputs
    }

    pub fn push_constants(&self) -> Option<&TypedBuffer> {
        self.push_constants.as_ref()
    }

    pub fn specialization(&self) -> &SpecializationBlock {
        &self.specialization
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub fn verifier(&self) -> Option<&dyn OutputVerifier> {
        self.verifier.as_deref()
    }

    pub fn binary_verifier(&self) -> Option<&dyn BinaryVerifier> {
        self.binary_verifier.as_deref()
    }

    pub fn mismatch_policy(&self) -> &MismatchPolicy {
        &self.mismatch_policy
    }

    /// Declared requirements plus those implied by the invocation and the module version.
    pub fn effective_requirements(&self) -> Requirements {
        let mut requirements = self.requirements.clone();
        requirements.features |= match self.invocation {
            Invocation::Compute { .. } => DeviceFeatures::COMPUTE,
            Invocation::Draw(_) if self.outputs.is_empty() => DeviceFeatures::empty(),
            Invocation::Draw(_) => DeviceFeatures::FRAGMENT_STORES,
        };
        if self.push_constants.is_some() {
            requirements.features |= DeviceFeatures::PUSH_CONSTANTS;
        }
        requirements.module_version = requirements.module_version.max(self.module_version);
        requirements
    }
}

pub struct TestSpecBuilder {
    name: String,
    source: String,
    entry_point: String,
    module_version: ModuleVersion,
    invocation: Option<Invocation>,
    invocation_conflict: bool,
    inputs: Vec<ResourceDescriptor>,
    outputs: Vec<ResourceDescriptor>,
    push_constants: Option<TypedBuffer>,
    specialization: SpecializationBlock,
    requirements: Requirements,
    verifier: Option<Arc<dyn OutputVerifier>>,
    binary_verifier: Option<Arc<dyn BinaryVerifier>>,
    mismatch_policy: MismatchPolicy,
}

impl TestSpecBuilder {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            entry_point: "main".to_string(),
            module_version: ModuleVersion::V1_0,
            invocation: None,
            invocation_conflict: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            push_constants: None,
            specialization: SpecializationBlock::new(),
            requirements: Requirements::default(),
            verifier: None,
            binary_verifier: None,
            mismatch_policy: MismatchPolicy::default(),
        }
    }

    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    pub fn module_version(mut self, version: ModuleVersion) -> Self {
        self.module_version = version;
        self
    }

    fn set_invocation(&mut self, invocation: Invocation) {
        if self.invocation.is_some() {
            self.invocation_conflict = true;
        } else {
            self.invocation = Some(invocation);
        }
    }

    pub fn compute(mut self, workgroups: [u32; 3]) -> Self {
        self.set_invocation(Invocation::Compute { workgroups });
        self
    }

    pub fn draw(mut self, params: DrawParameters) -> Self {
        self.set_invocation(Invocation::Draw(params));
        self
    }

    pub fn input(mut self, desc: impl Into<ResourceDescriptor>) -> Self {
        self.inputs.push(desc.into());
        self
    }

    /// Adds an output; `desc.buffer` holds the expected contents.
    pub fn output(mut self, desc: impl Into<ResourceDescriptor>) -> Self {
        self.outputs.push(desc.into());
        self
    }

    pub fn push_constants(mut self, data: TypedBuffer) -> Self {
        self.push_constants = Some(data);
        self
    }

    pub fn specialization(mut self, block: SpecializationBlock) -> Self {
        self.specialization = block;
        self
    }

    pub fn require_features(mut self, features: DeviceFeatures) -> Self {
        self.requirements.features |= features;
        self
    }

    pub fn require_extension(mut self, name: impl Into<String>) -> Self {
        self.requirements.extensions.push(name.into());
        self
    }

    pub fn verifier(mut self, verifier: impl OutputVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    pub fn binary_verifier(mut self, verifier: impl BinaryVerifier + 'static) -> Self {
        self.binary_verifier = Some(Arc::new(verifier));
        self
    }

    pub fn on_mismatch(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    pub fn build(mut self) -> Result<TestSpec, SpecError> {
        if self.invocation_conflict {
            return Err(SpecError::InvocationAlreadySet);
        }
        let invocation = self.invocation.ok_or(SpecError::MissingInvocation)?;
        if let Invocation::Compute { workgroups } = invocation {
            if workgroups.contains(&0) {
                return Err(SpecError::ZeroWorkgroupExtent(workgroups));
            }
        }
        if !self.module_version.is_supported() {
            return Err(SpecError::UnsupportedVersion(self.module_version));
        }
        if let Some(index) = self.outputs.iter().position(|o| o.buffer.byte_len() == 0) {
            return Err(SpecError::EmptyOutput { index });
        }
        if let Some(pc) = &self.push_constants {
            if pc.byte_len() == 0 || pc.byte_len() % 4 != 0 {
                return Err(SpecError::PushConstantSize(pc.byte_len()));
            }
        }
        self.specialization.validate()?;

        // Default coordinates: set 0, binding = position among inputs then outputs.
        let mut seen = HashSet::new();
        for (position, desc) in self
            .inputs
            .iter_mut()
            .chain(self.outputs.iter_mut())
            .enumerate()
        {
            let coords = *desc
                .coords
                .get_or_insert(BindingCoords::new(0, position as u32));
            if !seen.insert(coords) {
                return Err(SpecError::DuplicateBinding { coords });
            }
        }

        Ok(TestSpec {
            name: self.name,
            source: Arc::from(self.source),
            entry_point: self.entry_point,
            module_version: self.module_version,
            invocation,
            inputs: self.inputs,
            outputs: self.outputs,
            push_constants: self.push_constants,
            specialization: self.specialization,
            requirements: self.requirements,
            verifier: self.verifier,
            binary_verifier: self.binary_verifier,
            mismatch_policy: self.mismatch_policy,
        })
    }
}

/// Resources of a spec as `(position, is_output, descriptor)` in binding order.
pub(crate) fn all_resources(
    spec: &TestSpec,
) -> impl Iterator<Item = (usize, bool, &ResourceDescriptor)> {
    let inputs = spec.inputs.len();
    spec.inputs
        .iter()
        .chain(spec.outputs.iter())
        .enumerate()
        .map(move |(i, desc)| (i, i >= inputs, desc))
}
