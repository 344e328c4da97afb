//! JSON case manifests.
//!
//! ```json
//! {
//!   "cases": [{
//!     "name": "opfnegate",
//!     "source": "negate.spvasm",
//!     "workgroups": [100, 1, 1],
//!     "inputs": [{ "type": "f32", "values": [1.5, -2] }],
//!     "outputs": [{ "type": "f32", "values": [-1.5, 2] }]
//!   }]
//! }
//! ```
//!
//! Assembly comes from `source` (relative to the manifest) or inline `assembly`. Float values that
//! JSON cannot spell are written as strings: `"nan"`, `"inf"`, `"-inf"`. Hex strings such as
//! `"0xdeadbeef"` are raw bits: integers take them as values, floats as their bit pattern
//! (`"0x7fc00001"` is a NaN with payload 1).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use spvexec::asm::ModuleVersion;
use spvexec::specialization::SpecType;
use spvexec::{
    DeviceFeatures, DrawParameters, ElementType, MismatchPolicy, ResourceDescriptor, ResourceKind,
    ScalarType, ScalarValue, SpecializationBlock, StringsInOrder, TestSpec, TypedBuffer,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub cases: Vec<CaseManifest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseManifest {
    pub name: String,
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub assembly: Option<String>,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub workgroups: Option<[u32; 3]>,
    #[serde(default)]
    pub draw: Option<DrawManifest>,
    #[serde(default)]
    pub inputs: Vec<BufferManifest>,
    #[serde(default)]
    pub outputs: Vec<BufferManifest>,
    #[serde(default)]
    pub push_constants: Option<ValuesManifest>,
    #[serde(default)]
    pub spec_constants: Vec<SpecConstantManifest>,
    #[serde(default)]
    pub requires: RequirementsManifest,
    #[serde(default)]
    pub on_mismatch: Option<PolicyManifest>,
    /// Debug strings that must appear in the assembled module, in order.
    #[serde(default)]
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrawManifest {
    pub vertex_entry: Option<String>,
    pub fragment_entry: Option<String>,
    pub vertex_count: Option<u32>,
    pub instance_count: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuesManifest {
    /// `f32`, `u16`, `i32x4`, ...
    #[serde(rename = "type")]
    pub ty: String,
    pub values: Vec<JsonScalar>,
    #[serde(default)]
    pub stride: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferManifest {
    #[serde(rename = "type")]
    pub ty: String,
    pub values: Vec<JsonScalar>,
    #[serde(default)]
    pub stride: Option<usize>,
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    #[serde(default)]
    pub set: Option<u32>,
    #[serde(default)]
    pub binding: Option<u32>,
}

/// A scalar as written in the manifest, after string spellings are resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonScalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Hex literal.
    Bits(u64),
    Bool(bool),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for JsonScalar {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawScalar::deserialize(deserializer)? {
            RawScalar::Bool(v) => JsonScalar::Bool(v),
            RawScalar::Int(v) => JsonScalar::Int(v),
            RawScalar::UInt(v) => JsonScalar::UInt(v),
            RawScalar::Float(v) => JsonScalar::Float(v),
            RawScalar::Text(text) => parse_text_scalar(&text).map_err(serde::de::Error::custom)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecConstantManifest {
    /// `bool` or a scalar type name.
    #[serde(rename = "type")]
    pub ty: String,
    pub value: JsonScalar,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementsManifest {
    /// [`DeviceFeatures`] flag names, case-insensitive.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityManifest {
    #[default]
    Fail,
    QualityWarning,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyManifest {
    #[serde(default)]
    pub severity: SeverityManifest,
    #[serde(default)]
    pub message: Option<String>,
}

fn parse_text_scalar(text: &str) -> Result<JsonScalar, String> {
    let trimmed = text.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "nan" => return Ok(JsonScalar::Float(f64::NAN)),
        "inf" | "+inf" | "infinity" => return Ok(JsonScalar::Float(f64::INFINITY)),
        "-inf" | "-infinity" => return Ok(JsonScalar::Float(f64::NEG_INFINITY)),
        _ => {}
    }
    let digits = trimmed.replace('_', "");
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(JsonScalar::Bits)
            .map_err(|err| format!("invalid hex literal {text:?}: {err}"));
    }
    Err(format!("unsupported scalar literal {text:?}"))
}

impl JsonScalar {
    fn to_scalar(self) -> Result<ScalarValue> {
        match self {
            JsonScalar::Int(v) => Ok(ScalarValue::Int(v)),
            JsonScalar::UInt(v) => Ok(ScalarValue::UInt(v)),
            JsonScalar::Float(v) => Ok(ScalarValue::Float(v)),
            JsonScalar::Bits(v) => Ok(ScalarValue::Bits(v)),
            JsonScalar::Bool(_) => {
                bail!("booleans are only valid for `bool` specialization constants")
            }
        }
    }
}

/// Parses `f32`, `u8`, `f32x3` ...
pub fn parse_element_type(text: &str) -> Result<ElementType> {
    let text = text.trim();
    match text.split_once('x') {
        Some((scalar, components)) => {
            let scalar: ScalarType = scalar.parse()?;
            let components: u8 = components
                .parse()
                .with_context(|| format!("invalid vector width in {text:?}"))?;
            Ok(ElementType::vector(scalar, components)?)
        }
        None => Ok(ElementType::scalar(text.parse()?)),
    }
}

fn typed_buffer(ty: &str, values: &[JsonScalar], stride: Option<usize>) -> Result<TypedBuffer> {
    let element = parse_element_type(ty)?;
    let values = values
        .iter()
        .map(|v| v.to_scalar())
        .collect::<Result<Vec<_>>>()?;
    Ok(TypedBuffer::from_scalars(element, &values, stride)?)
}

impl ValuesManifest {
    pub fn to_buffer(&self) -> Result<TypedBuffer> {
        typed_buffer(&self.ty, &self.values, self.stride)
    }
}

impl BufferManifest {
    pub fn to_descriptor(&self) -> Result<ResourceDescriptor> {
        let buffer = typed_buffer(&self.ty, &self.values, self.stride)?;
        let desc = ResourceDescriptor::new(buffer, self.kind.unwrap_or_default());
        match (self.set, self.binding) {
            (set, Some(binding)) => Ok(desc.at(set.unwrap_or(0), binding)),
            (Some(_), None) => bail!("`set` given without `binding`"),
            (None, None) => Ok(desc),
        }
    }
}

impl SpecConstantManifest {
    fn append_to(&self, block: &mut SpecializationBlock) -> Result<u32> {
        if self.ty.trim().eq_ignore_ascii_case("bool") {
            let JsonScalar::Bool(value) = self.value else {
                bail!("`bool` specialization constant needs a boolean value");
            };
            return Ok(block.append_raw(SpecType::Bool, &u32::from(value).to_le_bytes())?);
        }
        let scalar: ScalarType = self.ty.parse()?;
        let mut bytes = Vec::with_capacity(scalar.size());
        scalar.encode(self.value.to_scalar()?, &mut bytes)?;
        Ok(block.append_raw(SpecType::Scalar(scalar), &bytes)?)
    }
}

impl RequirementsManifest {
    fn features(&self) -> Result<DeviceFeatures> {
        self.features.iter().try_fold(DeviceFeatures::empty(), |acc, name| {
            let upper = name.trim().to_ascii_uppercase();
            DeviceFeatures::from_name(&upper)
                .map(|flag| acc | flag)
                .ok_or_else(|| anyhow!("unknown device feature {name:?}"))
        })
    }
}

impl PolicyManifest {
    fn to_policy(&self) -> MismatchPolicy {
        match (self.severity, &self.message) {
            (SeverityManifest::QualityWarning, Some(message)) => {
                MismatchPolicy::quality_warning(message.clone())
            }
            (SeverityManifest::QualityWarning, None) => {
                MismatchPolicy::quality_warning("outputs differ from the expected values")
            }
            (SeverityManifest::Fail, Some(message)) => MismatchPolicy::fail_with(message.clone()),
            (SeverityManifest::Fail, None) => MismatchPolicy::default(),
        }
    }
}

impl DrawManifest {
    fn to_params(&self) -> DrawParameters {
        let defaults = DrawParameters::default();
        DrawParameters {
            vertex_entry: self.vertex_entry.clone().unwrap_or(defaults.vertex_entry),
            fragment_entry: self
                .fragment_entry
                .clone()
                .unwrap_or(defaults.fragment_entry),
            vertex_count: self.vertex_count.unwrap_or(defaults.vertex_count),
            instance_count: self.instance_count.unwrap_or(defaults.instance_count),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
        }
    }
}

impl CaseManifest {
    fn load_source(&self, base_dir: &Path) -> Result<String> {
        match (&self.source, &self.assembly) {
            (Some(path), None) => {
                let path = base_dir.join(path);
                fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
            }
            (None, Some(text)) => Ok(text.clone()),
            (Some(_), Some(_)) => bail!("give either `source` or `assembly`, not both"),
            (None, None) => bail!("missing `source` or `assembly`"),
        }
    }

    /// Resolves the case into a test specification. Relative `source` paths are joined to
    /// `base_dir`.
    pub fn to_spec(&self, base_dir: &Path) -> Result<TestSpec> {
        let mut builder = TestSpec::builder(&self.name, self.load_source(base_dir)?);

        if let Some(entry) = &self.entry_point {
            builder = builder.entry_point(entry);
        }
        if let Some(version) = &self.version {
            let version: ModuleVersion = version.parse()?;
            builder = builder.module_version(version);
        }
        if let Some(workgroups) = self.workgroups {
            builder = builder.compute(workgroups);
        }
        if let Some(draw) = &self.draw {
            builder = builder.draw(draw.to_params());
        }
        for (i, input) in self.inputs.iter().enumerate() {
            let desc = input.to_descriptor().with_context(|| format!("input {i}"))?;
            builder = builder.input(desc);
        }
        for (i, output) in self.outputs.iter().enumerate() {
            let desc = output.to_descriptor().with_context(|| format!("output {i}"))?;
            builder = builder.output(desc);
        }
        if let Some(push) = &self.push_constants {
            builder = builder.push_constants(push.to_buffer().context("push constants")?);
        }
        if !self.spec_constants.is_empty() {
            let mut block = SpecializationBlock::new();
            for (i, constant) in self.spec_constants.iter().enumerate() {
                constant
                    .append_to(&mut block)
                    .with_context(|| format!("specialization constant {i}"))?;
            }
            builder = builder.specialization(block);
        }
        builder = builder.require_features(self.requires.features()?);
        for extension in &self.requires.extensions {
            builder = builder.require_extension(extension);
        }
        if let Some(policy) = &self.on_mismatch {
            builder = builder.on_mismatch(policy.to_policy());
        }
        if !self.markers.is_empty() {
            builder = builder.binary_verifier(StringsInOrder::new(self.markers.iter().cloned()));
        }

        Ok(builder.build()?)
    }
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parse manifest {}", path.display()))
    }

    /// Builds every case accepted by `filter`, in manifest order.
    pub fn to_specs(&self, base_dir: &Path, filter: &CaseFilter) -> Result<Vec<TestSpec>> {
        self.cases
            .iter()
            .filter(|case| filter.matches(&case.name))
            .map(|case| {
                case.to_spec(base_dir)
                    .with_context(|| format!("case {:?}", case.name))
            })
            .collect()
    }
}

/// Substring filter over case names. An empty filter accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFilter {
    terms: Vec<String>,
}

impl CaseFilter {
    /// Terms are separated by commas, semicolons or whitespace.
    pub fn parse(text: &str) -> Self {
        Self {
            terms: text
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn merge(mut self, other: CaseFilter) -> Self {
        self.terms.extend(other.terms);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.terms.is_empty() || self.terms.iter().any(|t| name.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_types_parse_scalars_and_vectors() {
        assert_eq!(
            parse_element_type("f32").unwrap(),
            ElementType::scalar(ScalarType::F32)
        );
        assert_eq!(
            parse_element_type("i16x4").unwrap(),
            ElementType::vector(ScalarType::I16, 4).unwrap()
        );
        assert!(parse_element_type("f32x5").is_err());
        assert!(parse_element_type("q8").is_err());
    }

    #[test]
    fn text_scalars() {
        assert!(matches!(parse_text_scalar("nan"), Ok(JsonScalar::Float(v)) if v.is_nan()));
        assert_eq!(
            parse_text_scalar("-inf"),
            Ok(JsonScalar::Float(f64::NEG_INFINITY))
        );
        assert_eq!(
            parse_text_scalar("0xdead_beef"),
            Ok(JsonScalar::Bits(0xdead_beef))
        );
        assert!(parse_text_scalar("twelve").is_err());
    }

    #[test]
    fn hex_values_fill_floats_bit_for_bit() {
        let values: Vec<JsonScalar> =
            serde_json::from_str(r#"["0x7fc00001", "0x3f800000"]"#).unwrap();
        let buffer = typed_buffer("f32", &values, None).unwrap();
        let mut expected = 0x7fc0_0001u32.to_le_bytes().to_vec();
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        assert_eq!(buffer.bytes(), expected.as_slice());

        let values: Vec<JsonScalar> = serde_json::from_str(r#"["0xff", 3]"#).unwrap();
        let buffer = typed_buffer("u32", &values, None).unwrap();
        assert_eq!(buffer.bytes(), &[0xff, 0, 0, 0, 3, 0, 0, 0]);

        let values: Vec<JsonScalar> = serde_json::from_str(r#"["0x1_0000"]"#).unwrap();
        assert!(typed_buffer("f16", &values, None).is_err());
    }

    #[test]
    fn filter_terms() {
        let filter = CaseFilter::parse("negate, spec;  draw");
        assert!(filter.matches("opfnegate_f32"));
        assert!(filter.matches("draw_fragment"));
        assert!(!filter.matches("opiadd"));
        assert!(CaseFilter::parse(" ,; ").is_empty());
        assert!(CaseFilter::default().matches("anything"));
    }
}
