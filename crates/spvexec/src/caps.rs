//! Device capability description and the feature/extension gate.

use std::collections::BTreeSet;

use bitflags::bitflags;
use spvexec_asm::ModuleVersion;

use crate::config::HarnessConfig;

bitflags! {
    /// Optional device functionality a test can require.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceFeatures: u32 {
        const COMPUTE = 1 << 0;
        /// Storage buffer writes from fragment shaders.
        const FRAGMENT_STORES = 1 << 1;
        /// Storage buffer writes from vertex shaders.
        const VERTEX_STORES = 1 << 2;
        const FLOAT16 = 1 << 3;
        const FLOAT64 = 1 << 4;
        const INT16 = 1 << 5;
        const INT64 = 1 << 6;
        const PUSH_CONSTANTS = 1 << 7;
        const SUBGROUP = 1 << 8;
        const SPIRV_PASSTHROUGH = 1 << 9;
        const MULTIVIEW = 1 << 10;
        const PRIMITIVE_INDEX = 1 << 11;
    }
}

/// Extensions implied by device features. An empty feature set means always available.
const EXTENSION_TABLE: &[(DeviceFeatures, &str)] = &[
    (DeviceFeatures::empty(), "SPV_KHR_storage_buffer_storage_class"),
    (DeviceFeatures::empty(), "SPV_KHR_shader_draw_parameters"),
    (DeviceFeatures::INT16, "SPV_KHR_16bit_storage"),
    (DeviceFeatures::FLOAT16, "SPV_AMD_gpu_shader_half_float"),
    (DeviceFeatures::MULTIVIEW, "SPV_KHR_multiview"),
    (DeviceFeatures::SUBGROUP, "SPV_KHR_shader_ballot"),
];

/// What the execution device can do, fixed for the lifetime of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCaps {
    pub features: DeviceFeatures,
    pub extensions: BTreeSet<String>,
    pub max_module_version: ModuleVersion,
    pub max_bind_groups: u32,
    pub max_push_constant_size: u32,
}

impl DeviceCaps {
    pub fn from_wgpu(
        features: wgpu::Features,
        downlevel: wgpu::DownlevelFlags,
        limits: &wgpu::Limits,
        backend: wgpu::Backend,
        config: &HarnessConfig,
    ) -> Self {
        let mut flags = DeviceFeatures::empty();
        let mapping = [
            (
                downlevel.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
                DeviceFeatures::COMPUTE,
            ),
            (
                downlevel.contains(wgpu::DownlevelFlags::FRAGMENT_WRITABLE_STORAGE),
                DeviceFeatures::FRAGMENT_STORES,
            ),
            (
                downlevel.contains(wgpu::DownlevelFlags::VERTEX_STORAGE)
                    && features.contains(wgpu::Features::VERTEX_WRITABLE_STORAGE),
                DeviceFeatures::VERTEX_STORES,
            ),
            (
                features.contains(wgpu::Features::SHADER_F16),
                DeviceFeatures::FLOAT16,
            ),
            (
                features.contains(wgpu::Features::SHADER_F64),
                DeviceFeatures::FLOAT64,
            ),
            (
                features.contains(wgpu::Features::SHADER_I16),
                DeviceFeatures::INT16,
            ),
            (
                features.contains(wgpu::Features::SHADER_INT64),
                DeviceFeatures::INT64,
            ),
            (
                features.contains(wgpu::Features::PUSH_CONSTANTS)
                    && limits.max_push_constant_size > 0,
                DeviceFeatures::PUSH_CONSTANTS,
            ),
            (
                features.contains(wgpu::Features::SUBGROUP),
                DeviceFeatures::SUBGROUP,
            ),
            (
                features.contains(wgpu::Features::SPIRV_SHADER_PASSTHROUGH)
                    && backend == wgpu::Backend::Vulkan
                    && !config.disable_passthrough,
                DeviceFeatures::SPIRV_PASSTHROUGH,
            ),
            (
                features.contains(wgpu::Features::MULTIVIEW),
                DeviceFeatures::MULTIVIEW,
            ),
            (
                features.contains(wgpu::Features::SHADER_PRIMITIVE_INDEX),
                DeviceFeatures::PRIMITIVE_INDEX,
            ),
        ];
        for (present, flag) in mapping {
            if present {
                flags |= flag;
            }
        }

        Self::new(flags, config)
            .with_limits(limits.max_bind_groups, limits.max_push_constant_size)
    }

    /// Capabilities for a given feature set, with extensions derived from the feature table.
    pub fn new(features: DeviceFeatures, config: &HarnessConfig) -> Self {
        let mut extensions: BTreeSet<String> = EXTENSION_TABLE
            .iter()
            .filter(|(needed, _)| features.contains(*needed))
            .map(|(_, name)| name.to_string())
            .collect();
        extensions.extend(config.extra_extensions.iter().cloned());

        Self {
            features,
            extensions,
            max_module_version: config.max_spirv_version,
            max_bind_groups: wgpu::Limits::downlevel_defaults().max_bind_groups,
            max_push_constant_size: 0,
        }
    }

    pub fn with_limits(mut self, max_bind_groups: u32, max_push_constant_size: u32) -> Self {
        self.max_bind_groups = max_bind_groups;
        self.max_push_constant_size = max_push_constant_size;
        self
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }
}

/// What a test needs from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirements {
    pub features: DeviceFeatures,
    pub extensions: Vec<String>,
    pub module_version: ModuleVersion,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            features: DeviceFeatures::empty(),
            extensions: Vec::new(),
            module_version: ModuleVersion::V1_0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Supported,
    Unsupported(String),
}

impl GateDecision {
    pub fn is_supported(&self) -> bool {
        matches!(self, GateDecision::Supported)
    }
}

/// Decides whether `caps` satisfies `requirements`.
///
/// Monotonic: adding features, extensions or a higher maximum version to `caps` never turns a
/// supported decision into an unsupported one.
pub fn is_supported(requirements: &Requirements, caps: &DeviceCaps) -> GateDecision {
    let mut reasons = Vec::new();

    let missing = requirements.features.difference(caps.features);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter_names().map(|(name, _)| name).collect();
        reasons.push(format!("missing device features: {}", names.join(", ")));
    }

    let missing_ext: BTreeSet<&str> = requirements
        .extensions
        .iter()
        .map(String::as_str)
        .filter(|ext| !caps.has_extension(ext))
        .collect();
    if !missing_ext.is_empty() {
        let names: Vec<&str> = missing_ext.into_iter().collect();
        reasons.push(format!("missing extensions: {}", names.join(", ")));
    }

    if requirements.module_version > caps.max_module_version {
        reasons.push(format!(
            "SPIR-V {} exceeds the device maximum {}",
            requirements.module_version, caps.max_module_version
        ));
    }

    if reasons.is_empty() {
        GateDecision::Supported
    } else {
        GateDecision::Unsupported(reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(features: DeviceFeatures) -> DeviceCaps {
        DeviceCaps::new(features, &HarnessConfig::default())
    }

    #[test]
    fn always_available_extensions_are_present() {
        let c = caps(DeviceFeatures::empty());
        assert!(c.has_extension("SPV_KHR_storage_buffer_storage_class"));
        assert!(!c.has_extension("SPV_KHR_16bit_storage"));
        assert!(caps(DeviceFeatures::INT16).has_extension("SPV_KHR_16bit_storage"));
    }

    #[test]
    fn unsupported_reasons_are_deterministic() {
        let req = Requirements {
            features: DeviceFeatures::FLOAT64 | DeviceFeatures::INT64 | DeviceFeatures::COMPUTE,
            extensions: vec!["SPV_z".into(), "SPV_a".into(), "SPV_z".into()],
            module_version: ModuleVersion::V1_5,
        };
        let decision = is_supported(&req, &caps(DeviceFeatures::COMPUTE));
        assert_eq!(
            decision,
            GateDecision::Unsupported(
                "missing device features: FLOAT64, INT64; missing extensions: SPV_a, SPV_z; \
                 SPIR-V 1.5 exceeds the device maximum 1.3"
                    .into()
            )
        );
    }

    #[test]
    fn nonexistent_extension_is_never_supported() {
        let req = Requirements {
            extensions: vec!["VK_KHR_nonexistent".into()],
            ..Requirements::default()
        };
        assert!(!is_supported(&req, &caps(DeviceFeatures::all())).is_supported());
    }

    #[test]
    fn gate_is_monotonic_in_capabilities() {
        let all = DeviceFeatures::all();
        let requirements: Vec<Requirements> = [
            DeviceFeatures::empty(),
            DeviceFeatures::COMPUTE,
            DeviceFeatures::FLOAT16 | DeviceFeatures::INT16,
            DeviceFeatures::MULTIVIEW | DeviceFeatures::PUSH_CONSTANTS,
        ]
        .into_iter()
        .flat_map(|features| {
            [
                Requirements {
                    features,
                    ..Requirements::default()
                },
                Requirements {
                    features,
                    extensions: vec!["SPV_KHR_16bit_storage".into()],
                    module_version: ModuleVersion::V1_3,
                },
            ]
        })
        .collect();

        // Walk every pair of (smaller, larger) capability sets built from single-flag steps.
        let mut current = DeviceFeatures::empty();
        for (_, flag) in all.iter_names() {
            let smaller = caps(current);
            current |= flag;
            let larger = caps(current);
            for req in &requirements {
                if is_supported(req, &smaller).is_supported() {
                    assert!(
                        is_supported(req, &larger).is_supported(),
                        "{req:?} lost support going from {:?} to {:?}",
                        smaller.features,
                        larger.features
                    );
                }
            }
        }

        let mut newer = HarnessConfig::default();
        newer.max_spirv_version = ModuleVersion::V1_6;
        let req = Requirements {
            module_version: ModuleVersion::V1_3,
            ..Requirements::default()
        };
        assert!(is_supported(&req, &caps(DeviceFeatures::empty())).is_supported());
        assert!(is_supported(&req, &DeviceCaps::new(DeviceFeatures::empty(), &newer)).is_supported());
    }

    #[test]
    fn passthrough_respects_the_disable_knob() {
        let limits = wgpu::Limits::default();
        let features = wgpu::Features::SPIRV_SHADER_PASSTHROUGH;
        let downlevel = wgpu::DownlevelFlags::all();

        let enabled = DeviceCaps::from_wgpu(
            features,
            downlevel,
            &limits,
            wgpu::Backend::Vulkan,
            &HarnessConfig::default(),
        );
        assert!(enabled.features.contains(DeviceFeatures::SPIRV_PASSTHROUGH));
        assert!(enabled.features.contains(DeviceFeatures::COMPUTE));

        let config = HarnessConfig {
            disable_passthrough: true,
            ..HarnessConfig::default()
        };
        let disabled =
            DeviceCaps::from_wgpu(features, downlevel, &limits, wgpu::Backend::Vulkan, &config);
        assert!(!disabled.features.contains(DeviceFeatures::SPIRV_PASSTHROUGH));

        let gl = DeviceCaps::from_wgpu(
            features,
            downlevel,
            &limits,
            wgpu::Backend::Gl,
            &HarnessConfig::default(),
        );
        assert!(!gl.features.contains(DeviceFeatures::SPIRV_PASSTHROUGH));
    }

    #[test]
    fn vertex_stores_need_the_writable_storage_feature() {
        let limits = wgpu::Limits::default();
        let downlevel = wgpu::DownlevelFlags::all();
        let config = HarnessConfig::default();

        let without = DeviceCaps::from_wgpu(
            wgpu::Features::empty(),
            downlevel,
            &limits,
            wgpu::Backend::Gl,
            &config,
        );
        assert!(without.features.contains(DeviceFeatures::FRAGMENT_STORES));
        assert!(!without.features.contains(DeviceFeatures::VERTEX_STORES));

        let with = DeviceCaps::from_wgpu(
            wgpu::Features::VERTEX_WRITABLE_STORAGE,
            downlevel,
            &limits,
            wgpu::Backend::Gl,
            &config,
        );
        assert!(with.features.contains(DeviceFeatures::VERTEX_STORES));
    }
}
