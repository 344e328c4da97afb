//! Harness knobs read from `SPVEXEC_*` environment variables.

use std::time::Duration;

use spvexec_asm::{ModuleVersion, DEFAULT_CACHE_CAPACITY};
use tracing::warn;

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MISMATCH_LIMIT: usize = 16;
pub const DEFAULT_MAX_SPIRV_VERSION: ModuleVersion = ModuleVersion::V1_3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Upper bound on every fence and map wait.
    pub dispatch_timeout: Duration,
    /// Differing byte offsets listed in a byte-exact mismatch.
    pub mismatch_limit: usize,
    pub backends: wgpu::Backends,
    /// Highest module version the device is trusted to consume.
    pub max_spirv_version: ModuleVersion,
    /// Extension names advertised on top of those derived from device features.
    pub extra_extensions: Vec<String>,
    pub disable_passthrough: bool,
    pub assembly_cache_capacity: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            mismatch_limit: DEFAULT_MISMATCH_LIMIT,
            backends: wgpu::Backends::all(),
            max_spirv_version: DEFAULT_MAX_SPIRV_VERSION,
            extra_extensions: Vec::new(),
            disable_passthrough: false,
            assembly_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Unparseable values are logged and
    /// ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("SPVEXEC_DISPATCH_TIMEOUT_MS") {
            match parse_usize(&raw) {
                Some(ms) if ms > 0 => config.dispatch_timeout = Duration::from_millis(ms as u64),
                _ => warn!(value = %raw, "ignoring invalid SPVEXEC_DISPATCH_TIMEOUT_MS"),
            }
        }
        if let Some(raw) = lookup("SPVEXEC_MISMATCH_LIMIT") {
            match parse_usize(&raw) {
                Some(limit) => config.mismatch_limit = limit,
                None => warn!(value = %raw, "ignoring invalid SPVEXEC_MISMATCH_LIMIT"),
            }
        }
        if let Some(raw) = lookup("SPVEXEC_BACKENDS") {
            match parse_backends(&raw) {
                Some(backends) => config.backends = backends,
                None => warn!(value = %raw, "ignoring invalid SPVEXEC_BACKENDS"),
            }
        }
        if let Some(raw) = lookup("SPVEXEC_MAX_SPIRV_VERSION") {
            match raw.parse::<ModuleVersion>() {
                Ok(v) if v.is_supported() => config.max_spirv_version = v,
                _ => warn!(value = %raw, "ignoring invalid SPVEXEC_MAX_SPIRV_VERSION"),
            }
        }
        if let Some(raw) = lookup("SPVEXEC_EXTRA_EXTENSIONS") {
            config.extra_extensions = split_list(&raw);
        }
        if let Some(raw) = lookup("SPVEXEC_DISABLE_PASSTHROUGH") {
            config.disable_passthrough = is_truthy(&raw);
        }
        if let Some(raw) = lookup("SPVEXEC_ASSEMBLY_CACHE") {
            match parse_usize(&raw) {
                Some(capacity) => config.assembly_cache_capacity = capacity,
                None => warn!(value = %raw, "ignoring invalid SPVEXEC_ASSEMBLY_CACHE"),
            }
        }

        config
    }
}

fn is_truthy(raw: &str) -> bool {
    let v = raw.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}

pub fn env_var_truthy(name: &str) -> bool {
    let Ok(raw) = std::env::var(name) else {
        return false;
    };
    is_truthy(&raw)
}

/// GPU tests panic instead of skipping when this is set.
pub fn require_gpu() -> bool {
    env_var_truthy("SPVEXEC_REQUIRE_GPU")
}

fn parse_usize(input: &str) -> Option<usize> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Allow `10_000` style separators.
    let cleaned: String = trimmed.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<usize>().ok()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_backends(raw: &str) -> Option<wgpu::Backends> {
    let mut backends = wgpu::Backends::empty();
    for name in split_list(raw) {
        backends |= match name.to_ascii_lowercase().as_str() {
            "vulkan" | "vk" => wgpu::Backends::VULKAN,
            "gl" | "gles" | "opengl" => wgpu::Backends::GL,
            "metal" | "mtl" => wgpu::Backends::METAL,
            "dx12" | "d3d12" => wgpu::Backends::DX12,
            "primary" => wgpu::Backends::PRIMARY,
            "all" => wgpu::Backends::all(),
            _ => return None,
        };
    }
    (!backends.is_empty()).then_some(backends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> HarnessConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HarnessConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = config_from(&[]);
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.dispatch_timeout, Duration::from_secs(10));
        assert_eq!(config.mismatch_limit, 16);
        assert_eq!(config.max_spirv_version, ModuleVersion::V1_3);
        assert_eq!(config.assembly_cache_capacity, 256);
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            ("SPVEXEC_DISPATCH_TIMEOUT_MS", "2_500"),
            ("SPVEXEC_MISMATCH_LIMIT", "4"),
            ("SPVEXEC_BACKENDS", "vulkan, gl"),
            ("SPVEXEC_MAX_SPIRV_VERSION", "1.5"),
            ("SPVEXEC_EXTRA_EXTENSIONS", "SPV_KHR_a;SPV_KHR_b,"),
            ("SPVEXEC_DISABLE_PASSTHROUGH", "Yes"),
            ("SPVEXEC_ASSEMBLY_CACHE", "0"),
        ]);
        assert_eq!(config.dispatch_timeout, Duration::from_millis(2500));
        assert_eq!(config.mismatch_limit, 4);
        assert_eq!(config.backends, wgpu::Backends::VULKAN | wgpu::Backends::GL);
        assert_eq!(config.max_spirv_version, ModuleVersion::V1_5);
        assert_eq!(config.extra_extensions, vec!["SPV_KHR_a", "SPV_KHR_b"]);
        assert!(config.disable_passthrough);
        assert_eq!(config.assembly_cache_capacity, 0);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("SPVEXEC_DISPATCH_TIMEOUT_MS", "0"),
            ("SPVEXEC_MISMATCH_LIMIT", "many"),
            ("SPVEXEC_BACKENDS", "glide"),
            ("SPVEXEC_MAX_SPIRV_VERSION", "2.0"),
        ]);
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", " on ", "yes"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "", "off"] {
            assert!(!is_truthy(v), "{v}");
        }
    }
}
