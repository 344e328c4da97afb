use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use crate::caps::DeviceCaps;
use crate::config::HarnessConfig;
use crate::error::{ContextError, DeviceError};

/// Optional wgpu features requested whenever the adapter has them. Each one widens what the
/// feature gate reports as supported.
const OPTIONAL_FEATURES: &[wgpu::Features] = &[
    wgpu::Features::SHADER_F16,
    wgpu::Features::SHADER_F64,
    wgpu::Features::SHADER_I16,
    wgpu::Features::SHADER_INT64,
    wgpu::Features::PUSH_CONSTANTS,
    wgpu::Features::SUBGROUP,
    wgpu::Features::MULTIVIEW,
    wgpu::Features::SHADER_PRIMITIVE_INDEX,
    wgpu::Features::VERTEX_WRITABLE_STORAGE,
];

fn negotiated_features_for_available(
    available: wgpu::Features,
    backend: wgpu::Backend,
    disable_passthrough: bool,
) -> wgpu::Features {
    let mut requested = wgpu::Features::empty();
    for feature in OPTIONAL_FEATURES {
        if available.contains(*feature) {
            requested |= *feature;
        }
    }

    // Passthrough hands our words straight to the driver, which only the Vulkan backend accepts.
    if !disable_passthrough
        && backend == wgpu::Backend::Vulkan
        && available.contains(wgpu::Features::SPIRV_SHADER_PASSTHROUGH)
    {
        requested |= wgpu::Features::SPIRV_SHADER_PASSTHROUGH;
    }

    requested
}

#[derive(Debug, Default)]
struct DeviceHealth {
    lost: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// The device, queue and capabilities shared by every test in a run.
///
/// Only the health flag changes after creation. Tests that touch the device must hold
/// [`ExecutionContext::lock`] for their whole bind, dispatch and read-back sequence.
pub struct ExecutionContext {
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: DeviceCaps,
    health: Arc<DeviceHealth>,
    exclusive: Mutex<()>,
    config: HarnessConfig,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .field("caps", &self.caps)
            .field("lost", &self.is_lost())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    pub async fn new(config: HarnessConfig) -> Result<Self, ContextError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            // Some GL/Vulkan loaders refuse to start without a runtime dir.
            let needs_runtime_dir = std::env::var("XDG_RUNTIME_DIR")
                .ok()
                .map(|v| v.is_empty())
                .unwrap_or(true);
            if needs_runtime_dir {
                let dir = std::env::temp_dir()
                    .join(format!("spvexec-xdg-runtime-{}", std::process::id()));
                let _ = std::fs::create_dir_all(&dir);
                let _ = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700));
                std::env::set_var("XDG_RUNTIME_DIR", &dir);
            }
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Some(adapter) => adapter,
            None => instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: true,
                })
                .await
                .ok_or(ContextError::AdapterNotFound(config.backends))?,
        };

        let adapter_info = adapter.get_info();
        let downlevel_flags = adapter.get_downlevel_capabilities().flags;
        let adapter_features = adapter.features();
        let required_features = negotiated_features_for_available(
            adapter_features,
            adapter_info.backend,
            config.disable_passthrough,
        );

        debug!(
            ?adapter_features,
            ?required_features,
            backend = ?adapter_info.backend,
            disable_passthrough = config.disable_passthrough,
            "spvexec negotiated wgpu features"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("spvexec-device"),
                    required_features,
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .map_err(|e| ContextError::RequestDevice(e.to_string()))?;

        let health = Arc::new(DeviceHealth::default());
        {
            let health = Arc::clone(&health);
            device.set_device_lost_callback(move |reason, message| {
                let reason = format!("{reason:?}: {message}");
                error!(%reason, "wgpu device lost");
                *health
                    .reason
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(reason);
                health.lost.store(true, Ordering::Release);
            });
        }

        // wgpu panics on uncaptured errors by default.
        device.on_uncaptured_error(Box::new(|err| {
            error!(%err, "uncaptured wgpu error");
        }));

        let caps = DeviceCaps::from_wgpu(
            device.features(),
            downlevel_flags,
            &device.limits(),
            adapter_info.backend,
            &config,
        );
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            features = ?caps.features,
            max_module_version = %caps.max_module_version,
            "spvexec execution context ready"
        );

        Ok(Self {
            adapter_info,
            device,
            queue,
            caps,
            health,
            exclusive: Mutex::new(()),
            config,
        })
    }

    pub fn new_blocking(config: HarnessConfig) -> Result<Self, ContextError> {
        pollster::block_on(Self::new(config))
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn is_lost(&self) -> bool {
        self.health.lost.load(Ordering::Acquire)
    }

    /// `Err(DeviceError::Lost)` once the device-lost callback has fired.
    pub fn check_health(&self) -> Result<(), DeviceError> {
        if !self.is_lost() {
            return Ok(());
        }
        let reason = self
            .health
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        Err(DeviceError::Lost { reason })
    }

    /// Serializes device use across tests.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.exclusive.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_features_follow_the_adapter() {
        let available = wgpu::Features::SHADER_F16
            | wgpu::Features::PUSH_CONSTANTS
            | wgpu::Features::VERTEX_WRITABLE_STORAGE
            | wgpu::Features::TEXTURE_COMPRESSION_BC;
        let requested =
            negotiated_features_for_available(available, wgpu::Backend::Gl, false);
        assert_eq!(
            requested,
            wgpu::Features::SHADER_F16
                | wgpu::Features::PUSH_CONSTANTS
                | wgpu::Features::VERTEX_WRITABLE_STORAGE
        );
    }

    #[test]
    fn passthrough_is_vulkan_only_and_can_be_disabled() {
        let available = wgpu::Features::SPIRV_SHADER_PASSTHROUGH;
        assert_eq!(
            negotiated_features_for_available(available, wgpu::Backend::Vulkan, false),
            wgpu::Features::SPIRV_SHADER_PASSTHROUGH
        );
        assert!(negotiated_features_for_available(available, wgpu::Backend::Vulkan, true)
            .is_empty());
        assert!(negotiated_features_for_available(available, wgpu::Backend::Gl, false)
            .is_empty());
    }
}
