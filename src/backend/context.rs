//! wgpu context management.

use thiserror::Error;

/// Errors that can occur during context creation.
#[derive(Error, Debug)]
pub enum ContextError {
    /// Failed to request adapter.
    #[error("Failed to request adapter: no suitable GPU found")]
    AdapterRequest,

    /// Failed to request device.
    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// The wgpu rendering context: instance, adapter, device, and queue.
///
/// Shadow rendering is offscreen, so no surface is created; presenting the
/// lit scene is the embedding application's concern.
pub struct WgpuContext {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The GPU adapter.
    pub adapter: wgpu::Adapter,
    /// The GPU device.
    pub device: wgpu::Device,
    /// The command queue.
    pub queue: wgpu::Queue,
    /// Depth texture format used for shadow maps.
    pub depth_format: wgpu::TextureFormat,
}

impl WgpuContext {
    /// Create a new headless context.
    pub async fn new(power_preference: wgpu::PowerPreference) -> Result<Self, ContextError> {
        // Create instance
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Request adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ContextError::AdapterRequest)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Mirage Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        log::debug!("wgpu context created on {:?}", adapter.get_info().backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            depth_format: wgpu::TextureFormat::Depth32Float,
        })
    }
}
