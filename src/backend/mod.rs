//! Graphics backend implementations of [`crate::core::RenderDevice`].
//!
//! The wgpu backend is command-buffered: device calls accumulate and are
//! encoded and submitted when the target framebuffer changes or when
//! [`WgpuDevice::flush`] is called at the end of the frame.

mod context;
mod device;

pub use context::{ContextError, WgpuContext};
pub use device::{WgpuDevice, DEPTH_ONLY_SHADER, DISPLACED_DEPTH_SHADER};
