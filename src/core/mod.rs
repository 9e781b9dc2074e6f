//! # Core Module
//!
//! Device abstraction, unique IDs, error types, and the renderer that owns
//! the process-wide rendering context (current camera, framebuffer, and
//! viewport) together with the render-pass pipeline.

mod device;
mod error;
mod headless;
mod id;
mod renderer;

pub use device::{Framebuffer, RenderDevice, Viewport};
pub use error::RenderError;
pub use headless::{CommandLog, DeviceCommand, HeadlessDevice};
pub use id::Id;
pub use renderer::{DrawcallInfo, RenderPass, Renderer, StateScope};
