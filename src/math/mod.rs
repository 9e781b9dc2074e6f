//! Math types used throughout the crate.
//!
//! Matrices are column-major and projections target the wgpu/Vulkan
//! 0..1 depth range. Conversions to and from `glam` are provided at the
//! crate boundary.

mod color;
mod matrix4;
mod vector3;
mod vector4;

pub use color::Color;
pub use matrix4::Matrix4;
pub use vector3::Vector3;
pub use vector4::Vector4;
