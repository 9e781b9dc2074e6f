//! Uniform values.

use crate::core::Id;
use crate::math::{Matrix4, Vector3, Vector4};

/// A value a material can assign to a named shader uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// A single float.
    Float(f32),
    /// A signed integer.
    Int(i32),
    /// A 3-component vector.
    Vec3(Vector3),
    /// A 4-component vector.
    Vec4(Vector4),
    /// A 4x4 matrix.
    Mat4(Matrix4),
    /// A texture, referenced by its resource id.
    Texture(Id),
}
