//! 4x4 Matrix implementation.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::Vector3;

/// A 4x4 matrix stored in column-major order.
/// Used for 3D transformations (model, view, projection matrices).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix4 {
    /// Matrix elements in column-major order.
    /// [m00, m10, m20, m30, m01, m11, m21, m31, m02, m12, m22, m32, m03, m13, m23, m33]
    pub elements: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        elements: [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Create from a column-major array.
    #[inline]
    pub const fn from_cols_array(elements: [f32; 16]) -> Self {
        Self { elements }
    }

    /// Convert to a column-major array.
    #[inline]
    pub const fn to_cols_array(self) -> [f32; 16] {
        self.elements
    }

    /// Convert to a column-major 2D array, as expected by GPU uniform blocks.
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let e = &self.elements;
        [
            [e[0], e[1], e[2], e[3]],
            [e[4], e[5], e[6], e[7]],
            [e[8], e[9], e[10], e[11]],
            [e[12], e[13], e[14], e[15]],
        ]
    }

    /// Create a translation matrix.
    pub fn translation(v: Vector3) -> Self {
        let mut m = Self::IDENTITY;
        m.elements[12] = v.x;
        m.elements[13] = v.y;
        m.elements[14] = v.z;
        m
    }

    /// Extract the translation component.
    #[inline]
    pub fn position(&self) -> Vector3 {
        Vector3::new(self.elements[12], self.elements[13], self.elements[14])
    }

    /// Create a view matrix (look-at).
    /// Returns the inverse of the camera transform.
    pub fn look_at(eye: &Vector3, target: &Vector3, up: &Vector3) -> Self {
        let f = (*target - *eye).normalized(); // forward
        let r = f.cross(up).normalized(); // right
        let u = r.cross(&f); // up

        // Orthonormal basis: inverse = transposed rotation, translation
        // is -dot(axis, eye) per axis.
        Self {
            elements: [
                r.x, u.x, -f.x, 0.0,
                r.y, u.y, -f.y, 0.0,
                r.z, u.z, -f.z, 0.0,
                -r.dot(eye), -u.dot(eye), f.dot(eye), 1.0,
            ],
        }
    }

    /// Create a perspective projection matrix.
    /// Uses wgpu/Vulkan depth range (0 to 1).
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y / 2.0).tan();

        Self {
            elements: [
                f / aspect, 0.0, 0.0, 0.0,
                0.0, f, 0.0, 0.0,
                0.0, 0.0, far / (near - far), -1.0,
                0.0, 0.0, (near * far) / (near - far), 0.0,
            ],
        }
    }

    /// Create an orthographic projection matrix.
    /// Uses wgpu/Vulkan depth range (0 to 1).
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let w = 1.0 / (right - left);
        let h = 1.0 / (top - bottom);
        let d = 1.0 / (far - near);

        Self {
            elements: [
                2.0 * w, 0.0, 0.0, 0.0,
                0.0, 2.0 * h, 0.0, 0.0,
                0.0, 0.0, -d, 0.0,
                -(right + left) * w, -(top + bottom) * h, -near * d, 1.0,
            ],
        }
    }

    /// Multiply this matrix by another (`self * other`).
    pub fn multiply(&self, other: &Matrix4) -> Self {
        let a = &self.elements;
        let b = &other.elements;
        let mut out = [0.0f32; 16];

        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = a[row] * b[col * 4]
                    + a[4 + row] * b[col * 4 + 1]
                    + a[8 + row] * b[col * 4 + 2]
                    + a[12 + row] * b[col * 4 + 3];
            }
        }

        Self { elements: out }
    }

    /// Transform a point (w = 1), with perspective division.
    pub fn transform_point(&self, p: &Vector3) -> Vector3 {
        let e = &self.elements;
        let x = e[0] * p.x + e[4] * p.y + e[8] * p.z + e[12];
        let y = e[1] * p.x + e[5] * p.y + e[9] * p.z + e[13];
        let z = e[2] * p.x + e[6] * p.y + e[10] * p.z + e[14];
        let w = e[3] * p.x + e[7] * p.y + e[11] * p.z + e[15];

        if w != 0.0 && w != 1.0 {
            Vector3::new(x / w, y / w, z / w)
        } else {
            Vector3::new(x, y, z)
        }
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let e = &self.elements;
        Self {
            elements: [
                e[0], e[4], e[8], e[12],
                e[1], e[5], e[9], e[13],
                e[2], e[6], e[10], e[14],
                e[3], e[7], e[11], e[15],
            ],
        }
    }

    /// Inverse of the matrix. Returns identity if the matrix is singular.
    pub fn inverse(&self) -> Self {
        let m = &self.elements;
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14] + m[13] * m[6] * m[11] - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14] - m[12] * m[6] * m[11] + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13] + m[12] * m[5] * m[11] - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13] - m[12] * m[5] * m[10] + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14] - m[13] * m[2] * m[11] + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14] + m[12] * m[2] * m[11] - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13] - m[12] * m[1] * m[11] + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13] + m[12] * m[1] * m[10] - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14] + m[13] * m[2] * m[7] - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14] - m[12] * m[2] * m[7] + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13] + m[12] * m[1] * m[7] - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13] - m[12] * m[1] * m[6] + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10] - m[9] * m[2] * m[7] + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10] + m[8] * m[2] * m[7] - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9] - m[8] * m[1] * m[7] + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9] + m[8] * m[1] * m[6] - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        if det == 0.0 {
            return Self::IDENTITY;
        }

        let inv_det = 1.0 / det;
        for v in &mut inv {
            *v *= inv_det;
        }

        Self { elements: inv }
    }

    /// Element-wise comparison within an epsilon.
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.elements
            .iter()
            .zip(other.elements.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl From<glam::Mat4> for Matrix4 {
    fn from(m: glam::Mat4) -> Self {
        Self { elements: m.to_cols_array() }
    }
}

impl From<Matrix4> for glam::Mat4 {
    fn from(m: Matrix4) -> Self {
        glam::Mat4::from_cols_array(&m.elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_multiply() {
        let t = Matrix4::translation(Vector3::new(1.0, 2.0, 3.0));
        assert!(t.multiply(&Matrix4::IDENTITY).approx_eq(&t, 1e-6));
        assert!(Matrix4::IDENTITY.multiply(&t).approx_eq(&t, 1e-6));
    }

    #[test]
    fn test_translation_point() {
        let t = Matrix4::translation(Vector3::new(1.0, 2.0, 3.0));
        let p = t.transform_point(&Vector3::new(1.0, 1.0, 1.0));
        assert!(p.approx_eq(&Vector3::new(2.0, 3.0, 4.0), 1e-6));
    }

    #[test]
    fn test_look_at_centers_eye() {
        let view = Matrix4::look_at(
            &Vector3::new(0.0, 0.0, 5.0),
            &Vector3::ZERO,
            &Vector3::UP,
        );
        // The eye maps to the origin of view space.
        let p = view.transform_point(&Vector3::new(0.0, 0.0, 5.0));
        assert!(p.approx_eq(&Vector3::ZERO, 1e-6));
        // A point in front of the eye lands on the negative z axis.
        let q = view.transform_point(&Vector3::ZERO);
        assert!(q.approx_eq(&Vector3::new(0.0, 0.0, -5.0), 1e-6));
    }

    #[test]
    fn test_orthographic_maps_box_to_clip() {
        let proj = Matrix4::orthographic(-10.0, 10.0, -5.0, 5.0, 0.0, 100.0);
        // Center of the box maps to clip center with depth in 0..1.
        let center = proj.transform_point(&Vector3::new(0.0, 0.0, -50.0));
        assert!(center.approx_eq(&Vector3::new(0.0, 0.0, 0.5), 1e-6));
        let corner = proj.transform_point(&Vector3::new(10.0, 5.0, 0.0));
        assert!(corner.approx_eq(&Vector3::new(1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let m = Matrix4::look_at(
            &Vector3::new(3.0, 4.0, 5.0),
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::UP,
        );
        let roundtrip = m.multiply(&m.inverse());
        assert!(roundtrip.approx_eq(&Matrix4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_transpose() {
        let m = Matrix4::translation(Vector3::new(1.0, 2.0, 3.0));
        assert!(m.transpose().transpose().approx_eq(&m, 0.0));
    }
}
