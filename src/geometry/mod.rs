//! Geometry handles and vertex layouts.

mod vertex;

pub use vertex::Vertex;

use crate::core::Id;

/// A handle onto uploaded vertex/index data.
///
/// The geometry itself is a device resource; passes only need the identity
/// and the counts to issue a draw. Indexed geometry has `index_count > 0`.
#[derive(Debug, Clone)]
pub struct Geometry {
    id: Id,
    vertex_count: u32,
    index_count: u32,
}

impl Geometry {
    /// Create a geometry handle.
    pub fn new(vertex_count: u32, index_count: u32) -> Self {
        Self {
            id: Id::new(),
            vertex_count,
            index_count,
        }
    }

    /// Get the geometry id.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, 0 for non-indexed geometry.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Whether the geometry is drawn with an index buffer.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }
}
