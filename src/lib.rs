//! # Mirage - Displacement-Aware Shadow Mapping
//!
//! Mirage is a small rendering library built around one problem: geometry
//! that is displaced in the vertex shader (a heightmap-deformed terrain, a
//! surface with tracks pressed into it) casts wrong shadows when the shadow
//! pass renders it with a plain depth shader. The fix is per-material shader
//! substitution: the shadow pass renders most drawcalls with a minimal
//! depth-only program, but drawcalls whose material displaces vertices are
//! rendered with a paired depth program that applies the same displacement.
//!
//! ## Features
//!
//! - **Math**: vectors, matrices, color (column-major, wgpu 0..1 depth range)
//! - **Core**: device abstraction, renderer with scoped state restore
//! - **Shadows**: shadow maps, replacement table, the shadow render pass
//! - **Backend**: a wgpu implementation of the device trait with built-in
//!   depth-only and displaced-depth WGSL programs
//!
//! ## Example
//!
//! ```ignore
//! use mirage::prelude::*;
//!
//! let mut renderer = Renderer::new(Box::new(device));
//! let light = Rc::new(RefCell::new(Light::directional(Vector3::new(-0.5, -1.0, -0.3))));
//! light.borrow_mut().create_shadow_map(renderer.device_mut(), &ShadowConfig::default());
//!
//! let mut table = ShadowReplacementTable::new();
//! table.insert(&terrain_material, terrain_depth_material)?;
//!
//! let mut pass = ShadowMapRenderPass::with_replacements(
//!     &mut renderer, light, depth_material, table, 0);
//! pass.set_volume(ShadowVolume::new(player_position, Vector3::splat(30.0)));
//! renderer.add_pass(Box::new(pass));
//! ```

#![warn(missing_docs)]

pub mod math;
pub mod core;
pub mod camera;
pub mod geometry;
pub mod material;
pub mod light;
pub mod shadows;
pub mod backend;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::math::*;
    pub use crate::core::*;
    pub use crate::camera::*;
    pub use crate::geometry::*;
    pub use crate::material::*;
    pub use crate::light::*;
    pub use crate::shadows::*;
}

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "Mirage";
