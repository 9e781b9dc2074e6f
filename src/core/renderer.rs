//! The renderer: drawcall collections, the render-pass pipeline, and the
//! shared rendering context (current camera, framebuffer, viewport).
//!
//! Execution is single-threaded and frame-driven: the application fills the
//! drawcall collections, then [`Renderer::render`] runs each pass in
//! insertion order. Passes that change context state do so inside a
//! [`StateScope`], which restores the previous state on every exit path.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::camera::Camera;
use crate::geometry::Geometry;
use crate::material::{Material, ShaderProgram, UniformValue};
use crate::math::Matrix4;

use super::{Framebuffer, RenderDevice, Viewport};

/// A render-queue entry: one geometry, the material it is drawn with, and
/// the index of its accumulated world transform.
///
/// Entries are produced by the scene-traversal step, already culled and
/// ordered; passes read them and never reorder or mutate them.
#[derive(Debug, Clone)]
pub struct DrawcallInfo {
    /// The geometry to draw.
    pub geometry: Rc<Geometry>,
    /// The material assigned to the geometry for the main passes.
    pub material: Rc<Material>,
    /// Index into the renderer's world matrix list.
    pub world_matrix_index: usize,
}

/// A stage of the frame pipeline.
pub trait RenderPass {
    /// Render this pass. Called once per frame, after the drawcall
    /// collections for the frame are complete.
    fn render(&mut self, renderer: &mut Renderer);
}

/// Owns the graphics device, the per-frame render queues, and the mutable
/// rendering context every pass shares.
pub struct Renderer {
    device: Box<dyn RenderDevice>,
    passes: Vec<Box<dyn RenderPass>>,
    drawcall_collections: Vec<Vec<DrawcallInfo>>,
    world_matrices: Vec<Matrix4>,
    current_camera: Camera,
    current_viewport: Viewport,
    current_framebuffer: Rc<Framebuffer>,
    default_framebuffer: Rc<Framebuffer>,
}

impl Renderer {
    /// Create a renderer on top of a device.
    pub fn new(device: Box<dyn RenderDevice>) -> Self {
        let default_framebuffer = Rc::new(Framebuffer::default_target());
        Self {
            device,
            passes: Vec::new(),
            drawcall_collections: Vec::new(),
            world_matrices: Vec::new(),
            current_camera: Camera::new(),
            current_viewport: Viewport::default(),
            current_framebuffer: Rc::clone(&default_framebuffer),
            default_framebuffer,
        }
    }

    /// Get mutable access to the device.
    #[inline]
    pub fn device_mut(&mut self) -> &mut dyn RenderDevice {
        &mut *self.device
    }

    /// Append a pass to the frame pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
        log::debug!("render pass added (total: {})", self.passes.len() + 1);
        self.passes.push(pass);
    }

    /// Run every pass in insertion order. One call per frame.
    pub fn render(&mut self) {
        let mut passes = std::mem::take(&mut self.passes);
        for pass in &mut passes {
            pass.render(self);
        }
        self.passes = passes;
    }

    /// Drop the previous frame's drawcalls and world matrices.
    pub fn begin_frame(&mut self) {
        for collection in &mut self.drawcall_collections {
            collection.clear();
        }
        self.world_matrices.clear();
    }

    /// Append a drawcall to a collection, creating collections up to the
    /// given index as needed.
    pub fn add_drawcall(&mut self, collection: usize, drawcall: DrawcallInfo) {
        if collection >= self.drawcall_collections.len() {
            self.drawcall_collections.resize_with(collection + 1, Vec::new);
        }
        self.drawcall_collections[collection].push(drawcall);
    }

    /// The drawcalls of a collection, in submission order. A collection
    /// that was never filled is empty.
    pub fn drawcalls(&self, collection: usize) -> &[DrawcallInfo] {
        self.drawcall_collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Store a world matrix and return its index for drawcalls.
    pub fn add_world_matrix(&mut self, matrix: Matrix4) -> usize {
        self.world_matrices.push(matrix);
        self.world_matrices.len() - 1
    }

    /// Look up a stored world matrix.
    ///
    /// # Panics
    /// Panics on an out-of-range index; a drawcall referencing a matrix
    /// that was never stored is a programming error.
    #[inline]
    pub fn world_matrix(&self, index: usize) -> Matrix4 {
        self.world_matrices[index]
    }

    /// The camera that passes currently render with.
    #[inline]
    pub fn current_camera(&self) -> &Camera {
        &self.current_camera
    }

    /// Mutable access to the current camera.
    #[inline]
    pub fn current_camera_mut(&mut self) -> &mut Camera {
        &mut self.current_camera
    }

    /// Replace the current camera.
    pub fn set_current_camera(&mut self, camera: Camera) {
        self.current_camera = camera;
    }

    /// The current viewport rectangle.
    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.current_viewport
    }

    /// Set the viewport, forwarding it to the device.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.current_viewport = viewport;
        self.device.set_viewport(viewport);
    }

    /// The framebuffer passes currently draw into.
    #[inline]
    pub fn current_framebuffer(&self) -> &Rc<Framebuffer> {
        &self.current_framebuffer
    }

    /// Bind a framebuffer as the active render target.
    pub fn set_current_framebuffer(&mut self, framebuffer: Rc<Framebuffer>) {
        self.device.bind_framebuffer(&framebuffer);
        self.current_framebuffer = framebuffer;
    }

    /// The default (screen) framebuffer.
    #[inline]
    pub fn default_framebuffer(&self) -> &Rc<Framebuffer> {
        &self.default_framebuffer
    }

    /// Push the transform uniforms for one drawcall to a program:
    /// `WorldMatrix` and `WorldViewProjMatrix` every call, plus the
    /// camera-level `ViewProjMatrix`/`InvViewProjMatrix` once per pass
    /// when `camera_changed` is set.
    pub fn update_transforms(
        &mut self,
        program: &ShaderProgram,
        world_matrix_index: usize,
        camera_changed: bool,
    ) {
        let world = self.world_matrices[world_matrix_index];
        let view_proj = *self.current_camera.view_projection_matrix();

        if camera_changed {
            self.device
                .set_uniform(program.id(), "ViewProjMatrix", &UniformValue::Mat4(view_proj));
            self.device.set_uniform(
                program.id(),
                "InvViewProjMatrix",
                &UniformValue::Mat4(view_proj.inverse()),
            );
        }

        self.device
            .set_uniform(program.id(), "WorldMatrix", &UniformValue::Mat4(world));
        self.device.set_uniform(
            program.id(),
            "WorldViewProjMatrix",
            &UniformValue::Mat4(view_proj.multiply(&world)),
        );
    }

    /// Snapshot the current camera, viewport, and framebuffer. The returned
    /// scope derefs to the renderer; dropping it restores all three, also
    /// when unwinding.
    pub fn save_state(&mut self) -> StateScope<'_> {
        StateScope {
            camera: self.current_camera.clone(),
            viewport: self.current_viewport,
            framebuffer: Rc::clone(&self.current_framebuffer),
            renderer: self,
        }
    }
}

/// Scoped snapshot of the shared rendering context.
///
/// Replaces manual save/restore pairs: state mutated through the scope is
/// rolled back in `Drop`, so a pass cannot leak camera, viewport, or
/// framebuffer changes into the passes that follow it.
pub struct StateScope<'a> {
    renderer: &'a mut Renderer,
    camera: Camera,
    viewport: Viewport,
    framebuffer: Rc<Framebuffer>,
}

impl Deref for StateScope<'_> {
    type Target = Renderer;

    fn deref(&self) -> &Renderer {
        self.renderer
    }
}

impl DerefMut for StateScope<'_> {
    fn deref_mut(&mut self) -> &mut Renderer {
        self.renderer
    }
}

impl Drop for StateScope<'_> {
    fn drop(&mut self) {
        self.renderer.set_viewport(self.viewport);
        self.renderer.set_current_camera(self.camera.clone());
        self.renderer
            .set_current_framebuffer(Rc::clone(&self.framebuffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeviceCommand, HeadlessDevice};
    use crate::math::Vector3;

    fn test_renderer() -> (Renderer, crate::core::CommandLog) {
        let device = HeadlessDevice::new();
        let log = device.command_log();
        (Renderer::new(Box::new(device)), log)
    }

    #[test]
    fn test_state_scope_restores_on_drop() {
        let (mut renderer, _log) = test_renderer();
        renderer.set_viewport(Viewport::new(0, 0, 800, 600));
        let saved_camera = renderer.current_camera().clone();
        let saved_framebuffer = renderer.current_framebuffer().id();

        {
            let mut scope = renderer.save_state();
            scope.set_viewport(Viewport::new(0, 0, 512, 512));
            let mut camera = Camera::new();
            camera.set_view(Vector3::new(0.0, 5.0, 0.0), Vector3::ZERO, Vector3::UNIT_Z);
            scope.set_current_camera(camera);
            let offscreen = Rc::new(Framebuffer::default_target());
            scope.set_current_framebuffer(offscreen);
        }

        assert_eq!(renderer.viewport(), Viewport::new(0, 0, 800, 600));
        assert_eq!(renderer.current_camera(), &saved_camera);
        assert_eq!(renderer.current_framebuffer().id(), saved_framebuffer);
    }

    #[test]
    fn test_state_scope_restores_on_panic() {
        let (mut renderer, _log) = test_renderer();
        renderer.set_viewport(Viewport::new(0, 0, 640, 480));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scope = renderer.save_state();
            scope.set_viewport(Viewport::new(0, 0, 1, 1));
            panic!("mid-pass failure");
        }));

        assert!(result.is_err());
        assert_eq!(renderer.viewport(), Viewport::new(0, 0, 640, 480));
    }

    #[test]
    fn test_update_transforms_pushes_camera_uniforms_once() {
        let (mut renderer, log) = test_renderer();
        let program = ShaderProgram::new("depth");
        let world = renderer.add_world_matrix(Matrix4::translation(Vector3::new(1.0, 0.0, 0.0)));

        renderer.update_transforms(&program, world, true);
        renderer.update_transforms(&program, world, false);

        let camera_pushes = log
            .to_vec()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::SetUniform { name, .. } if name == "ViewProjMatrix"))
            .count();
        assert_eq!(camera_pushes, 1);

        let per_draw_pushes = log
            .to_vec()
            .iter()
            .filter(|c| {
                matches!(c, DeviceCommand::SetUniform { name, .. } if name == "WorldViewProjMatrix")
            })
            .count();
        assert_eq!(per_draw_pushes, 2);
    }

    #[test]
    fn test_drawcall_collections_keep_submission_order() {
        let (mut renderer, _log) = test_renderer();
        assert!(renderer.drawcalls(3).is_empty());

        let geometry = Rc::new(Geometry::new(3, 0));
        let material = Rc::new(Material::new(Rc::new(ShaderProgram::new("unlit"))));
        for i in 0..3 {
            let index = renderer.add_world_matrix(Matrix4::IDENTITY);
            assert_eq!(index, i);
            renderer.add_drawcall(
                1,
                DrawcallInfo {
                    geometry: Rc::clone(&geometry),
                    material: Rc::clone(&material),
                    world_matrix_index: index,
                },
            );
        }

        assert!(renderer.drawcalls(0).is_empty());
        let order: Vec<usize> = renderer
            .drawcalls(1)
            .iter()
            .map(|d| d.world_matrix_index)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
