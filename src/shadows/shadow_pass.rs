//! Shadow map render pass (depth-only, with per-material substitution).

use std::cell::RefCell;
use std::rc::Rc;

use crate::camera::Camera;
use crate::core::{Framebuffer, RenderDevice, RenderPass, Renderer, Viewport};
use crate::light::{Light, LightType};
use crate::material::Material;
use crate::math::Vector3;

use super::{ShadowReplacementTable, ShadowVolume};

/// World-up for the light camera, switching to world-Z when the light
/// direction is close to vertical to keep the view basis well-formed.
fn shadow_up_vector(direction: Vector3) -> Vector3 {
    if direction.y.abs() < 0.9 {
        Vector3::UP
    } else {
        Vector3::UNIT_Z
    }
}

/// Renders scene depth from the light's point of view into the light's
/// shadow map.
///
/// Most drawcalls render with the pass's default depth-only material. A
/// drawcall whose live material's shader program has an entry in the
/// replacement table renders with the paired replacement material instead —
/// this is how vertex-displacing surfaces get depth programs that apply the
/// same displacement. Within one render the pass flips between exactly two
/// states, default program active and replacement program active, driven
/// only by that per-drawcall program lookup.
///
/// The pass borrows the shared rendering context through a
/// [`crate::core::StateScope`]: camera, viewport, and framebuffer are
/// restored when the pass finishes, on every exit path.
pub struct ShadowMapRenderPass {
    light: Rc<RefCell<Light>>,
    default_material: Rc<Material>,
    replacements: ShadowReplacementTable,
    drawcall_collection: usize,
    target_framebuffer: Rc<Framebuffer>,
    volume: ShadowVolume,
    resolution: u32,
}

impl ShadowMapRenderPass {
    /// Create a pass with no replacements: every drawcall renders with the
    /// default depth material.
    ///
    /// # Panics
    /// Panics if the light has no shadow map — create it first with
    /// [`Light::create_shadow_map`].
    pub fn new(
        renderer: &mut Renderer,
        light: Rc<RefCell<Light>>,
        default_material: Rc<Material>,
        drawcall_collection: usize,
    ) -> Self {
        Self::with_replacements(
            renderer,
            light,
            default_material,
            ShadowReplacementTable::new(),
            drawcall_collection,
        )
    }

    /// Create a pass with a replacement table.
    ///
    /// # Panics
    /// Panics if the light has no shadow map — create it first with
    /// [`Light::create_shadow_map`].
    pub fn with_replacements(
        renderer: &mut Renderer,
        light: Rc<RefCell<Light>>,
        default_material: Rc<Material>,
        replacements: ShadowReplacementTable,
        drawcall_collection: usize,
    ) -> Self {
        let (target_framebuffer, resolution) = {
            let light_ref = light.borrow();
            let map = light_ref
                .shadow_map()
                .expect("light has no shadow map; create it before constructing the shadow pass");
            (Rc::new(Framebuffer::with_depth(map)), map.resolution())
        };
        renderer.device_mut().init_framebuffer(&target_framebuffer);
        log::debug!(
            "shadow pass targeting {}x{} map, {} replacement(s)",
            resolution,
            resolution,
            replacements.len()
        );

        Self {
            light,
            default_material,
            replacements,
            drawcall_collection,
            target_framebuffer,
            volume: ShadowVolume::default(),
            resolution,
        }
    }

    /// Set the volume the directional shadow camera covers.
    ///
    /// Callable every frame; a caller that wants sharp shadows around a
    /// moving focus point re-centers the volume on it each frame. The pass
    /// itself never moves the volume.
    pub fn set_volume(&mut self, volume: ShadowVolume) {
        self.volume = volume;
    }

    /// The current shadow volume.
    #[inline]
    pub fn volume(&self) -> ShadowVolume {
        self.volume
    }

    /// Build the camera the pass renders with: positioned from the light
    /// and the volume center, orthographic over the volume for directional
    /// lights, perspective from the attenuation parameters for spot lights.
    ///
    /// # Panics
    /// Panics for light types without shadow map support.
    fn light_camera(&self) -> Camera {
        let light = self.light.borrow();
        let position = light.position_from(self.volume.center());
        let direction = light.direction();

        let mut camera = Camera::new();
        camera.set_view(position, position + direction, shadow_up_vector(direction));

        match light.light_type() {
            LightType::Directional => {
                let half = self.volume.half_extents();
                camera.set_orthographic(-half, half);
            }
            LightType::Spot => {
                let attenuation = light.attenuation();
                camera.set_perspective(attenuation.w, 1.0, 0.01, attenuation.y);
            }
            unsupported => panic!("light type {:?} cannot render a shadow map", unsupported),
        }

        camera
    }
}

impl RenderPass for ShadowMapRenderPass {
    fn render(&mut self, renderer: &mut Renderer) {
        let drawcalls = renderer.drawcalls(self.drawcall_collection).to_vec();

        let mut scope = renderer.save_state();

        scope.set_current_framebuffer(Rc::clone(&self.target_framebuffer));
        scope.device_mut().clear(None, Some(1.0));

        self.default_material.bind(scope.device_mut());
        let default_program = Rc::clone(self.default_material.program());

        scope.set_viewport(Viewport::new(0, 0, self.resolution, self.resolution));
        scope.set_current_camera(self.light_camera());

        // One flag across the whole loop: the camera-level uniforms are
        // pushed by whichever branch handles the first drawcall.
        let mut first = true;
        for drawcall in &drawcalls {
            scope.device_mut().bind_geometry(&drawcall.geometry);

            match self.replacements.lookup(drawcall.material.program().id()) {
                Some(replacement) => {
                    replacement.bind(scope.device_mut());
                    scope.update_transforms(
                        replacement.program(),
                        drawcall.world_matrix_index,
                        first,
                    );
                    scope.device_mut().draw(&drawcall.geometry);
                    // Back to the default program for the drawcalls that follow.
                    self.default_material.bind(scope.device_mut());
                }
                None => {
                    scope.update_transforms(&default_program, drawcall.world_matrix_index, first);
                    scope.device_mut().draw(&drawcall.geometry);
                }
            }

            first = false;
        }

        let shadow_matrix = *scope.current_camera_mut().view_projection_matrix();
        self.light.borrow_mut().set_shadow_matrix(shadow_matrix);

        // Scope drop restores viewport, camera, and framebuffer.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CommandLog, DeviceCommand, DrawcallInfo, HeadlessDevice, Id,
    };
    use crate::geometry::Geometry;
    use crate::material::{ShaderProgram, UniformValue};
    use crate::math::Matrix4;
    use crate::shadows::ShadowConfig;

    struct Fixture {
        renderer: Renderer,
        log: CommandLog,
        light: Rc<RefCell<Light>>,
        default_material: Rc<Material>,
    }

    fn fixture(light: Light) -> Fixture {
        let device = HeadlessDevice::new();
        let log = device.command_log();
        let mut renderer = Renderer::new(Box::new(device));
        renderer.set_viewport(Viewport::new(0, 0, 1280, 720));

        let mut light = light;
        light.create_shadow_map(renderer.device_mut(), &ShadowConfig::default());

        Fixture {
            renderer,
            log,
            light: Rc::new(RefCell::new(light)),
            default_material: Rc::new(Material::new(Rc::new(ShaderProgram::new("shadow-depth")))),
        }
    }

    fn directional_fixture() -> Fixture {
        fixture(Light::directional(Vector3::new(1.0, -1.0, 0.0)))
    }

    fn push_drawcall(
        renderer: &mut Renderer,
        material: &Rc<Material>,
        world: Matrix4,
    ) -> Rc<Geometry> {
        let geometry = Rc::new(Geometry::new(3, 0));
        let index = renderer.add_world_matrix(world);
        renderer.add_drawcall(
            0,
            DrawcallInfo {
                geometry: Rc::clone(&geometry),
                material: Rc::clone(material),
                world_matrix_index: index,
            },
        );
        geometry
    }

    fn program_and_draw_events(log: &CommandLog) -> Vec<DeviceCommand> {
        log.to_vec()
            .into_iter()
            .filter(|c| matches!(c, DeviceCommand::UseProgram { .. } | DeviceCommand::Draw { .. }))
            .collect()
    }

    fn uniform_events(log: &CommandLog, uniform: &str) -> Vec<(Id, UniformValue)> {
        log.to_vec()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::SetUniform { program, name, value } if name == uniform => {
                    Some((program, value))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_unmatched_drawcall_gets_world_view_proj_once() {
        let mut f = directional_fixture();
        let rock = Rc::new(Material::new(Rc::new(ShaderProgram::new("rock"))));
        let world = Matrix4::translation(Vector3::new(2.0, 0.0, 1.0));
        push_drawcall(&mut f.renderer, &rock, world);

        let mut pass = ShadowMapRenderPass::new(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            0,
        );
        pass.set_volume(ShadowVolume::new(Vector3::ZERO, Vector3::splat(30.0)));
        pass.render(&mut f.renderer);

        // Exactly one transform push, on the default program.
        let pushes = uniform_events(&f.log, "WorldViewProjMatrix");
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, f.default_material.program().id());

        // And its value is camera view-projection times the world matrix.
        let direction = Vector3::new(1.0, -1.0, 0.0).normalized();
        let mut expected_camera = Camera::new();
        expected_camera.set_view(Vector3::ZERO, direction, Vector3::UP);
        expected_camera.set_orthographic(Vector3::splat(-15.0), Vector3::splat(15.0));
        let expected = expected_camera.view_projection_matrix().multiply(&world);
        assert_eq!(pushes[0].1, UniformValue::Mat4(expected));
    }

    #[test]
    fn test_matched_drawcall_uses_replacement_then_rebinds_default() {
        let mut f = directional_fixture();

        let terrain = Rc::new(Material::new(Rc::new(ShaderProgram::new("terrain"))));
        let terrain_depth = Rc::new(Material::new(Rc::new(ShaderProgram::new("terrain-depth"))));
        let rock = Rc::new(Material::new(Rc::new(ShaderProgram::new("rock"))));

        let mut table = ShadowReplacementTable::new();
        table.insert(&terrain, Rc::clone(&terrain_depth)).unwrap();

        let displaced = push_drawcall(&mut f.renderer, &terrain, Matrix4::IDENTITY);
        let plain = push_drawcall(&mut f.renderer, &rock, Matrix4::IDENTITY);

        let mut pass = ShadowMapRenderPass::with_replacements(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            table,
            0,
        );
        pass.render(&mut f.renderer);

        let default_id = f.default_material.program().id();
        let replacement_id = terrain_depth.program().id();
        assert_eq!(
            program_and_draw_events(&f.log),
            vec![
                // Pass setup binds the default depth program.
                DeviceCommand::UseProgram { program: default_id },
                // Matched drawcall: replacement in, draw, default back in.
                DeviceCommand::UseProgram { program: replacement_id },
                DeviceCommand::Draw { geometry: displaced.id() },
                DeviceCommand::UseProgram { program: default_id },
                // Unmatched drawcall renders with the default program.
                DeviceCommand::Draw { geometry: plain.id() },
            ]
        );

        // Transform uniforms went to the program that drew each call.
        let pushes = uniform_events(&f.log, "WorldViewProjMatrix");
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0].0, replacement_id);
        assert_eq!(pushes[1].0, default_id);
    }

    #[test]
    fn test_camera_uniforms_pushed_once_regardless_of_branch() {
        let mut f = directional_fixture();

        let terrain = Rc::new(Material::new(Rc::new(ShaderProgram::new("terrain"))));
        let terrain_depth = Rc::new(Material::new(Rc::new(ShaderProgram::new("terrain-depth"))));
        let rock = Rc::new(Material::new(Rc::new(ShaderProgram::new("rock"))));

        let mut table = ShadowReplacementTable::new();
        table.insert(&terrain, Rc::clone(&terrain_depth)).unwrap();

        // First drawcall is the matched one, so the camera-level uniforms
        // must land on the replacement program — and nowhere else.
        push_drawcall(&mut f.renderer, &terrain, Matrix4::IDENTITY);
        push_drawcall(&mut f.renderer, &rock, Matrix4::IDENTITY);
        push_drawcall(&mut f.renderer, &rock, Matrix4::IDENTITY);

        let mut pass = ShadowMapRenderPass::with_replacements(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            table,
            0,
        );
        pass.render(&mut f.renderer);

        let camera_pushes = uniform_events(&f.log, "ViewProjMatrix");
        assert_eq!(camera_pushes.len(), 1);
        assert_eq!(camera_pushes[0].0, terrain_depth.program().id());
    }

    #[test]
    fn test_duplicate_replacement_never_selected() {
        let mut f = directional_fixture();

        let terrain = Rc::new(Material::new(Rc::new(ShaderProgram::new("terrain"))));
        let first = Rc::new(Material::new(Rc::new(ShaderProgram::new("depth-first"))));
        let second = Rc::new(Material::new(Rc::new(ShaderProgram::new("depth-second"))));

        let mut table = ShadowReplacementTable::new();
        table.insert(&terrain, Rc::clone(&first)).unwrap();
        // Same source program again: rejected, must not shadow the first.
        assert!(table.insert(&terrain, Rc::clone(&second)).is_err());

        push_drawcall(&mut f.renderer, &terrain, Matrix4::IDENTITY);

        let mut pass = ShadowMapRenderPass::with_replacements(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            table,
            0,
        );
        pass.render(&mut f.renderer);

        let used: Vec<Id> = f
            .log
            .to_vec()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::UseProgram { program } => Some(program),
                _ => None,
            })
            .collect();
        assert!(used.contains(&first.program().id()));
        assert!(!used.contains(&second.program().id()));
    }

    #[test]
    fn test_context_state_is_restored_for_any_drawcall_count() {
        for count in [0usize, 1, 5] {
            let mut f = directional_fixture();
            let rock = Rc::new(Material::new(Rc::new(ShaderProgram::new("rock"))));
            for _ in 0..count {
                push_drawcall(&mut f.renderer, &rock, Matrix4::IDENTITY);
            }

            let mut pass = ShadowMapRenderPass::new(
                &mut f.renderer,
                Rc::clone(&f.light),
                Rc::clone(&f.default_material),
                0,
            );

            let viewport_before = f.renderer.viewport();
            let camera_before = f.renderer.current_camera().clone();
            let framebuffer_before = f.renderer.current_framebuffer().id();

            pass.render(&mut f.renderer);

            assert_eq!(f.renderer.viewport(), viewport_before);
            assert_eq!(f.renderer.current_camera(), &camera_before);
            assert_eq!(f.renderer.current_framebuffer().id(), framebuffer_before);

            // The device also saw the restore, as the final commands.
            let commands = f.log.to_vec();
            let tail = &commands[commands.len() - 2..];
            assert_eq!(tail[0], DeviceCommand::SetViewport(viewport_before));
            assert_eq!(
                tail[1],
                DeviceCommand::BindFramebuffer { framebuffer: framebuffer_before }
            );
        }
    }

    #[test]
    fn test_clears_depth_only_into_target_framebuffer() {
        let mut f = directional_fixture();
        let mut pass = ShadowMapRenderPass::new(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            0,
        );

        let screen = f.renderer.current_framebuffer().id();
        pass.render(&mut f.renderer);

        let commands = f.log.to_vec();
        let bind_at = commands
            .iter()
            .position(|c| {
                matches!(c, DeviceCommand::BindFramebuffer { framebuffer } if *framebuffer != screen)
            })
            .expect("target framebuffer bound");
        assert_eq!(
            commands[bind_at + 1],
            DeviceCommand::Clear { color: None, depth: Some(1.0) }
        );
    }

    #[test]
    fn test_directional_projection_covers_volume() {
        let mut f = directional_fixture();
        let mut pass = ShadowMapRenderPass::new(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            0,
        );
        pass.set_volume(ShadowVolume::new(Vector3::new(1.0, 0.0, -2.0), Vector3::splat(30.0)));

        let camera = pass.light_camera();
        let expected =
            Matrix4::orthographic(-15.0, 15.0, -15.0, 15.0, -15.0, 15.0);
        assert!(camera.projection_matrix().approx_eq(&expected, 0.0));
    }

    #[test]
    fn test_spot_projection_derives_from_attenuation() {
        let mut f = fixture(Light::spot(
            Vector3::new(1.0, 4.0, 1.0),
            Vector3::new(0.0, -1.0, 0.0),
            25.0,
            1.2,
        ));
        let pass = ShadowMapRenderPass::new(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            0,
        );

        let camera = pass.light_camera();
        let expected = Matrix4::perspective(1.2, 1.0, 0.01, 25.0);
        assert!(camera.projection_matrix().approx_eq(&expected, 0.0));

        // Vertical direction: the view basis must have used world-Z up.
        let position = Vector3::new(1.0, 4.0, 1.0);
        let expected_view = Matrix4::look_at(
            &position,
            &(position + Vector3::new(0.0, -1.0, 0.0)),
            &Vector3::UNIT_Z,
        );
        assert!(camera.view_matrix().approx_eq(&expected_view, 0.0));
    }

    #[test]
    #[should_panic(expected = "cannot render a shadow map")]
    fn test_point_light_hits_fatal_path() {
        let mut f = fixture(Light::point(Vector3::ZERO, 10.0));
        let mut pass = ShadowMapRenderPass::new(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            0,
        );
        pass.render(&mut f.renderer);
    }

    #[test]
    #[should_panic(expected = "light has no shadow map")]
    fn test_missing_shadow_map_is_fatal_at_construction() {
        let device = HeadlessDevice::new();
        let mut renderer = Renderer::new(Box::new(device));
        let light = Rc::new(RefCell::new(Light::directional(Vector3::new(0.0, -1.0, 0.0))));
        let material = Rc::new(Material::new(Rc::new(ShaderProgram::new("shadow-depth"))));
        let _ = ShadowMapRenderPass::new(&mut renderer, light, material, 0);
    }

    #[test]
    fn test_up_vector_boundary() {
        // Below the threshold on either sign: world up.
        assert_eq!(shadow_up_vector(Vector3::new(0.4, 0.899, 0.2)), Vector3::UP);
        assert_eq!(shadow_up_vector(Vector3::new(0.4, -0.899, 0.2)), Vector3::UP);
        // At the threshold exactly, and beyond: world Z.
        assert_eq!(shadow_up_vector(Vector3::new(0.0, 0.9, 0.1)), Vector3::UNIT_Z);
        assert_eq!(shadow_up_vector(Vector3::new(0.0, -0.9, 0.1)), Vector3::UNIT_Z);
        assert_eq!(shadow_up_vector(Vector3::new(0.0, 1.0, 0.0)), Vector3::UNIT_Z);
    }

    #[test]
    fn test_shadow_matrix_written_back_to_light() {
        let mut f = directional_fixture();
        let mut pass = ShadowMapRenderPass::new(
            &mut f.renderer,
            Rc::clone(&f.light),
            Rc::clone(&f.default_material),
            0,
        );
        pass.set_volume(ShadowVolume::new(Vector3::ZERO, Vector3::splat(30.0)));

        assert_eq!(f.light.borrow().shadow_matrix(), &Matrix4::IDENTITY);
        pass.render(&mut f.renderer);

        let mut expected_camera = pass.light_camera();
        let expected = *expected_camera.view_projection_matrix();
        assert_eq!(f.light.borrow().shadow_matrix(), &expected);
    }
}
