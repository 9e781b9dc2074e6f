//! Command-recording device for tests and headless runs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::geometry::Geometry;
use crate::material::{ShaderProgram, UniformValue};
use crate::math::Color;
use crate::shadows::ShadowMap;

use super::{Framebuffer, Id, RenderDevice, Viewport};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Shadow map storage was allocated.
    InitShadowMap {
        /// Depth texture id.
        texture: Id,
        /// Square resolution in pixels.
        resolution: u32,
    },
    /// A framebuffer was created.
    InitFramebuffer {
        /// Framebuffer id.
        framebuffer: Id,
        /// Depth attachment texture id, if any.
        depth_attachment: Option<Id>,
    },
    /// A framebuffer became the active render target.
    BindFramebuffer {
        /// Framebuffer id.
        framebuffer: Id,
    },
    /// The viewport rectangle changed.
    SetViewport(Viewport),
    /// The active target was cleared.
    Clear {
        /// Color clear value, if the color buffer was cleared.
        color: Option<Color>,
        /// Depth clear value, if the depth buffer was cleared.
        depth: Option<f32>,
    },
    /// A shader program became active.
    UseProgram {
        /// Program id.
        program: Id,
    },
    /// A named uniform was set on a program.
    SetUniform {
        /// Program id.
        program: Id,
        /// Uniform name.
        name: String,
        /// Uniform value.
        value: UniformValue,
    },
    /// A geometry's buffers were bound.
    BindGeometry {
        /// Geometry id.
        geometry: Id,
    },
    /// The bound geometry was drawn.
    Draw {
        /// Geometry id.
        geometry: Id,
    },
}

/// Shared handle onto a [`HeadlessDevice`]'s recorded command stream.
///
/// Clone it before boxing the device into a renderer; the recording stays
/// observable afterwards.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Rc<RefCell<Vec<DeviceCommand>>>);

impl CommandLog {
    /// Snapshot the recorded commands.
    pub fn to_vec(&self) -> Vec<DeviceCommand> {
        self.0.borrow().clone()
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Drop all recorded commands.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, command: DeviceCommand) {
        self.0.borrow_mut().push(command);
    }
}

/// A [`RenderDevice`] that performs no GPU work and records every call.
///
/// The shadow pass's observable contract (which program draws which
/// geometry, which uniforms are pushed when, and what state is restored)
/// is asserted against this recording in the test suite.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    log: CommandLog,
}

impl HeadlessDevice {
    /// Create a new recording device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a shared handle onto the command log.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl RenderDevice for HeadlessDevice {
    fn init_shadow_map(&mut self, map: &ShadowMap) {
        self.log.push(DeviceCommand::InitShadowMap {
            texture: map.id(),
            resolution: map.resolution(),
        });
    }

    fn init_framebuffer(&mut self, framebuffer: &Framebuffer) {
        self.log.push(DeviceCommand::InitFramebuffer {
            framebuffer: framebuffer.id(),
            depth_attachment: framebuffer.depth_attachment(),
        });
    }

    fn bind_framebuffer(&mut self, framebuffer: &Framebuffer) {
        self.log.push(DeviceCommand::BindFramebuffer { framebuffer: framebuffer.id() });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.log.push(DeviceCommand::SetViewport(viewport));
    }

    fn clear(&mut self, color: Option<Color>, depth: Option<f32>) {
        self.log.push(DeviceCommand::Clear { color, depth });
    }

    fn use_program(&mut self, program: &ShaderProgram) {
        self.log.push(DeviceCommand::UseProgram { program: program.id() });
    }

    fn set_uniform(&mut self, program: Id, name: &str, value: &UniformValue) {
        self.log.push(DeviceCommand::SetUniform {
            program,
            name: name.to_owned(),
            value: value.clone(),
        });
    }

    fn bind_geometry(&mut self, geometry: &Geometry) {
        self.log.push(DeviceCommand::BindGeometry { geometry: geometry.id() });
    }

    fn draw(&mut self, geometry: &Geometry) {
        self.log.push(DeviceCommand::Draw { geometry: geometry.id() });
    }
}
