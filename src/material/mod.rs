//! Materials and shader programs.

mod program;
mod uniform;

pub use program::ShaderProgram;
pub use uniform::UniformValue;

use std::rc::Rc;

use crate::core::RenderDevice;

/// A material: a shared shader program plus named uniform values.
///
/// Many materials may reference the same compiled program — a terrain
/// material and its depth-only shadow counterpart typically differ only in
/// program and uniform set. For dispatch purposes (notably the shadow
/// replacement table) a material's identity is its *shader program* id,
/// never the material instance.
#[derive(Debug)]
pub struct Material {
    program: Rc<ShaderProgram>,
    uniforms: Vec<(String, UniformValue)>,
}

impl Material {
    /// Create a material with no uniform values set.
    pub fn new(program: Rc<ShaderProgram>) -> Self {
        Self {
            program,
            uniforms: Vec::new(),
        }
    }

    /// The shader program this material renders with.
    #[inline]
    pub fn program(&self) -> &Rc<ShaderProgram> {
        &self.program
    }

    /// Set a named uniform value, replacing any previous value under the
    /// same name. Values keep their first-set order when pushed to the
    /// device.
    pub fn set_uniform_value(&mut self, name: impl Into<String>, value: UniformValue) {
        let name = name.into();
        if let Some(slot) = self.uniforms.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.uniforms.push((name, value));
        }
    }

    /// Look up a stored uniform value.
    pub fn uniform_value(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Activate the program and push the stored uniform values.
    pub fn bind(&self, device: &mut dyn RenderDevice) {
        device.use_program(&self.program);
        for (name, value) in &self.uniforms {
            device.set_uniform(self.program.id(), name, value);
        }
    }
}
