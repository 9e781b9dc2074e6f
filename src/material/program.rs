//! Shader program handles.

use crate::core::Id;

/// A handle onto a compiled shader program.
///
/// Programs are shared (`Rc<ShaderProgram>`) between the materials that use
/// them; the [`Id`] is the stable identity that the shadow replacement
/// table dispatches on. Compilation itself is a backend concern — see
/// [`crate::backend`].
#[derive(Debug)]
pub struct ShaderProgram {
    id: Id,
    label: String,
}

impl ShaderProgram {
    /// Create a program handle with a debug label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            label: label.into(),
        }
    }

    /// The stable program id.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The debug label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}
