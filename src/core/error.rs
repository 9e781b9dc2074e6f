//! Crate-level error type.

use thiserror::Error;

use super::Id;

/// Errors produced while configuring the renderer.
///
/// Per-frame contract violations (a missing shadow map at pass construction,
/// an unsupported light type, an out-of-range world matrix index) are
/// programming errors and panic instead; validating them every frame in the
/// render loop would cost more than it protects.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A shadow replacement was registered twice for the same source
    /// shader program. Duplicate keys can never take effect (the first
    /// entry always wins), so they are rejected outright.
    #[error("duplicate shadow replacement for shader program {0}")]
    DuplicateShadowSource(Id),

    /// The legacy parallel-list replacement form was given lists of
    /// different lengths.
    #[error("mismatched replacement lists: {sources} source materials, {replacements} replacements")]
    MismatchedReplacementLists {
        /// Number of source materials provided.
        sources: usize,
        /// Number of replacement materials provided.
        replacements: usize,
    },
}
