//! Shadow replacement table: source program -> replacement depth material.

use std::collections::HashMap;
use std::rc::Rc;

use crate::core::{Id, RenderError};
use crate::material::Material;

/// Maps a source material's shader program to the depth material the shadow
/// pass must substitute for it.
///
/// Keys are shader *program* ids: two materials sharing one program share
/// one table entry, and a drawcall matches by the program of its live
/// material, never by material instance or name. Registering a second
/// replacement for a program that already has one is rejected — the first
/// entry would always win, so a duplicate can only be a configuration bug.
#[derive(Debug, Default)]
pub struct ShadowReplacementTable {
    replacements: HashMap<Id, Rc<Material>>,
}

impl ShadowReplacementTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a replacement: drawcalls using `source`'s shader program
    /// render their depth with `replacement` instead of the pass default.
    pub fn insert(
        &mut self,
        source: &Material,
        replacement: Rc<Material>,
    ) -> Result<(), RenderError> {
        let program = source.program().id();
        if self.replacements.contains_key(&program) {
            return Err(RenderError::DuplicateShadowSource(program));
        }
        self.replacements.insert(program, replacement);
        Ok(())
    }

    /// Build a table from `(source, replacement)` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = (&'a Material, Rc<Material>)>,
    {
        let mut table = Self::new();
        for (source, replacement) in pairs {
            table.insert(source, replacement)?;
        }
        Ok(table)
    }

    /// Build a table from the legacy parallel-list form: `sources[i]` is
    /// replaced by `replacements[i]`. Kept for callers that still hold two
    /// matched vectors; converted to the canonical pair representation here,
    /// there is no separate lookup path for it.
    pub fn from_parallel(
        sources: &[Rc<Material>],
        replacements: &[Rc<Material>],
    ) -> Result<Self, RenderError> {
        if sources.len() != replacements.len() {
            return Err(RenderError::MismatchedReplacementLists {
                sources: sources.len(),
                replacements: replacements.len(),
            });
        }
        Self::from_pairs(
            sources
                .iter()
                .map(Rc::as_ref)
                .zip(replacements.iter().cloned()),
        )
    }

    /// The replacement material for a shader program, if one is registered.
    pub fn lookup(&self, program: Id) -> Option<&Rc<Material>> {
        self.replacements.get(&program)
    }

    /// Number of registered replacements.
    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::ShaderProgram;

    fn material(program: &Rc<ShaderProgram>) -> Rc<Material> {
        Rc::new(Material::new(Rc::clone(program)))
    }

    #[test]
    fn test_lookup_is_by_program_identity() {
        let terrain_program = Rc::new(ShaderProgram::new("terrain"));
        let depth_program = Rc::new(ShaderProgram::new("terrain-depth"));

        // Two distinct materials on the same program.
        let terrain_a = material(&terrain_program);
        let terrain_b = material(&terrain_program);
        let replacement = material(&depth_program);

        let mut table = ShadowReplacementTable::new();
        table.insert(&terrain_a, Rc::clone(&replacement)).unwrap();

        // Both materials match through their shared program.
        let hit = table.lookup(terrain_b.program().id()).unwrap();
        assert!(Rc::ptr_eq(hit, &replacement));
        assert!(table.lookup(depth_program.id()).is_none());
    }

    #[test]
    fn test_duplicate_source_is_rejected_and_first_wins() {
        let program = Rc::new(ShaderProgram::new("terrain"));
        let source_a = material(&program);
        let source_b = material(&program);
        let first = material(&Rc::new(ShaderProgram::new("depth-a")));
        let second = material(&Rc::new(ShaderProgram::new("depth-b")));

        let mut table = ShadowReplacementTable::new();
        table.insert(&source_a, Rc::clone(&first)).unwrap();

        let err = table.insert(&source_b, second).unwrap_err();
        assert!(matches!(err, RenderError::DuplicateShadowSource(id) if id == program.id()));

        // The first-registered replacement is still the one in effect.
        let hit = table.lookup(program.id()).unwrap();
        assert!(Rc::ptr_eq(hit, &first));
    }

    #[test]
    fn test_from_parallel_matches_by_index() {
        let program_a = Rc::new(ShaderProgram::new("sand"));
        let program_b = Rc::new(ShaderProgram::new("tracks"));
        let sources = vec![material(&program_a), material(&program_b)];
        let depth_a = material(&Rc::new(ShaderProgram::new("sand-depth")));
        let depth_b = material(&Rc::new(ShaderProgram::new("tracks-depth")));
        let replacements = vec![Rc::clone(&depth_a), Rc::clone(&depth_b)];

        let table = ShadowReplacementTable::from_parallel(&sources, &replacements).unwrap();
        assert_eq!(table.len(), 2);
        assert!(Rc::ptr_eq(table.lookup(program_a.id()).unwrap(), &depth_a));
        assert!(Rc::ptr_eq(table.lookup(program_b.id()).unwrap(), &depth_b));
    }

    #[test]
    fn test_from_parallel_rejects_mismatched_lengths() {
        let sources = vec![material(&Rc::new(ShaderProgram::new("sand")))];
        let err = ShadowReplacementTable::from_parallel(&sources, &[]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::MismatchedReplacementLists { sources: 1, replacements: 0 }
        ));
    }
}
