//! Frame-wide uniform bindings.

use std::collections::BTreeMap;
use std::fmt;

use crate::resources::ProgramId;

use super::uniform::UniformVariable;
use super::uniform_struct::UniformStruct;

/// Uniform variables of one frame, shared by all programs or scoped to one.
///
/// When a program is bound, its per-program variables take precedence over
/// shared variables of the same name. Maps are ordered so resolution is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct GlobalRenderState {
    shared: BTreeMap<String, UniformVariable>,
    per_program: BTreeMap<ProgramId, BTreeMap<String, UniformVariable>>,
}

impl GlobalRenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a variable applied to every program.
    pub fn set_shared(&mut self, name: impl Into<String>, value: impl Into<UniformVariable>) {
        self.shared.insert(name.into(), value.into());
    }

    /// Insert or overwrite a variable applied only to `program`.
    pub fn set_per_program(
        &mut self,
        program: ProgramId,
        name: impl Into<String>,
        value: impl Into<UniformVariable>,
    ) {
        self.per_program
            .entry(program)
            .or_default()
            .insert(name.into(), value.into());
    }

    /// Set the members of the struct uniform `name` (element `index` of an
    /// array of structs) for all programs.
    pub fn set_shared_struct<S: UniformStruct>(
        &mut self,
        name: &str,
        value: &S,
        index: Option<usize>,
    ) {
        self.shared.extend(value.uniform_variables(name, index));
    }

    /// Set the members of the struct uniform `name` for `program` only.
    pub fn set_per_program_struct<S: UniformStruct>(
        &mut self,
        program: ProgramId,
        name: &str,
        value: &S,
        index: Option<usize>,
    ) {
        self.per_program
            .entry(program)
            .or_default()
            .extend(value.uniform_variables(name, index));
    }

    pub fn shared(&self, name: &str) -> Option<&UniformVariable> {
        self.shared.get(name)
    }

    pub fn per_program(&self, program: ProgramId, name: &str) -> Option<&UniformVariable> {
        self.per_program.get(&program)?.get(name)
    }

    pub fn shared_uniforms(&self) -> &BTreeMap<String, UniformVariable> {
        &self.shared
    }

    pub fn per_program_uniforms(
        &self,
        program: ProgramId,
    ) -> Option<&BTreeMap<String, UniformVariable>> {
        self.per_program.get(&program)
    }

    pub fn has_per_program(&self, program: ProgramId) -> bool {
        self.per_program.contains_key(&program)
    }

    /// Clear both maps.
    pub fn reset(&mut self) {
        self.shared.clear();
        self.per_program.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.per_program.is_empty()
    }

    /// The variables to apply when `program` is bound, in application order.
    ///
    /// Per-program variables come first, followed by the shared variables
    /// not already named per program.
    pub fn resolve_uniforms(&self, program: ProgramId) -> Vec<(&str, &UniformVariable)> {
        let local = self.per_program.get(&program);
        let mut resolved: Vec<(&str, &UniformVariable)> = local
            .into_iter()
            .flatten()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        resolved.extend(
            self.shared
                .iter()
                .filter(|(name, _)| !local.is_some_and(|local| local.contains_key(*name)))
                .map(|(name, value)| (name.as_str(), value)),
        );
        resolved
    }

    /// The value `name` has while `program` is bound.
    pub fn resolve_uniform(&self, program: ProgramId, name: &str) -> Option<&UniformVariable> {
        self.per_program(program, name).or_else(|| self.shared(name))
    }
}

impl fmt::Display for GlobalRenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GlobalRenderState[")?;
        writeln!(f, "  shared = {{")?;
        for (name, value) in &self.shared {
            writeln!(f, "    {name} = {value}")?;
        }
        writeln!(f, "  }},")?;
        for (program, uniforms) in &self.per_program {
            writeln!(f, "  {program} = {{")?;
            for (name, value) in uniforms {
                writeln!(f, "    {name} = {value}")?;
            }
            writeln!(f, "  }},")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_per_program_wins() {
        let p = ProgramId(1);
        let q = ProgramId(2);
        let mut state = GlobalRenderState::new();
        state.set_shared("color", Vec3::new(1.0, 0.0, 0.0));
        state.set_per_program(p, "color", Vec3::new(0.0, 1.0, 0.0));

        assert_eq!(
            state.resolve_uniform(p, "color"),
            Some(&UniformVariable::from(Vec3::new(0.0, 1.0, 0.0)))
        );
        assert_eq!(
            state.resolve_uniform(q, "color"),
            Some(&UniformVariable::from(Vec3::new(1.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn test_resolution_order() {
        let p = ProgramId(7);
        let mut state = GlobalRenderState::new();
        state.set_shared("a", 1i32);
        state.set_shared("u", 1i32);
        state.set_per_program(p, "u", 2i32);
        state.set_per_program(p, "z", 3i32);

        let names: Vec<&str> = state.resolve_uniforms(p).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["u", "z", "a"]);

        let other: Vec<&str> = state
            .resolve_uniforms(ProgramId(8))
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(other, vec!["a", "u"]);
    }

    #[test]
    fn test_insert_overwrites_and_reset_clears() {
        let p = ProgramId(3);
        let mut state = GlobalRenderState::new();
        state.set_shared("u", 1.0f32);
        state.set_shared("u", 2.0f32);
        assert_eq!(state.shared("u"), Some(&UniformVariable::from(2.0f32)));

        state.set_per_program(p, "v", true);
        assert!(state.has_per_program(p));

        state.reset();
        assert!(state.is_empty());
        assert!(!state.has_per_program(p));
    }

    crate::uniform_struct! {
        struct Material {
            diffuse: Vec3,
            shininess: f32,
        }
    }

    #[test]
    fn test_struct_members_follow_precedence() {
        let p = ProgramId(4);
        let mut state = GlobalRenderState::new();
        let base = Material {
            diffuse: Vec3::ONE,
            shininess: 8.0,
        };
        let glossy = Material {
            diffuse: Vec3::ZERO,
            shininess: 64.0,
        };
        state.set_shared_struct("u_material", &base, None);
        state.set_per_program_struct(p, "u_material", &glossy, None);
        state.set_shared_struct("u_layers", &base, Some(2));

        assert_eq!(
            state.resolve_uniform(p, "u_material.shininess"),
            Some(&UniformVariable::from(64.0f32))
        );
        assert_eq!(
            state.resolve_uniform(ProgramId(5), "u_material.diffuse"),
            Some(&UniformVariable::from(Vec3::ONE))
        );
        assert!(state.shared("u_layers[2].diffuse").is_some());
        assert_eq!(state.resolve_uniforms(p).len(), 4);
    }

    #[test]
    fn test_display_lists_variables() {
        let mut state = GlobalRenderState::new();
        state.set_shared("u_time", 0.5f32);
        let text = state.to_string();
        assert!(text.contains("u_time = UniformVariable[type = Float, value = 0.5]"));
    }
}
