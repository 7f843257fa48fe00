//! Scoped state of a technique while its passes run.

use std::collections::BTreeMap;

use crate::backend::ClearFlags;
use crate::target::ViewportGeometry;

use super::global_state::GlobalRenderState;
use super::pipeline::RenderPipeline;
use super::uniform::UniformVariable;
use super::uniform_struct::UniformStruct;

/// State a [`RenderPass`](super::RenderPass) configures in `set_up`.
///
/// A context lives for one technique. `shared_uniforms` persist across the
/// passes of that technique; `current_uniforms`, the clear flags and the
/// viewport are reset at the start of every pass. The pipeline carries over
/// between passes of the same technique.
#[derive(Debug)]
pub struct DrawContext<'a> {
    /// Frame-wide state of the command being rendered
    pub global_state: &'a GlobalRenderState,
    pub pipeline: RenderPipeline,
    pub current_uniforms: BTreeMap<String, UniformVariable>,
    pub shared_uniforms: BTreeMap<String, UniformVariable>,
    pub clear: ClearFlags,
    pub viewport: ViewportGeometry,
    target_viewport: ViewportGeometry,
}

impl<'a> DrawContext<'a> {
    /// Fresh context for a technique drawing into `viewport`.
    pub fn new(global_state: &'a GlobalRenderState, viewport: ViewportGeometry) -> Self {
        Self {
            global_state,
            pipeline: RenderPipeline::default(),
            current_uniforms: BTreeMap::new(),
            shared_uniforms: BTreeMap::new(),
            clear: ClearFlags::ALL,
            viewport,
            target_viewport: viewport,
        }
    }

    /// Reset the per-pass state.
    pub fn begin_pass(&mut self) {
        self.current_uniforms.clear();
        self.clear = ClearFlags::ALL;
        self.viewport = self.target_viewport;
    }

    /// Set a variable for the current pass only.
    pub fn set_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformVariable>) {
        self.current_uniforms.insert(name.into(), value.into());
    }

    /// Set the members of the struct uniform `name` for the current pass.
    pub fn set_uniform_struct<S: UniformStruct>(
        &mut self,
        name: &str,
        value: &S,
        index: Option<usize>,
    ) {
        self.current_uniforms
            .extend(value.uniform_variables(name, index));
    }

    /// Set a variable for all remaining passes of the technique.
    pub fn set_shared_uniform(
        &mut self,
        name: impl Into<String>,
        value: impl Into<UniformVariable>,
    ) {
        self.shared_uniforms.insert(name.into(), value.into());
    }

    /// Pass variables in application order; current variables override shared ones.
    pub fn pass_uniforms(&self) -> impl Iterator<Item = (&str, &UniformVariable)> {
        self.shared_uniforms
            .iter()
            .filter(move |(name, _)| !self.current_uniforms.contains_key(*name))
            .chain(self.current_uniforms.iter())
            .map(|(name, value)| (name.as_str(), value))
    }
}
