//! Fixed-function render state and the bound program.

use std::fmt;
use std::sync::Arc;

use crate::resources::{Program, ProgramId};

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// A single render state transition forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStateChange {
    DepthTest(bool),
    DepthFunc(DepthFunc),
    DepthWrite(bool),
    CullFace(bool),
    Blend(bool),
}

/// Render state of a pass plus the program it draws with.
#[derive(Clone)]
pub struct RenderPipeline {
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub depth_write: bool,
    pub cull_face: bool,
    pub blend: bool,
    pub program: Option<Arc<Program>>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_func: DepthFunc::Less,
            depth_write: true,
            cull_face: true,
            blend: false,
            program: None,
        }
    }
}

impl RenderPipeline {
    pub fn program_id(&self) -> Option<ProgramId> {
        self.program.as_ref().map(|program| program.id())
    }

    /// Every render state as a change, in application order.
    pub fn all_states(&self) -> [RenderStateChange; 5] {
        [
            RenderStateChange::DepthTest(self.depth_test),
            RenderStateChange::DepthFunc(self.depth_func),
            RenderStateChange::DepthWrite(self.depth_write),
            RenderStateChange::CullFace(self.cull_face),
            RenderStateChange::Blend(self.blend),
        ]
    }

    /// Record a single state transition.
    pub fn apply(&mut self, change: RenderStateChange) {
        match change {
            RenderStateChange::DepthTest(value) => self.depth_test = value,
            RenderStateChange::DepthFunc(value) => self.depth_func = value,
            RenderStateChange::DepthWrite(value) => self.depth_write = value,
            RenderStateChange::CullFace(value) => self.cull_face = value,
            RenderStateChange::Blend(value) => self.blend = value,
        }
    }

    /// The states that differ from `previous`; all states without one.
    pub fn state_changes(&self, previous: Option<&RenderPipeline>) -> Vec<RenderStateChange> {
        match previous {
            None => self.all_states().to_vec(),
            Some(previous) => self
                .all_states()
                .into_iter()
                .zip(previous.all_states())
                .filter(|(new, old)| new != old)
                .map(|(new, _)| new)
                .collect(),
        }
    }
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("depth_test", &self.depth_test)
            .field("depth_func", &self.depth_func)
            .field("depth_write", &self.depth_write)
            .field("cull_face", &self.cull_face)
            .field("blend", &self.blend)
            .field("program", &self.program_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pipeline = RenderPipeline::default();
        assert!(pipeline.depth_test);
        assert_eq!(pipeline.depth_func, DepthFunc::Less);
        assert!(pipeline.depth_write);
        assert!(pipeline.cull_face);
        assert!(!pipeline.blend);
        assert!(pipeline.program.is_none());
    }

    #[test]
    fn test_state_changes() {
        let old = RenderPipeline::default();
        let new = RenderPipeline {
            blend: true,
            depth_func: DepthFunc::LessEqual,
            ..RenderPipeline::default()
        };
        assert_eq!(
            new.state_changes(Some(&old)),
            vec![
                RenderStateChange::DepthFunc(DepthFunc::LessEqual),
                RenderStateChange::Blend(true),
            ]
        );
        assert_eq!(new.state_changes(None).len(), 5);
        assert!(old.state_changes(Some(&old)).is_empty());
    }
}
