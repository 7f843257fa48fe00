//! Render passes and techniques.

use std::sync::Arc;

use crate::error::RenderResult;
use crate::resources::Program;

use super::draw_context::DrawContext;

/// One traversal of the draw commands with a given pipeline.
pub trait RenderPass: Send + Sync {
    fn name(&self) -> &str;

    /// Configure pipeline, uniforms and clear flags before drawing.
    fn set_up(&self, ctx: &mut DrawContext<'_>) -> RenderResult<()>;

    /// Called after all draw commands of the pass were issued.
    fn tear_down(&self, _ctx: &mut DrawContext<'_>) -> RenderResult<()> {
        Ok(())
    }
}

/// An ordered sequence of passes.
pub trait RenderTechnique: Send + Sync {
    fn name(&self) -> &str;

    fn passes(&self) -> &[Box<dyn RenderPass>];
}

/// Draws every command with a single program.
pub struct DefaultPass {
    program: Arc<Program>,
}

impl DefaultPass {
    pub fn new(program: Arc<Program>) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }
}

impl RenderPass for DefaultPass {
    fn name(&self) -> &str {
        "Default"
    }

    fn set_up(&self, ctx: &mut DrawContext<'_>) -> RenderResult<()> {
        ctx.pipeline.program = Some(self.program.clone());
        Ok(())
    }
}

/// A technique made of one [`DefaultPass`].
pub struct DefaultTechnique {
    passes: Vec<Box<dyn RenderPass>>,
}

impl DefaultTechnique {
    pub fn new(program: Arc<Program>) -> Self {
        Self {
            passes: vec![Box::new(DefaultPass::new(program))],
        }
    }
}

impl RenderTechnique for DefaultTechnique {
    fn name(&self) -> &str {
        "Default"
    }

    fn passes(&self) -> &[Box<dyn RenderPass>] {
        &self.passes
    }
}
