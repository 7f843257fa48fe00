//! Everything needed to render one frame into one target.

use std::fmt;
use std::sync::Arc;

use crate::target::RenderTarget;

use super::draw_list::{DefaultDrawCommandList, DrawCommandList};
use super::global_state::GlobalRenderState;
use super::technique::RenderTechnique;

/// Draw commands, frame-wide uniforms and techniques for one target.
///
/// The target must be set before the command is submitted.
/// [`reset`](Self::reset) prepares the command for the next frame and keeps
/// the target.
pub struct RenderCommand {
    target: Option<Arc<RenderTarget>>,
    pub(crate) draw_commands: Box<dyn DrawCommandList>,
    pub(crate) global_state: GlobalRenderState,
    pub(crate) techniques: Vec<Arc<dyn RenderTechnique>>,
}

impl RenderCommand {
    pub fn new(target: Option<Arc<RenderTarget>>) -> Self {
        Self::with_draw_commands(
            target,
            Box::new(DefaultDrawCommandList::with_capacity(
                super::DEFAULT_DRAW_COMMAND_LIST_CAPACITY,
            )),
        )
    }

    pub fn with_draw_commands(
        target: Option<Arc<RenderTarget>>,
        draw_commands: Box<dyn DrawCommandList>,
    ) -> Self {
        Self {
            target,
            draw_commands,
            global_state: GlobalRenderState::new(),
            techniques: Vec::new(),
        }
    }

    pub fn target(&self) -> Option<&Arc<RenderTarget>> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: Option<Arc<RenderTarget>>) {
        self.target = target;
    }

    pub fn draw_commands(&self) -> &dyn DrawCommandList {
        self.draw_commands.as_ref()
    }

    pub fn draw_commands_mut(&mut self) -> &mut dyn DrawCommandList {
        self.draw_commands.as_mut()
    }

    pub fn global_state(&self) -> &GlobalRenderState {
        &self.global_state
    }

    pub fn global_state_mut(&mut self) -> &mut GlobalRenderState {
        &mut self.global_state
    }

    pub fn techniques(&self) -> &[Arc<dyn RenderTechnique>] {
        &self.techniques
    }

    pub fn add_technique(&mut self, technique: Arc<dyn RenderTechnique>) {
        self.techniques.push(technique);
    }

    /// Clear draw commands, uniforms and techniques. The target is kept.
    pub fn reset(&mut self) {
        self.draw_commands.clear();
        self.global_state.reset();
        self.techniques.clear();
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCommand")
            .field("target", &self.target)
            .field("draw_commands", &self.draw_commands.len())
            .field("global_state", &self.global_state)
            .field(
                "techniques",
                &self.techniques.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullDevice;
    use crate::buffer::{HostBuffer, VertexBuffer, VertexLayout};
    use crate::render::DrawCommand;
    use crate::resources::{DrawMode, VertexData};
    use glam::Mat4;

    #[test]
    fn test_reset_keeps_target() {
        let target = RenderTarget::window();
        let mut command = RenderCommand::new(Some(target.clone()));

        let data = Arc::new(VertexData::new(
            Arc::new(NullDevice::new()),
            VertexBuffer::new(Box::new(HostBuffer::new()), VertexLayout::new()),
            None,
            DrawMode::Triangles,
        ));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, Mat4::IDENTITY)));
        command.global_state_mut().set_shared("u", 1.0f32);

        command.reset();
        assert!(command.draw_commands().is_empty());
        assert!(command.global_state().is_empty());
        assert!(Arc::ptr_eq(command.target().unwrap(), &target));
    }
}
