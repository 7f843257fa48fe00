//! Render command model and the frame renderer
//!
//! The scene layer fills a [`RenderCommand`] per frame: draw commands, a
//! [`GlobalRenderState`] with frame-wide uniforms, and the techniques to
//! apply. The [`Renderer`] consumes it pass by pass.

mod draw_command;
mod draw_context;
mod draw_list;
mod global_state;
pub mod pipeline;
mod render_command;
mod renderer;
mod technique;
pub mod uniform;
pub mod uniform_struct;

pub use draw_command::DrawCommand;
pub use draw_context::DrawContext;
pub use draw_list::{DefaultDrawCommandList, DrawCommandList, ProgramSortedDrawCommandList};
pub use global_state::GlobalRenderState;
pub use pipeline::{DepthFunc, RenderPipeline, RenderStateChange};
pub use render_command::RenderCommand;
pub use renderer::{RenderStats, Renderer, MVP_UNIFORM};
pub use technique::{DefaultPass, DefaultTechnique, RenderPass, RenderTechnique};
pub use uniform::{UniformData, UniformType, UniformValue, UniformVariable};
pub use uniform_struct::UniformStruct;

/// Initial capacity of draw command lists
pub const DEFAULT_DRAW_COMMAND_LIST_CAPACITY: usize = 1024;
