//! Sequoia Render - the render core of the Sequoia engine
//!
//! The crate abstracts graphics backends behind one render-system interface:
//! - **Null**: headless backend that performs no GPU work (tests, servers)
//! - **OpenGL**: rendering through `glow` on an externally created context
//! - **D3D12**: reserved, reports itself as unsupported
//!
//! # Features
//! - Lazily and thread-safely validated GPU resources with sticky failure
//! - Host and device buffers with bounds-checked read/write/lock
//! - Typed uniform variables with shared and per-program scoping
//! - Draw command lists aggregated into per-frame render commands
//! - A background resource thread with future-based result delivery

pub mod backend;
pub mod buffer;
pub mod error;
pub mod render;
pub mod resource;
pub mod resources;
pub mod server;
pub mod system;
pub mod target;
pub mod window;

pub use buffer::{
    Buffer, BufferKind, BufferLock, DeviceBuffer, HostBuffer, IndexBuffer, IndexType, LockOption,
    UniformBuffer, UsageHint, VertexAttribute, VertexBuffer, VertexFormat, VertexLayout,
};
pub use error::{RenderError, RenderResult};
pub use render::{
    DefaultDrawCommandList, DefaultPass, DefaultTechnique, DrawCommand, DrawCommandList,
    DrawContext, GlobalRenderState, ProgramSortedDrawCommandList, RenderCommand, RenderPass,
    RenderPipeline, RenderStats, RenderTechnique, Renderer, UniformStruct, UniformType,
    UniformVariable,
};
pub use resource::{RenderResource, ResourceValidity};
pub use resources::{
    DrawMode, EdgeSampling, File, FilterMode, FrameBuffer, Image, Program, ProgramId,
    ProgramManager, Shader, ShaderManager, ShaderType, Texture, TextureManager, TextureParameter,
    VertexData,
};
pub use server::{RenderServer, ServerState, TaskFuture};
pub use system::RenderSystem;
pub use target::{Camera, RenderTarget, Viewport, ViewportGeometry, ViewportListener};
pub use window::{NullWindow, RenderWindow, WindowHint};

/// Backend selection for the render system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderSystemKind {
    /// Headless backend, every operation succeeds without touching a GPU
    #[default]
    Null,
    /// OpenGL backend via glow
    OpenGL,
    /// Direct3D 12, not implemented
    D3D12,
}

impl std::fmt::Display for RenderSystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RenderSystemKind::Null => "Null",
            RenderSystemKind::OpenGL => "OpenGL",
            RenderSystemKind::D3D12 => "D3D12",
        };
        f.write_str(name)
    }
}

/// Configuration for creating a [`RenderSystem`]
#[derive(Debug, Clone)]
pub struct RenderSystemOptions {
    /// Which backend to use
    pub kind: RenderSystemKind,
    /// Dump renderer state and call arguments when a backend call fails
    pub debug: bool,
    /// Start a background resource thread
    pub resource_thread: bool,
    /// Initial capacity of newly created draw command lists
    pub draw_command_list_capacity: usize,
    /// Main window hints
    pub window: WindowHint,
}

impl Default for RenderSystemOptions {
    fn default() -> Self {
        Self {
            kind: RenderSystemKind::Null,
            debug: false,
            resource_thread: true,
            draw_command_list_capacity: render::DEFAULT_DRAW_COMMAND_LIST_CAPACITY,
            window: WindowHint::default(),
        }
    }
}
