//! Render backend abstraction layer.
//!
//! Each backend implements [`RenderDevice`], which creates and destroys the
//! backend objects behind the engine's render resources, and hands out a
//! [`RendererBackend`] that turns renderer state changes into backend calls.
//!
//! # Available Backends
//!
//! - `null` (always compiled): no-op backend for headless use and testing
//! - `opengl`: OpenGL backend using glow
//! - `d3d12`: placeholder that refuses to be created
//!
//! Backend objects are tagged unions with one variant per compiled backend,
//! so a resource can be inspected without dynamic downcasting.

pub mod d3d12;
#[cfg(feature = "opengl")]
pub mod gl;
pub mod null;

use crate::buffer::{BufferKind, HostBuffer, UsageHint, VertexLayout};
use crate::error::RenderResult;
use crate::render::pipeline::RenderStateChange;
use crate::render::uniform::UniformVariable;
use crate::resources::{DrawMode, File, Image, ShaderType, TextureParameter};
use crate::RenderSystemKind;

pub use null::NullDevice;

/// Backend shader object.
#[derive(Debug)]
pub enum GpuShader {
    Null,
    #[cfg(feature = "opengl")]
    Gl(glow::Shader),
}

/// Backend program object.
#[derive(Debug)]
pub enum GpuProgram {
    Null,
    #[cfg(feature = "opengl")]
    Gl {
        program: glow::Program,
        uniforms: std::collections::HashMap<String, glow::UniformLocation>,
    },
}

impl GpuProgram {
    /// Names of the active uniforms reported by the backend.
    pub fn uniform_names(&self) -> Vec<&str> {
        match self {
            Self::Null => Vec::new(),
            #[cfg(feature = "opengl")]
            Self::Gl { uniforms, .. } => uniforms.keys().map(String::as_str).collect(),
        }
    }
}

/// Backend texture object.
#[derive(Debug)]
pub enum GpuTexture {
    Null,
    #[cfg(feature = "opengl")]
    Gl(glow::Texture),
}

/// Backend buffer object.
#[derive(Debug)]
pub enum GpuBuffer {
    /// The null backend keeps buffer contents in host memory
    Null(HostBuffer),
    #[cfg(feature = "opengl")]
    Gl {
        buffer: glow::Buffer,
        /// Binding target used when the buffer is drawn from
        target: u32,
        usage: u32,
        num_bytes: usize,
    },
}

/// Backend vertex array object.
#[derive(Debug)]
pub enum GpuVertexArray {
    Null,
    #[cfg(feature = "opengl")]
    Gl(glow::VertexArray),
}

/// Backend frame buffer object.
#[derive(Debug)]
pub enum GpuFrameBuffer {
    Null,
    #[cfg(feature = "opengl")]
    Gl {
        framebuffer: glow::Framebuffer,
        color: glow::Texture,
        depth: glow::Renderbuffer,
    },
}

/// Buffers the renderer asks the backend to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearFlags {
    pub const ALL: Self = Self {
        color: true,
        depth: true,
        stencil: true,
    };
    pub const NONE: Self = Self {
        color: false,
        depth: false,
        stencil: false,
    };

    pub fn is_empty(&self) -> bool {
        !(self.color || self.depth || self.stencil)
    }
}

/// Parameters of a single draw call.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub vertex_array: &'a GpuVertexArray,
    pub mode: DrawMode,
    pub num_vertices: usize,
    /// Index count and index type size in bytes
    pub indices: Option<(usize, usize)>,
}

/// Backend device creating and destroying backend objects.
///
/// All creation functions are invoked from
/// [`RenderResource::make_valid_impl`](crate::resource::RenderResource::make_valid_impl)
/// implementations, possibly on the resource thread.
pub trait RenderDevice: Send + Sync + 'static {
    /// Backend discriminator.
    fn kind(&self) -> RenderSystemKind;

    /// Human readable backend name.
    fn name(&self) -> &'static str;

    /// Compile a shader from the source in `file`.
    fn compile_shader(&self, shader_type: ShaderType, file: &File) -> RenderResult<GpuShader>;

    /// Link compiled shaders into a program and query its active uniforms.
    fn link_program(&self, shaders: &[&GpuShader]) -> RenderResult<GpuProgram>;

    /// Create a texture and upload `image`.
    fn create_texture(&self, image: &Image, param: &TextureParameter) -> RenderResult<GpuTexture>;

    /// Allocate a buffer of `num_bytes`.
    fn create_buffer(
        &self,
        kind: BufferKind,
        num_bytes: usize,
        hint: UsageHint,
    ) -> RenderResult<GpuBuffer>;

    /// Copy `data` into `buffer` at `offset`.
    fn write_buffer(
        &self,
        buffer: &mut GpuBuffer,
        offset: usize,
        data: &[u8],
        discard: bool,
    ) -> RenderResult<()>;

    /// Copy `dest.len()` bytes at `offset` of `buffer` into `dest`.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: usize, dest: &mut [u8]) -> RenderResult<()>;

    /// Describe the vertex layout of `vertices` (and `indices`) to the backend.
    fn create_vertex_array(
        &self,
        layout: &VertexLayout,
        vertices: &GpuBuffer,
        indices: Option<&GpuBuffer>,
    ) -> RenderResult<GpuVertexArray>;

    /// Create an off-screen frame buffer with a color and a depth attachment.
    fn create_frame_buffer(&self, width: u32, height: u32) -> RenderResult<GpuFrameBuffer>;

    fn destroy_shader(&self, shader: &GpuShader);
    fn destroy_program(&self, program: &GpuProgram);
    fn destroy_texture(&self, texture: &GpuTexture);
    fn destroy_buffer(&self, buffer: &GpuBuffer);
    fn destroy_vertex_array(&self, vertex_array: &GpuVertexArray);
    fn destroy_frame_buffer(&self, frame_buffer: &GpuFrameBuffer);

    /// Create the dispatch object used by the [`Renderer`](crate::render::Renderer).
    fn create_renderer_backend(&self) -> Box<dyn RendererBackend>;
}

/// Backend dispatch of renderer state changes.
///
/// The [`Renderer`](crate::render::Renderer) caches state and only calls
/// these when something actually changed.
pub trait RendererBackend: Send {
    /// Draw into `frame_buffer` from now on, or into the window with `None`.
    fn frame_buffer_changed(&mut self, frame_buffer: Option<&GpuFrameBuffer>) -> RenderResult<()>;

    fn program_changed(&mut self, program: Option<&GpuProgram>) -> RenderResult<()>;

    fn render_state_changed(&mut self, change: RenderStateChange) -> RenderResult<()>;

    fn viewport_changed(&mut self, x: i32, y: i32, width: i32, height: i32) -> RenderResult<()>;

    fn vertex_data_changed(&mut self, vertex_array: &GpuVertexArray) -> RenderResult<()>;

    /// Bind (`enable`) or unbind `texture` on `unit`.
    fn texture_changed(&mut self, unit: u32, texture: &GpuTexture, enable: bool)
        -> RenderResult<()>;

    fn uniform_changed(
        &mut self,
        program: &GpuProgram,
        name: &str,
        value: &UniformVariable,
    ) -> RenderResult<()>;

    fn clear(&mut self, flags: ClearFlags) -> RenderResult<()>;

    fn draw(&mut self, call: &DrawCall<'_>) -> RenderResult<()>;
}
