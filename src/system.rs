//! The render system: backend selection and the per-frame entry point.

use std::path::Path;
use std::sync::Arc;

use crate::backend::{d3d12, NullDevice, RenderDevice};
use crate::buffer::{
    Buffer, BufferKind, DeviceBuffer, IndexBuffer, IndexType, UniformBuffer, UsageHint,
    VertexBuffer, VertexLayout,
};
use crate::error::{self, RenderError, RenderResult};
use crate::render::{DefaultDrawCommandList, RenderCommand, RenderStats, Renderer};
use crate::resource::RenderResource;
use crate::resources::{
    DrawMode, File, FrameBuffer, Image, Program, ProgramManager, Shader, ShaderManager,
    ShaderType, Texture, TextureManager, TextureParameter, VertexData,
};
use crate::server::{self, RenderServer, TaskFuture};
use crate::target::{RenderTarget, Viewport, ViewportGeometry};
use crate::window::{NullWindow, RenderWindow};
use crate::{RenderSystemKind, RenderSystemOptions};

/// Owns a backend device, the main window, the renderer and the resource
/// thread.
///
/// Resources created here share the system's device and are cached by the
/// managers, so requesting the same shader twice yields the same object.
pub struct RenderSystem {
    // Joined first so no task outlives the rest of the system.
    server: Option<RenderServer>,
    shaders: ShaderManager,
    programs: ProgramManager,
    textures: TextureManager,
    renderer: Renderer,
    window: Box<dyn RenderWindow>,
    device: Arc<dyn RenderDevice>,
    options: RenderSystemOptions,
    frames: u64,
}

impl RenderSystem {
    /// Create a render system of `options.kind`.
    ///
    /// The OpenGL backend needs a context created by the windowing layer; use
    /// [`with_gl_context`](Self::with_gl_context) for it.
    pub fn create(options: RenderSystemOptions) -> RenderResult<Self> {
        log::info!("creating {} render system", options.kind);
        match options.kind {
            RenderSystemKind::Null => {
                let window = Box::new(NullWindow::new(options.window.clone()));
                Self::assemble(options, Arc::new(NullDevice::new()), window, || {
                    log::debug!("null resource thread initialized");
                })
            }
            RenderSystemKind::OpenGL => Err(RenderError::Unsupported(
                RenderSystemKind::OpenGL,
                "an OpenGL context must be supplied through RenderSystem::with_gl_context"
                    .to_string(),
            )),
            RenderSystemKind::D3D12 => {
                let device = d3d12::create_device()?;
                let window = Box::new(NullWindow::new(options.window.clone()));
                Self::assemble(options, device, window, || {})
            }
        }
    }

    /// Create an OpenGL render system on an existing context.
    ///
    /// `resource_thread_init` runs on the resource thread before any task and
    /// must make a context sharing objects with `gl` current there.
    #[cfg(feature = "opengl")]
    pub fn with_gl_context<F>(
        gl: glow::Context,
        window: Box<dyn RenderWindow>,
        mut options: RenderSystemOptions,
        resource_thread_init: F,
    ) -> RenderResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        use crate::backend::gl::{GlContext, GlDevice};

        options.kind = RenderSystemKind::OpenGL;
        log::info!("creating OpenGL render system");
        let device = Arc::new(GlDevice::new(Arc::new(GlContext::new(gl))));
        Self::assemble(options, device, window, resource_thread_init)
    }

    fn assemble<F>(
        options: RenderSystemOptions,
        device: Arc<dyn RenderDevice>,
        window: Box<dyn RenderWindow>,
        resource_thread_init: F,
    ) -> RenderResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let server = if options.resource_thread {
            let mut server = RenderServer::new();
            server.init_resource_thread(resource_thread_init)?;
            Some(server)
        } else {
            None
        };

        log::info!("render system ready ({})", device.name());
        Ok(Self {
            server,
            shaders: ShaderManager::new(device.clone()),
            programs: ProgramManager::new(device.clone()),
            textures: TextureManager::new(device.clone()),
            renderer: Renderer::new(device.create_renderer_backend(), options.debug),
            window,
            device,
            options,
            frames: 0,
        })
    }

    pub fn kind(&self) -> RenderSystemKind {
        self.device.kind()
    }

    pub fn options(&self) -> &RenderSystemOptions {
        &self.options
    }

    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    pub fn window(&self) -> &dyn RenderWindow {
        self.window.as_ref()
    }

    pub fn window_mut(&mut self) -> &mut dyn RenderWindow {
        self.window.as_mut()
    }

    /// The render target of the main window.
    pub fn window_target(&self) -> &Arc<RenderTarget> {
        self.window.target()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn server(&self) -> Option<&RenderServer> {
        self.server.as_ref()
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn shader_manager(&self) -> &ShaderManager {
        &self.shaders
    }

    pub fn program_manager(&self) -> &ProgramManager {
        &self.programs
    }

    pub fn texture_manager(&self) -> &TextureManager {
        &self.textures
    }

    /// Drop cached resources nothing outside the managers refers to.
    ///
    /// Programs go first so the shaders they held become collectable.
    pub fn collect_garbage(&self) -> usize {
        self.programs.collect_garbage()
            + self.shaders.collect_garbage()
            + self.textures.collect_garbage()
    }

    pub fn create_shader(&self, shader_type: ShaderType, file: &File) -> Arc<Shader> {
        self.shaders.get(shader_type, file)
    }

    /// Load a shader source from disk.
    pub fn load_shader<P: AsRef<Path>>(
        &self,
        shader_type: ShaderType,
        path: P,
    ) -> RenderResult<Arc<Shader>> {
        Ok(self.create_shader(shader_type, &File::load(path)?))
    }

    pub fn create_program(&self, shaders: &[Arc<Shader>]) -> Arc<Program> {
        self.programs.get(shaders)
    }

    pub fn create_texture(&self, image: &Arc<Image>, param: TextureParameter) -> Arc<Texture> {
        self.textures.get(image, param)
    }

    fn create_device_buffer(
        &self,
        kind: BufferKind,
        num_bytes: usize,
        hint: UsageHint,
        use_shadow_buffer: bool,
    ) -> RenderResult<DeviceBuffer> {
        let mut buffer = DeviceBuffer::new(self.device.clone(), kind, use_shadow_buffer);
        buffer.allocate(num_bytes, hint)?;
        Ok(buffer)
    }

    /// Allocate a device vertex buffer for `num_vertices` vertices of `layout`.
    pub fn create_vertex_buffer(
        &self,
        layout: VertexLayout,
        num_vertices: usize,
        hint: UsageHint,
        use_shadow_buffer: bool,
    ) -> RenderResult<VertexBuffer> {
        let num_bytes = num_vertices * layout.stride();
        let buffer =
            self.create_device_buffer(BufferKind::Vertex, num_bytes, hint, use_shadow_buffer)?;
        Ok(VertexBuffer::new(Box::new(buffer), layout))
    }

    pub fn create_index_buffer(
        &self,
        index_type: IndexType,
        num_indices: usize,
        hint: UsageHint,
        use_shadow_buffer: bool,
    ) -> RenderResult<IndexBuffer> {
        let num_bytes = num_indices * index_type.size();
        let buffer =
            self.create_device_buffer(BufferKind::Index, num_bytes, hint, use_shadow_buffer)?;
        Ok(IndexBuffer::new(Box::new(buffer), index_type))
    }

    pub fn create_uniform_buffer(
        &self,
        num_bytes: usize,
        hint: UsageHint,
    ) -> RenderResult<UniformBuffer> {
        let buffer = self.create_device_buffer(BufferKind::Uniform, num_bytes, hint, true)?;
        Ok(UniformBuffer::new(Box::new(buffer)))
    }

    pub fn create_vertex_data(
        &self,
        vertices: VertexBuffer,
        indices: Option<IndexBuffer>,
        draw_mode: DrawMode,
    ) -> Arc<VertexData> {
        Arc::new(VertexData::new(
            self.device.clone(),
            vertices,
            indices,
            draw_mode,
        ))
    }

    pub fn create_frame_buffer(&self, width: u32, height: u32) -> Arc<FrameBuffer> {
        Arc::new(FrameBuffer::new(self.device.clone(), width, height))
    }

    /// An off-screen target of `width` x `height` with a full-size viewport.
    pub fn create_off_screen_target(&self, width: u32, height: u32) -> Arc<RenderTarget> {
        let target = RenderTarget::off_screen(self.create_frame_buffer(width, height));
        Viewport::attach(
            &target,
            None,
            ViewportGeometry::new(0, 0, width as i32, height as i32),
        );
        target
    }

    /// An empty command targeting the main window.
    pub fn create_render_command(&self) -> RenderCommand {
        RenderCommand::with_draw_commands(
            Some(self.window.target().clone()),
            Box::new(DefaultDrawCommandList::with_capacity(
                self.options.draw_command_list_capacity,
            )),
        )
    }

    /// Render `command`, presenting the window unless the target is
    /// off-screen.
    ///
    /// Fatal errors (a lost context) are handed to [`error::fatal`] and do not
    /// return.
    pub fn render_one_frame(&mut self, command: &mut RenderCommand) -> RenderResult<RenderStats> {
        let off_screen = command.target().is_some_and(|target| target.is_off_screen());

        let stats = self.renderer.render(command).map_err(Self::escalate)?;
        if !off_screen {
            self.window.swap_buffers().map_err(Self::escalate)?;
        }
        self.frames += 1;
        log::trace!("frame {} rendered: {:?}", self.frames, stats);
        Ok(stats)
    }

    fn escalate(err: RenderError) -> RenderError {
        if err.is_fatal() {
            error::fatal(&format!("render system failure: {err}"), false);
        }
        err
    }

    /// Run `task` on the resource thread, or inline without one.
    pub fn spawn_resource_task<F, T>(&self, task: F) -> TaskFuture<T>
    where
        F: FnOnce() -> RenderResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match &self.server {
            Some(server) => server.spawn_resource_task(task),
            None => TaskFuture::ready(server::run_task(task)),
        }
    }

    /// Make `resource` valid on the resource thread.
    pub fn load_async<R>(&self, resource: Arc<R>) -> TaskFuture<()>
    where
        R: RenderResource + ?Sized + 'static,
    {
        self.spawn_resource_task(move || resource.ensure_valid())
    }
}

impl std::fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSystem")
            .field("kind", &self.kind())
            .field("frames", &self.frames)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}
