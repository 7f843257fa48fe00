//! Null backend for headless use and testing.
//!
//! Every operation succeeds without touching a GPU. Buffers keep their
//! contents in host memory so written data can be read back.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::{Buffer, BufferKind, HostBuffer, UsageHint, VertexLayout};
use crate::error::{RenderError, RenderResult};
use crate::render::pipeline::RenderStateChange;
use crate::render::uniform::UniformVariable;
use crate::resources::{File, Image, ShaderType, TextureParameter};
use crate::RenderSystemKind;

use super::{
    ClearFlags, DrawCall, GpuBuffer, GpuFrameBuffer, GpuProgram, GpuShader, GpuTexture,
    GpuVertexArray, RenderDevice, RendererBackend,
};

/// Null render device.
///
/// Counts the backend objects it has handed out and not yet destroyed.
#[derive(Debug, Default)]
pub struct NullDevice {
    live_objects: AtomicUsize,
}

impl NullDevice {
    /// Create a new null device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of created objects that were not destroyed yet.
    pub fn live_objects(&self) -> usize {
        self.live_objects.load(Ordering::Relaxed)
    }

    fn created(&self) {
        self.live_objects.fetch_add(1, Ordering::Relaxed);
    }

    fn destroyed(&self) {
        let _ = self
            .live_objects
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

fn host_storage(buffer: &GpuBuffer) -> RenderResult<&HostBuffer> {
    match buffer {
        GpuBuffer::Null(host) => Ok(host),
        #[cfg(feature = "opengl")]
        _ => Err(RenderError::Backend(
            "buffer was not created by the null backend".to_string(),
        )),
    }
}

impl RenderDevice for NullDevice {
    fn kind(&self) -> RenderSystemKind {
        RenderSystemKind::Null
    }

    fn name(&self) -> &'static str {
        "Null Backend"
    }

    fn compile_shader(&self, shader_type: ShaderType, file: &File) -> RenderResult<GpuShader> {
        log::trace!(
            "NullDevice: compiling {} shader \"{}\"",
            shader_type,
            file.name()
        );
        self.created();
        Ok(GpuShader::Null)
    }

    fn link_program(&self, shaders: &[&GpuShader]) -> RenderResult<GpuProgram> {
        log::trace!("NullDevice: linking program ({} shaders)", shaders.len());
        self.created();
        Ok(GpuProgram::Null)
    }

    fn create_texture(&self, image: &Image, param: &TextureParameter) -> RenderResult<GpuTexture> {
        log::trace!(
            "NullDevice: creating texture \"{}\" ({}x{}, {:?})",
            image.name,
            image.width,
            image.height,
            param
        );
        self.created();
        Ok(GpuTexture::Null)
    }

    fn create_buffer(
        &self,
        kind: BufferKind,
        num_bytes: usize,
        hint: UsageHint,
    ) -> RenderResult<GpuBuffer> {
        log::trace!(
            "NullDevice: creating {:?} buffer (size: {}, {:?})",
            kind,
            num_bytes,
            hint
        );
        self.created();
        Ok(GpuBuffer::Null(HostBuffer::with_size(num_bytes)))
    }

    fn write_buffer(
        &self,
        buffer: &mut GpuBuffer,
        offset: usize,
        data: &[u8],
        discard: bool,
    ) -> RenderResult<()> {
        match buffer {
            GpuBuffer::Null(host) => host.write(data, offset, discard),
            #[cfg(feature = "opengl")]
            _ => Err(RenderError::Backend(
                "buffer was not created by the null backend".to_string(),
            )),
        }
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: usize, dest: &mut [u8]) -> RenderResult<()> {
        host_storage(buffer)?.read(offset, dest)
    }

    fn create_vertex_array(
        &self,
        layout: &VertexLayout,
        vertices: &GpuBuffer,
        indices: Option<&GpuBuffer>,
    ) -> RenderResult<GpuVertexArray> {
        host_storage(vertices)?;
        if let Some(indices) = indices {
            host_storage(indices)?;
        }
        log::trace!(
            "NullDevice: creating vertex array ({} attributes, stride {})",
            layout.attributes().len(),
            layout.stride()
        );
        self.created();
        Ok(GpuVertexArray::Null)
    }

    fn create_frame_buffer(&self, width: u32, height: u32) -> RenderResult<GpuFrameBuffer> {
        log::trace!("NullDevice: creating frame buffer ({}x{})", width, height);
        self.created();
        Ok(GpuFrameBuffer::Null)
    }

    fn destroy_shader(&self, _shader: &GpuShader) {
        log::trace!("NullDevice: destroying shader");
        self.destroyed();
    }

    fn destroy_program(&self, _program: &GpuProgram) {
        log::trace!("NullDevice: destroying program");
        self.destroyed();
    }

    fn destroy_texture(&self, _texture: &GpuTexture) {
        log::trace!("NullDevice: destroying texture");
        self.destroyed();
    }

    fn destroy_buffer(&self, _buffer: &GpuBuffer) {
        log::trace!("NullDevice: destroying buffer");
        self.destroyed();
    }

    fn destroy_vertex_array(&self, _vertex_array: &GpuVertexArray) {
        log::trace!("NullDevice: destroying vertex array");
        self.destroyed();
    }

    fn destroy_frame_buffer(&self, _frame_buffer: &GpuFrameBuffer) {
        log::trace!("NullDevice: destroying frame buffer");
        self.destroyed();
    }

    fn create_renderer_backend(&self) -> Box<dyn RendererBackend> {
        Box::new(NullRendererBackend::default())
    }
}

/// Renderer dispatch that only counts draw calls.
#[derive(Debug, Default)]
pub struct NullRendererBackend {
    draw_calls: usize,
}

impl NullRendererBackend {
    /// Number of draw calls issued so far.
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }
}

impl RendererBackend for NullRendererBackend {
    fn frame_buffer_changed(
        &mut self,
        frame_buffer: Option<&GpuFrameBuffer>,
    ) -> RenderResult<()> {
        log::trace!(
            "NullRenderer: frame buffer changed (off-screen: {})",
            frame_buffer.is_some()
        );
        Ok(())
    }

    fn program_changed(&mut self, program: Option<&GpuProgram>) -> RenderResult<()> {
        log::trace!("NullRenderer: program changed (bound: {})", program.is_some());
        Ok(())
    }

    fn render_state_changed(&mut self, change: RenderStateChange) -> RenderResult<()> {
        log::trace!("NullRenderer: {:?}", change);
        Ok(())
    }

    fn viewport_changed(&mut self, x: i32, y: i32, width: i32, height: i32) -> RenderResult<()> {
        log::trace!("NullRenderer: viewport ({}, {}, {}, {})", x, y, width, height);
        Ok(())
    }

    fn vertex_data_changed(&mut self, _vertex_array: &GpuVertexArray) -> RenderResult<()> {
        log::trace!("NullRenderer: vertex data changed");
        Ok(())
    }

    fn texture_changed(
        &mut self,
        unit: u32,
        _texture: &GpuTexture,
        enable: bool,
    ) -> RenderResult<()> {
        log::trace!("NullRenderer: texture unit {} enabled: {}", unit, enable);
        Ok(())
    }

    fn uniform_changed(
        &mut self,
        _program: &GpuProgram,
        name: &str,
        value: &UniformVariable,
    ) -> RenderResult<()> {
        log::trace!("NullRenderer: {} = {}", name, value);
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags) -> RenderResult<()> {
        log::trace!("NullRenderer: clear {:?}", flags);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> RenderResult<()> {
        self.draw_calls += 1;
        log::trace!(
            "NullRenderer: draw {:?} ({} vertices, indices: {:?})",
            call.mode,
            call.num_vertices,
            call.indices
        );
        Ok(())
    }
}
