//! OpenGL backend using glow.
//!
//! The context is created by the windowing layer and handed over as a
//! [`glow::Context`]. Every call requires that context (or one sharing
//! objects with it) to be current on the calling thread; the resource thread
//! binds its own shared context in its init function.

mod renderer;

use std::collections::HashMap;
use std::sync::Arc;

use glow::{HasContext, PixelUnpackData};

use crate::buffer::{BufferKind, UsageHint, VertexLayout};
use crate::error::{RenderError, RenderResult};
use crate::resources::{EdgeSampling, File, FilterMode, Image, ShaderType, TextureParameter};
use crate::RenderSystemKind;

use super::{
    GpuBuffer, GpuFrameBuffer, GpuProgram, GpuShader, GpuTexture, GpuVertexArray, RenderDevice,
    RendererBackend,
};

pub use renderer::GlRendererBackend;

/// `GL_CONTEXT_LOST`, reported by `glGetError` after a device reset.
const CONTEXT_LOST: u32 = 0x0507;

/// Attribute locations bound before linking, matching
/// [`VertexLayout::position_normal_uv_color`].
const ATTRIBUTE_LOCATIONS: [&str; 4] = ["in_Position", "in_Normal", "in_TexCoord", "in_Color"];

/// Shareable OpenGL context.
pub struct GlContext(glow::Context);

// SAFETY: the function table and capability data of a glow context are
// immutable after creation. Issuing calls additionally requires a current
// context on the calling thread, which the render system arranges for the
// main and the resource thread.
unsafe impl Send for GlContext {}
// SAFETY: see above.
unsafe impl Sync for GlContext {}

impl GlContext {
    pub fn new(gl: glow::Context) -> Self {
        Self(gl)
    }

    pub fn gl(&self) -> &glow::Context {
        &self.0
    }
}

impl std::fmt::Debug for GlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlContext").finish_non_exhaustive()
    }
}

/// Map the pending GL error, if any, to a [`RenderError`].
///
/// # Safety
///
/// Requires a current OpenGL context.
unsafe fn check_error(gl: &glow::Context, call: &str) -> RenderResult<()> {
    match unsafe { gl.get_error() } {
        glow::NO_ERROR => Ok(()),
        CONTEXT_LOST => Err(RenderError::ContextLost),
        code => Err(RenderError::Backend(format!(
            "OpenGL error 0x{code:04x} in {call}"
        ))),
    }
}

fn foreign(what: &str) -> RenderError {
    RenderError::Backend(format!("{what} was not created by the OpenGL backend"))
}

fn gl_size(value: usize) -> RenderResult<i32> {
    i32::try_from(value)
        .map_err(|_| RenderError::Backend(format!("size {value} exceeds the OpenGL range")))
}

fn shader_stage(shader_type: ShaderType) -> u32 {
    match shader_type {
        ShaderType::Vertex => glow::VERTEX_SHADER,
        ShaderType::Fragment => glow::FRAGMENT_SHADER,
        ShaderType::Geometry => glow::GEOMETRY_SHADER,
        ShaderType::TessControl => glow::TESS_CONTROL_SHADER,
        ShaderType::TessEvaluation => glow::TESS_EVALUATION_SHADER,
        ShaderType::Compute => glow::COMPUTE_SHADER,
    }
}

fn buffer_target(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Host | BufferKind::Vertex => glow::ARRAY_BUFFER,
        BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
        BufferKind::Uniform => glow::UNIFORM_BUFFER,
    }
}

fn buffer_usage(hint: UsageHint) -> u32 {
    if hint.contains(UsageHint::DISCARDABLE) {
        glow::STREAM_DRAW
    } else if hint.contains(UsageHint::DYNAMIC) {
        glow::DYNAMIC_DRAW
    } else {
        glow::STATIC_DRAW
    }
}

fn filter(mode: FilterMode, mipmap: bool) -> i32 {
    let value = match (mode, mipmap) {
        (FilterMode::Nearest, false) => glow::NEAREST,
        (FilterMode::Linear, false) => glow::LINEAR,
        (FilterMode::Nearest, true) => glow::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, true) => glow::LINEAR_MIPMAP_LINEAR,
    };
    value as i32
}

fn wrap(edge: EdgeSampling) -> i32 {
    let value = match edge {
        EdgeSampling::Repeat => glow::REPEAT,
        EdgeSampling::ClampToEdge => glow::CLAMP_TO_EDGE,
        EdgeSampling::MirroredRepeat => glow::MIRRORED_REPEAT,
    };
    value as i32
}

/// Location of a vertex attribute: the bound location for the well-known
/// names, the position in the layout otherwise.
fn attribute_location(name: &str, index: usize) -> u32 {
    let location = ATTRIBUTE_LOCATIONS
        .iter()
        .position(|known| *known == name)
        .unwrap_or(index);
    location as u32
}

/// The source line a compiler log points at, if the log names one.
///
/// Understands the `0:<line>` (Mesa, AMD) and `0(<line>)` (NVIDIA) styles.
pub(crate) fn offending_line(log: &str, source: &str) -> Option<(usize, String)> {
    let line = ["0:", "0("].iter().find_map(|pattern| {
        let start = log.find(pattern)? + pattern.len();
        let digits: String = log[start..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse::<usize>().ok()
    })?;
    let text = source.lines().nth(line.checked_sub(1)?)?;
    Some((line, text.trim().to_string()))
}

/// OpenGL render device.
pub struct GlDevice {
    context: Arc<GlContext>,
}

impl GlDevice {
    pub fn new(context: Arc<GlContext>) -> Self {
        Self { context }
    }

    fn gl(&self) -> &glow::Context {
        self.context.gl()
    }
}

impl RenderDevice for GlDevice {
    fn kind(&self) -> RenderSystemKind {
        RenderSystemKind::OpenGL
    }

    fn name(&self) -> &'static str {
        "OpenGL Backend"
    }

    fn compile_shader(&self, shader_type: ShaderType, file: &File) -> RenderResult<GpuShader> {
        let gl = self.gl();
        let source = file.text();
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let shader = gl
                .create_shader(shader_stage(shader_type))
                .map_err(|reason| RenderError::ResourceCreationFailed {
                    what: "shader",
                    reason,
                })?;
            gl.shader_source(shader, &source);
            gl.compile_shader(shader);

            if !gl.get_shader_compile_status(shader) {
                let info = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                let mut log = info.trim_end().to_string();
                if let Some((line, text)) = offending_line(&info, &source) {
                    log.push_str(&format!("\n  line {line}: {text}"));
                }
                return Err(RenderError::ShaderCompilationFailed {
                    file: file.name(),
                    log,
                });
            }
            Ok(GpuShader::Gl(shader))
        }
    }

    fn link_program(&self, shaders: &[&GpuShader]) -> RenderResult<GpuProgram> {
        let gl = self.gl();
        let handles = shaders
            .iter()
            .map(|shader| match shader {
                GpuShader::Gl(handle) => Ok(*handle),
                _ => Err(foreign("shader")),
            })
            .collect::<RenderResult<Vec<_>>>()?;

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let program = gl
                .create_program()
                .map_err(RenderError::ProgramLinkFailed)?;
            for &shader in &handles {
                gl.attach_shader(program, shader);
            }
            for (location, name) in ATTRIBUTE_LOCATIONS.iter().enumerate() {
                gl.bind_attrib_location(program, location as u32, name);
            }
            gl.link_program(program);

            for &shader in &handles {
                gl.detach_shader(program, shader);
            }
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RenderError::ProgramLinkFailed(log.trim_end().to_string()));
            }

            let mut uniforms = HashMap::new();
            for index in 0..gl.get_active_uniforms(program) {
                let Some(active) = gl.get_active_uniform(program, index) else {
                    continue;
                };
                let name = active
                    .name
                    .strip_suffix("[0]")
                    .unwrap_or(&active.name)
                    .to_string();
                if let Some(location) = gl.get_uniform_location(program, &active.name) {
                    uniforms.insert(name, location);
                }
            }
            log::debug!(
                "OpenGL: linked program with {} active uniforms",
                uniforms.len()
            );
            Ok(GpuProgram::Gl { program, uniforms })
        }
    }

    fn create_texture(&self, image: &Image, param: &TextureParameter) -> RenderResult<GpuTexture> {
        let gl = self.gl();
        let width = gl_size(image.width as usize)?;
        let height = gl_size(image.height as usize)?;

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let texture = gl
                .create_texture()
                .map_err(|reason| RenderError::ResourceCreationFailed {
                    what: "texture",
                    reason,
                })?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(&image.pixels)),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                filter(param.min_filter, param.use_mipmap),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                filter(param.mag_filter, false),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap(param.edge_sampling));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap(param.edge_sampling));
            if param.use_mipmap {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            gl.bind_texture(glow::TEXTURE_2D, None);

            if let Err(err) = check_error(gl, "create_texture") {
                gl.delete_texture(texture);
                return Err(err);
            }
            Ok(GpuTexture::Gl(texture))
        }
    }

    fn create_buffer(
        &self,
        kind: BufferKind,
        num_bytes: usize,
        hint: UsageHint,
    ) -> RenderResult<GpuBuffer> {
        let gl = self.gl();
        let size = gl_size(num_bytes)?;
        let usage = buffer_usage(hint);

        // Uploads go through the copy target so no vertex array state changes.
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let buffer = gl
                .create_buffer()
                .map_err(|reason| RenderError::ResourceCreationFailed {
                    what: "buffer",
                    reason,
                })?;
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(buffer));
            gl.buffer_data_size(glow::COPY_WRITE_BUFFER, size, usage);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);

            if let Err(err) = check_error(gl, "create_buffer") {
                gl.delete_buffer(buffer);
                return Err(err);
            }
            Ok(GpuBuffer::Gl {
                buffer,
                target: buffer_target(kind),
                usage,
                num_bytes,
            })
        }
    }

    fn write_buffer(
        &self,
        buffer: &mut GpuBuffer,
        offset: usize,
        data: &[u8],
        discard: bool,
    ) -> RenderResult<()> {
        let GpuBuffer::Gl {
            buffer,
            usage,
            num_bytes,
            ..
        } = buffer
        else {
            return Err(foreign("buffer"));
        };
        let gl = self.gl();
        let offset = gl_size(offset)?;

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(*buffer));
            if discard {
                // Orphan the old storage so the driver need not wait for it.
                gl.buffer_data_size(glow::COPY_WRITE_BUFFER, gl_size(*num_bytes)?, *usage);
            }
            gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset, data);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
            check_error(gl, "write_buffer")
        }
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: usize, dest: &mut [u8]) -> RenderResult<()> {
        let GpuBuffer::Gl { buffer, .. } = buffer else {
            return Err(foreign("buffer"));
        };
        let gl = self.gl();
        let offset = gl_size(offset)?;

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            gl.bind_buffer(glow::COPY_READ_BUFFER, Some(*buffer));
            gl.get_buffer_sub_data(glow::COPY_READ_BUFFER, offset, dest);
            gl.bind_buffer(glow::COPY_READ_BUFFER, None);
            check_error(gl, "read_buffer")
        }
    }

    fn create_vertex_array(
        &self,
        layout: &VertexLayout,
        vertices: &GpuBuffer,
        indices: Option<&GpuBuffer>,
    ) -> RenderResult<GpuVertexArray> {
        let GpuBuffer::Gl {
            buffer: vertex_buffer,
            ..
        } = vertices
        else {
            return Err(foreign("vertex buffer"));
        };
        let index_buffer = match indices {
            Some(GpuBuffer::Gl { buffer, .. }) => Some(*buffer),
            Some(_) => return Err(foreign("index buffer")),
            None => None,
        };
        let gl = self.gl();
        let stride = gl_size(layout.stride())?;

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let vertex_array =
                gl.create_vertex_array()
                    .map_err(|reason| RenderError::ResourceCreationFailed {
                        what: "vertex array",
                        reason,
                    })?;
            gl.bind_vertex_array(Some(vertex_array));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(*vertex_buffer));
            for (index, attribute) in layout.attributes().iter().enumerate() {
                let location = attribute_location(&attribute.name, index);
                let data_type = if attribute.format.is_normalized() {
                    glow::UNSIGNED_BYTE
                } else {
                    glow::FLOAT
                };
                gl.enable_vertex_attrib_array(location);
                gl.vertex_attrib_pointer_f32(
                    location,
                    attribute.format.components(),
                    data_type,
                    attribute.format.is_normalized(),
                    stride,
                    gl_size(attribute.offset)?,
                );
            }
            if let Some(index_buffer) = index_buffer {
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index_buffer));
            }
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            if let Err(err) = check_error(gl, "create_vertex_array") {
                gl.delete_vertex_array(vertex_array);
                return Err(err);
            }
            Ok(GpuVertexArray::Gl(vertex_array))
        }
    }

    fn create_frame_buffer(&self, width: u32, height: u32) -> RenderResult<GpuFrameBuffer> {
        let gl = self.gl();
        let width = gl_size(width as usize)?;
        let height = gl_size(height as usize)?;
        let failed = |reason: String| RenderError::ResourceCreationFailed {
            what: "frame buffer",
            reason,
        };

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let framebuffer = gl.create_framebuffer().map_err(failed)?;
            let color = gl.create_texture().map_err(failed)?;
            let depth = gl.create_renderbuffer().map_err(failed)?;

            gl.bind_texture(glow::TEXTURE_2D, Some(color));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);

            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH_COMPONENT24, width, height);
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(color),
                0,
            );
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(depth),
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(color);
                gl.delete_renderbuffer(depth);
                return Err(failed(format!("incomplete frame buffer (status 0x{status:04x})")));
            }
            Ok(GpuFrameBuffer::Gl {
                framebuffer,
                color,
                depth,
            })
        }
    }

    fn destroy_shader(&self, shader: &GpuShader) {
        if let GpuShader::Gl(shader) = shader {
            // SAFETY: the render system keeps a context current on this thread.
            unsafe { self.gl().delete_shader(*shader) };
        }
    }

    fn destroy_program(&self, program: &GpuProgram) {
        if let GpuProgram::Gl { program, .. } = program {
            // SAFETY: the render system keeps a context current on this thread.
            unsafe { self.gl().delete_program(*program) };
        }
    }

    fn destroy_texture(&self, texture: &GpuTexture) {
        if let GpuTexture::Gl(texture) = texture {
            // SAFETY: the render system keeps a context current on this thread.
            unsafe { self.gl().delete_texture(*texture) };
        }
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let GpuBuffer::Gl { buffer, .. } = buffer {
            // SAFETY: the render system keeps a context current on this thread.
            unsafe { self.gl().delete_buffer(*buffer) };
        }
    }

    fn destroy_vertex_array(&self, vertex_array: &GpuVertexArray) {
        if let GpuVertexArray::Gl(vertex_array) = vertex_array {
            // SAFETY: the render system keeps a context current on this thread.
            unsafe { self.gl().delete_vertex_array(*vertex_array) };
        }
    }

    fn destroy_frame_buffer(&self, frame_buffer: &GpuFrameBuffer) {
        if let GpuFrameBuffer::Gl {
            framebuffer,
            color,
            depth,
        } = frame_buffer
        {
            // SAFETY: the render system keeps a context current on this thread.
            unsafe {
                let gl = self.gl();
                gl.delete_framebuffer(*framebuffer);
                gl.delete_texture(*color);
                gl.delete_renderbuffer(*depth);
            }
        }
    }

    fn create_renderer_backend(&self) -> Box<dyn RendererBackend> {
        Box::new(GlRendererBackend::new(self.context.clone()))
    }
}

impl std::fmt::Debug for GlDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlDevice").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "#version 330\nvoid main() {\n  gl_Position = vec4(1.0)\n}\n";

    #[test]
    fn test_offending_line_mesa_style() {
        let log = "0:3(25): error: syntax error, unexpected '}'";
        assert_eq!(
            offending_line(log, SOURCE),
            Some((3, "gl_Position = vec4(1.0)".to_string()))
        );
    }

    #[test]
    fn test_offending_line_nvidia_style() {
        let log = "0(2) : error C0000: syntax error";
        assert_eq!(
            offending_line(log, SOURCE),
            Some((2, "void main() {".to_string()))
        );
    }

    #[test]
    fn test_offending_line_without_location() {
        assert_eq!(offending_line("internal compiler error", SOURCE), None);
        assert_eq!(offending_line("0:99: error", SOURCE), None);
    }

    #[test]
    fn test_attribute_location() {
        assert_eq!(attribute_location("in_TexCoord", 0), 2);
        assert_eq!(attribute_location("in_Custom", 5), 5);
    }

    #[test]
    fn test_usage_mapping() {
        assert_eq!(buffer_usage(UsageHint::STATIC_WRITE_ONLY), glow::STATIC_DRAW);
        assert_eq!(buffer_usage(UsageHint::DYNAMIC_WRITE_ONLY), glow::DYNAMIC_DRAW);
        assert_eq!(
            buffer_usage(UsageHint::DYNAMIC_WRITE_ONLY_DISCARDABLE),
            glow::STREAM_DRAW
        );
    }
}
