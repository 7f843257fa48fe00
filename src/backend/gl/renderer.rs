//! OpenGL dispatch of renderer state changes.

use std::sync::Arc;

use bytemuck::cast_slice;
use glow::HasContext;

use crate::backend::{
    ClearFlags, DrawCall, GpuFrameBuffer, GpuProgram, GpuTexture, GpuVertexArray, RendererBackend,
};
use crate::error::{RenderError, RenderResult};
use crate::render::pipeline::{DepthFunc, RenderStateChange};
use crate::render::{UniformData, UniformVariable};
use crate::resources::DrawMode;

use super::{check_error, foreign, gl_size, GlContext};

fn depth_func(func: DepthFunc) -> u32 {
    match func {
        DepthFunc::Never => glow::NEVER,
        DepthFunc::Less => glow::LESS,
        DepthFunc::Equal => glow::EQUAL,
        DepthFunc::LessEqual => glow::LEQUAL,
        DepthFunc::Greater => glow::GREATER,
        DepthFunc::NotEqual => glow::NOTEQUAL,
        DepthFunc::GreaterEqual => glow::GEQUAL,
        DepthFunc::Always => glow::ALWAYS,
    }
}

fn primitive(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
    }
}

fn index_type(size: usize) -> RenderResult<u32> {
    match size {
        1 => Ok(glow::UNSIGNED_BYTE),
        2 => Ok(glow::UNSIGNED_SHORT),
        4 => Ok(glow::UNSIGNED_INT),
        _ => Err(RenderError::Backend(format!("unsupported index size {size}"))),
    }
}

/// Renderer dispatch issuing OpenGL calls.
pub struct GlRendererBackend {
    context: Arc<GlContext>,
}

impl GlRendererBackend {
    pub fn new(context: Arc<GlContext>) -> Self {
        Self { context }
    }

    fn gl(&self) -> &glow::Context {
        self.context.gl()
    }

    fn set_capability(&self, capability: u32, enable: bool) {
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            if enable {
                self.gl().enable(capability);
            } else {
                self.gl().disable(capability);
            }
        }
    }
}

impl RendererBackend for GlRendererBackend {
    fn frame_buffer_changed(
        &mut self,
        frame_buffer: Option<&GpuFrameBuffer>,
    ) -> RenderResult<()> {
        let handle = match frame_buffer {
            Some(GpuFrameBuffer::Gl { framebuffer, .. }) => Some(*framebuffer),
            Some(_) => return Err(foreign("frame buffer")),
            None => None,
        };
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            self.gl().bind_framebuffer(glow::FRAMEBUFFER, handle);
            check_error(self.gl(), "bind_framebuffer")
        }
    }

    fn program_changed(&mut self, program: Option<&GpuProgram>) -> RenderResult<()> {
        let handle = match program {
            Some(GpuProgram::Gl { program, .. }) => Some(*program),
            Some(_) => return Err(foreign("program")),
            None => None,
        };
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            self.gl().use_program(handle);
            check_error(self.gl(), "use_program")
        }
    }

    fn render_state_changed(&mut self, change: RenderStateChange) -> RenderResult<()> {
        match change {
            RenderStateChange::DepthTest(enable) => self.set_capability(glow::DEPTH_TEST, enable),
            RenderStateChange::CullFace(enable) => self.set_capability(glow::CULL_FACE, enable),
            RenderStateChange::Blend(enable) => {
                self.set_capability(glow::BLEND, enable);
                if enable {
                    // SAFETY: the render system keeps a context current on this thread.
                    unsafe {
                        self.gl()
                            .blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA)
                    };
                }
            }
            // SAFETY: the render system keeps a context current on this thread.
            RenderStateChange::DepthFunc(func) => unsafe { self.gl().depth_func(depth_func(func)) },
            // SAFETY: the render system keeps a context current on this thread.
            RenderStateChange::DepthWrite(enable) => unsafe { self.gl().depth_mask(enable) },
        }
        // SAFETY: the render system keeps a context current on this thread.
        unsafe { check_error(self.gl(), "render_state_changed") }
    }

    fn viewport_changed(&mut self, x: i32, y: i32, width: i32, height: i32) -> RenderResult<()> {
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            self.gl().viewport(x, y, width, height);
            check_error(self.gl(), "viewport")
        }
    }

    fn vertex_data_changed(&mut self, vertex_array: &GpuVertexArray) -> RenderResult<()> {
        let GpuVertexArray::Gl(vertex_array) = vertex_array else {
            return Err(foreign("vertex array"));
        };
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            self.gl().bind_vertex_array(Some(*vertex_array));
            check_error(self.gl(), "bind_vertex_array")
        }
    }

    fn texture_changed(
        &mut self,
        unit: u32,
        texture: &GpuTexture,
        enable: bool,
    ) -> RenderResult<()> {
        let GpuTexture::Gl(texture) = texture else {
            return Err(foreign("texture"));
        };
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let gl = self.gl();
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, enable.then_some(*texture));
            check_error(gl, "bind_texture")
        }
    }

    fn uniform_changed(
        &mut self,
        program: &GpuProgram,
        name: &str,
        value: &UniformVariable,
    ) -> RenderResult<()> {
        let GpuProgram::Gl { uniforms, .. } = program else {
            return Err(foreign("program"));
        };
        let Some(location) = uniforms.get(name) else {
            // Not active in this program.
            return Ok(());
        };
        let location = Some(location);
        let gl = self.gl();

        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            match value.data() {
                UniformData::Invalid => {
                    return Err(RenderError::Backend(format!("uniform {name} has no value")))
                }
                UniformData::Float(v) => gl.uniform_1_f32(location, *v),
                UniformData::VectorOfFloat(v) => gl.uniform_1_f32_slice(location, v),
                UniformData::Int(v) => gl.uniform_1_i32(location, *v),
                UniformData::VectorOfInt(v) => gl.uniform_1_i32_slice(location, v),
                UniformData::Bool(v) => gl.uniform_1_i32(location, i32::from(*v)),
                UniformData::VectorOfBool(v) => {
                    let ints: Vec<i32> = v.iter().map(|&b| i32::from(b)).collect();
                    gl.uniform_1_i32_slice(location, &ints)
                }
                UniformData::Vec2(v) => gl.uniform_2_f32(location, v.x, v.y),
                UniformData::VectorOfVec2(v) => gl.uniform_2_f32_slice(location, cast_slice(v)),
                UniformData::Vec3(v) => gl.uniform_3_f32(location, v.x, v.y, v.z),
                UniformData::VectorOfVec3(v) => gl.uniform_3_f32_slice(location, cast_slice(v)),
                UniformData::Vec4(v) => gl.uniform_4_f32(location, v.x, v.y, v.z, v.w),
                UniformData::VectorOfVec4(v) => gl.uniform_4_f32_slice(location, cast_slice(v)),
                UniformData::IVec2(v) => gl.uniform_2_i32(location, v.x, v.y),
                UniformData::VectorOfIVec2(v) => gl.uniform_2_i32_slice(location, cast_slice(v)),
                UniformData::IVec3(v) => gl.uniform_3_i32(location, v.x, v.y, v.z),
                UniformData::VectorOfIVec3(v) => gl.uniform_3_i32_slice(location, cast_slice(v)),
                UniformData::IVec4(v) => gl.uniform_4_i32(location, v.x, v.y, v.z, v.w),
                UniformData::VectorOfIVec4(v) => gl.uniform_4_i32_slice(location, cast_slice(v)),
                UniformData::Mat2(m) => {
                    gl.uniform_matrix_2_f32_slice(location, false, &m.to_cols_array())
                }
                UniformData::VectorOfMat2(m) => {
                    gl.uniform_matrix_2_f32_slice(location, false, cast_slice(m))
                }
                UniformData::Mat3(m) => {
                    gl.uniform_matrix_3_f32_slice(location, false, &m.to_cols_array())
                }
                UniformData::VectorOfMat3(m) => {
                    gl.uniform_matrix_3_f32_slice(location, false, cast_slice(m))
                }
                UniformData::Mat4(m) => {
                    gl.uniform_matrix_4_f32_slice(location, false, &m.to_cols_array())
                }
                UniformData::VectorOfMat4(m) => {
                    gl.uniform_matrix_4_f32_slice(location, false, cast_slice(m))
                }
            }
            check_error(gl, "uniform")
        }
    }

    fn clear(&mut self, flags: ClearFlags) -> RenderResult<()> {
        let mut mask = 0;
        if flags.color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if flags.depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if flags.stencil {
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        // SAFETY: the render system keeps a context current on this thread.
        unsafe {
            let gl = self.gl();
            gl.clear(mask);
            check_error(gl, "clear")
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> RenderResult<()> {
        let GpuVertexArray::Gl(_) = call.vertex_array else {
            return Err(foreign("vertex array"));
        };
        let mode = primitive(call.mode);
        // SAFETY: the render system keeps a context current on this thread
        // and the vertex array is bound by `vertex_data_changed`.
        unsafe {
            let gl = self.gl();
            match call.indices {
                Some((count, size)) => {
                    gl.draw_elements(mode, gl_size(count)?, index_type(size)?, 0)
                }
                None => gl.draw_arrays(mode, 0, gl_size(call.num_vertices)?),
            }
            check_error(gl, "draw")
        }
    }
}

impl std::fmt::Debug for GlRendererBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlRendererBackend").finish_non_exhaustive()
    }
}
