//! Geometry ready to be drawn

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard};

use crate::backend::{GpuVertexArray, RenderDevice};
use crate::buffer::{IndexBuffer, VertexBuffer};
use crate::error::{RenderError, RenderResult};
use crate::resource::{RenderResource, ResourceValidity};
use crate::RenderSystemKind;

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

/// A vertex buffer, an optional index buffer and how to assemble them.
///
/// Making vertex data valid describes the buffers to the backend (a vertex
/// array object for OpenGL). The buffers must be allocated before that; their
/// contents may still be rewritten afterwards.
pub struct VertexData {
    device: Arc<dyn RenderDevice>,
    validity: ResourceValidity,
    vertices: Mutex<VertexBuffer>,
    indices: Option<Mutex<IndexBuffer>>,
    draw_mode: DrawMode,
    gpu: OnceLock<GpuVertexArray>,
}

impl VertexData {
    pub fn new(
        device: Arc<dyn RenderDevice>,
        vertices: VertexBuffer,
        indices: Option<IndexBuffer>,
        draw_mode: DrawMode,
    ) -> Self {
        Self {
            device,
            validity: ResourceValidity::new(),
            vertices: Mutex::new(vertices),
            indices: indices.map(Mutex::new),
            draw_mode,
            gpu: OnceLock::new(),
        }
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    /// Exclusive access to the vertex buffer.
    pub fn vertices(&self) -> MutexGuard<'_, VertexBuffer> {
        self.vertices.lock()
    }

    /// Exclusive access to the index buffer, if any.
    pub fn indices(&self) -> Option<MutexGuard<'_, IndexBuffer>> {
        self.indices.as_ref().map(|indices| indices.lock())
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.lock().num_vertices()
    }

    /// Index count and index size in bytes, if indexed.
    pub fn index_info(&self) -> Option<(usize, usize)> {
        self.indices.as_ref().map(|indices| {
            let indices = indices.lock();
            (indices.num_indices(), indices.index_type().size())
        })
    }

    /// Backend object, available once the vertex data is valid.
    pub fn gpu(&self) -> Option<&GpuVertexArray> {
        self.gpu.get()
    }
}

impl RenderResource for VertexData {
    fn kind(&self) -> RenderSystemKind {
        self.device.kind()
    }

    fn validity(&self) -> &ResourceValidity {
        &self.validity
    }

    fn make_valid_impl(&self) -> RenderResult<()> {
        let vertices = self.vertices.lock();
        let vertex_buffer = vertices.buffer().gpu_buffer().ok_or_else(|| {
            RenderError::ResourceCreationFailed {
                what: "vertex data",
                reason: "vertex buffer is not allocated on the backend".to_string(),
            }
        })?;

        let indices = self.indices.as_ref().map(|indices| indices.lock());
        let index_buffer = match &indices {
            Some(indices) => Some(indices.buffer().gpu_buffer().ok_or_else(|| {
                RenderError::ResourceCreationFailed {
                    what: "vertex data",
                    reason: "index buffer is not allocated on the backend".to_string(),
                }
            })?),
            None => None,
        };

        log::trace!(
            "{}: creating vertex array ({} vertices, indexed: {})",
            self.device.name(),
            vertices.num_vertices(),
            index_buffer.is_some()
        );
        let gpu = self
            .device
            .create_vertex_array(vertices.layout(), vertex_buffer, index_buffer)?;
        if let Err(rejected) = self.gpu.set(gpu) {
            self.device.destroy_vertex_array(&rejected);
        }
        Ok(())
    }
}

impl Drop for VertexData {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            self.device.destroy_vertex_array(&gpu);
        }
    }
}

impl fmt::Debug for VertexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexData")
            .field("vertices", &*self.vertices.lock())
            .field("indices", &self.indices.as_ref().map(|i| i.lock().num_indices()))
            .field("draw_mode", &self.draw_mode)
            .field("valid", &self.is_valid())
            .finish()
    }
}

static_assertions::assert_impl_all!(VertexData: Send, Sync);
