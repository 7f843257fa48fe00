//! Vertex layouts and vertex buffers.

use super::{Buffer, BufferLock, LockOption};
use crate::error::RenderResult;

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    /// Four unsigned bytes normalized to [0, 1]
    Unorm8x4,
}

impl VertexFormat {
    /// Number of components.
    pub fn components(&self) -> i32 {
        match self {
            VertexFormat::Float32 => 1,
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 | VertexFormat::Unorm8x4 => 4,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        match self {
            VertexFormat::Unorm8x4 => 4,
            _ => self.components() as usize * 4,
        }
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, VertexFormat::Unorm8x4)
    }
}

/// A named attribute at a byte offset within a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub format: VertexFormat,
    pub offset: usize,
}

/// Interleaved layout of one vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: usize,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute after the existing ones.
    pub fn with_attribute(mut self, name: impl Into<String>, format: VertexFormat) -> Self {
        self.attributes.push(VertexAttribute {
            name: name.into(),
            format,
            offset: self.stride,
        });
        self.stride += format.size();
        self
    }

    /// Position, normal, texture coordinate and color.
    pub fn position_normal_uv_color() -> Self {
        Self::new()
            .with_attribute("in_Position", VertexFormat::Float32x3)
            .with_attribute("in_Normal", VertexFormat::Float32x3)
            .with_attribute("in_TexCoord", VertexFormat::Float32x2)
            .with_attribute("in_Color", VertexFormat::Unorm8x4)
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Buffer of interleaved vertices.
pub struct VertexBuffer {
    buffer: Box<dyn Buffer>,
    layout: VertexLayout,
}

impl VertexBuffer {
    pub fn new(buffer: Box<dyn Buffer>, layout: VertexLayout) -> Self {
        Self { buffer, layout }
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn num_vertices(&self) -> usize {
        match self.layout.stride() {
            0 => 0,
            stride => self.buffer.num_bytes() / stride,
        }
    }

    pub fn buffer(&self) -> &dyn Buffer {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> &mut dyn Buffer {
        self.buffer.as_mut()
    }

    pub fn write(&mut self, src: &[u8], offset: usize, discard: bool) -> RenderResult<()> {
        self.buffer.write(src, offset, discard)
    }

    pub fn read(&self, offset: usize, dest: &mut [u8]) -> RenderResult<()> {
        self.buffer.read(offset, dest)
    }

    pub fn lock(&mut self, option: LockOption) -> RenderResult<BufferLock<'_>> {
        BufferLock::new(self.buffer.as_mut(), option)
    }
}

impl std::fmt::Debug for VertexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("num_vertices", &self.num_vertices())
            .field("stride", &self.layout.stride())
            .field("num_bytes", &self.buffer.num_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::HostBuffer;

    #[test]
    fn test_layout_offsets() {
        let layout = VertexLayout::position_normal_uv_color();
        let offsets: Vec<_> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
        assert_eq!(layout.stride(), 36);
    }

    #[test]
    fn test_num_vertices() {
        let layout = VertexLayout::new().with_attribute("in_Position", VertexFormat::Float32x3);
        let buffer = VertexBuffer::new(Box::new(HostBuffer::with_size(12 * 5)), layout);
        assert_eq!(buffer.num_vertices(), 5);
    }

    #[test]
    fn test_lock_through_wrapper() {
        let layout = VertexLayout::new().with_attribute("in_Value", VertexFormat::Float32);
        let mut buffer = VertexBuffer::new(Box::new(HostBuffer::with_size(8)), layout);
        {
            let mut lock = buffer.lock(LockOption::WriteOnly).unwrap();
            lock.copy_from_slice(bytemuck::cast_slice(&[1.5f32, 2.5]));
        }
        let mut out = [0.0f32; 2];
        buffer.read(0, bytemuck::cast_slice_mut(&mut out)).unwrap();
        assert_eq!(out, [1.5, 2.5]);
    }
}
