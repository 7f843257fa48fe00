//! Index buffers.

use super::{Buffer, BufferLock, LockOption};
use crate::error::RenderResult;

/// Width of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    U8,
    U16,
    #[default]
    U32,
}

impl IndexType {
    /// Size of one index in bytes.
    pub fn size(&self) -> usize {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Buffer of vertex indices.
pub struct IndexBuffer {
    buffer: Box<dyn Buffer>,
    index_type: IndexType,
}

impl IndexBuffer {
    pub fn new(buffer: Box<dyn Buffer>, index_type: IndexType) -> Self {
        Self { buffer, index_type }
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn num_indices(&self) -> usize {
        self.buffer.num_bytes() / self.index_type.size()
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

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("index_type", &self.index_type)
            .field("num_indices", &self.num_indices())
            .finish()
    }
}
