//! Uniform blocks.

use bytemuck::Pod;

use super::{Buffer, BufferLock, LockOption};
use crate::error::RenderResult;

/// Buffer holding the raw contents of a uniform block.
pub struct UniformBuffer {
    buffer: Box<dyn Buffer>,
}

impl UniformBuffer {
    pub fn new(buffer: Box<dyn Buffer>) -> Self {
        Self { buffer }
    }

    pub fn num_bytes(&self) -> usize {
        self.buffer.num_bytes()
    }

    /// Write a plain-data value at `offset`.
    pub fn write_value<T: Pod>(&mut self, value: &T, offset: usize) -> RenderResult<()> {
        self.buffer.write(bytemuck::bytes_of(value), offset, false)
    }

    /// Read a plain-data value at `offset`.
    pub fn read_value<T: Pod>(&self, offset: usize) -> RenderResult<T> {
        let mut value = T::zeroed();
        self.buffer
            .read(offset, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    pub fn buffer(&self) -> &dyn Buffer {
        self.buffer.as_ref()
    }

    pub fn lock(&mut self, option: LockOption) -> RenderResult<BufferLock<'_>> {
        BufferLock::new(self.buffer.as_mut(), option)
    }
}

impl std::fmt::Debug for UniformBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBuffer")
            .field("num_bytes", &self.buffer.num_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::HostBuffer;
    use glam::{Mat4, Vec4};

    #[test]
    fn test_write_read_values() {
        let mut buffer = UniformBuffer::new(Box::new(HostBuffer::with_size(80)));
        buffer.write_value(&Mat4::IDENTITY, 0).unwrap();
        buffer.write_value(&Vec4::new(1.0, 0.0, 0.0, 1.0), 64).unwrap();

        assert_eq!(buffer.read_value::<Mat4>(0).unwrap(), Mat4::IDENTITY);
        assert_eq!(
            buffer.read_value::<Vec4>(64).unwrap(),
            Vec4::new(1.0, 0.0, 0.0, 1.0)
        );
    }

    #[test]
    #[should_panic(expected = "out of bound writing")]
    fn test_write_past_end() {
        let mut buffer = UniformBuffer::new(Box::new(HostBuffer::with_size(8)));
        let _ = buffer.write_value(&Vec4::ONE, 0);
    }
}
