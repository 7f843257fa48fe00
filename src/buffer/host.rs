//! Buffer backed by process memory.

use bytemuck::{Pod, Zeroable};

use super::{check_bounds, Buffer, BufferKind, LockOption, UsageHint};
use crate::error::RenderResult;

/// Alignment unit of host buffer storage.
#[repr(C, align(16))]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Chunk([u8; 16]);

static_assertions::assert_eq_size!(Chunk, [u8; 16]);
static_assertions::const_assert_eq!(std::mem::align_of::<Chunk>(), 16);

const CHUNK_SIZE: usize = std::mem::size_of::<Chunk>();

/// A buffer in host memory, aligned to 16 bytes.
///
/// Locking is free: the lock exposes the backing memory directly.
#[derive(Clone, Default)]
pub struct HostBuffer {
    chunks: Vec<Chunk>,
    num_bytes: usize,
    hint: UsageHint,
    locked: Option<LockOption>,
}

impl HostBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-initialized buffer of `num_bytes`.
    pub fn with_size(num_bytes: usize) -> Self {
        let mut buffer = Self::new();
        buffer.reallocate(num_bytes, UsageHint::default());
        buffer
    }

    fn reallocate(&mut self, num_bytes: usize, hint: UsageHint) {
        let num_chunks = num_bytes.div_ceil(CHUNK_SIZE);
        self.chunks = vec![Chunk([0; CHUNK_SIZE]); num_chunks];
        self.num_bytes = num_bytes;
        self.hint = hint;
    }

    /// The buffer contents.
    pub fn data(&self) -> &[u8] {
        &bytemuck::cast_slice::<Chunk, u8>(&self.chunks)[..self.num_bytes]
    }

    /// The buffer contents, mutable.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let num_bytes = self.num_bytes;
        &mut bytemuck::cast_slice_mut::<Chunk, u8>(&mut self.chunks)[..num_bytes]
    }

    /// The buffer contents reinterpreted as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the size is not a multiple of `size_of::<T>()`.
    pub fn as_slice<T: Pod>(&self) -> &[T] {
        bytemuck::cast_slice(self.data())
    }
}

impl Buffer for HostBuffer {
    fn kind(&self) -> BufferKind {
        BufferKind::Host
    }

    fn num_bytes(&self) -> usize {
        self.num_bytes
    }

    fn usage_hint(&self) -> UsageHint {
        self.hint
    }

    fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    fn allocate(&mut self, num_bytes: usize, hint: UsageHint) -> RenderResult<()> {
        assert!(self.locked.is_none(), "cannot reallocate a locked buffer");
        log::trace!("HostBuffer: allocating {num_bytes} bytes");
        self.reallocate(num_bytes, hint);
        Ok(())
    }

    fn write(&mut self, src: &[u8], offset: usize, _discard: bool) -> RenderResult<()> {
        assert!(self.locked.is_none(), "cannot write to a locked buffer");
        check_bounds("writing", offset, src.len(), self.num_bytes);
        self.data_mut()[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn read(&self, offset: usize, dest: &mut [u8]) -> RenderResult<()> {
        check_bounds("reading", offset, dest.len(), self.num_bytes);
        dest.copy_from_slice(&self.data()[offset..offset + dest.len()]);
        Ok(())
    }

    fn lock_impl(&mut self, option: LockOption) -> RenderResult<()> {
        self.locked = Some(option);
        Ok(())
    }

    fn unlock_impl(&mut self) -> RenderResult<()> {
        self.locked = None;
        Ok(())
    }

    fn locked_bytes(&self) -> &[u8] {
        self.data()
    }

    fn locked_bytes_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl std::fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBuffer")
            .field("num_bytes", &self.num_bytes)
            .field("hint", &self.hint)
            .field("locked", &self.locked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_aligned_and_zeroed() {
        let buffer = HostBuffer::with_size(20);
        assert_eq!(buffer.num_bytes(), 20);
        assert_eq!(buffer.data().len(), 20);
        assert_eq!(buffer.data().as_ptr() as usize % 16, 0);
        assert!(buffer.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocate_replaces_previous_allocation() {
        let mut buffer = HostBuffer::with_size(8);
        buffer.write(&[1; 8], 0, false).unwrap();
        buffer.allocate(32, UsageHint::DYNAMIC).unwrap();
        assert_eq!(buffer.num_bytes(), 32);
        assert_eq!(buffer.usage_hint(), UsageHint::DYNAMIC);
        assert!(buffer.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_read_doubles() {
        let mut buffer = HostBuffer::with_size(3 * std::mem::size_of::<f64>());
        let values = [2.0f64, 3.0, 4.0];
        buffer
            .write(bytemuck::cast_slice(&values), 0, false)
            .unwrap();

        let mut out = [0.0f64; 2];
        buffer
            .read(8, bytemuck::cast_slice_mut(&mut out))
            .unwrap();
        assert_eq!(out, [3.0, 4.0]);
        assert_eq!(buffer.as_slice::<f64>(), &values);
    }

    #[test]
    #[should_panic(expected = "out of bound writing")]
    fn test_write_out_of_bounds() {
        let mut buffer = HostBuffer::with_size(4);
        let _ = buffer.write(&[0; 8], 0, false);
    }

    #[test]
    #[should_panic(expected = "out of bound reading")]
    fn test_read_out_of_bounds() {
        let buffer = HostBuffer::with_size(4);
        let mut out = [0u8; 2];
        let _ = buffer.read(3, &mut out);
    }

    #[test]
    fn test_lock_exposes_storage() {
        let mut buffer = HostBuffer::with_size(4);
        {
            let mut lock = buffer.lock(LockOption::Normal).unwrap();
            lock.copy_from_slice(&[1, 2, 3, 4]);
        }
        assert!(!buffer.is_locked());
        assert_eq!(buffer.data(), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "cannot write to a locked buffer")]
    fn test_write_while_locked() {
        let mut buffer = HostBuffer::with_size(4);
        buffer.lock_impl(LockOption::Normal).unwrap();
        let _ = buffer.write(&[0; 4], 0, false);
    }
}
