//! Byte-addressable buffers.
//!
//! [`Buffer`] is the common read/write/lock contract over host memory
//! ([`HostBuffer`]) and backend memory ([`DeviceBuffer`]). The typed wrappers
//! [`VertexBuffer`], [`IndexBuffer`] and [`UniformBuffer`] add the knowledge
//! needed to draw with the contents.
//!
//! Reading or writing past the end of a buffer is a contract violation and
//! panics. Locking yields a scoped [`BufferLock`] which unlocks when dropped.

mod device;
mod host;
mod index;
mod uniform;
mod vertex;

use std::ops::{Deref, DerefMut};

use bitflags::bitflags;

use crate::backend::GpuBuffer;
use crate::error::RenderResult;

pub use device::DeviceBuffer;
pub use host::HostBuffer;
pub use index::{IndexBuffer, IndexType};
pub use uniform::UniformBuffer;
pub use vertex::{VertexAttribute, VertexBuffer, VertexFormat, VertexLayout};

/// What a buffer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Host,
    Vertex,
    Index,
    Uniform,
}

bitflags! {
    /// Advisory usage hints for buffer allocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UsageHint: u32 {
        /// Contents are rarely modified.
        const STATIC = 1;
        /// Contents are modified frequently.
        const DYNAMIC = 2;
        /// The application never reads the contents back.
        const WRITE_ONLY = 4;
        /// Contents may be thrown away on every write.
        const DISCARDABLE = 8;
        const STATIC_WRITE_ONLY = Self::STATIC.bits() | Self::WRITE_ONLY.bits();
        const DYNAMIC_WRITE_ONLY = Self::DYNAMIC.bits() | Self::WRITE_ONLY.bits();
        const DYNAMIC_WRITE_ONLY_DISCARDABLE =
            Self::DYNAMIC.bits() | Self::WRITE_ONLY.bits() | Self::DISCARDABLE.bits();
    }
}

impl Default for UsageHint {
    fn default() -> Self {
        UsageHint::STATIC_WRITE_ONLY
    }
}

/// Access requested when locking a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockOption {
    /// Read and write, existing contents preserved
    #[default]
    Normal,
    /// Existing contents may be dropped
    Discard,
    /// Read only, nothing is written back on unlock
    ReadOnly,
    /// Write only, existing contents need not be fetched
    WriteOnly,
}

impl LockOption {
    /// Whether the existing contents must be visible through the lock.
    pub fn needs_contents(self) -> bool {
        matches!(self, LockOption::Normal | LockOption::ReadOnly)
    }

    /// Whether the locked bytes must be written back on unlock.
    pub fn writes_back(self) -> bool {
        !matches!(self, LockOption::ReadOnly)
    }
}

/// Common contract of all buffers.
///
/// `lock_impl`, `unlock_impl` and the `locked_bytes` accessors are the
/// implementation side of [`BufferLock`]; use [`Buffer::lock`] or
/// [`BufferLock::new`] instead of calling them directly.
pub trait Buffer: Send {
    fn kind(&self) -> BufferKind;

    /// Size of the allocation in bytes.
    fn num_bytes(&self) -> usize;

    fn usage_hint(&self) -> UsageHint;

    fn is_locked(&self) -> bool;

    /// Free any previous allocation and allocate `num_bytes`.
    fn allocate(&mut self, num_bytes: usize, hint: UsageHint) -> RenderResult<()>;

    /// Copy `src` into the buffer starting at `offset`.
    ///
    /// `discard` allows the backend to drop the previous contents of the
    /// written range; the copy itself is unaffected.
    ///
    /// # Panics
    ///
    /// Panics if `offset + src.len()` exceeds [`num_bytes`](Self::num_bytes)
    /// or the buffer is locked.
    fn write(&mut self, src: &[u8], offset: usize, discard: bool) -> RenderResult<()>;

    /// Copy `dest.len()` bytes starting at `offset` into `dest`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + dest.len()` exceeds [`num_bytes`](Self::num_bytes).
    fn read(&self, offset: usize, dest: &mut [u8]) -> RenderResult<()>;

    fn lock_impl(&mut self, option: LockOption) -> RenderResult<()>;

    fn unlock_impl(&mut self) -> RenderResult<()>;

    fn locked_bytes(&self) -> &[u8];

    fn locked_bytes_mut(&mut self) -> &mut [u8];

    /// Backend object behind this buffer, if it lives in backend memory.
    fn gpu_buffer(&self) -> Option<&GpuBuffer> {
        None
    }

    /// Lock the buffer for bulk access.
    fn lock(&mut self, option: LockOption) -> RenderResult<BufferLock<'_>>
    where
        Self: Sized,
    {
        BufferLock::new(self, option)
    }
}

/// Panic unless `offset..offset + length` lies within `capacity`.
pub(crate) fn check_bounds(op: &str, offset: usize, length: usize, capacity: usize) {
    let in_bounds = offset
        .checked_add(length)
        .is_some_and(|end| end <= capacity);
    assert!(
        in_bounds,
        "out of bound {op}: offset {offset} + length {length} exceeds {capacity} bytes"
    );
}

/// Scoped access to the storage of a locked buffer.
///
/// Dereferences to the locked bytes. The buffer is unlocked when the guard
/// is dropped or [`unlock`](Self::unlock) is called.
pub struct BufferLock<'a> {
    buffer: &'a mut dyn Buffer,
    option: LockOption,
    unlocked: bool,
}

impl<'a> BufferLock<'a> {
    /// Lock `buffer`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already locked.
    pub fn new(buffer: &'a mut dyn Buffer, option: LockOption) -> RenderResult<Self> {
        assert!(!buffer.is_locked(), "buffer is already locked");
        buffer.lock_impl(option)?;
        Ok(Self {
            buffer,
            option,
            unlocked: false,
        })
    }

    pub fn option(&self) -> LockOption {
        self.option
    }

    /// Unlock explicitly, reporting backend errors of the write back.
    pub fn unlock(mut self) -> RenderResult<()> {
        self.unlocked = true;
        self.buffer.unlock_impl()
    }
}

impl Deref for BufferLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.locked_bytes()
    }
}

impl DerefMut for BufferLock<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.locked_bytes_mut()
    }
}

impl Drop for BufferLock<'_> {
    fn drop(&mut self) {
        if !self.unlocked {
            if let Err(err) = self.buffer.unlock_impl() {
                log::error!("failed to unlock buffer: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_hint_combinations() {
        assert_eq!(UsageHint::STATIC_WRITE_ONLY.bits(), 5);
        assert_eq!(UsageHint::DYNAMIC_WRITE_ONLY.bits(), 6);
        assert_eq!(UsageHint::DYNAMIC_WRITE_ONLY_DISCARDABLE.bits(), 14);
        assert!(UsageHint::DYNAMIC_WRITE_ONLY.contains(UsageHint::WRITE_ONLY));
    }

    #[test]
    fn test_lock_option_semantics() {
        assert!(LockOption::Normal.needs_contents());
        assert!(!LockOption::Discard.needs_contents());
        assert!(!LockOption::ReadOnly.writes_back());
        assert!(LockOption::WriteOnly.writes_back());
    }

    #[test]
    fn test_check_bounds_accepts_exact_fit() {
        check_bounds("writing", 8, 16, 24);
        check_bounds("reading", 24, 0, 24);
    }

    #[test]
    #[should_panic(expected = "out of bound writing")]
    fn test_check_bounds_rejects_overflow() {
        check_bounds("writing", 16, 16, 24);
    }

    #[test]
    #[should_panic(expected = "out of bound reading")]
    fn test_check_bounds_rejects_wrapping_offset() {
        check_bounds("reading", usize::MAX, 2, 24);
    }
}
