//! Buffer backed by backend memory.

use std::sync::Arc;

use super::{check_bounds, Buffer, BufferKind, HostBuffer, LockOption, UsageHint};
use crate::backend::{GpuBuffer, RenderDevice};
use crate::error::{RenderError, RenderResult};

/// A buffer living in backend memory.
///
/// With a shadow buffer, a host copy of the contents is kept in sync so
/// reads and locks never touch the backend. Without one, locking stages the
/// contents into a temporary host buffer which is uploaded again on unlock.
pub struct DeviceBuffer {
    device: Arc<dyn RenderDevice>,
    kind: BufferKind,
    gpu: Option<GpuBuffer>,
    shadow: Option<HostBuffer>,
    staging: Option<HostBuffer>,
    use_shadow_buffer: bool,
    num_bytes: usize,
    hint: UsageHint,
    locked: Option<LockOption>,
}

impl DeviceBuffer {
    /// Create an unallocated buffer.
    pub fn new(device: Arc<dyn RenderDevice>, kind: BufferKind, use_shadow_buffer: bool) -> Self {
        Self {
            device,
            kind,
            gpu: None,
            shadow: None,
            staging: None,
            use_shadow_buffer,
            num_bytes: 0,
            hint: UsageHint::default(),
            locked: None,
        }
    }

    pub fn has_shadow_buffer(&self) -> bool {
        self.use_shadow_buffer
    }

    fn release(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            self.device.destroy_buffer(&gpu);
        }
        self.shadow = None;
        self.num_bytes = 0;
        self.hint = UsageHint::default();
    }

    fn locked_storage(&self) -> &HostBuffer {
        match (&self.staging, &self.shadow) {
            (Some(staging), _) => staging,
            (None, Some(shadow)) => shadow,
            (None, None) => panic!("buffer is not locked"),
        }
    }
}

impl Buffer for DeviceBuffer {
    fn kind(&self) -> BufferKind {
        self.kind
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
        self.release();

        log::trace!(
            "{}: allocating {:?} buffer ({} bytes, {:?})",
            self.device.name(),
            self.kind,
            num_bytes,
            hint
        );
        self.gpu = Some(self.device.create_buffer(self.kind, num_bytes, hint)?);
        if self.use_shadow_buffer {
            self.shadow = Some(HostBuffer::with_size(num_bytes));
        }
        self.num_bytes = num_bytes;
        self.hint = hint;
        Ok(())
    }

    fn write(&mut self, src: &[u8], offset: usize, discard: bool) -> RenderResult<()> {
        assert!(self.locked.is_none(), "cannot write to a locked buffer");
        check_bounds("writing", offset, src.len(), self.num_bytes);
        if src.is_empty() {
            return Ok(());
        }

        if let Some(shadow) = self.shadow.as_mut() {
            shadow.write(src, offset, discard)?;
        }
        if let Some(gpu) = self.gpu.as_mut() {
            self.device.write_buffer(gpu, offset, src, discard)?;
        }
        Ok(())
    }

    fn read(&self, offset: usize, dest: &mut [u8]) -> RenderResult<()> {
        check_bounds("reading", offset, dest.len(), self.num_bytes);
        if dest.is_empty() {
            return Ok(());
        }

        match (&self.shadow, &self.gpu) {
            (Some(shadow), _) => shadow.read(offset, dest),
            (None, Some(gpu)) => self.device.read_buffer(gpu, offset, dest),
            (None, None) => Err(RenderError::Backend(format!(
                "{:?} buffer has no storage to read from",
                self.kind
            ))),
        }
    }

    fn lock_impl(&mut self, option: LockOption) -> RenderResult<()> {
        // Read only locks on a shadowed buffer stage a copy so the shadow
        // keeps matching the backend contents.
        if self.shadow.is_none() || option == LockOption::ReadOnly {
            let mut staging = HostBuffer::with_size(self.num_bytes);
            if option.needs_contents() && self.num_bytes > 0 {
                match (&self.shadow, &self.gpu) {
                    (Some(shadow), _) => staging.data_mut().copy_from_slice(shadow.data()),
                    (None, Some(gpu)) => self.device.read_buffer(gpu, 0, staging.data_mut())?,
                    (None, None) => {}
                }
            }
            self.staging = Some(staging);
        }
        self.locked = Some(option);
        Ok(())
    }

    fn unlock_impl(&mut self) -> RenderResult<()> {
        let Some(option) = self.locked.take() else {
            return Ok(());
        };
        let staging = self.staging.take();
        if !option.writes_back() || self.num_bytes == 0 {
            return Ok(());
        }

        let discard = option == LockOption::Discard;
        let contents = match (&staging, &self.shadow) {
            (Some(staging), _) => staging.data(),
            (None, Some(shadow)) => shadow.data(),
            (None, None) => return Ok(()),
        };
        if let Some(gpu) = self.gpu.as_mut() {
            self.device.write_buffer(gpu, 0, contents, discard)?;
        }
        Ok(())
    }

    fn locked_bytes(&self) -> &[u8] {
        self.locked_storage().data()
    }

    fn locked_bytes_mut(&mut self) -> &mut [u8] {
        match (&mut self.staging, &mut self.shadow) {
            (Some(staging), _) => staging.data_mut(),
            (None, Some(shadow)) => shadow.data_mut(),
            (None, None) => panic!("buffer is not locked"),
        }
    }

    fn gpu_buffer(&self) -> Option<&GpuBuffer> {
        self.gpu.as_ref()
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("backend", &self.device.name())
            .field("kind", &self.kind)
            .field("num_bytes", &self.num_bytes)
            .field("shadow", &self.use_shadow_buffer)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}
