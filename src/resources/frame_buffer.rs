//! Off-screen render targets

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::{GpuFrameBuffer, RenderDevice};
use crate::error::{RenderError, RenderResult};
use crate::resource::{RenderResource, ResourceValidity};
use crate::RenderSystemKind;

/// A frame buffer with a color texture and a depth attachment.
pub struct FrameBuffer {
    device: Arc<dyn RenderDevice>,
    validity: ResourceValidity,
    width: u32,
    height: u32,
    gpu: OnceLock<GpuFrameBuffer>,
}

impl FrameBuffer {
    pub fn new(device: Arc<dyn RenderDevice>, width: u32, height: u32) -> Self {
        Self {
            device,
            validity: ResourceValidity::new(),
            width,
            height,
            gpu: OnceLock::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Backend object, available once the frame buffer is valid.
    pub fn gpu(&self) -> Option<&GpuFrameBuffer> {
        self.gpu.get()
    }
}

impl RenderResource for FrameBuffer {
    fn kind(&self) -> RenderSystemKind {
        self.device.kind()
    }

    fn validity(&self) -> &ResourceValidity {
        &self.validity
    }

    fn make_valid_impl(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::ResourceCreationFailed {
                what: "frame buffer",
                reason: format!("invalid size {}x{}", self.width, self.height),
            });
        }
        log::trace!(
            "{}: creating {}x{} frame buffer",
            self.device.name(),
            self.width,
            self.height
        );
        let gpu = self.device.create_frame_buffer(self.width, self.height)?;
        if let Err(rejected) = self.gpu.set(gpu) {
            self.device.destroy_frame_buffer(&rejected);
        }
        Ok(())
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            self.device.destroy_frame_buffer(&gpu);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("valid", &self.is_valid())
            .finish()
    }
}
