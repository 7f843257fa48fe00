//! Window boundary of the render system
//!
//! Window creation, event polling and buffer swapping belong to the
//! platform layer. The render core only needs the operations of
//! [`RenderWindow`]; [`NullWindow`] implements them without a display.

use std::sync::Arc;

use glam::Mat4;

use crate::error::RenderResult;
use crate::target::{RenderTarget, Viewport, ViewportGeometry};

/// Requested properties of the main window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHint {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

impl Default for WindowHint {
    fn default() -> Self {
        Self {
            title: "Sequoia".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            fullscreen: false,
        }
    }
}

/// A window the render system presents into.
pub trait RenderWindow: Send {
    /// Get current window dimensions
    fn dimensions(&self) -> (u32, u32);

    /// Check if close was requested
    fn is_closed(&self) -> bool;

    /// Process pending platform events
    fn poll_events(&mut self);

    /// Present the rendered frame
    fn swap_buffers(&mut self) -> RenderResult<()>;

    /// The default frame buffer of this window
    fn target(&self) -> &Arc<RenderTarget>;
}

/// Headless window
///
/// Owns a window render target with a full-size viewport. Nothing is ever
/// presented; swapped frames are only counted.
pub struct NullWindow {
    hint: WindowHint,
    target: Arc<RenderTarget>,
    viewport: Arc<Viewport>,
    frames: u64,
    closed: bool,
}

impl NullWindow {
    pub fn new(hint: WindowHint) -> Self {
        let target = RenderTarget::window();
        let viewport = Viewport::attach(
            &target,
            Some(Arc::new(Mat4::IDENTITY)),
            ViewportGeometry::new(0, 0, hint.width as i32, hint.height as i32),
        );
        log::debug!(
            "created null window \"{}\" ({}x{})",
            hint.title,
            hint.width,
            hint.height
        );
        Self {
            hint,
            target,
            viewport,
            frames: 0,
            closed: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.hint.title
    }

    pub fn viewport(&self) -> &Arc<Viewport> {
        &self.viewport
    }

    /// Number of frames presented so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Resize the window, resizing its viewport along with it
    pub fn resize(&mut self, width: u32, height: u32) {
        self.hint.width = width;
        self.hint.height = height;
        self.viewport
            .update_geometry(ViewportGeometry::new(0, 0, width as i32, height as i32));
    }

    /// Request the window to close
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl RenderWindow for NullWindow {
    fn dimensions(&self) -> (u32, u32) {
        (self.hint.width, self.hint.height)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn poll_events(&mut self) {}

    fn swap_buffers(&mut self) -> RenderResult<()> {
        self.frames += 1;
        log::trace!("null window: presented frame {}", self.frames);
        Ok(())
    }

    fn target(&self) -> &Arc<RenderTarget> {
        &self.target
    }
}
