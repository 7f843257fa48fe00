//! Render targets and viewports
//!
//! A [`RenderTarget`] is the surface a [`RenderCommand`](crate::render::RenderCommand)
//! draws into: the default frame buffer of a window or an off-screen
//! [`FrameBuffer`]. The region drawn to and the camera used are described by
//! its [`Viewport`].

use std::fmt;
use std::sync::{Arc, Weak};

use glam::Mat4;
use parking_lot::{Mutex, RwLock};

use crate::resources::FrameBuffer;

/// Source of the view-projection matrix.
pub trait Camera: Send + Sync {
    fn view_projection_matrix(&self) -> Mat4;
}

impl Camera for Mat4 {
    fn view_projection_matrix(&self) -> Mat4 {
        *self
    }
}

/// Observer of viewport changes.
pub trait ViewportListener: Send + Sync {
    /// The position or size of `viewport` changed.
    fn viewport_geometry_changed(&self, viewport: &Viewport);

    /// The camera of `viewport` was replaced.
    fn viewport_camera_changed(&self, _viewport: &Viewport) {}
}

/// Position and size of a viewport in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ViewportGeometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width divided by height, 1 for degenerate sizes.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// A region of a render target seen through a camera.
///
/// The target is fixed at construction; the camera may be absent, in which
/// case the identity transform is used.
pub struct Viewport {
    target: Weak<RenderTarget>,
    geometry: RwLock<ViewportGeometry>,
    camera: RwLock<Option<Arc<dyn Camera>>>,
    listeners: Mutex<Vec<Weak<dyn ViewportListener>>>,
}

impl Viewport {
    /// Create a viewport onto `target` and install it as the target's viewport.
    pub fn attach(
        target: &Arc<RenderTarget>,
        camera: Option<Arc<dyn Camera>>,
        geometry: ViewportGeometry,
    ) -> Arc<Self> {
        let viewport = Arc::new(Self {
            target: Arc::downgrade(target),
            geometry: RwLock::new(geometry),
            camera: RwLock::new(camera),
            listeners: Mutex::new(Vec::new()),
        });
        target.set_viewport(Some(viewport.clone()));
        viewport
    }

    /// The target, unless it has been dropped.
    pub fn target(&self) -> Option<Arc<RenderTarget>> {
        self.target.upgrade()
    }

    pub fn geometry(&self) -> ViewportGeometry {
        *self.geometry.read()
    }

    pub fn camera(&self) -> Option<Arc<dyn Camera>> {
        self.camera.read().clone()
    }

    /// View-projection matrix of the camera, identity without one.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.camera
            .read()
            .as_ref()
            .map_or(Mat4::IDENTITY, |camera| camera.view_projection_matrix())
    }

    /// Move or resize the viewport and notify listeners.
    pub fn update_geometry(&self, geometry: ViewportGeometry) {
        {
            let mut current = self.geometry.write();
            if *current == geometry {
                return;
            }
            *current = geometry;
        }
        log::debug!(
            "viewport geometry changed to {}x{} at ({}, {})",
            geometry.width,
            geometry.height,
            geometry.x,
            geometry.y
        );
        for listener in self.live_listeners() {
            listener.viewport_geometry_changed(self);
        }
    }

    /// Replace the camera and notify listeners.
    pub fn set_camera(&self, camera: Option<Arc<dyn Camera>>) {
        *self.camera.write() = camera;
        for listener in self.live_listeners() {
            listener.viewport_camera_changed(self);
        }
    }

    /// Register a listener. Listeners are held weakly.
    pub fn add_listener(&self, listener: &Arc<dyn ViewportListener>) {
        self.listeners.lock().push(Arc::downgrade(listener));
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ViewportListener>) {
        let target = Arc::downgrade(listener);
        self.listeners
            .lock()
            .retain(|existing| !Weak::ptr_eq(existing, &target));
    }

    /// Upgrade all listeners, pruning dropped ones. Callbacks run unlocked.
    fn live_listeners(&self) -> Vec<Arc<dyn ViewportListener>> {
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("geometry", &self.geometry())
            .field("has_camera", &self.camera.read().is_some())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// Surface rendered into.
pub struct RenderTarget {
    viewport: RwLock<Option<Arc<Viewport>>>,
    frame_buffer: Option<Arc<FrameBuffer>>,
}

impl RenderTarget {
    /// The default frame buffer of the current context.
    pub fn window() -> Arc<Self> {
        Arc::new(Self {
            viewport: RwLock::new(None),
            frame_buffer: None,
        })
    }

    /// An off-screen target.
    pub fn off_screen(frame_buffer: Arc<FrameBuffer>) -> Arc<Self> {
        Arc::new(Self {
            viewport: RwLock::new(None),
            frame_buffer: Some(frame_buffer),
        })
    }

    pub fn viewport(&self) -> Option<Arc<Viewport>> {
        self.viewport.read().clone()
    }

    pub fn set_viewport(&self, viewport: Option<Arc<Viewport>>) {
        *self.viewport.write() = viewport;
    }

    pub fn frame_buffer(&self) -> Option<&Arc<FrameBuffer>> {
        self.frame_buffer.as_ref()
    }

    pub fn is_off_screen(&self) -> bool {
        self.frame_buffer.is_some()
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTarget")
            .field("viewport", &self.viewport())
            .field("frame_buffer", &self.frame_buffer)
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderTarget: Send, Sync);
static_assertions::assert_impl_all!(Viewport: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        geometry: AtomicUsize,
        camera: AtomicUsize,
    }

    impl ViewportListener for CountingListener {
        fn viewport_geometry_changed(&self, _viewport: &Viewport) {
            self.geometry.fetch_add(1, Ordering::SeqCst);
        }

        fn viewport_camera_changed(&self, _viewport: &Viewport) {
            self.camera.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_viewport_belongs_to_target() {
        let target = RenderTarget::window();
        let viewport = Viewport::attach(&target, None, ViewportGeometry::new(0, 0, 640, 480));
        assert!(Arc::ptr_eq(&target.viewport().unwrap(), &viewport));
        assert!(Arc::ptr_eq(&viewport.target().unwrap(), &target));
        assert_eq!(viewport.view_projection_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_listeners_are_notified() {
        let target = RenderTarget::window();
        let viewport = Viewport::attach(&target, None, ViewportGeometry::new(0, 0, 640, 480));
        let counter = Arc::new(CountingListener::default());
        let listener: Arc<dyn ViewportListener> = counter.clone();
        viewport.add_listener(&listener);

        viewport.update_geometry(ViewportGeometry::new(0, 0, 800, 600));
        viewport.update_geometry(ViewportGeometry::new(0, 0, 800, 600));
        viewport.set_camera(Some(Arc::new(Mat4::from_scale(glam::Vec3::splat(2.0)))));
        assert_eq!(counter.geometry.load(Ordering::SeqCst), 1);
        assert_eq!(counter.camera.load(Ordering::SeqCst), 1);

        viewport.remove_listener(&listener);
        viewport.update_geometry(ViewportGeometry::new(0, 0, 1024, 768));
        assert_eq!(counter.geometry.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let target = RenderTarget::window();
        let viewport = Viewport::attach(&target, None, ViewportGeometry::default());
        {
            let listener: Arc<dyn ViewportListener> = Arc::new(CountingListener::default());
            viewport.add_listener(&listener);
        }
        viewport.update_geometry(ViewportGeometry::new(1, 1, 2, 2));
        assert_eq!(viewport.listeners.lock().len(), 0);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(ViewportGeometry::new(0, 0, 800, 400).aspect_ratio(), 2.0);
        assert_eq!(ViewportGeometry::default().aspect_ratio(), 1.0);
    }
}
