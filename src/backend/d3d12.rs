//! Direct3D 12 placeholder.
//!
//! The render system kind is reserved but no device can be created.

use std::sync::Arc;

use super::RenderDevice;
use crate::error::{RenderError, RenderResult};
use crate::RenderSystemKind;

/// Always fails: the Direct3D 12 backend is not implemented.
pub fn create_device() -> RenderResult<Arc<dyn RenderDevice>> {
    log::warn!("Direct3D 12 render system requested");
    Err(RenderError::Unsupported(
        RenderSystemKind::D3D12,
        "the Direct3D 12 backend is not implemented".to_string(),
    ))
}
