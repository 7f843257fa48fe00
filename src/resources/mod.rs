//! GPU-backed render resources
//!
//! Shaders, programs, textures, vertex data and frame buffers. All of them
//! are created cheaply and materialized on the backend by
//! [`RenderResource::make_valid`](crate::resource::RenderResource::make_valid).
//! The managers deduplicate shaders, programs and textures by identity.

mod file;
mod frame_buffer;
mod manager;
mod program;
mod shader;
mod texture;
mod vertex_data;

pub use file::*;
pub use frame_buffer::*;
pub use manager::*;
pub use program::*;
pub use shader::*;
pub use texture::*;
pub use vertex_data::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide unique identifier for shaders and programs.
pub(crate) fn next_resource_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
