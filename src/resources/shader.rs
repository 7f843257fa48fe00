//! Shader stages

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::{GpuShader, RenderDevice};
use crate::error::RenderResult;
use crate::resource::{RenderResource, ResourceValidity};
use crate::RenderSystemKind;

use super::File;

/// Pipeline stage of a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderType {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderType::Vertex => "vertex",
            ShaderType::Fragment => "fragment",
            ShaderType::Geometry => "geometry",
            ShaderType::TessControl => "tessellation control",
            ShaderType::TessEvaluation => "tessellation evaluation",
            ShaderType::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// A single shader stage compiled from a source file.
pub struct Shader {
    id: u64,
    device: Arc<dyn RenderDevice>,
    validity: ResourceValidity,
    shader_type: ShaderType,
    file: File,
    gpu: OnceLock<GpuShader>,
}

impl Shader {
    pub fn new(device: Arc<dyn RenderDevice>, shader_type: ShaderType, file: File) -> Self {
        Self {
            id: super::next_resource_id(),
            device,
            validity: ResourceValidity::new(),
            shader_type,
            file,
            gpu: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shader_type(&self) -> ShaderType {
        self.shader_type
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Backend object, available once the shader is valid.
    pub fn gpu(&self) -> Option<&GpuShader> {
        self.gpu.get()
    }
}

impl RenderResource for Shader {
    fn kind(&self) -> RenderSystemKind {
        self.device.kind()
    }

    fn validity(&self) -> &ResourceValidity {
        &self.validity
    }

    fn make_valid_impl(&self) -> RenderResult<()> {
        log::trace!(
            "{}: compiling {} shader \"{}\"",
            self.device.name(),
            self.shader_type,
            self.file.name()
        );
        let gpu = self.device.compile_shader(self.shader_type, &self.file)?;
        if let Err(rejected) = self.gpu.set(gpu) {
            self.device.destroy_shader(&rejected);
        }
        Ok(())
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            self.device.destroy_shader(&gpu);
        }
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("type", &self.shader_type)
            .field("file", &self.file.name())
            .field("valid", &self.is_valid())
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
