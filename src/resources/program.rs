//! Linked shader programs

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::{GpuProgram, GpuShader, RenderDevice};
use crate::error::{RenderError, RenderResult};
use crate::resource::{RenderResource, ResourceValidity};
use crate::RenderSystemKind;

use super::Shader;

/// Stable identity of a [`Program`], used to key per-program state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u64);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program#{}", self.0)
    }
}

/// A set of shaders linked into one program.
///
/// Making a program valid first makes all of its shaders valid; a shader
/// failure becomes the program's failure.
pub struct Program {
    id: ProgramId,
    device: Arc<dyn RenderDevice>,
    validity: ResourceValidity,
    shaders: Vec<Arc<Shader>>,
    gpu: OnceLock<GpuProgram>,
}

impl Program {
    pub fn new(device: Arc<dyn RenderDevice>, shaders: Vec<Arc<Shader>>) -> Self {
        Self {
            id: ProgramId(super::next_resource_id()),
            device,
            validity: ResourceValidity::new(),
            shaders,
            gpu: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn shaders(&self) -> &[Arc<Shader>] {
        &self.shaders
    }

    /// Backend object, available once the program is valid.
    pub fn gpu(&self) -> Option<&GpuProgram> {
        self.gpu.get()
    }

    /// Names of the active uniforms, empty until the program is valid.
    pub fn uniform_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .gpu()
            .map(|gpu| gpu.uniform_names().into_iter().map(str::to_owned).collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl RenderResource for Program {
    fn kind(&self) -> RenderSystemKind {
        self.device.kind()
    }

    fn validity(&self) -> &ResourceValidity {
        &self.validity
    }

    fn make_valid_impl(&self) -> RenderResult<()> {
        if self.shaders.is_empty() {
            return Err(RenderError::ProgramLinkFailed(
                "program has no shaders attached".to_string(),
            ));
        }

        let mut handles: Vec<&GpuShader> = Vec::with_capacity(self.shaders.len());
        for shader in &self.shaders {
            shader.ensure_valid()?;
            let handle = shader.gpu().ok_or_else(|| {
                RenderError::ProgramLinkFailed(format!(
                    "shader \"{}\" has no backend object",
                    shader.file().name()
                ))
            })?;
            handles.push(handle);
        }

        log::trace!(
            "{}: linking {} from {} shaders",
            self.device.name(),
            self.id,
            handles.len()
        );
        let gpu = self.device.link_program(&handles)?;
        if let Err(rejected) = self.gpu.set(gpu) {
            self.device.destroy_program(&rejected);
        }
        Ok(())
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            self.device.destroy_program(&gpu);
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("shaders", &self.shaders)
            .field("valid", &self.is_valid())
            .finish()
    }
}

static_assertions::assert_impl_all!(Program: Send, Sync);
