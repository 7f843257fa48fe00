//! A single unit of drawing work.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::Mat4;

use crate::resources::{Program, ProgramId, Texture, VertexData};

use super::uniform::UniformVariable;
use super::uniform_struct::UniformStruct;

/// Geometry plus the textures and uniforms it is drawn with.
///
/// The program normally comes from the pass drawing the command; a command
/// may carry its own program which then replaces the pass program for this
/// command only.
#[derive(Clone)]
pub struct DrawCommand {
    vertex_data: Arc<VertexData>,
    model_matrix: Mat4,
    program: Option<Arc<Program>>,
    textures: BTreeMap<u32, Arc<Texture>>,
    uniforms: BTreeMap<String, UniformVariable>,
}

impl DrawCommand {
    pub fn new(vertex_data: Arc<VertexData>, model_matrix: Mat4) -> Self {
        Self {
            vertex_data,
            model_matrix,
            program: None,
            textures: BTreeMap::new(),
            uniforms: BTreeMap::new(),
        }
    }

    pub fn vertex_data(&self) -> &Arc<VertexData> {
        &self.vertex_data
    }

    pub fn set_vertex_data(&mut self, vertex_data: Arc<VertexData>) {
        self.vertex_data = vertex_data;
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model_matrix
    }

    pub fn set_model_matrix(&mut self, model_matrix: Mat4) {
        self.model_matrix = model_matrix;
    }

    pub fn program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    pub fn program_id(&self) -> Option<ProgramId> {
        self.program.as_ref().map(|program| program.id())
    }

    /// Draw with `program` instead of the pass program.
    pub fn set_program(&mut self, program: Option<Arc<Program>>) {
        self.program = program;
    }

    /// Bind `texture` to `unit`, replacing any texture already bound there.
    pub fn set_texture(&mut self, unit: u32, texture: Arc<Texture>) {
        self.textures.insert(unit, texture);
    }

    pub fn textures(&self) -> &BTreeMap<u32, Arc<Texture>> {
        &self.textures
    }

    /// Set a variable specific to this command, overwriting an existing one.
    pub fn set_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformVariable>) {
        self.uniforms.insert(name.into(), value.into());
    }

    /// Set the members of the struct uniform `name`, or of element `index`
    /// of an array of structs.
    pub fn set_uniform_struct<S: UniformStruct>(
        &mut self,
        name: &str,
        value: &S,
        index: Option<usize>,
    ) {
        self.uniforms.extend(value.uniform_variables(name, index));
    }

    pub fn uniforms(&self) -> &BTreeMap<String, UniformVariable> {
        &self.uniforms
    }
}

impl fmt::Debug for DrawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCommand")
            .field("vertex_data", &self.vertex_data)
            .field("model_matrix", &self.model_matrix)
            .field("program", &self.program_id())
            .field("textures", &self.textures.keys().collect::<Vec<_>>())
            .field("uniforms", &self.uniforms)
            .finish()
    }
}
