//! Deduplicating caches for shaders, programs and textures
//!
//! A manager hands out shared handles and keeps one reference itself.
//! [`collect_garbage`](ShaderManager::collect_garbage) drops every entry the
//! manager is the last owner of, which destroys the backend object.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::RenderDevice;

use super::{File, Image, Program, Shader, ShaderType, Texture, TextureParameter};

fn collect<K, V>(map: &mut HashMap<K, Arc<V>>) -> usize {
    let before = map.len();
    map.retain(|_, value| Arc::strong_count(value) > 1);
    before - map.len()
}

/// Shaders keyed by stage and source file.
pub struct ShaderManager {
    device: Arc<dyn RenderDevice>,
    shaders: Mutex<HashMap<(ShaderType, File), Arc<Shader>>>,
}

impl ShaderManager {
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            shaders: Mutex::new(HashMap::new()),
        }
    }

    /// The shader compiled from `file`, created on first request.
    pub fn get(&self, shader_type: ShaderType, file: &File) -> Arc<Shader> {
        let mut shaders = self.shaders.lock();
        shaders
            .entry((shader_type, file.clone()))
            .or_insert_with(|| {
                Arc::new(Shader::new(self.device.clone(), shader_type, file.clone()))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.shaders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.lock().is_empty()
    }

    /// Drop shaders nobody else references. Returns the number dropped.
    pub fn collect_garbage(&self) -> usize {
        let removed = collect(&mut *self.shaders.lock());
        if removed > 0 {
            log::debug!("released {removed} unused shaders");
        }
        removed
    }
}

/// Programs keyed by the set of attached shaders.
pub struct ProgramManager {
    device: Arc<dyn RenderDevice>,
    programs: Mutex<HashMap<Vec<u64>, Arc<Program>>>,
}

impl ProgramManager {
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            programs: Mutex::new(HashMap::new()),
        }
    }

    /// The program linking `shaders`; attachment order does not matter.
    pub fn get(&self, shaders: &[Arc<Shader>]) -> Arc<Program> {
        let mut key: Vec<u64> = shaders.iter().map(|shader| shader.id()).collect();
        key.sort_unstable();
        key.dedup();

        let mut programs = self.programs.lock();
        programs
            .entry(key)
            .or_insert_with(|| Arc::new(Program::new(self.device.clone(), shaders.to_vec())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.programs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.lock().is_empty()
    }

    /// Drop programs nobody else references. Returns the number dropped.
    pub fn collect_garbage(&self) -> usize {
        let removed = collect(&mut *self.programs.lock());
        if removed > 0 {
            log::debug!("released {removed} unused programs");
        }
        removed
    }
}

/// Textures keyed by image identity and sampling parameters.
pub struct TextureManager {
    device: Arc<dyn RenderDevice>,
    textures: Mutex<HashMap<(usize, TextureParameter), Arc<Texture>>>,
}

impl TextureManager {
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            textures: Mutex::new(HashMap::new()),
        }
    }

    /// The texture of `image` sampled with `param`.
    ///
    /// Images are compared by identity; the cached texture keeps the image
    /// alive, so the address cannot be reused while the entry exists.
    pub fn get(&self, image: &Arc<Image>, param: TextureParameter) -> Arc<Texture> {
        let key = (Arc::as_ptr(image) as usize, param);
        let mut textures = self.textures.lock();
        textures
            .entry(key)
            .or_insert_with(|| Arc::new(Texture::new(self.device.clone(), image.clone(), param)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.textures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.lock().is_empty()
    }

    /// Drop textures nobody else references. Returns the number dropped.
    pub fn collect_garbage(&self) -> usize {
        let removed = collect(&mut *self.textures.lock());
        if removed > 0 {
            log::debug!("released {removed} unused textures");
        }
        removed
    }
}
