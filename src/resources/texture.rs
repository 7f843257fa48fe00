//! Images and textures

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use image::{DynamicImage, GenericImageView};

use crate::backend::{GpuTexture, RenderDevice};
use crate::error::{RenderError, RenderResult};
use crate::resource::{RenderResource, ResourceValidity};
use crate::RenderSystemKind;

/// Decoded RGBA8 image data
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub name: String,
}

impl Image {
    /// Wrap raw RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>, name: &str) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::ResourceCreationFailed {
                what: "image",
                reason: format!(
                    "{}x{} RGBA8 image needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            name: name.to_string(),
        })
    }

    /// Decode an image file
    pub fn from_file<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|e| RenderError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(img, &name))
    }

    /// Decode an image from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> RenderResult<Self> {
        let img = image::load_from_memory(bytes).map_err(|e| RenderError::Io {
            path: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.to_rgba8().into_raw(),
            name: name.to_string(),
        }
    }

    /// A 1x1 image of one color
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// A checkerboard of 8x8 tiles
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                pixels.extend_from_slice(if is_even { &color1 } else { &color2 });
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
            name: "checkerboard".to_string(),
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Sampling outside of [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeSampling {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// How a texture is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureParameter {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub edge_sampling: EdgeSampling,
    pub use_mipmap: bool,
}

impl Default for TextureParameter {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            edge_sampling: EdgeSampling::Repeat,
            use_mipmap: true,
        }
    }
}

/// An image uploaded to the backend.
pub struct Texture {
    device: Arc<dyn RenderDevice>,
    validity: ResourceValidity,
    image: Arc<Image>,
    param: TextureParameter,
    gpu: OnceLock<GpuTexture>,
}

impl Texture {
    pub fn new(device: Arc<dyn RenderDevice>, image: Arc<Image>, param: TextureParameter) -> Self {
        Self {
            device,
            validity: ResourceValidity::new(),
            image,
            param,
            gpu: OnceLock::new(),
        }
    }

    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    pub fn parameter(&self) -> &TextureParameter {
        &self.param
    }

    /// Backend object, available once the texture is valid.
    pub fn gpu(&self) -> Option<&GpuTexture> {
        self.gpu.get()
    }
}

impl RenderResource for Texture {
    fn kind(&self) -> RenderSystemKind {
        self.device.kind()
    }

    fn validity(&self) -> &ResourceValidity {
        &self.validity
    }

    fn make_valid_impl(&self) -> RenderResult<()> {
        log::trace!(
            "{}: uploading texture \"{}\" ({}x{})",
            self.device.name(),
            self.image.name,
            self.image.width,
            self.image.height
        );
        let gpu = self.device.create_texture(&self.image, &self.param)?;
        if let Err(rejected) = self.gpu.set(gpu) {
            self.device.destroy_texture(&rejected);
        }
        Ok(())
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            self.device.destroy_texture(&gpu);
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("image", &self.image)
            .field("param", &self.param)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullDevice;

    #[test]
    fn test_from_rgba8_checks_size() {
        assert!(Image::from_rgba8(2, 2, vec![0; 16], "ok").is_ok());
        assert!(Image::from_rgba8(2, 2, vec![0; 15], "short").is_err());
    }

    #[test]
    fn test_checkerboard_size() {
        let image = Image::checkerboard(16, [255; 4], [0, 0, 0, 255]);
        assert_eq!(image.pixels.len(), 16 * 16 * 4);
        assert_eq!(&image.pixels[0..4], &[255; 4]);
        assert_eq!(&image.pixels[8 * 4..8 * 4 + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_invalid_bytes_fail_to_decode() {
        assert!(Image::from_bytes(&[1, 2, 3], "garbage").is_err());
    }

    #[test]
    fn test_texture_make_valid() {
        let texture = Texture::new(
            Arc::new(NullDevice::new()),
            Arc::new(Image::solid_color([255, 0, 0, 255], "red")),
            TextureParameter::default(),
        );
        texture.make_valid();
        assert!(texture.is_valid());
        assert!(texture.gpu().is_some());
    }
}
