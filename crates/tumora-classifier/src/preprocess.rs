//! Image decoding and tensor preparation
//!
//! Turns uploaded bytes into the `[1, H, W, 3]` NHWC tensor the classifier
//! expects: RGB, stretch-to-fit resize (aspect ratio is not preserved),
//! intensities divided by the configured scale.

use crate::model_config::PreprocessConfig;
use image::{imageops, DynamicImage, ImageFormat};
use tract_onnx::prelude::tract_ndarray::Array4;
use tumora_core::{Error, Result};

/// Model input, batch of one in NHWC layout
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    /// Wrap an existing array
    pub fn from_array(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// Shape as `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        let (n, h, w, c) = self.data.dim();
        [n, h, w, c]
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }

    /// Iterate over all values in memory order
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied()
    }
}

/// Decodes and normalizes images according to a [`PreprocessConfig`]
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Shape of every tensor this preprocessor produces
    pub fn output_shape(&self) -> [usize; 4] {
        self.config.output_shape()
    }

    /// Decode raw bytes and build the model input
    pub fn preprocess(&self, bytes: &[u8]) -> Result<InputTensor> {
        let image = decode(bytes)?;
        self.preprocess_image(&image)
    }

    /// Build the model input from an already decoded image
    pub fn preprocess_image(&self, image: &DynamicImage) -> Result<InputTensor> {
        let (width, height) = (self.config.width, self.config.height);

        // Grayscale is replicated across channels, alpha is dropped
        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, width, height, self.config.filter.into());

        // RgbImage raw layout is row-major HWC, which is exactly NHWC with N=1
        let scale = self.config.scale;
        let values: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / scale)
            .collect();

        let data = Array4::from_shape_vec((1, height as usize, width as usize, 3), values)
            .map_err(|e| Error::internal(format!("Failed to build input tensor: {}", e)))?;

        Ok(InputTensor { data })
    }
}

/// Decode an uploaded image, accepting JPEG and PNG
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::decode("Empty image data"));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| Error::decode("Unrecognized image format"))?;

    if !is_supported_format(format) {
        return Err(Error::decode(format!("Unsupported image format: {:?}", format)));
    }

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::decode(format!("Failed to decode {:?} image: {}", format, e)))
}

/// Formats accepted at the upload boundary
pub fn is_supported_format(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Jpeg | ImageFormat::Png)
}

/// Preprocess with the default 224x224 / 255 contract
pub fn preprocess(bytes: &[u8]) -> Result<InputTensor> {
    Preprocessor::default().preprocess(bytes)
}
