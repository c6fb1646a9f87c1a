//! Turns a detected face into the classifier's input tensor.

use ndarray::Array4;

use crate::error::{Error, Result};
use crate::grayscale::GrayImage;
use crate::types::FaceRegion;
use crate::RawImage;

/// Side length of the square network input.
pub const FACE_SIZE: usize = 48;
/// Per-channel mean and standard deviation the weights were trained with,
/// applied after scaling intensities to `[0, 1]`.
pub const PIXEL_MEAN: f32 = 0.485;
pub const PIXEL_STD: f32 = 0.229;

/// A `[1, 1, 48, 48]` (batch, channel, height, width) tensor ready for the
/// network.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFace {
    tensor: Array4<f32>,
}

impl NormalizedFace {
    pub const SHAPE: [usize; 4] = [1, 1, FACE_SIZE, FACE_SIZE];

    /// Wrap an existing tensor, rejecting any shape other than [`Self::SHAPE`].
    pub fn from_tensor(tensor: Array4<f32>) -> Result<Self> {
        if tensor.shape() != Self::SHAPE {
            return Err(Error::Tensor(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::IncompatibleShape,
            )));
        }
        Ok(Self { tensor })
    }

    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    pub fn into_tensor(self) -> Array4<f32> {
        self.tensor
    }
}

/// Normalize one face of a colour image: grayscale, crop, resize, scale.
pub fn normalize_face(image: &RawImage, region: FaceRegion) -> Result<NormalizedFace> {
    normalize_gray(&GrayImage::from_rgb(image), region)
}

/// Same as [`normalize_face`] for an image that is already grayscale.
///
/// The region must have non-zero area and lie inside the image.
pub fn normalize_gray(image: &GrayImage, region: FaceRegion) -> Result<NormalizedFace> {
    if !region.fits_within(image.width(), image.height()) {
        return Err(Error::InvalidRegion {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            image_width: image.width(),
            image_height: image.height(),
        });
    }

    let face = image
        .crop(&region)
        .resize_bilinear(FACE_SIZE as u32, FACE_SIZE as u32);

    let values = face
        .as_raw()
        .iter()
        .map(|&p| (p as f32 / 255.0 - PIXEL_MEAN) / PIXEL_STD)
        .collect::<Vec<_>>();
    let tensor = Array4::from_shape_vec((1, 1, FACE_SIZE, FACE_SIZE), values)?;

    Ok(NormalizedFace { tensor })
}
