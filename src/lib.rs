//! # face-emotion
//!
//! Pure Rust facial expression classification.
//!
//! Given a photograph, the crate finds the most prominent face and labels it
//! with one of seven expressions (angry, disgust, fear, happy, sad, surprise,
//! neutral) together with a confidence in `[0, 1]`.
//!
//! ## Pipeline
//!
//! 1. Convert the image to grayscale and run a SeetaFace cascade detector
//!    over it ([`SeetaLocalizer`])
//! 2. Keep the candidate with the largest area ([`select_largest`])
//! 3. Crop, resize to 48×48 and standardize the face ([`normalize_face`])
//! 4. Run the convolutional classifier ([`EmotionNet`]) to get seven logits
//! 5. Softmax the logits and report the top class ([`assemble`])
//!
//! An image without a face is not an error for callers of
//! [`classify_files`]: it yields a neutral result with zero confidence and
//! the message "No face detected".
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use face_emotion::{
//!     EmotionNet, EmotionPipeline, FaceLocalizer, FaceRegion, GrayImage, RawImage, Result,
//! };
//!
//! // A localizer that always reports the same rectangle; use
//! // `SeetaLocalizer::load("seeta_fd_frontal_v1.0.bin")` for real images.
//! struct Centre;
//!
//! impl FaceLocalizer for Centre {
//!     fn locate(&self, image: &GrayImage) -> Result<Vec<FaceRegion>> {
//!         Ok(vec![FaceRegion::new(8, 8, image.width() - 16, image.height() - 16)])
//!     }
//! }
//!
//! // Load trained weights with `EmotionNet::load("emotion_model.bin")`;
//! // an all-zero network is enough to exercise the pipeline.
//! let net = EmotionNet::from_fn(|name, _| if name.ends_with("running_var") { 1.0 } else { 0.0 });
//! let pipeline = EmotionPipeline::new(Centre, Arc::new(net));
//!
//! let image = RawImage::from_fn(96, 96, |x, y| image::Rgb([(x + y) as u8, 80, 160]));
//! let result = pipeline.classify_image(&image).unwrap();
//! assert!((0.0..=1.0).contains(&result.confidence));
//! ```

mod error;
mod grayscale;
mod layers;
mod localizer;
mod network;
mod normalizer;
mod pipeline;
mod scoring;
mod types;
mod weights;

pub use error::{Error, ErrorKind, ModelError, Result};
pub use grayscale::GrayImage;
pub use layers::{BatchNorm2d, Conv2d, Linear, BATCH_NORM_EPS};
pub use localizer::{select_largest, FaceLocalizer, SeetaLocalizer};
pub use network::EmotionNet;
pub use normalizer::{normalize_face, normalize_gray, NormalizedFace, FACE_SIZE};
pub use pipeline::{
    classify_files, classify_files_with, load_image, EmotionPipeline, Report, RunStatus,
};
pub use scoring::{argmax, assemble, softmax};
pub use types::{ClassificationResult, EmotionLabel, FaceRegion, Logits};
pub use weights::FORMAT_VERSION;

/// An 8-bit RGB image as decoded from disk.
pub type RawImage = image::RgbImage;
