//! End-to-end classification: localize → normalize → classify → assemble.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::grayscale::GrayImage;
use crate::localizer::{select_largest, FaceLocalizer};
use crate::network::EmotionNet;
use crate::normalizer::normalize_gray;
use crate::scoring::assemble;
use crate::types::ClassificationResult;
use crate::RawImage;

/// Decode an image file into RGB, rejecting empty images.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RawImage> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|source| Error::ImageRead {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    if image.width() == 0 || image.height() == 0 {
        return Err(Error::ImageRead {
            path: path.to_path_buf(),
            source: image::ImageError::Limits(image::error::LimitError::from_kind(
                image::error::LimitErrorKind::DimensionError,
            )),
        });
    }
    Ok(image)
}

/// A localizer paired with loaded weights.
///
/// Holds no mutable state, so one pipeline can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct EmotionPipeline<L> {
    localizer: L,
    net: Arc<EmotionNet>,
}

impl<L: FaceLocalizer> EmotionPipeline<L> {
    pub fn new(localizer: L, net: Arc<EmotionNet>) -> Self {
        Self { localizer, net }
    }

    pub fn net(&self) -> &EmotionNet {
        &self.net
    }

    /// Classify the largest face in an image file.
    pub fn classify_path<P: AsRef<Path>>(&self, path: P) -> Result<ClassificationResult> {
        self.classify_image(&load_image(path)?)
    }

    /// Classify the largest face in a decoded image.
    ///
    /// Returns [`Error::NoFaceDetected`] when the localizer finds nothing.
    pub fn classify_image(&self, image: &RawImage) -> Result<ClassificationResult> {
        let gray = GrayImage::from_rgb(image);

        let candidates = self.localizer.locate(&gray)?;
        let region = select_largest(&candidates).ok_or(Error::NoFaceDetected)?;
        debug!(
            candidates = candidates.len(),
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "selected face region"
        );

        let face = normalize_gray(&gray, region)?;
        let logits = self.net.forward(&face)?;
        let result = assemble(&logits);
        debug!(?logits, emotion = %result.emotion, confidence = result.confidence, "classified");

        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// What a caller prints and how it should exit.
///
/// "No face" is reported with success status but a flagged neutral result,
/// so consumers that only look at the JSON still see the fallback label.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub result: ClassificationResult,
    pub status: RunStatus,
}

impl Report {
    pub fn success(result: ClassificationResult) -> Self {
        Self {
            result,
            status: RunStatus::Success,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: ClassificationResult::degraded(message),
            status: RunStatus::Failure,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
        }
    }
}

impl From<Result<ClassificationResult>> for Report {
    fn from(outcome: Result<ClassificationResult>) -> Self {
        match outcome {
            Ok(result) => Report::success(result),
            Err(Error::NoFaceDetected) => Report::success(ClassificationResult::no_face()),
            Err(e) => {
                error!("classification failed: {e}");
                Report::failure(e.to_string())
            }
        }
    }
}

/// Load weights, read the image, classify, and fold every outcome into a
/// [`Report`]. Weights are loaded before the image is touched.
pub fn classify_files<L, I, W>(image_path: I, weights_path: W, localizer: L) -> Report
where
    L: FaceLocalizer,
    I: AsRef<Path>,
    W: AsRef<Path>,
{
    classify_files_with(image_path, weights_path, || Ok(localizer))
}

/// Like [`classify_files`], but the localizer is only built once the
/// weights have loaded, so a bad weight blob is reported ahead of a
/// missing detector model.
pub fn classify_files_with<L, F, I, W>(
    image_path: I,
    weights_path: W,
    make_localizer: F,
) -> Report
where
    L: FaceLocalizer,
    F: FnOnce() -> Result<L>,
    I: AsRef<Path>,
    W: AsRef<Path>,
{
    let outcome = EmotionNet::load(weights_path).and_then(|net| {
        let localizer = make_localizer()?;
        EmotionPipeline::new(localizer, Arc::new(net)).classify_path(image_path)
    });
    Report::from(outcome)
}
