//! Face localization: proposing face rectangles and choosing the one to score.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use rustface::{Detector, ImageData};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::grayscale::GrayImage;
use crate::types::FaceRegion;

/// Image pyramid step between detection scales.
pub const SCALE_STEP: f32 = 1.3;
/// Smallest face side, in pixels, the detector searches for.
pub const MIN_FACE_SIZE: u32 = 20;
/// Cascade score a merged window needs to count as a face.
pub const SCORE_THRESHOLD: f64 = 2.0;
pub const WINDOW_STEP: u32 = 4;

/// Proposes candidate face regions in a grayscale image.
///
/// Candidates come back in the detector's own order, which must be
/// reproducible for a given image so that [`select_largest`] is too.
pub trait FaceLocalizer: Send + Sync {
    fn locate(&self, image: &GrayImage) -> Result<Vec<FaceRegion>>;
}

impl<T: FaceLocalizer + ?Sized> FaceLocalizer for &T {
    fn locate(&self, image: &GrayImage) -> Result<Vec<FaceRegion>> {
        (**self).locate(image)
    }
}

impl<T: FaceLocalizer + ?Sized> FaceLocalizer for Arc<T> {
    fn locate(&self, image: &GrayImage) -> Result<Vec<FaceRegion>> {
        (**self).locate(image)
    }
}

/// The candidate with the largest area; earlier candidates win ties.
pub fn select_largest(regions: &[FaceRegion]) -> Option<FaceRegion> {
    let mut best: Option<FaceRegion> = None;
    for region in regions {
        match best {
            Some(current) if region.area() <= current.area() => {}
            _ => best = Some(*region),
        }
    }
    best
}

/// SeetaFace funnel-structured cascade detector, backed by `rustface`.
///
/// Holds the model file's bytes, read once per process. Every
/// [`locate`](FaceLocalizer::locate) call parses them into a private
/// `rustface` detector, because a detector takes `&mut self` to detect and
/// consumes the model it is built from. That parse is paid once per image
/// and lets one instance be shared between threads without locking.
#[derive(Clone)]
pub struct SeetaLocalizer {
    model: Arc<[u8]>,
}

static SHARED_LOCALIZER: OnceLock<std::result::Result<SeetaLocalizer, String>> = OnceLock::new();

impl SeetaLocalizer {
    /// Read a SeetaFace model (e.g. `seeta_fd_frontal_v1.0.bin`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            Error::Detector(format!("cannot read detector model {}: {e}", path.display()))
        })?;
        Self::from_bytes(bytes)
    }

    /// Use an in-memory SeetaFace model, checking that it parses.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let localizer = Self {
            model: Arc::from(bytes),
        };
        localizer.detector()?;
        Ok(localizer)
    }

    /// Process-wide localizer, loaded on first use and never modified.
    ///
    /// The first call decides which model file backs the handle; later calls
    /// get the same instance whatever path they pass.
    pub fn shared<P: AsRef<Path>>(path: P) -> Result<&'static SeetaLocalizer> {
        SHARED_LOCALIZER
            .get_or_init(|| {
                let path = path.as_ref();
                match Self::load(path) {
                    Ok(localizer) => {
                        debug!("face detector model loaded from {}", path.display());
                        Ok(localizer)
                    }
                    Err(e) => {
                        warn!("face detector model unavailable: {e}");
                        Err(e.to_string())
                    }
                }
            })
            .as_ref()
            .map_err(|e| Error::Detector(e.clone()))
    }

    fn detector(&self) -> Result<Box<dyn Detector>> {
        let model = rustface::read_model(Cursor::new(&self.model[..]))
            .map_err(|e| Error::Detector(format!("invalid detector model: {e}")))?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(MIN_FACE_SIZE);
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(1.0 / SCALE_STEP);
        detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);
        Ok(detector)
    }
}

impl std::fmt::Debug for SeetaLocalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeetaLocalizer")
            .field("model_bytes", &self.model.len())
            .finish()
    }
}

impl FaceLocalizer for SeetaLocalizer {
    fn locate(&self, image: &GrayImage) -> Result<Vec<FaceRegion>> {
        let mut detector = self.detector()?;
        let data = ImageData::new(image.as_raw(), image.width(), image.height());
        let faces = detector.detect(&data);

        let mut regions = Vec::with_capacity(faces.len());
        for face in &faces {
            let bbox = face.bbox();
            match FaceRegion::clipped(
                bbox.x() as i64,
                bbox.y() as i64,
                bbox.width() as i64,
                bbox.height() as i64,
                image.width(),
                image.height(),
            ) {
                Some(region) => regions.push(region),
                None => warn!(
                    "dropping detection ({}, {}) {}x{} outside {}x{} image",
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    image.width(),
                    image.height()
                ),
            }
        }

        debug!("located {} face candidate(s)", regions.len());
        Ok(regions)
    }
}
