use std::path::PathBuf;

use thiserror::Error;

use crate::types::Logits;

/// Problems with a weight blob or an in-memory parameter record.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model deserialization error: {0}")]
    Deserialization(#[from] bincode::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Failed to load model {}: {source}", path.display())]
    ModelLoad { path: PathBuf, source: ModelError },

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("Face detector error: {0}")]
    Detector(String),

    #[error(
        "Invalid face region ({x}, {y}) {width}x{height} for {image_width}x{image_height} image"
    )]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Tensor shape error: {0}")]
    Tensor(#[from] ndarray::ShapeError),

    #[error("Classifier produced non-finite scores: {0:?}")]
    NonFiniteScores(Logits),
}

/// Coarse classification of an [`Error`], for callers that branch on the
/// failure class rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ImageRead,
    NoFaceDetected,
    ModelLoad,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ImageRead { .. } => ErrorKind::ImageRead,
            Error::NoFaceDetected => ErrorKind::NoFaceDetected,
            Error::ModelLoad { .. } | Error::Model(_) => ErrorKind::ModelLoad,
            Error::Detector(_)
            | Error::InvalidRegion { .. }
            | Error::Tensor(_)
            | Error::NonFiniteScores(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_face_message_is_stable() {
        assert_eq!(Error::NoFaceDetected.to_string(), "No face detected");
    }

    #[test]
    fn model_errors_classify_as_model_load() {
        let err = Error::ModelLoad {
            path: PathBuf::from("weights.bin"),
            source: ModelError::InvalidModel("fc1.weight: bad shape".into()),
        };
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
        assert!(err.to_string().contains("weights.bin"));
        assert!(err.to_string().contains("fc1.weight"));

        let err = Error::from(ModelError::InvalidModel("bn1.running_var".into()));
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
    }

    #[test]
    fn overflowing_scores_are_internal() {
        let err = Error::NonFiniteScores([0.0, 1.0, f32::INFINITY, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("inf"));
    }
}
