//! Reading and writing the classifier's weight blob.
//!
//! A blob is the bincode encoding (fixed-width integers, little endian) of
//!
//! ```text
//! { version: u32 = 1, net: EmotionNet }
//! ```
//!
//! where every tensor is stored as its shape followed by its row-major data.
//! Files whose name ends in `.bz2` are bzip2-compressed.
//!
//! # Example
//!
//! ```ignore
//! use face_emotion::EmotionNet;
//!
//! let net = EmotionNet::load("emotion_model.bin.bz2")?;
//! net.save("emotion_model.bin")?;
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::Options;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, ModelError, Result};
use crate::network::EmotionNet;

pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on how much a blob may decode to; the real model is ~20 MiB.
const MAX_DECODED_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Deserialize)]
struct WeightFile {
    version: u32,
    net: EmotionNet,
}

#[derive(Serialize)]
struct WeightFileRef<'a> {
    version: u32,
    net: &'a EmotionNet,
}

fn codec() -> impl Options {
    bincode::options()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
        .with_limit(MAX_DECODED_BYTES)
}

fn is_bz2(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bz2")
}

impl EmotionNet {
    /// Load and validate a weight blob (raw or `.bz2`).
    ///
    /// Every failure, including a parameter whose shape does not match the
    /// architecture, is reported as [`Error::ModelLoad`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let net = read_blob(path).map_err(|source| Error::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded weights from {}", path.display());
        Ok(net)
    }

    /// Decode and validate a blob from an uncompressed byte stream.
    ///
    /// Reading stops once the stream exceeds the decode limit, so a
    /// compressed blob cannot inflate without bound.
    pub fn from_reader<R: Read>(reader: R) -> std::result::Result<Self, ModelError> {
        decode(&read_limited(reader, MAX_DECODED_BYTES)?)
    }

    /// Write the blob, compressing it when the path ends in `.bz2`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ModelError> {
        let path = path.as_ref();
        let bytes = codec().serialize(&WeightFileRef {
            version: FORMAT_VERSION,
            net: self,
        })?;

        let mut writer = BufWriter::new(File::create(path)?);
        if is_bz2(path) {
            let mut encoder = BzEncoder::new(writer, Compression::default());
            encoder.write_all(&bytes)?;
            encoder.finish()?.flush()?;
        } else {
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        Ok(())
    }
}

fn read_blob(path: &Path) -> std::result::Result<EmotionNet, ModelError> {
    let file = File::open(path)?;
    if is_bz2(path) {
        EmotionNet::from_reader(BzDecoder::new(BufReader::new(file)))
    } else {
        EmotionNet::from_reader(file)
    }
}

fn read_limited<R: Read>(reader: R, limit: u64) -> std::result::Result<Vec<u8>, ModelError> {
    let mut bytes = Vec::new();
    BufReader::new(reader.take(limit + 1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(ModelError::InvalidModel(format!("weight blob exceeds {limit} bytes")));
    }
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> std::result::Result<EmotionNet, ModelError> {
    if bytes.is_empty() {
        return Err(ModelError::InvalidModel("weight blob is empty".into()));
    }

    let file: WeightFile = codec().deserialize(bytes)?;
    if file.version != FORMAT_VERSION {
        return Err(ModelError::InvalidModel(format!(
            "Unsupported weight blob version: {}",
            file.version
        )));
    }

    file.net.validate().map_err(|e| match e {
        Error::Model(inner) => inner,
        other => ModelError::InvalidModel(other.to_string()),
    })?;
    Ok(file.net)
}
