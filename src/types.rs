use serde::{Deserialize, Serialize};

/// Raw class scores produced by the network, one per [`EmotionLabel`].
pub type Logits = [f32; EmotionLabel::COUNT];

/// The seven expression classes, in the order the trained weights emit them.
///
/// The discriminants are the network's output indices; reordering the
/// variants without retraining the weights silently mislabels every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Angry = 0,
    Disgust = 1,
    Fear = 2,
    Happy = 3,
    Sad = 4,
    Surprise = 5,
    Neutral = 6,
}

impl EmotionLabel {
    pub const COUNT: usize = 7;

    pub const ALL: [EmotionLabel; Self::COUNT] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An axis-aligned face rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the region has non-zero area and lies entirely inside an
    /// image of the given size.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        !self.is_empty()
            && self.x as u64 + self.width as u64 <= image_width as u64
            && self.y as u64 + self.height as u64 <= image_height as u64
    }

    /// Clip a signed detector box to an image, returning `None` when nothing
    /// of it remains.
    pub fn clipped(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let left = x.max(0);
        let top = y.max(0);
        let right = (x + width).min(image_width as i64);
        let bottom = (y + height).min(image_height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Self::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// The externally visible outcome of one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub emotion: EmotionLabel,
    /// Probability of `emotion`, in `[0, 1]`.
    pub confidence: f32,
    /// Present only for degraded outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationResult {
    pub const NO_FACE_MESSAGE: &'static str = "No face detected";

    pub fn new(emotion: EmotionLabel, confidence: f32) -> Self {
        Self {
            emotion,
            confidence,
            error: None,
        }
    }

    /// Neutral fallback carrying an error message.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            emotion: EmotionLabel::Neutral,
            confidence: 0.0,
            error: Some(message.into()),
        }
    }

    pub fn no_face() -> Self {
        Self::degraded(Self::NO_FACE_MESSAGE)
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_indices_follow_weight_order() {
        for (i, label) in EmotionLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(EmotionLabel::from_index(i), Some(*label));
        }
        assert_eq!(EmotionLabel::from_index(7), None);
        assert_eq!(EmotionLabel::Happy.as_str(), "happy");
        assert_eq!(EmotionLabel::Neutral.to_string(), "neutral");
    }

    #[test]
    fn region_clipping() {
        let inside = FaceRegion::clipped(10, 20, 30, 40, 100, 100).unwrap();
        assert_eq!(inside, FaceRegion::new(10, 20, 30, 40));

        let overhanging = FaceRegion::clipped(-5, 90, 20, 20, 100, 100).unwrap();
        assert_eq!(overhanging, FaceRegion::new(0, 90, 15, 10));
        assert!(overhanging.fits_within(100, 100));

        assert_eq!(FaceRegion::clipped(120, 0, 10, 10, 100, 100), None);
        assert_eq!(FaceRegion::clipped(0, 0, 0, 10, 100, 100), None);
    }

    #[test]
    fn region_area_does_not_overflow() {
        let region = FaceRegion::new(0, 0, u32::MAX, 2);
        assert_eq!(region.area(), u32::MAX as u64 * 2);
    }

    #[test]
    fn result_json_shape() {
        let ok = ClassificationResult::new(EmotionLabel::Happy, 0.75);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["emotion"], "happy");
        assert_eq!(json["confidence"], 0.75);
        assert!(json.get("error").is_none());

        let degraded = ClassificationResult::no_face();
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["emotion"], "neutral");
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["error"], "No face detected");
    }
}
