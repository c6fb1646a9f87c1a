//! Turns raw logits into a labelled, calibrated result.

use crate::types::{ClassificationResult, EmotionLabel, Logits};

/// Numerically stable softmax: the maximum logit is subtracted before
/// exponentiation so large scores never overflow.
pub fn softmax(logits: &Logits) -> [f32; EmotionLabel::COUNT] {
    let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut probabilities = [0.0f32; EmotionLabel::COUNT];
    let mut sum = 0.0f32;
    for (p, &logit) in probabilities.iter_mut().zip(logits.iter()) {
        *p = (logit - max_logit).exp();
        sum += *p;
    }
    for p in probabilities.iter_mut() {
        *p /= sum;
    }
    probabilities
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Pick the most probable label and report its probability as confidence.
///
/// Expects finite logits, as returned by [`EmotionNet::forward`](crate::EmotionNet::forward).
pub fn assemble(logits: &Logits) -> ClassificationResult {
    let probabilities = softmax(logits);
    let best = argmax(&probabilities);
    // `best` indexes a COUNT-sized array, so the lookup cannot miss.
    let emotion = EmotionLabel::ALL[best];

    ClassificationResult::new(emotion, probabilities[best].clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(values: &[f32]) -> f32 {
        values.iter().sum()
    }

    #[test]
    fn softmax_is_a_distribution() {
        let cases: [Logits; 4] = [
            [0.0; 7],
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            [-3.5, 0.25, 8.0, -1.0, 2.0, 2.0, -20.0],
            [1000.0, 999.0, -1000.0, 0.0, 500.0, 1000.0, 3.0],
        ];
        for logits in cases {
            let p = softmax(&logits);
            assert!(p.iter().all(|&v| v >= 0.0 && v.is_finite()), "{p:?}");
            assert!((sum(&p) - 1.0).abs() < 1e-6, "sum {} for {logits:?}", sum(&p));
        }
    }

    #[test]
    fn softmax_uniform_logits() {
        let p = softmax(&[2.5; 7]);
        for v in p {
            assert!((v - 1.0 / 7.0).abs() < 1e-6);
        }
    }

    #[test]
    fn softmax_matches_direct_formula() {
        let logits: Logits = [0.1, -0.4, 1.3, 0.0, 0.7, -2.0, 0.9];
        let denom: f64 = logits.iter().map(|&l| (l as f64).exp()).sum();
        let p = softmax(&logits);
        for (i, &l) in logits.iter().enumerate() {
            let expected = (l as f64).exp() / denom;
            assert!((p[i] as f64 - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5, 0.2]), 1);
        assert_eq!(argmax(&[0.9]), 0);
        assert_eq!(argmax(&[0.0, 0.0, 0.0]), 0);
    }

    #[test]
    fn assemble_reports_top_probability() {
        let logits: Logits = [0.0, 0.0, 0.0, 4.0, 0.0, 1.0, 0.0];
        let result = assemble(&logits);
        let p = softmax(&logits);

        assert_eq!(result.emotion, EmotionLabel::Happy);
        assert_eq!(result.confidence, p[EmotionLabel::Happy.index()]);
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);
        assert!(result.error.is_none());
    }

    #[test]
    fn assemble_handles_extreme_logits() {
        let logits: Logits = [-1e30, -1e30, -1e30, -1e30, -1e30, -1e30, 1e30];
        let result = assemble(&logits);
        assert_eq!(result.emotion, EmotionLabel::Neutral);
        assert_eq!(result.confidence, 1.0);
    }
}
