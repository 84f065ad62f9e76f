use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

use crate::error::DetectorError;
use crate::model::{AppState, IMAGE_SIZE};
use crate::models::ClassificationResult;

/// Human-authored class identifier in the model's vocabulary.
pub const HUMAN_LABEL: &str = "hum";

/// Minimum confidence for admitting a human-labelled image. AI-labelled
/// results deny at any confidence.
pub const ALLOW_THRESHOLD: f32 = 0.9;

// Per-channel normalization from the checkpoint's processor config.
const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// Decodes uploaded bytes into a 3-channel image. Grayscale, indexed and
/// alpha inputs are converted; undecodable bytes are a client fault.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DetectorError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| DetectorError::InvalidImage(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Resizes to the model's input edge and normalizes into an NCHW tensor.
pub fn preprocess(img: &RgbImage) -> Array4<f32> {
    let size = IMAGE_SIZE as u32;
    let resized = image::imageops::resize(img, size, size, FilterType::Triangle);

    let mut input = Array4::zeros((1, 3, IMAGE_SIZE, IMAGE_SIZE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = (pixel[c] as f32 / 255.0 - MEAN) / STD;
            input[[0, c, y as usize, x as usize]] = value;
        }
    }
    input
}

/// Numerically stable softmax: the max logit is subtracted before
/// exponentiating so extreme logits cannot overflow.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

// Strict comparison keeps the first label on ties.
fn argmax(probs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate() {
        if p > probs[best] {
            best = i;
        }
    }
    best
}

/// Builds the result for a probability vector: arg-max label, its
/// probability as confidence, and the full label-to-score mapping.
pub fn interpret(probs: &[f32], labels: &[String]) -> ClassificationResult {
    let idx = argmax(probs);
    let scores = labels
        .iter()
        .cloned()
        .zip(probs.iter().copied())
        .collect();
    ClassificationResult {
        label: labels[idx].clone(),
        confidence: probs[idx],
        scores,
    }
}

/// Full pipeline for one upload: decode, preprocess, score, interpret.
pub fn classify_bytes(bytes: &[u8], state: &AppState) -> Result<ClassificationResult, DetectorError> {
    let img = decode_image(bytes)?;
    let input = preprocess(&img);

    let logits = state.scorer.score(&input)?;
    if logits.len() != state.labels.len() {
        return Err(DetectorError::Scoring(format!(
            "expected {} logits, model returned {}",
            state.labels.len(),
            logits.len()
        )));
    }

    let probs = softmax(&logits);
    Ok(interpret(&probs, &state.labels))
}

/// Admission policy: allow only confident human-labelled results.
pub fn allow(result: &ClassificationResult) -> bool {
    result.label == HUMAN_LABEL && result.confidence >= ALLOW_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, Rgba, RgbaImage};
    use std::collections::BTreeMap;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
        buf
    }

    fn result(label: &str, confidence: f32) -> ClassificationResult {
        let mut scores = BTreeMap::new();
        scores.insert("ai".to_string(), 1.0 - confidence);
        scores.insert("hum".to_string(), confidence);
        ClassificationResult {
            label: label.to_string(),
            confidence,
            scores,
        }
    }

    #[test]
    fn softmax_is_a_distribution() {
        let probs = softmax(&[0.3, -1.2, 2.5]);
        assert_eq!(probs.len(), 3);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn softmax_survives_extreme_logits() {
        let probs = softmax(&[1000.0, 0.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs[0] - 1.0).abs() < 1e-4);
        assert!(probs[1] >= 0.0);
    }

    #[test]
    fn softmax_orders_by_logit() {
        let probs = softmax(&[1.0, 3.0, 2.0]);
        assert!(probs[1] > probs[2] && probs[2] > probs[0]);
    }

    #[test]
    fn argmax_ties_resolve_to_first_label() {
        let labels = crate::model::labels();
        let result = interpret(&[0.5, 0.5], &labels);
        assert_eq!(result.label, "ai");
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn interpret_picks_the_maximum() {
        let labels = crate::model::labels();
        let result = interpret(&[0.12, 0.88], &labels);
        assert_eq!(result.label, "hum");
        assert_eq!(result.confidence, 0.88);
        let max = result.scores.values().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(result.confidence, max);
        assert_eq!(result.scores.len(), labels.len());
    }

    #[test]
    fn allow_requires_confident_human() {
        assert!(allow(&result("hum", 0.95)));
        assert!(!allow(&result("hum", 0.8)));
        assert!(!allow(&result("ai", 0.99)));
    }

    #[test]
    fn allow_threshold_boundary() {
        assert!(allow(&result("hum", 0.9)));
        assert!(!allow(&result("hum", 0.8999)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DetectorError::InvalidImage(_)));

        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidImage(_)));
    }

    #[test]
    fn decode_rejects_truncated_png() {
        let mut bytes = png_bytes(DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            16,
            16,
            Rgb([10, 20, 30]),
        )));
        bytes.truncate(bytes.len() / 2);
        // Depending on the decoder this surfaces at open or at read; either
        // way it must be a client fault, not a panic.
        if let Err(err) = decode_image(&bytes) {
            assert!(matches!(err, DetectorError::InvalidImage(_)));
        }
    }

    #[test]
    fn decode_normalizes_grayscale_to_rgb() {
        let bytes = png_bytes(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            5,
            7,
            Luma([128]),
        )));
        let rgb = decode_image(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (5, 7));
        let pixel = rgb.get_pixel(0, 0);
        assert_eq!((pixel[0], pixel[1], pixel[2]), (128, 128, 128));
    }

    #[test]
    fn decode_drops_alpha_channel() {
        let bytes = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([200, 100, 50, 128]),
        )));
        let rgb = decode_image(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (4, 4));
    }

    #[test]
    fn preprocess_shape_and_range() {
        let img = image::RgbImage::from_pixel(64, 48, Rgb([255, 0, 128]));
        let input = preprocess(&img);
        assert_eq!(input.dim(), (1, 3, IMAGE_SIZE, IMAGE_SIZE));
        // (x/255 - 0.5) / 0.5 maps into [-1, 1].
        assert!(input.iter().all(|&v| (-1.0..=1.0).contains(&v)));
        assert!((input[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((input[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn preprocess_is_deterministic() {
        let img = image::RgbImage::from_fn(30, 20, |x, y| Rgb([x as u8, y as u8, 77]));
        assert_eq!(preprocess(&img), preprocess(&img));
    }
}
