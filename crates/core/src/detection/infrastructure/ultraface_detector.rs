use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::{Region, DEFAULT_NMS_IOU};

/// UltraFace (version-RFB-320) input resolution.
const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.7;

/// UltraFace face detector backed by an ONNX Runtime session.
///
/// The model emits per-prior scores and already-decoded corner-form boxes
/// in normalized coordinates, so postprocessing is thresholding, mapping
/// into frame pixels, and non-maximum suppression.
pub struct UltraFaceDetector {
    session: ort::session::Session,
    confidence: f32,
}

impl UltraFaceDetector {
    pub fn new(model_path: &Path, confidence: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        Ok(Self {
            session,
            confidence,
        })
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let input = preprocess(frame, INPUT_WIDTH, INPUT_HEIGHT);
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // UltraFace outputs two tensors:
        // - scores: [1, N, 2] (background, face) softmax pairs
        // - boxes:  [1, N, 4] normalized corner form (x1, y1, x2, y2)
        if outputs.len() < 2 {
            return Err(
                format!("UltraFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        let boxes = outputs[1].try_extract_array::<f32>()?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;
        let box_data = boxes.as_slice().ok_or("Cannot get box slice")?;

        let raw = decode(
            score_data,
            box_data,
            frame.width(),
            frame.height(),
            self.confidence,
        );
        Ok(Region::suppress(raw, DEFAULT_NMS_IOU))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize to `width × height` and normalize with `(v - 127) / 128`
/// (the UltraFace preprocessing contract), NCHW float32.
fn preprocess(frame: &Frame, width: u32, height: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let w = width as usize;
    let h = height as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, h, w));

    for y in 0..h {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / h as f64) as usize).min(src_h - 1);
        for x in 0..w {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / w as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - 127.0) / 128.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Threshold on the face-class score and map normalized corner boxes into
/// frame pixels, clamped to the frame. Degenerate boxes are dropped.
fn decode(
    scores: &[f32],
    boxes: &[f32],
    frame_w: u32,
    frame_h: u32,
    confidence: f32,
) -> Vec<Region> {
    let priors = (scores.len() / 2).min(boxes.len() / 4);
    let mut regions = Vec::new();

    for i in 0..priors {
        let score = scores[i * 2 + 1];
        if score < confidence {
            continue;
        }

        let x1 = boxes[i * 4] * frame_w as f32;
        let y1 = boxes[i * 4 + 1] * frame_h as f32;
        let x2 = boxes[i * 4 + 2] * frame_w as f32;
        let y2 = boxes[i * 4 + 3] * frame_h as f32;

        let region = Region::new(
            x1.round() as i32,
            y1.round() as i32,
            (x2 - x1).round() as i32,
            (y2 - y1).round() as i32,
            score,
        )
        .clamped(frame_w, frame_h);

        if region.area() > 0 {
            regions.push(region);
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_preprocess_shape() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 0);
        let tensor = preprocess(&frame, INPUT_WIDTH, INPUT_HEIGHT);
        assert_eq!(tensor.shape(), &[1, 3, 240, 320]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let white = Frame::new(vec![255u8; 50 * 50 * 3], 50, 50, 0);
        let tensor = preprocess(&white, INPUT_WIDTH, INPUT_HEIGHT);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 1.0);

        let black = Frame::new(vec![0u8; 50 * 50 * 3], 50, 50, 0);
        let tensor = preprocess(&black, INPUT_WIDTH, INPUT_HEIGHT);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], -127.0 / 128.0);
    }

    #[test]
    fn test_decode_thresholds_on_face_score() {
        // Two priors: one confident face, one background-dominated
        let scores = [0.1, 0.9, 0.8, 0.2];
        let boxes = [0.25, 0.25, 0.75, 0.75, 0.0, 0.0, 0.5, 0.5];
        let regions = decode(&scores, &boxes, 100, 100, 0.7);
        assert_eq!(regions.len(), 1);
        assert_eq!(
            (regions[0].x, regions[0].y, regions[0].width, regions[0].height),
            (25, 25, 50, 50)
        );
        assert_relative_eq!(regions[0].score, 0.9);
    }

    #[test]
    fn test_decode_maps_into_frame_pixels() {
        let scores = [0.0, 1.0];
        let boxes = [0.1, 0.2, 0.5, 0.6];
        let regions = decode(&scores, &boxes, 320, 240, 0.5);
        assert_eq!(regions.len(), 1);
        assert_eq!(
            (regions[0].x, regions[0].y, regions[0].width, regions[0].height),
            (32, 48, 128, 96)
        );
    }

    #[test]
    fn test_decode_clamps_out_of_bounds_boxes() {
        let scores = [0.0, 0.95];
        let boxes = [-0.2, -0.2, 0.5, 0.5];
        let regions = decode(&scores, &boxes, 100, 100, 0.5);
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].x, regions[0].y), (0, 0));
        assert_eq!((regions[0].width, regions[0].height), (50, 50));
    }

    #[test]
    fn test_decode_drops_degenerate_boxes() {
        let scores = [0.0, 0.95];
        let boxes = [0.5, 0.5, 0.5, 0.5]; // zero area
        let regions = decode(&scores, &boxes, 100, 100, 0.5);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_decode_empty_outputs() {
        assert!(decode(&[], &[], 100, 100, 0.5).is_empty());
    }

    #[test]
    fn test_decode_handles_mismatched_output_lengths() {
        // 2 score pairs but only 1 box: the extra score is ignored
        let scores = [0.0, 0.9, 0.0, 0.9];
        let boxes = [0.0, 0.0, 0.5, 0.5];
        let regions = decode(&scores, &boxes, 100, 100, 0.5);
        assert_eq!(regions.len(), 1);
    }
}
