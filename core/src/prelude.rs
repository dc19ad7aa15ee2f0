use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// One sampled still from the live feed, laid out as `height x width x channel`.
///
/// Frames are cheap to clone; the pixel buffer is shared and released once the
/// last clone is dropped at the end of a detection cycle.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub pixels: Arc<Array3<u8>>,
}

impl Frame {
    pub fn new(sequence: u64, pixels: Array3<u8>) -> Self {
        Self {
            sequence,
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.dim().0 as u32
    }
}

/// Axis-aligned region in source-frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scored candidate region produced by the frame scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub label: String,
    pub score: f32,
}

impl Detection {
    pub fn new(bounding_box: BoundingBox, label: impl Into<String>, score: f32) -> Self {
        Self {
            bounding_box,
            label: label.into(),
            score,
        }
    }
}

/// Candidate exactly as the model emits it. The box is normalized to `[0, 1]`
/// and ordered `[ymin, xmin, ymax, xmax]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub normalized_box: [f32; 4],
    pub label: String,
    pub score: f32,
}

impl RawCandidate {
    pub fn new(normalized_box: [f32; 4], label: impl Into<String>, score: f32) -> Self {
        Self {
            normalized_box,
            label: label.into(),
            score,
        }
    }
}

/// Failure of a single scoring call.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("model unavailable: loading has not completed")]
    ModelUnavailable,
    #[error("inference failure: {0}")]
    Inference(String),
}

pub type ScoreResult<T> = Result<T, ScoreError>;

/// Opaque object-detection model. Implementations must not mutate the frame.
pub trait DetectionModel: Send + Sync + 'static {
    fn infer(&self, frame: &Frame) -> impl Future<Output = ScoreResult<Vec<RawCandidate>>> + Send;
}
