use crate::prelude::{
    BoundingBox, Detection, DetectionModel, Frame, RawCandidate, ScoreError, ScoreResult,
};
use crate::processing::model::ModelHandle;

/// Runs the shared model against one frame and keeps the candidates that
/// clear the caller's threshold.
pub struct FrameScorer<M> {
    model: ModelHandle<M>,
    labels: Vec<String>,
}

impl<M: DetectionModel> FrameScorer<M> {
    pub fn new(model: ModelHandle<M>) -> Self {
        Self {
            model,
            labels: Vec::new(),
        }
    }

    /// Restricts output to the given labels (case-insensitive). Empty keeps all.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels
            .into_iter()
            .map(|label| label.to_ascii_lowercase())
            .collect();
        self
    }

    /// Detections with `score >= threshold`, in model output order.
    ///
    /// Fails with [`ScoreError::ModelUnavailable`] until the model has loaded.
    pub async fn score(&self, frame: &Frame, threshold: f32) -> ScoreResult<Vec<Detection>> {
        let model = self.model.current().ok_or(ScoreError::ModelUnavailable)?;
        let candidates = model.infer(frame).await?;

        let width = frame.width() as f32;
        let height = frame.height() as f32;

        Ok(candidates
            .into_iter()
            .filter(|candidate| candidate.score >= threshold)
            .filter(|candidate| self.accepts(&candidate.label))
            .map(|candidate| to_pixel_space(candidate, width, height))
            .collect())
    }

    fn accepts(&self, label: &str) -> bool {
        self.labels.is_empty()
            || self
                .labels
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(label))
    }
}

fn to_pixel_space(candidate: RawCandidate, width: f32, height: f32) -> Detection {
    let [ymin, xmin, ymax, xmax] = candidate.normalized_box;
    let bounding_box = BoundingBox {
        x: xmin * width,
        y: ymin * height,
        width: (xmax - xmin) * width,
        height: (ymax - ymin) * height,
    };
    Detection::new(bounding_box, candidate.label, candidate.score)
}
