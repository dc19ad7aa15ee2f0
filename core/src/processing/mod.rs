pub mod detection_loop;
pub mod model;
pub mod scorer;
pub mod still;

pub use detection_loop::{DetectionLoop, DetectionSink, LoopHandle, LoopState, DEFAULT_TICK};
pub use model::{model_slot, ModelHandle, ModelLoader, ModelState, ModelStatus};
pub use scorer::FrameScorer;
pub use still::{encode_still, STILL_QUALITY};
