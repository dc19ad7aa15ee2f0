use crate::workflow::config::SimulationConfig;
use chrono::Utc;
use fireguardcore::interface::{
    CapabilityError, CapabilityProvider, Coordinates, FrameSource, ReadyState, VideoDevice,
};
use fireguardcore::prelude::{DetectionModel, Frame, RawCandidate, ScoreResult};
use fireguardcore::processing::{encode_still, STILL_QUALITY};
use log::{debug, info};
use ndarray::{s, Array3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Pixels at least this red and this far above blue count as flame.
const HOT_RED: u8 = 200;
const HOT_MARGIN: u8 = 100;

const BASE_LATITUDE: f64 = 40.7128;
const BASE_LONGITUDE: f64 = -74.0060;

fn build_frame(config: &SimulationConfig, rng: &mut StdRng, sequence: u64) -> Frame {
    let width = config.frame_width.max(4);
    let height = config.frame_height.max(4);
    let mut pixels = Array3::<u8>::zeros((height, width, 3));

    for value in pixels.iter_mut() {
        *value = rng.gen_range(20..90);
    }

    if rng.gen_bool(config.fire_probability.clamp(0.0, 1.0)) {
        let patch_h = (height / 4).max(1);
        let patch_w = (width / 4).max(1);
        let top = rng.gen_range(0..=height - patch_h);
        let left = rng.gen_range(0..=width - patch_w);
        let mut patch = pixels.slice_mut(s![top..top + patch_h, left..left + patch_w, ..]);
        for mut pixel in patch.lanes_mut(ndarray::Axis(2)) {
            pixel[0] = rng.gen_range(HOT_RED..=255);
            pixel[1] = rng.gen_range(90..180);
            pixel[2] = rng.gen_range(0..40);
        }
    }

    Frame::new(sequence, pixels)
}

/// Camera track producing seeded noise with an occasional flame-coloured patch.
pub struct SyntheticCamera {
    device_id: String,
    config: SimulationConfig,
    rng: Mutex<StdRng>,
    sequence: AtomicU64,
    latest: Mutex<Option<Frame>>,
    stopped: AtomicBool,
}

impl SyntheticCamera {
    pub fn new(device_id: impl Into<String>, config: SimulationConfig, seed: u64) -> Self {
        Self {
            device_id: device_id.into(),
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            sequence: AtomicU64::new(0),
            latest: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn ready_state(&self) -> ReadyState {
        if self.stopped.load(Ordering::SeqCst) {
            ReadyState::NotReady
        } else {
            ReadyState::ReadyForCapture
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = {
            let mut rng = self.rng.lock().ok()?;
            build_frame(&self.config, &mut rng, sequence)
        };
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(frame.clone());
        }
        Some(frame)
    }

    fn capture_still(&self) -> Option<String> {
        let frame = self.latest.lock().ok()?.clone()?;
        encode_still(&frame, STILL_QUALITY)
    }

    fn set_torch(&self, enabled: bool) -> Result<(), CapabilityError> {
        debug!("synthetic torch on {} -> {}", self.device_id, enabled);
        Ok(())
    }

    fn stop_tracks(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        info!("synthetic camera {} stopped", self.device_id);
    }
}

/// Device capabilities for offline runs: two cameras, a fixed position with
/// seeded jitter, full battery and a wake lock that always succeeds.
pub struct SyntheticProvider {
    config: SimulationConfig,
    opened: AtomicU64,
    rng: Mutex<StdRng>,
}

impl SyntheticProvider {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed.wrapping_add(0x5eed));
        Self {
            config,
            opened: AtomicU64::new(0),
            rng: Mutex::new(rng),
        }
    }
}

impl CapabilityProvider for SyntheticProvider {
    type Source = SyntheticCamera;

    fn list_devices(&self) -> Result<Vec<VideoDevice>, CapabilityError> {
        Ok(vec![
            VideoDevice::new("synthetic-front", "Synthetic front camera"),
            VideoDevice::new("synthetic-rear", "Synthetic rear camera"),
        ])
    }

    async fn open(&self, device_id: Option<&str>) -> Result<SyntheticCamera, CapabilityError> {
        let opened = self.opened.fetch_add(1, Ordering::SeqCst);
        let device_id = device_id.unwrap_or("synthetic-rear");
        info!("opening synthetic camera {}", device_id);
        Ok(SyntheticCamera::new(
            device_id,
            self.config.clone(),
            self.config.seed.wrapping_add(opened),
        ))
    }

    async fn coordinates(&self) -> Result<Coordinates, CapabilityError> {
        let (lat_jitter, lon_jitter) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| CapabilityError::Unavailable("position source poisoned".into()))?;
            (rng.gen_range(-1e-4..1e-4), rng.gen_range(-1e-4..1e-4))
        };
        Ok(Coordinates {
            latitude: BASE_LATITUDE + lat_jitter,
            longitude: BASE_LONGITUDE + lon_jitter,
            accuracy: 25.0,
            timestamp: Utc::now(),
        })
    }

    fn battery_level(&self) -> Result<f32, CapabilityError> {
        Ok(100.0)
    }

    fn request_wake_lock(&self) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// Colour heuristic standing in for a trained detector. Reports one `fire`
/// candidate around the hot pixels, scored by how much of a generated patch
/// they cover.
#[derive(Debug, Default, Clone)]
pub struct SyntheticModel;

impl DetectionModel for SyntheticModel {
    async fn infer(&self, frame: &Frame) -> ScoreResult<Vec<RawCandidate>> {
        let (height, width, _) = frame.pixels.dim();
        let mut hot = 0usize;
        let (mut ymin, mut xmin, mut ymax, mut xmax) = (height, width, 0usize, 0usize);

        for ((y, x), pixel) in frame
            .pixels
            .lanes(ndarray::Axis(2))
            .into_iter()
            .enumerate()
            .map(|(index, pixel)| ((index / width, index % width), pixel))
        {
            if pixel[0] >= HOT_RED && pixel[0].saturating_sub(pixel[2]) >= HOT_MARGIN {
                hot += 1;
                ymin = ymin.min(y);
                xmin = xmin.min(x);
                ymax = ymax.max(y + 1);
                xmax = xmax.max(x + 1);
            }
        }

        if hot == 0 {
            return Ok(Vec::new());
        }

        let patch_area = ((height / 4).max(1) * (width / 4).max(1)) as f32;
        let coverage = (hot as f32 / patch_area).min(1.0);
        let score = 0.35 + 0.6 * coverage;
        let normalized = [
            ymin as f32 / height as f32,
            xmin as f32 / width as f32,
            ymax as f32 / height as f32,
            xmax as f32 / width as f32,
        ];
        Ok(vec![RawCandidate::new(normalized, "fire", score)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(fire_probability: f64) -> SimulationConfig {
        SimulationConfig {
            seed: 11,
            fire_probability,
            frame_width: 32,
            frame_height: 24,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn generator_honours_frame_dimensions() {
        let camera = SyntheticCamera::new("cam", config(0.0), 1);
        let frame = camera.current_frame().unwrap();
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 24);
        assert_eq!(camera.current_frame().unwrap().sequence, 1);
    }

    #[test]
    fn same_seed_generates_same_frames() {
        let a = SyntheticCamera::new("cam", config(0.5), 9);
        let b = SyntheticCamera::new("cam", config(0.5), 9);
        for _ in 0..4 {
            assert_eq!(a.current_frame().unwrap().pixels, b.current_frame().unwrap().pixels);
        }
    }

    #[tokio::test]
    async fn model_scores_hot_patch_and_ignores_plain_noise() {
        let model = SyntheticModel;
        let calm = SyntheticCamera::new("cam", config(0.0), 3);
        assert!(model.infer(&calm.current_frame().unwrap()).await.unwrap().is_empty());

        let burning = SyntheticCamera::new("cam", config(1.0), 3);
        let candidates = model.infer(&burning.current_frame().unwrap()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].label, "fire");
        assert!(candidates[0].score > 0.9);
        let [ymin, xmin, ymax, xmax] = candidates[0].normalized_box;
        assert!(ymin < ymax && xmin < xmax);
        assert!((ymax - ymin - 0.25).abs() < 1e-3);
    }

    #[test]
    fn still_requires_a_sampled_frame() {
        let camera = SyntheticCamera::new("cam", config(1.0), 5);
        assert!(camera.capture_still().is_none());
        camera.current_frame();
        let still = camera.capture_still().unwrap();
        assert!(still.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn stopped_camera_produces_no_frames() {
        let camera = SyntheticCamera::new("cam", config(0.0), 5);
        camera.stop_tracks();
        assert_eq!(camera.ready_state(), ReadyState::NotReady);
        assert!(camera.current_frame().is_none());
    }

    #[tokio::test]
    async fn provider_lists_two_cameras_and_jitters_position() {
        let provider = SyntheticProvider::new(config(0.0));
        assert_eq!(provider.list_devices().unwrap().len(), 2);
        let fix = provider.coordinates().await.unwrap();
        assert!((fix.latitude - BASE_LATITUDE).abs() < 1e-3);
        assert!((fix.longitude - BASE_LONGITUDE).abs() < 1e-3);
    }
}
