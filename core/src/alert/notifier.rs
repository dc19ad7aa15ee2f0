use crate::policy::ConfidenceBand;
use crate::telemetry::LogManager;

/// Haptic pattern played alongside the audio alert: on, off, on.
pub const VIBRATION_PATTERN_MS: [u64; 3] = [500, 200, 500];

/// What the human should be told when an alert is raised.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCue {
    pub confidence: f32,
    pub band: ConfidenceBand,
    pub vibration_ms: [u64; 3],
}

impl AlertCue {
    pub fn new(confidence: f32) -> Self {
        Self {
            confidence,
            band: ConfidenceBand::from_percent(confidence),
            vibration_ms: VIBRATION_PATTERN_MS,
        }
    }
}

/// Fire-and-forget audio and haptic feedback.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, cue: &AlertCue);

    /// Stops any ongoing sound once the pending alert is resolved.
    fn silence(&self) {}
}

/// Notifier for headless runs; writes the cue to the log.
pub struct LogNotifier {
    logger: LogManager,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("notifier"),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, cue: &AlertCue) {
        self.logger.warn(&format!(
            "FIRE DETECTED: {} ({:.1}%)",
            cue.band.headline(),
            cue.confidence
        ));
    }

    fn silence(&self) {
        self.logger.trace("alert sound stopped");
    }
}
