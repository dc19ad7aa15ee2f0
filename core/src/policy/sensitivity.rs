use crate::prelude::Detection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-facing knob for how eagerly detections escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl SensitivityLevel {
    pub const ALL: [SensitivityLevel; 3] = [
        SensitivityLevel::Low,
        SensitivityLevel::Medium,
        SensitivityLevel::High,
    ];

    /// Minimum confidence a detection needs at this level.
    pub fn threshold(self) -> f32 {
        match self {
            SensitivityLevel::Low => 0.70,
            SensitivityLevel::Medium => 0.50,
            SensitivityLevel::High => 0.30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensitivityLevel::Low => "low",
            SensitivityLevel::Medium => "medium",
            SensitivityLevel::High => "high",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensitivityLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SensitivityLevel::Low),
            "medium" => Ok(SensitivityLevel::Medium),
            "high" => Ok(SensitivityLevel::High),
            other => Err(format!("unknown sensitivity level '{}'", other)),
        }
    }
}

pub fn threshold_for(level: SensitivityLevel) -> f32 {
    level.threshold()
}

/// Strongest score in the set, or zero when nothing was detected.
///
/// A single strong region is enough to escalate; averaging would let a crowd
/// of weak regions hide it.
pub fn aggregate(detections: &[Detection]) -> f32 {
    detections
        .iter()
        .map(|detection| detection.score)
        .fold(0.0, f32::max)
}

/// Whether a detection set is strong enough to raise an alert at `level`.
pub fn qualifies(detections: &[Detection], level: SensitivityLevel) -> bool {
    aggregate(detections) > threshold_for(level)
}

/// Display band for a percentage confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Potential,
    High,
    VeryHigh,
}

impl ConfidenceBand {
    pub fn from_percent(confidence: f32) -> Self {
        if confidence < 70.0 {
            ConfidenceBand::Potential
        } else if confidence < 90.0 {
            ConfidenceBand::High
        } else {
            ConfidenceBand::VeryHigh
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            ConfidenceBand::Potential => "Potential fire detected",
            ConfidenceBand::High => "High confidence detection",
            ConfidenceBand::VeryHigh => "Very high confidence detection",
        }
    }
}
