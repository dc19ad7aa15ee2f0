pub mod sensitivity;

pub use sensitivity::{aggregate, qualifies, threshold_for, ConfidenceBand, SensitivityLevel};
