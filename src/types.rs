//! Shared types and enums used across firepost.
//! Includes `ExecutionMode`, the probability `Threshold`, and the per-chip
//! outcome types (`ChipOutcome`, `SkipReason`).
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a `WorkerPool` schedules its workers.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// CPU-bound work (geometry unions); one worker per core.
    Compute,
    /// Work that mostly waits on a child process or on disk; oversubscribed.
    Blocking,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Compute => write!(f, "compute"),
            ExecutionMode::Blocking => write!(f, "blocking"),
        }
    }
}

/// Probability threshold in `[0, 1]`, applied to chips stored on a 0-255 scale.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidArgument {
                arg: "threshold",
                value: value.to_string(),
            });
        }
        Ok(Threshold(value))
    }

    /// Threshold rescaled to the chip's native 0-255 range.
    pub fn pixel_value(self) -> u8 {
        (self.0 * 255.0).round() as u8
    }

    /// Whether a (0-255) pixel value is at or above the threshold.
    /// Values outside the byte range are clamped first.
    pub fn passes(self, value: f64) -> bool {
        value.clamp(0.0, 255.0) >= f64::from(self.pixel_value())
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(0.5)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Threshold::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> f64 {
        t.0
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pixel {})", self.0, self.pixel_value())
    }
}

/// Why a chip produced no output. These are expected outcomes, not errors.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SkipReason {
    /// The reference raster does not intersect the chip footprint.
    NoOverlap,
    /// The chip's maximum value is below the probability threshold.
    BelowThreshold,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoOverlap => write!(f, "no overlap"),
            SkipReason::BelowThreshold => write!(f, "below threshold"),
        }
    }
}

/// Result of a per-chip transform that may legitimately skip its input.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ChipOutcome {
    Written(PathBuf),
    Skipped(SkipReason),
}

/// Counts for a per-chip batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &Result<ChipOutcome>) {
        match outcome {
            Ok(ChipOutcome::Written(_)) => self.processed += 1,
            Ok(ChipOutcome::Skipped(_)) => self.skipped += 1,
            Err(_) => self.errors += 1,
        }
    }

    pub fn from_outcomes(outcomes: &[Result<ChipOutcome>]) -> Self {
        let mut report = BatchReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }
}
