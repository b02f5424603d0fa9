//! Live input level for the call visualizer.
//!
//! The cpal callback writes the RMS of every captured buffer into a
//! [`LevelMeter`]; the egui widget samples it each frame into a
//! [`LevelHistory`] and renders the history as a short bar chart.
//!
//! ```rust
//! use voice_demo::audio::{LevelHistory, LevelMeter};
//!
//! let meter = LevelMeter::new();
//! meter.record(&[0.5, -0.5, 0.5, -0.5]);
//! assert!((meter.level() - 0.5).abs() < 1e-6);
//!
//! let mut history = LevelHistory::new(5);
//! history.push(meter.level());
//! assert_eq!(history.bars().len(), 5);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Root-mean-square amplitude of `samples`, clamped to `[0.0, 1.0]`.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt().min(1.0)
}

// ---------------------------------------------------------------------------
// LevelMeter
// ---------------------------------------------------------------------------

/// Lock-free "latest level" cell shared between the audio thread and the UI.
///
/// Cheap to clone; all clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    bits: Arc<AtomicU32>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the RMS of `samples` as the current level.
    pub fn record(&self, samples: &[f32]) {
        self.bits.store(rms(samples).to_bits(), Ordering::Relaxed);
    }

    /// Most recently recorded level in `[0.0, 1.0]`.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Drop back to silence (after the microphone is released).
    pub fn reset(&self) {
        self.bits.store(0.0_f32.to_bits(), Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// LevelHistory
// ---------------------------------------------------------------------------

/// Fixed-length rolling window of levels, oldest first.
#[derive(Debug, Clone)]
pub struct LevelHistory {
    levels: VecDeque<f32>,
    len: usize,
}

impl LevelHistory {
    /// Floor applied to every bar so silent bars stay visible.
    pub const MIN_BAR: f32 = 0.15;

    /// Speech RMS rarely exceeds ~0.3; scale it up to fill the bar height.
    const GAIN: f32 = 3.0;

    pub fn new(len: usize) -> Self {
        Self {
            levels: std::iter::repeat(0.0).take(len).collect(),
            len,
        }
    }

    /// Append `level`, discarding the oldest entry.
    pub fn push(&mut self, level: f32) {
        if self.len == 0 {
            return;
        }
        if self.levels.len() == self.len {
            self.levels.pop_front();
        }
        self.levels.push_back(level.clamp(0.0, 1.0));
    }

    /// Bar heights in `[MIN_BAR, 1.0]`, one per slot.
    pub fn bars(&self) -> Vec<f32> {
        self.levels
            .iter()
            .map(|l| (l * Self::GAIN).clamp(Self::MIN_BAR, 1.0))
            .collect()
    }

    pub fn clear(&mut self) {
        self.levels.iter_mut().for_each(|l| *l = 0.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
