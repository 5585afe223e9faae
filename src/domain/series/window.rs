use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-length queue of normalized values fed to the regressor.
///
/// Pushing a new value always evicts the oldest one, so the length never
/// changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
}

impl SlidingWindow {
    pub fn from_seed(seed: &[f64]) -> Self {
        Self {
            values: seed.iter().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drops the oldest value and appends `value` as the newest.
    pub fn advance(&mut self, value: f64) {
        if self.values.pop_front().is_some() {
            self.values.push_back(value);
        }
    }

    pub fn newest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Contiguous view, oldest first.
    pub fn as_slice(&mut self) -> &[f64] {
        self.values.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Windows of normalized closes paired with their normalized targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSet {
    pub windows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn last_window(&self) -> Option<&[f64]> {
        self.windows.last().map(|w| w.as_slice())
    }

    /// Chronological split: the first `ratio` share is the training part.
    ///
    /// Never shuffles, so no test window precedes a training window.
    pub fn split_chronological(&self, ratio: f64) -> (WindowSet, WindowSet) {
        let cut = ((self.len() as f64) * ratio).floor() as usize;
        let cut = cut.min(self.len());
        (
            WindowSet {
                windows: self.windows[..cut].to_vec(),
                targets: self.targets[..cut].to_vec(),
            },
            WindowSet {
                windows: self.windows[cut..].to_vec(),
                targets: self.targets[cut..].to_vec(),
            },
        )
    }
}
