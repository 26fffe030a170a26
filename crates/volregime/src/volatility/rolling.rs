//! Fixed-size trailing window over raw values.
//!
//! The buffer keeps the last `size` raw values and recomputes mean and sample
//! standard deviation from them on every push, so the numeric contract
//! (ddof = 1, window includes the newest value) does not depend on any
//! incremental update scheme.

use std::collections::VecDeque;

/// Moments of one full window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Mean of the window
    pub mean: f64,
    /// Sample standard deviation of the window (ddof = 1)
    pub std_dev: f64,
}

/// Trailing buffer of the most recent `size` values.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    size: usize,
    buffer: VecDeque<f64>,
}

impl RollingWindow {
    /// Create an empty window. `size` must be at least 2 for a defined
    /// standard deviation.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            buffer: VecDeque::with_capacity(size),
        }
    }

    /// Window size.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Push a value and return the window's moments once it is full.
    ///
    /// Returns `None` while fewer than `size` values have been seen, or when
    /// any value in the window is not finite.
    pub fn push(&mut self, value: f64) -> Option<WindowStats> {
        if self.buffer.len() == self.size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
        self.stats()
    }

    /// Moments of the current window, if it is full and finite.
    pub fn stats(&self) -> Option<WindowStats> {
        if self.size < 2 || self.buffer.len() < self.size {
            return None;
        }
        if self.buffer.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let n = self.size as f64;
        let mean = self.buffer.iter().sum::<f64>() / n;
        let ss: f64 = self.buffer.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some(WindowStats {
            mean,
            std_dev: (ss / (n - 1.0)).max(0.0).sqrt(),
        })
    }
}
