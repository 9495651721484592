//! Windowed averaging for clock-drift and peer-lead estimation.
//!
//! Two consumers feed these averages: the authoritative merge driver smooths
//! each participant's clock offset from the group mean (a slow-moving value,
//! sampled once per merged frame), and the self-throttle smooths how far the
//! local simulation runs ahead of the last acknowledged authoritative frame
//! (a jittery value, sampled once per render tick). Both want the same thing:
//! the mean of recent samples, with old samples falling out of the window.

use std::collections::VecDeque;
use std::time::Duration;

use web_time::Instant;

/// A running average over a sliding time window, with an optional cap on the
/// number of retained samples.
///
/// Samples older than the window are evicted when a new entry arrives; with a
/// cap, the oldest samples are also evicted to keep at most `max_samples`.
/// [`try_get_average`](DriftAverager::try_get_average) returns `None` until
/// the first sample is added.
#[derive(Debug)]
pub struct DriftAverager {
    window: Duration,
    max_samples: Option<usize>,
    samples: VecDeque<(Instant, f32)>,
}

impl DriftAverager {
    /// Creates an averager over the given time window, unbounded sample count.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            max_samples: None,
            samples: VecDeque::new(),
        }
    }

    /// Creates an averager that additionally retains at most `max_samples`
    /// entries, evicting the oldest beyond that.
    #[must_use]
    pub fn with_max_samples(window: Duration, max_samples: usize) -> Self {
        Self {
            window,
            max_samples: Some(max_samples.max(1)),
            samples: VecDeque::with_capacity(max_samples.max(1)),
        }
    }

    /// Adds a sample, evicting entries that fell out of the window or exceed
    /// the sample cap.
    pub fn add_entry(&mut self, value: f32) {
        let now = Instant::now();
        self.samples.push_back((now, value));
        while let Some(&(stamp, _)) = self.samples.front() {
            if now.duration_since(stamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        if let Some(cap) = self.max_samples {
            while self.samples.len() > cap {
                self.samples.pop_front();
            }
        }
    }

    /// The mean of the retained samples, or `None` if no sample has ever been
    /// added (or all have aged out).
    #[must_use]
    pub fn try_get_average(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f32 = self.samples.iter().map(|&(_, v)| v).sum();
        Some(sum / self.samples.len() as f32)
    }

    /// Number of samples currently inside the window.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

// #########
// # TESTS #
// #########
