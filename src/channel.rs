//! The rolling buffer that stores measurements from one signal line of the
//! headset, together with incrementally maintained statistics.
//!
//! Raw electrode channels store bare `f64` readings; alpha and valence
//! channels store a [`Paired`] reading that carries the long-term average
//! supplied by the headset application. Which shape a [`Channel`] holds is
//! fixed at construction through its type parameter, so consumers always
//! switch on a known, closed shape.

use std::collections::VecDeque;

/// Number of trailing entries `slope` looks back over by default.
pub const SLOPE_WINDOW: usize = 50;

/// One measurement stored in a [`Channel`]. The primary value feeds the
/// running statistics; the long-term average is only present for alpha and
/// valence readings.
pub trait Sample: Copy {
    /// The primary measured value.
    fn value(self) -> f64;
    /// The slowly-varying baseline paired with this reading, if any.
    fn long_term_average(self) -> Option<f64>;
}

impl Sample for f64 {
    fn value(self) -> f64 {
        self
    }
    fn long_term_average(self) -> Option<f64> {
        None
    }
}

/// A reading paired with its long-term average, as streamed for the alpha
/// and valence signals. The average is computed upstream by the headset
/// application, not locally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paired {
    /// The measured value.
    pub value: f64,
    /// The accompanying long-term average.
    pub long_term_average: f64,
}

impl Sample for Paired {
    fn value(self) -> f64 {
        self.value
    }
    fn long_term_average(self) -> Option<f64> {
        Some(self.long_term_average)
    }
}

/// A bounded list of measurements from one signal line, newest last.
///
/// The running total, count, and all-time min/max cover every value ever
/// pushed, not just the retained window, so `avg`/`min`/`max` keep their
/// meaning after old entries have been evicted.
#[derive(Debug, Clone)]
pub struct Channel<S> {
    entries: VecDeque<S>,
    total: f64,
    count: u64,
    min: Option<f64>,
    max: Option<f64>,
}

impl<S: Sample> Channel<S> {
    /// An empty channel with no recorded extremes.
    pub fn new() -> Self {
        Channel {
            entries: VecDeque::new(),
            total: 0.0,
            count: 0,
            min: None,
            max: None,
        }
    }

    /// Appends one measurement and folds its primary value into the running
    /// statistics. Never fails.
    pub fn push(&mut self, sample: S) {
        let v = sample.value();
        self.entries.push_back(sample);
        self.total += v;
        self.count += 1;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    /// Drops the oldest entry, if there is one. The running statistics are
    /// deliberately left untouched: min/max/avg are all-time aggregates.
    pub fn evict_oldest(&mut self) {
        self.entries.pop_front();
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are currently retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walks the retained entries, oldest first. Used by consumers that
    /// draw the waveform.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.entries.iter()
    }

    /// The most recent primary value, or `None` if the channel is empty.
    pub fn current(&self) -> Option<f64> {
        self.entries.back().map(|s| s.value())
    }

    /// The lowest primary value ever pushed, or `None` before any sample.
    pub fn min(&self) -> Option<f64> {
        self.min
    }

    /// The highest primary value ever pushed, or `None` before any sample.
    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Mean of every primary value ever pushed, or 0 when nothing has been.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    /// The long-term average carried by the most recent entry. `None` when
    /// the channel is empty or stores bare scalars.
    pub fn long_term_average(&self) -> Option<f64> {
        self.entries.back().and_then(|s| s.long_term_average())
    }

    /// Normalizes a raw value into roughly 0.0–1.0 against the observed
    /// extremes.
    ///
    /// Quirk, kept on purpose: the denominator is `max`, not `max - min`,
    /// with a fallback to 1 only when `max` is exactly 0. Downstream
    /// consumers are calibrated to this exact shape, so it is preserved
    /// rather than corrected.
    pub fn relative(&self, v: f64) -> f64 {
        let min = self.min.unwrap_or(0.0);
        let max = self.max.unwrap_or(0.0);
        (v - min) / if max == 0.0 { 1.0 } else { max }
    }

    /// Whether the curve is rising or dropping, roughly -1.0 to 1.0, over
    /// the default window of [`SLOPE_WINDOW`] entries.
    pub fn slope(&self) -> f64 {
        self.slope_over(SLOPE_WINDOW)
    }

    /// [`slope`](Channel::slope) over the trailing `window` entries: the
    /// normalized difference between the newest value and the value `window`
    /// entries back (positive when rising). 0.0 on an empty channel.
    pub fn slope_over(&self, window: usize) -> f64 {
        let d = window.min(self.entries.len());
        if d == 0 {
            return 0.0;
        }
        let oldest = self.entries[self.entries.len() - d].value();
        let newest = self.entries[self.entries.len() - 1].value();
        self.relative(newest) - self.relative(oldest)
    }

    /// The slope expressed as a rotation in degrees, for consumers that
    /// point an arrow at the trend.
    pub fn angle(&self) -> f64 {
        self.slope() * 90.0
    }
}

impl<S: Sample> Default for Channel<S> {
    fn default() -> Self {
        Self::new()
    }
}
