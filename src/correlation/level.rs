//! One level of the multiple-tau hierarchy

use std::collections::VecDeque;

/// A pair of (possibly compressed) values from the A and B streams
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Sample {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

/// Lags handled by one level, as local lag indices `first..end`
///
/// Local lag `k` at level `p` is the absolute lag `k * 2^p` sampling
/// intervals; `offset` is the row of lag `first` in the correlator's lag
/// table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LevelLags {
    pub first: usize,
    pub end: usize,
    pub offset: usize,
}

impl LevelLags {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.end - self.first
    }

    /// Row in the lag table of local lag `k`
    pub fn row(&self, k: usize) -> usize {
        self.offset + k - self.first
    }
}

/// Fixed-capacity history of one level plus the value awaiting compression
#[derive(Clone, Debug)]
pub(crate) struct Level {
    /// Most recent samples, newest first
    history: VecDeque<Sample>,
    capacity: usize,
    /// Older half of the next pair to compress into the level above;
    /// `None` on the top level, which never compresses
    pending: Option<Sample>,
    /// Whether this level feeds a level above it
    promotes: bool,
    /// Samples received over the level's lifetime
    received: u64,
}

impl Level {
    pub fn new(capacity: usize, promotes: bool) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            pending: None,
            promotes,
            received: 0,
        }
    }

    /// Insert a sample as the newest entry, evicting the oldest past capacity
    ///
    /// Returns the `(older, newer)` pair to compress into the level above
    /// once two samples have arrived since the last compression.
    pub fn push(&mut self, sample: Sample) -> Option<(Sample, Sample)> {
        let pair = if self.promotes {
            match self.pending.take() {
                Some(older) => Some((older, sample.clone())),
                None => {
                    self.pending = Some(sample.clone());
                    None
                }
            }
        } else {
            None
        };

        if self.history.len() == self.capacity {
            self.history.pop_back();
        }
        self.history.push_front(sample);
        self.received += 1;

        pair
    }

    /// Sample `k` entries back from the newest (`k = 0` is the newest)
    pub fn lagged(&self, k: usize) -> Option<&Sample> {
        self.history.get(k)
    }

    /// Remove the unpaired value, if any
    pub fn take_pending(&mut self) -> Option<Sample> {
        self.pending.take()
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    pub fn received(&self) -> u64 {
        self.received
    }
}
