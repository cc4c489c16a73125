//! Append-only recording of observable samples

use crate::observable::{self, ObservableRef};
use crate::traits::{Accumulator, AccumulatorBase, Result};
use ndarray::ArrayView2;

/// Time series recorder
///
/// Keeps every sample in insertion order. Samples are stored back to back in
/// a single flat buffer, so [`time_series`](Self::time_series) is a zero-copy
/// view.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use tauflow::observable::ObservableCell;
/// use tauflow::series::TimeSeries;
///
/// let obs = Rc::new(ObservableCell::new(vec![2]));
/// let mut series = TimeSeries::new(obs, 1).unwrap();
///
/// series.add(&[1.0, 2.0]).unwrap();
/// series.add(&[3.0, 4.0]).unwrap();
///
/// let data = series.time_series();
/// assert_eq!(data.shape(), &[2, 2]);
/// assert_eq!(data[[1, 0]], 3.0);
/// ```
#[derive(Clone, Debug)]
pub struct TimeSeries {
    base: AccumulatorBase,
    obs: ObservableRef,
    /// Declared shape of the observable
    shape: Vec<usize>,
    /// Values per sample
    sample_len: usize,
    /// Recorded samples, flattened
    data: Vec<f64>,
}

impl TimeSeries {
    /// Create an empty recorder bound to `obs`, sampled every `delta_n` steps
    pub fn new(obs: ObservableRef, delta_n: usize) -> Result<Self> {
        let base = AccumulatorBase::new(delta_n)?;
        let shape = observable::bound_shape(obs.as_ref())?;
        let sample_len = observable::flat_len(&shape);

        Ok(Self {
            base,
            obs,
            shape,
            sample_len,
            data: Vec::new(),
        })
    }

    /// Append a sample
    pub fn add(&mut self, sample: &[f64]) -> Result<()> {
        observable::check_len(self.sample_len, sample.len())?;
        self.data.extend_from_slice(sample);
        self.base.record_update();
        Ok(())
    }

    /// Recorded samples as a (sample index x flattened observable) view
    pub fn time_series(&self) -> ArrayView2<'_, f64> {
        ArrayView2::from_shape((self.len(), self.sample_len), &self.data)
            .expect("recorded data is a whole number of samples")
    }

    /// Iterate over recorded samples in insertion order
    pub fn samples(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.sample_len)
    }

    /// Get the number of recorded samples
    pub fn len(&self) -> usize {
        self.data.len() / self.sample_len
    }

    /// Check if no samples are recorded
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Discard all recorded samples
    ///
    /// The observable binding and its shape are kept.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Accumulator for TimeSeries {
    fn base(&self) -> &AccumulatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AccumulatorBase {
        &mut self.base
    }

    fn update(&mut self) -> Result<()> {
        let sample = observable::pull(self.obs.as_ref(), self.sample_len)?;
        self.add(&sample)
    }

    fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.shape.len() + 1);
        shape.push(self.len());
        shape.extend_from_slice(&self.shape);
        shape
    }
}
