//! Running mean and variance of a vector observable
//!
//! Computes per-component statistics using Welford's numerically stable
//! online algorithm.

use crate::observable::{self, ObservableRef};
use crate::traits::{Accumulator, AccumulatorBase, AccumulatorError, Result};
use ndarray::ArrayD;

/// Running mean/variance accumulator using Welford's algorithm
///
/// Tracks, for every component of the observable, the running mean and the
/// sum of squared deviations from it (M2) in a single pass with memory
/// proportional to the observable size only.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use tauflow::observable::ObservableCell;
/// use tauflow::statistics::MeanVariance;
///
/// let obs = Rc::new(ObservableCell::new(vec![1]));
/// let mut stats = MeanVariance::new(obs, 1).unwrap();
///
/// for value in [1.0, 2.0, 3.0, 4.0] {
///     stats.add(&[value]).unwrap();
/// }
///
/// assert!((stats.mean()[[0]] - 2.5).abs() < 1e-12);
/// assert!((stats.variance().unwrap()[[0]] - 5.0 / 3.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct MeanVariance {
    base: AccumulatorBase,
    obs: ObservableRef,
    /// Declared shape of the observable
    shape: Vec<usize>,
    /// Number of samples seen
    count: u64,
    /// Running mean per component
    mean: Vec<f64>,
    /// Sum of squared differences from the mean (M2 in Welford's algorithm)
    m2: Vec<f64>,
}

impl MeanVariance {
    /// Create an empty accumulator bound to `obs`, sampled every `delta_n` steps
    pub fn new(obs: ObservableRef, delta_n: usize) -> Result<Self> {
        let base = AccumulatorBase::new(delta_n)?;
        let shape = observable::bound_shape(obs.as_ref())?;
        let len = observable::flat_len(&shape);

        Ok(Self {
            base,
            obs,
            shape,
            count: 0,
            mean: vec![0.0; len],
            m2: vec![0.0; len],
        })
    }

    /// Add a sample
    ///
    /// The sample is rejected before any mutation if its length differs
    /// from the observable's.
    pub fn add(&mut self, sample: &[f64]) -> Result<()> {
        observable::check_len(self.mean.len(), sample.len())?;

        self.count += 1;
        let n = self.count as f64;

        for ((mean, m2), &value) in self
            .mean
            .iter_mut()
            .zip(self.m2.iter_mut())
            .zip(sample.iter())
        {
            let delta = value - *mean;
            *mean += delta / n;
            let delta2 = value - *mean;
            *m2 += delta * delta2;
        }

        self.base.record_update();
        Ok(())
    }

    /// Get the number of samples
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get the mean, shaped like the observable
    ///
    /// All zeros before the first sample.
    pub fn mean(&self) -> ArrayD<f64> {
        observable::reshape(&self.shape, self.mean.clone())
    }

    /// Get the sample variance (Bessel's correction)
    pub fn variance(&self) -> Result<ArrayD<f64>> {
        Ok(observable::reshape(&self.shape, self.sample_variance()?))
    }

    /// Get the standard error of the mean, assuming uncorrelated samples
    pub fn std_error(&self) -> Result<ArrayD<f64>> {
        let n = self.count as f64;
        let std_error = self
            .sample_variance()?
            .into_iter()
            .map(|var| (var / n).sqrt())
            .collect();
        Ok(observable::reshape(&self.shape, std_error))
    }

    fn sample_variance(&self) -> Result<Vec<f64>> {
        if self.count < 2 {
            return Err(AccumulatorError::InsufficientSamples {
                required: 2,
                available: self.count,
            });
        }
        let denom = (self.count - 1) as f64;
        Ok(self.m2.iter().map(|&m2| m2 / denom).collect())
    }
}

impl Accumulator for MeanVariance {
    fn base(&self) -> &AccumulatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AccumulatorBase {
        &mut self.base
    }

    fn update(&mut self) -> Result<()> {
        let sample = observable::pull(self.obs.as_ref(), self.mean.len())?;
        self.add(&sample)
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }
}
