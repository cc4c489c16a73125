//! Multiple-tau correlator
//!
//! Correlates two observable streams over lag times spanning many decades
//! while keeping memory logarithmic in `tau_max / dt`.
//!
//! # Algorithm
//!
//! Level `p` of the hierarchy sees the streams at resolution `dt * 2^p` and
//! keeps the `tau_lin` most recent values. Every new value at level `p` is
//! correlated with the values `k = 0..tau_lin` entries back in the same level,
//! i.e. with lags `k * 2^p * dt`. Level 0 covers `k` in `0..tau_lin`; higher
//! levels only cover `k` in `tau_lin/2..tau_lin`, since smaller local lags are
//! already resolved more finely below. Every second value arriving at level
//! `p` is combined with its predecessor by the compression function and
//! pushed to level `p + 1`.
//!
//! The number of levels is `P + 1`, with `P` the smallest integer such that
//! `tau_lin * dt * 2^P >= tau_max`. Lags larger than `tau_max` are dropped
//! from the top level.

use super::config::{check_args, Compression, CorrelatorConfig, Operation, MAX_LAG_STEPS};
use super::kernels::{CompressionFn, CorrelationFn};
use super::level::{Level, LevelLags, Sample};
use crate::observable::{self, ObservableRef};
use crate::traits::{Accumulator, AccumulatorBase, AccumulatorError, Result};
use ndarray::ArrayD;
use tracing::{debug, warn};
use validator::Validate;

/// Slack, in sampling intervals, when comparing lags against `tau_max`
const LAG_TOLERANCE: f64 = 1e-9;

/// Multiple-tau correlator of observables A and B
///
/// Accumulates `C(tau) = <op(A(t), B(t + tau))>` for the configured
/// [`Operation`]. Without a second observable, B is A (autocorrelation).
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use tauflow::correlation::{Correlator, CorrelatorConfig};
/// use tauflow::observable::ObservableCell;
///
/// let obs = Rc::new(ObservableCell::new(vec![1]));
/// let config = CorrelatorConfig::new(100.0, 1.0).with_tau_lin(8);
/// let mut corr = Correlator::new(obs, None, config, 1).unwrap();
///
/// for t in 0..1000 {
///     corr.add(&[(t as f64 * 0.1).sin()]).unwrap();
/// }
/// corr.finalize();
///
/// let tau = corr.lag_times();
/// let c = corr.result();
/// assert_eq!(tau.len(), c.shape()[0]);
/// ```
#[derive(Clone, Debug)]
pub struct Correlator {
    base: AccumulatorBase,
    obs_a: ObservableRef,
    obs_b: Option<ObservableRef>,
    /// Configuration with `tau_lin` resolved
    config: CorrelatorConfig,
    /// Sampling interval, `time_step * delta_N`
    dt: f64,
    shape_a: Vec<usize>,
    shape_b: Vec<usize>,
    len_a: usize,
    len_b: usize,
    /// Shape of one correlation value
    corr_shape: Vec<usize>,
    dim_corr: usize,
    correlate: CorrelationFn,
    compress_a: CompressionFn,
    compress_b: CompressionFn,
    /// Lag ranges per level; its length is the hierarchy depth
    lags: Vec<LevelLags>,
    /// Lag of each table row, in sampling intervals
    lag_steps: Vec<u64>,
    /// Levels allocated so far, grown on first input
    levels: Vec<Level>,
    /// Correlation sums, `n_lags x dim_corr`
    sums: Vec<f64>,
    /// Contributing pairs per lag
    counts: Vec<u64>,
    /// Raw samples ingested
    n_data: u64,
    sum_a: Vec<f64>,
    sum_b: Vec<f64>,
    finalized: bool,
}

impl Correlator {
    /// Create a correlator of `obs_a` with `obs_b` (or with itself when `None`)
    ///
    /// `delta_n` is the number of simulation steps between samples, so the
    /// sampling interval is `config.time_step * delta_n`.
    pub fn new(
        obs_a: ObservableRef,
        obs_b: Option<ObservableRef>,
        config: CorrelatorConfig,
        delta_n: usize,
    ) -> Result<Self> {
        let base = AccumulatorBase::new(delta_n)?;
        config.validate()?;

        let shape_a = observable::bound_shape(obs_a.as_ref())?;
        let shape_b = match &obs_b {
            Some(obs) => observable::bound_shape(obs.as_ref())?,
            None => shape_a.clone(),
        };
        let len_a = observable::flat_len(&shape_a);
        let len_b = observable::flat_len(&shape_b);
        let corr_shape = config.operation.result_shape(len_a, len_b)?;
        let dim_corr = observable::flat_len(&corr_shape);

        let dt = config.time_step * delta_n as f64;
        let steps = config.tau_max / dt;

        let mut config = config;
        if config.tau_lin == 1 {
            config.tau_lin = derive_tau_lin(steps);
            warn!(
                tau_lin = config.tau_lin,
                "tau_lin derived from tau_max; the correlator runs without compression"
            );
        }

        let (lags, lag_steps) = lag_grid(config.tau_lin, steps);
        let n_lags = lag_steps.len();

        debug!(
            operation = config.operation.name(),
            tau_lin = config.tau_lin,
            levels = lags.len(),
            lags = n_lags,
            dt,
            "configured multiple-tau correlator"
        );

        Ok(Self {
            base,
            obs_a,
            obs_b,
            dt,
            shape_a,
            shape_b,
            len_a,
            len_b,
            corr_shape,
            dim_corr,
            correlate: config.operation.kernel(),
            compress_a: config.compress1.kernel(),
            compress_b: config.compress2().kernel(),
            lags,
            lag_steps,
            levels: Vec::new(),
            sums: vec![0.0; n_lags * dim_corr],
            counts: vec![0; n_lags],
            n_data: 0,
            sum_a: vec![0.0; len_a],
            sum_b: vec![0.0; len_b],
            finalized: false,
            config,
        })
    }

    /// Add a sample of A, correlated with itself
    pub fn add(&mut self, a: &[f64]) -> Result<()> {
        self.add_pair(a, a)
    }

    /// Add simultaneous samples of A and B
    ///
    /// Rejected without touching any state if either length is wrong or the
    /// correlator is finalized.
    pub fn add_pair(&mut self, a: &[f64], b: &[f64]) -> Result<()> {
        if self.finalized {
            return Err(AccumulatorError::Finalized);
        }
        observable::check_len(self.len_a, a.len())?;
        observable::check_len(self.len_b, b.len())?;

        self.n_data += 1;
        for (s, x) in self.sum_a.iter_mut().zip(a) {
            *s += x;
        }
        for (s, y) in self.sum_b.iter_mut().zip(b) {
            *s += y;
        }

        self.ingest(
            0,
            Sample {
                a: a.to_vec(),
                b: b.to_vec(),
            },
        );
        self.base.record_update();
        Ok(())
    }

    /// Flush values still waiting for a compression partner
    ///
    /// Each unpaired value is compressed with itself and pushed up the
    /// hierarchy, so the tail of the run still contributes to the high lags.
    /// Calling it again has no effect. Further samples are rejected with
    /// [`AccumulatorError::Finalized`].
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }

        let mut flushed = 0usize;
        for p in 0..self.lags.len().saturating_sub(1) {
            let Some(level) = self.levels.get_mut(p) else {
                break;
            };
            if let Some(pending) = level.take_pending() {
                let promoted = self.compress(&pending, &pending);
                self.ingest(p + 1, promoted);
                flushed += 1;
            }
        }

        self.finalized = true;
        debug!(
            flushed,
            levels = self.levels.len(),
            samples = self.n_data,
            "finalized correlator"
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Correlation per lag, shaped `[n_lags] + operation shape`
    ///
    /// Lags without any contributing pair are `NaN`.
    pub fn result(&self) -> ArrayD<f64> {
        let data = self
            .sums
            .chunks_exact(self.dim_corr)
            .zip(&self.counts)
            .flat_map(|(row, &n)| {
                row.iter().map(move |&s| {
                    if n == 0 {
                        f64::NAN
                    } else {
                        s / n as f64
                    }
                })
            })
            .collect();
        observable::reshape(&self.shape(), data)
    }

    /// Lag times of the result rows, strictly increasing
    pub fn lag_times(&self) -> Vec<f64> {
        self.lag_steps.iter().map(|&k| k as f64 * self.dt).collect()
    }

    /// Number of pairs that contributed to each lag
    pub fn sample_sizes(&self) -> Vec<u64> {
        self.counts.clone()
    }

    pub fn n_lags(&self) -> usize {
        self.lag_steps.len()
    }

    /// Number of values in one correlation entry
    pub fn dim_corr(&self) -> usize {
        self.dim_corr
    }

    /// Number of levels the hierarchy grows to
    pub fn hierarchy_depth(&self) -> usize {
        self.lags.len()
    }

    /// Number of levels that have received data so far
    pub fn active_levels(&self) -> usize {
        self.levels.len()
    }

    /// Effective `tau_lin`, after deriving it when configured as 1
    pub fn tau_lin(&self) -> usize {
        self.config.tau_lin
    }

    pub fn tau_max(&self) -> f64 {
        self.config.tau_max
    }

    /// Sampling interval, `time_step * delta_N`
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn operation(&self) -> Operation {
        self.config.operation
    }

    /// Compression functions of the A and B streams
    pub fn compressions(&self) -> (Compression, Compression) {
        (self.config.compress1, self.config.compress2())
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn args(&self) -> [f64; 3] {
        self.config.args
    }

    /// Replace the operation arguments; they are used as given (pre-squared)
    pub fn set_args(&mut self, args: [f64; 3]) -> Result<()> {
        check_args(self.config.operation, &args)
            .map_err(|msg| AccumulatorError::Configuration(msg.into()))?;
        self.config.args = args;
        Ok(())
    }

    /// Number of raw samples ingested
    pub fn n_data(&self) -> u64 {
        self.n_data
    }

    /// Mean of the raw A samples
    pub fn mean_a(&self) -> ArrayD<f64> {
        observable::reshape(&self.shape_a, self.stream_mean(&self.sum_a))
    }

    /// Mean of the raw B samples
    pub fn mean_b(&self) -> ArrayD<f64> {
        observable::reshape(&self.shape_b, self.stream_mean(&self.sum_b))
    }

    fn stream_mean(&self, sums: &[f64]) -> Vec<f64> {
        if self.n_data == 0 {
            return vec![0.0; sums.len()];
        }
        let n = self.n_data as f64;
        sums.iter().map(|s| s / n).collect()
    }

    /// Push a sample into level `p` and let compressed values cascade upwards
    fn ingest(&mut self, mut p: usize, mut sample: Sample) {
        loop {
            if p == self.levels.len() {
                let promotes = p + 1 < self.lags.len();
                debug!(level = p, promotes, "allocating correlator level");
                self.levels.push(Level::new(self.config.tau_lin, promotes));
            }

            let pair = self.levels[p].push(sample);
            self.correlate_newest(p);

            match pair {
                Some((older, newer)) => {
                    sample = self.compress(&older, &newer);
                    p += 1;
                }
                None => break,
            }
        }
    }

    /// Correlate the newest value of level `p` with its history
    fn correlate_newest(&mut self, p: usize) {
        let level = &self.levels[p];
        let lags = self.lags[p];
        let dim = self.dim_corr;
        let Some(newest) = level.lagged(0) else {
            return;
        };

        for k in lags.first..lags.end {
            let Some(older) = level.lagged(k) else {
                break;
            };
            let row = lags.row(k);
            (self.correlate)(
                &older.a,
                &newest.b,
                &self.config.args,
                &mut self.sums[row * dim..(row + 1) * dim],
            );
            self.counts[row] += 1;
        }
    }

    fn compress(&self, older: &Sample, newer: &Sample) -> Sample {
        Sample {
            a: (self.compress_a)(&older.a, &newer.a),
            b: (self.compress_b)(&older.b, &newer.b),
        }
    }
}

impl Accumulator for Correlator {
    fn base(&self) -> &AccumulatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AccumulatorBase {
        &mut self.base
    }

    fn update(&mut self) -> Result<()> {
        if self.finalized {
            return Err(AccumulatorError::Finalized);
        }
        let a = observable::pull(self.obs_a.as_ref(), self.len_a)?;
        let b = match &self.obs_b {
            Some(obs) => Some(observable::pull(obs.as_ref(), self.len_b)?),
            None => None,
        };
        self.add_pair(&a, b.as_deref().unwrap_or(&a))
    }

    fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.corr_shape.len() + 1);
        shape.push(self.n_lags());
        shape.extend_from_slice(&self.corr_shape);
        shape
    }

    /// The lag grid is built from `time_step * delta_N`, so the sampling
    /// interval of a correlator cannot change after construction.
    fn set_delta_n(&mut self, _delta_n: usize) -> Result<()> {
        Err(AccumulatorError::Configuration(
            "the sampling interval of a correlator is fixed at construction".into(),
        ))
    }
}

/// `ceil(tau_max / dt)`, rounded up to the next even number
fn derive_tau_lin(steps: f64) -> usize {
    let tau_lin = ((steps - LAG_TOLERANCE).ceil().max(2.0)) as usize;
    tau_lin + tau_lin % 2
}

/// Lag ranges per level and the lag of every table row, in sampling intervals
///
/// `steps` is `tau_max / dt`.
fn lag_grid(tau_lin: usize, steps: f64) -> (Vec<LevelLags>, Vec<u64>) {
    debug_assert!(steps <= MAX_LAG_STEPS);

    let mut top = 0;
    while (tau_lin as f64) * 2f64.powi(top) < steps - LAG_TOLERANCE {
        top += 1;
    }

    let mut lags = Vec::with_capacity(top as usize + 1);
    let mut lag_steps = Vec::new();
    for p in 0..=top {
        let first = if p == 0 { 0 } else { tau_lin / 2 };
        let stride = 1u64 << p;
        let offset = lag_steps.len();

        let mut end = first;
        while end < tau_lin && (end as u64 * stride) as f64 <= steps + LAG_TOLERANCE {
            lag_steps.push(end as u64 * stride);
            end += 1;
        }
        lags.push(LevelLags { first, end, offset });
    }

    (lags, lag_steps)
}
