//! Core traits for accumulators
//!
//! All accumulators implement the base [`Accumulator`] trait, which is the
//! contract the [`AutoUpdateAccumulators`](crate::schedule::AutoUpdateAccumulators)
//! registry relies on: a sampling interval, an update counter, and an
//! `update` that pulls fresh values from the bound observable.

use core::fmt::{self, Debug};

/// Error raised by accumulator construction, ingestion, or queries
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorError {
    /// Invalid construction parameters
    Configuration(String),
    /// The bound observables cannot be combined by the chosen operation
    IncompatibleObservables {
        operation: &'static str,
        len_a: usize,
        len_b: usize,
    },
    /// A sample does not have the length fixed at construction
    ShapeMismatch { expected: usize, found: usize },
    /// A derived statistic needs more samples than are available
    InsufficientSamples { required: u64, available: u64 },
    /// The accumulator is already in the auto-update registry
    AlreadyRegistered,
    /// The accumulator is not in the auto-update registry
    NotRegistered,
    /// The accumulator was finalized and accepts no further samples
    Finalized,
    /// The accumulator is borrowed elsewhere and cannot be updated
    InUse,
}

impl fmt::Display for AccumulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccumulatorError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            AccumulatorError::IncompatibleObservables {
                operation,
                len_a,
                len_b,
            } => write!(
                f,
                "operation '{}' cannot combine observables of length {} and {}",
                operation, len_a, len_b
            ),
            AccumulatorError::ShapeMismatch { expected, found } => {
                write!(f, "shape mismatch: expected {} values, found {}", expected, found)
            }
            AccumulatorError::InsufficientSamples {
                required,
                available,
            } => write!(
                f,
                "insufficient samples: need at least {}, have {}",
                required, available
            ),
            AccumulatorError::AlreadyRegistered => write!(f, "accumulator is already registered"),
            AccumulatorError::NotRegistered => write!(f, "accumulator is not registered"),
            AccumulatorError::Finalized => {
                write!(f, "no data can be added after finalize() was called")
            }
            AccumulatorError::InUse => write!(f, "accumulator is borrowed elsewhere"),
        }
    }
}

impl std::error::Error for AccumulatorError {}

impl From<validator::ValidationErrors> for AccumulatorError {
    fn from(e: validator::ValidationErrors) -> Self {
        AccumulatorError::Configuration(format!("{e}"))
    }
}

pub type Result<T> = core::result::Result<T, AccumulatorError>;

/// Sampling interval and update bookkeeping shared by every accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorBase {
    /// Number of simulation steps between auto-updates
    delta_n: usize,
    /// Number of successful updates so far
    n_updates: u64,
}

impl AccumulatorBase {
    /// Create the bookkeeping for an accumulator sampled every `delta_n` steps
    pub fn new(delta_n: usize) -> Result<Self> {
        validate_delta_n(delta_n)?;
        Ok(Self {
            delta_n,
            n_updates: 0,
        })
    }

    pub fn delta_n(&self) -> usize {
        self.delta_n
    }

    pub fn set_delta_n(&mut self, delta_n: usize) -> Result<()> {
        validate_delta_n(delta_n)?;
        self.delta_n = delta_n;
        Ok(())
    }

    pub fn n_updates(&self) -> u64 {
        self.n_updates
    }

    /// Whether an auto-update is due at simulation step `step`
    pub fn is_due(&self, step: u64) -> bool {
        step % self.delta_n as u64 == 0
    }

    /// Steps from `step` until the next step at which an update is due
    pub fn steps_until_due(&self, step: u64) -> u64 {
        let delta_n = self.delta_n as u64;
        (delta_n - step % delta_n) % delta_n
    }

    #[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
    pub(crate) fn record_update(&mut self) {
        self.n_updates += 1;
    }
}

fn validate_delta_n(delta_n: usize) -> Result<()> {
    if delta_n == 0 {
        return Err(AccumulatorError::Configuration(
            "delta_N must be a positive number of steps".into(),
        ));
    }
    Ok(())
}

/// Core trait for all accumulators
pub trait Accumulator: Debug {
    /// Shared sampling bookkeeping
    fn base(&self) -> &AccumulatorBase;

    /// Mutable access to the shared sampling bookkeeping
    fn base_mut(&mut self) -> &mut AccumulatorBase;

    /// Pull the current values from the bound observable(s) and ingest them
    fn update(&mut self) -> Result<()>;

    /// Shape of the accumulated result
    fn shape(&self) -> Vec<usize>;

    /// Number of steps between auto-updates
    fn delta_n(&self) -> usize {
        self.base().delta_n()
    }

    /// Change the number of steps between auto-updates
    fn set_delta_n(&mut self, delta_n: usize) -> Result<()> {
        self.base_mut().set_delta_n(delta_n)
    }

    /// Number of updates ingested so far
    fn n_updates(&self) -> u64 {
        self.base().n_updates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delta_n_rejected() {
        assert!(matches!(
            AccumulatorBase::new(0),
            Err(AccumulatorError::Configuration(_))
        ));

        let mut base = AccumulatorBase::new(3).unwrap();
        assert!(base.set_delta_n(0).is_err());
        assert_eq!(base.delta_n(), 3);
    }

    #[test]
    fn test_due_steps() {
        let base = AccumulatorBase::new(4).unwrap();

        assert!(base.is_due(0));
        assert!(!base.is_due(3));
        assert!(base.is_due(8));

        assert_eq!(base.steps_until_due(0), 0);
        assert_eq!(base.steps_until_due(1), 3);
        assert_eq!(base.steps_until_due(7), 1);
    }

    #[test]
    fn test_error_display() {
        let err = AccumulatorError::ShapeMismatch {
            expected: 3,
            found: 2,
        };
        assert_eq!(err.to_string(), "shape mismatch: expected 3 values, found 2");

        let err = AccumulatorError::InsufficientSamples {
            required: 2,
            available: 1,
        };
        assert!(err.to_string().contains("at least 2"));
    }
}
