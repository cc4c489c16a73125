//! Correlator configuration
//!
//! Operation and compression names parse from the snake_case strings used by
//! simulation scripts; everything else is validated once, at construction.

use crate::traits::AccumulatorError;
use core::fmt;
use core::str::FromStr;
use validator::{Validate, ValidationError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Operation combining A(t) and B(t + tau) into one correlation value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Operation {
    /// `sum_i A_i * B_i`
    ScalarProduct,
    /// `A_i * B_i`
    ComponentwiseProduct,
    /// `(A_i - B_i)^2`, the per-component mean square displacement
    SquareDistanceComponentwise,
    /// `C[i * len_b + j] = A_i * B_j`
    TensorProduct,
    /// Fluorescence correlation spectroscopy autocorrelation, one value per
    /// particle (3 components)
    FcsAcf,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScalarProduct => "scalar_product",
            Self::ComponentwiseProduct => "componentwise_product",
            Self::SquareDistanceComponentwise => "square_distance_componentwise",
            Self::TensorProduct => "tensor_product",
            Self::FcsAcf => "fcs_acf",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for Operation {
    type Error = AccumulatorError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "scalar_product" => Ok(Self::ScalarProduct),
            "componentwise_product" => Ok(Self::ComponentwiseProduct),
            "square_distance_componentwise" => Ok(Self::SquareDistanceComponentwise),
            "tensor_product" => Ok(Self::TensorProduct),
            "fcs_acf" => Ok(Self::FcsAcf),
            _ => Err(AccumulatorError::Configuration(format!(
                "unknown correlation operation '{s}', expected 'scalar_product', \
                 'componentwise_product', 'square_distance_componentwise', \
                 'tensor_product', or 'fcs_acf'"
            ))),
        }
    }
}

impl FromStr for Operation {
    type Err = AccumulatorError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Rule reducing two chronologically adjacent values into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Compression {
    /// Keep the older value
    #[default]
    Discard2,
    /// Keep the newer value
    Discard1,
    /// Average the two values
    Linear,
}

impl Compression {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Discard2 => "discard2",
            Self::Discard1 => "discard1",
            Self::Linear => "linear",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for Compression {
    type Error = AccumulatorError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "discard2" => Ok(Self::Discard2),
            "discard1" => Ok(Self::Discard1),
            "linear" => Ok(Self::Linear),
            _ => Err(AccumulatorError::Configuration(format!(
                "unknown compression '{s}', expected 'discard2', 'discard1', or 'linear'"
            ))),
        }
    }
}

impl FromStr for Compression {
    type Err = AccumulatorError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Largest supported ratio `tau_max / dt`
pub(crate) const MAX_LAG_STEPS: f64 = (1u64 << 52) as f64;

fn validate_correlator_config(cfg: &CorrelatorConfig) -> Result<(), ValidationError> {
    if !(cfg.tau_max.is_finite() && cfg.tau_max > 0.0) {
        return Err(ValidationError::new("tau_max must be a positive finite number"));
    }
    if !(cfg.time_step.is_finite() && cfg.time_step > 0.0) {
        return Err(ValidationError::new(
            "time_step must be a positive finite number",
        ));
    }
    if cfg.tau_lin != 1 && (cfg.tau_lin < 2 || cfg.tau_lin % 2 != 0) {
        return Err(ValidationError::new(
            "tau_lin must be an even number >= 2, or 1 to derive it from tau_max",
        ));
    }
    if cfg.tau_max / cfg.time_step > MAX_LAG_STEPS {
        return Err(ValidationError::new(
            "tau_max spans too many sampling intervals",
        ));
    }
    check_args(cfg.operation, &cfg.args).map_err(ValidationError::new)?;
    Ok(())
}

/// Reject operation arguments the operation cannot use
///
/// `fcs_acf` divides by each squared beam waist, so all three must be positive.
pub(crate) fn check_args(operation: Operation, args: &[f64; 3]) -> Result<(), &'static str> {
    if args.iter().any(|a| !a.is_finite()) {
        return Err("args must be finite");
    }
    if operation == Operation::FcsAcf && args.iter().any(|&a| a <= 0.0) {
        return Err("fcs_acf args (squared beam waists) must be positive");
    }
    Ok(())
}

/// Parameters of a multiple-tau correlator
///
/// The sampling interval of the correlator is `time_step * delta_N`, where
/// `delta_N` is passed to [`Correlator::new`](super::Correlator::new).
///
/// # Example
///
/// ```
/// use tauflow::correlation::{Compression, CorrelatorConfig, Operation};
///
/// let config = CorrelatorConfig::new(1000.0, 0.01)
///     .with_tau_lin(16)
///     .with_operation(Operation::SquareDistanceComponentwise)
///     .with_compression(Compression::Linear);
/// assert_eq!(config.compress2(), Compression::Linear);
/// ```
#[derive(Debug, Clone, PartialEq, Validate)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[validate(schema(function = "validate_correlator_config"))]
pub struct CorrelatorConfig {
    /// Maximum lag, in simulation time
    pub tau_max: f64,
    /// Integrator step size, in simulation time
    pub time_step: f64,
    /// Width of the linear region; even and >= 2, or 1 to derive from `tau_max`
    pub tau_lin: usize,
    pub operation: Operation,
    /// Compression applied to the A stream
    pub compress1: Compression,
    /// Compression applied to the B stream; defaults to `compress1`
    pub compress2: Option<Compression>,
    /// Operation arguments, pre-squared (used by `fcs_acf` only)
    pub args: [f64; 3],
}

impl CorrelatorConfig {
    /// Scalar-product autocorrelation with `tau_lin = 16` and `discard2`
    pub fn new(tau_max: f64, time_step: f64) -> Self {
        Self {
            tau_max,
            time_step,
            tau_lin: 16,
            operation: Operation::ScalarProduct,
            compress1: Compression::Discard2,
            compress2: None,
            args: [0.0; 3],
        }
    }

    pub fn with_tau_lin(mut self, tau_lin: usize) -> Self {
        self.tau_lin = tau_lin;
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Set the compression of the A stream (and of B, unless set separately)
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compress1 = compression;
        self
    }

    pub fn with_compression2(mut self, compression: Compression) -> Self {
        self.compress2 = Some(compression);
        self
    }

    pub fn with_args(mut self, args: [f64; 3]) -> Self {
        self.args = args;
        self
    }

    /// Effective compression of the B stream
    pub fn compress2(&self) -> Compression {
        self.compress2.unwrap_or(self.compress1)
    }
}
