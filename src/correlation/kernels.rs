//! Correlation operators and compression functions
//!
//! Both are resolved once, at construction, into plain function pointers so
//! the per-sample loop never dispatches on the configured names.

use super::config::{Compression, Operation};
use crate::traits::{AccumulatorError, Result};

/// Accumulates `op(a, b)` into `acc`
pub(crate) type CorrelationFn = fn(a: &[f64], b: &[f64], args: &[f64; 3], acc: &mut [f64]);

/// Reduces `(older, newer)` into one value
pub(crate) type CompressionFn = fn(older: &[f64], newer: &[f64]) -> Vec<f64>;

impl Operation {
    /// Shape of one correlation value for observables of the given lengths
    ///
    /// The scalar product yields a 0-dimensional value.
    pub fn result_shape(&self, len_a: usize, len_b: usize) -> Result<Vec<usize>> {
        let incompatible = || AccumulatorError::IncompatibleObservables {
            operation: self.name(),
            len_a,
            len_b,
        };
        match self {
            Self::ScalarProduct => {
                if len_a != len_b {
                    return Err(incompatible());
                }
                Ok(Vec::new())
            }
            Self::ComponentwiseProduct | Self::SquareDistanceComponentwise => {
                if len_a != len_b {
                    return Err(incompatible());
                }
                Ok(vec![len_a])
            }
            Self::TensorProduct => Ok(vec![len_a * len_b]),
            Self::FcsAcf => {
                if len_a != len_b || len_a % 3 != 0 {
                    return Err(incompatible());
                }
                Ok(vec![len_a / 3])
            }
        }
    }

    pub(crate) fn kernel(&self) -> CorrelationFn {
        match self {
            Self::ScalarProduct => scalar_product,
            Self::ComponentwiseProduct => componentwise_product,
            Self::SquareDistanceComponentwise => square_distance_componentwise,
            Self::TensorProduct => tensor_product,
            Self::FcsAcf => fcs_acf,
        }
    }
}

impl Compression {
    pub(crate) fn kernel(&self) -> CompressionFn {
        match self {
            Self::Discard2 => discard2,
            Self::Discard1 => discard1,
            Self::Linear => linear,
        }
    }
}

fn scalar_product(a: &[f64], b: &[f64], _args: &[f64; 3], acc: &mut [f64]) {
    acc[0] += a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();
}

fn componentwise_product(a: &[f64], b: &[f64], _args: &[f64; 3], acc: &mut [f64]) {
    for ((c, x), y) in acc.iter_mut().zip(a).zip(b) {
        *c += x * y;
    }
}

fn square_distance_componentwise(a: &[f64], b: &[f64], _args: &[f64; 3], acc: &mut [f64]) {
    for ((c, x), y) in acc.iter_mut().zip(a).zip(b) {
        let d = x - y;
        *c += d * d;
    }
}

fn tensor_product(a: &[f64], b: &[f64], _args: &[f64; 3], acc: &mut [f64]) {
    for (row, x) in acc.chunks_exact_mut(b.len()).zip(a) {
        for (c, y) in row.iter_mut().zip(b) {
            *c += x * y;
        }
    }
}

// `args` holds the squared beam waists w_x^2, w_y^2, w_z^2
fn fcs_acf(a: &[f64], b: &[f64], args: &[f64; 3], acc: &mut [f64]) {
    for ((c, pa), pb) in acc.iter_mut().zip(a.chunks_exact(3)).zip(b.chunks_exact(3)) {
        let exponent: f64 = pa
            .iter()
            .zip(pb)
            .zip(args)
            .map(|((x, y), w2)| {
                let d = x - y;
                d * d / w2
            })
            .sum();
        *c += (-exponent).exp();
    }
}

fn discard2(older: &[f64], _newer: &[f64]) -> Vec<f64> {
    older.to_vec()
}

fn discard1(_older: &[f64], newer: &[f64]) -> Vec<f64> {
    newer.to_vec()
}

fn linear(older: &[f64], newer: &[f64]) -> Vec<f64> {
    older
        .iter()
        .zip(newer)
        .map(|(x, y)| 0.5 * (x + y))
        .collect()
}
