//! Observable sources
//!
//! An observable produces a fixed-shape vector describing the current
//! simulation state. Accumulators hold an [`ObservableRef`] and pull a fresh
//! vector from it on every auto-update. Any reduction across simulation
//! workers happens inside the observable; accumulators only see the combined
//! vector.

use crate::traits::{AccumulatorError, Result};
use core::cell::RefCell;
use core::fmt;
#[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
use ndarray::{ArrayD, IxDyn};
use std::rc::Rc;

/// A source of fixed-shape numeric vectors
pub trait Observable: fmt::Debug {
    /// Dimension sizes of the produced vector; must not change over time
    fn shape(&self) -> Vec<usize>;

    /// Current values, flattened in row-major order
    fn sample(&self) -> Vec<f64>;

    /// Number of values produced per sample
    fn len(&self) -> usize {
        flat_len(&self.shape())
    }
}

/// Shared handle to an observable
pub type ObservableRef = Rc<dyn Observable>;

/// Number of scalar values in an array of the given shape
pub fn flat_len(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Read the declared shape of an observable, rejecting empty outputs
#[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
pub(crate) fn bound_shape(obs: &dyn Observable) -> Result<Vec<usize>> {
    let shape = obs.shape();
    if flat_len(&shape) == 0 {
        return Err(AccumulatorError::Configuration(format!(
            "observable shape {:?} produces no values",
            shape
        )));
    }
    Ok(shape)
}

pub(crate) fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(AccumulatorError::ShapeMismatch { expected, found });
    }
    Ok(())
}

/// Sample an observable and verify the result against the bound length
#[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
pub(crate) fn pull(obs: &dyn Observable, expected: usize) -> Result<Vec<f64>> {
    let values = obs.sample();
    check_len(expected, values.len())?;
    Ok(values)
}

/// Reshape flat accumulator state into an array of the given shape
#[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
pub(crate) fn reshape(shape: &[usize], data: Vec<f64>) -> ArrayD<f64> {
    debug_assert_eq!(flat_len(shape), data.len());
    ArrayD::from_shape_vec(IxDyn(shape), data)
        .expect("accumulator state length always matches its declared shape")
}

/// Observable backed by a closure
///
/// # Example
///
/// ```
/// use tauflow::observable::{Observable, ObservableFn};
///
/// let obs = ObservableFn::new(vec![3], || vec![1.0, 2.0, 3.0]);
/// assert_eq!(obs.len(), 3);
/// assert_eq!(obs.sample(), vec![1.0, 2.0, 3.0]);
/// ```
pub struct ObservableFn<F> {
    shape: Vec<usize>,
    f: F,
}

impl<F: Fn() -> Vec<f64>> ObservableFn<F> {
    pub fn new(shape: Vec<usize>, f: F) -> Self {
        Self { shape, f }
    }
}

impl<F: Fn() -> Vec<f64>> Observable for ObservableFn<F> {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn sample(&self) -> Vec<f64> {
        (self.f)()
    }
}

impl<F> fmt::Debug for ObservableFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableFn")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Observable holding a value the simulation overwrites each step
///
/// # Example
///
/// ```
/// use tauflow::observable::{Observable, ObservableCell};
///
/// let cell = ObservableCell::new(vec![2]);
/// cell.set(&[0.5, 1.5]).unwrap();
/// assert_eq!(cell.sample(), vec![0.5, 1.5]);
/// ```
#[derive(Debug, Clone)]
pub struct ObservableCell {
    shape: Vec<usize>,
    value: RefCell<Vec<f64>>,
}

impl ObservableCell {
    /// Create a cell of the given shape, initialized to zeros
    pub fn new(shape: Vec<usize>) -> Self {
        let len = flat_len(&shape);
        Self {
            shape,
            value: RefCell::new(vec![0.0; len]),
        }
    }

    /// Create a cell holding an initial value
    pub fn with_value(shape: Vec<usize>, value: Vec<f64>) -> Result<Self> {
        check_len(flat_len(&shape), value.len())?;
        Ok(Self {
            shape,
            value: RefCell::new(value),
        })
    }

    /// Overwrite the current value
    pub fn set(&self, value: &[f64]) -> Result<()> {
        let mut current = self.value.borrow_mut();
        check_len(current.len(), value.len())?;
        current.copy_from_slice(value);
        Ok(())
    }

    /// Overwrite a single-valued cell
    pub fn set_scalar(&self, value: f64) -> Result<()> {
        self.set(&[value])
    }
}

impl Observable for ObservableCell {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn sample(&self) -> Vec<f64> {
        self.value.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_len() {
        assert_eq!(flat_len(&[]), 1);
        assert_eq!(flat_len(&[4]), 4);
        assert_eq!(flat_len(&[2, 3]), 6);
        assert_eq!(flat_len(&[2, 0]), 0);
    }

    #[test]
    fn test_cell_rejects_wrong_length() {
        let cell = ObservableCell::new(vec![3]);
        assert_eq!(
            cell.set(&[1.0, 2.0]),
            Err(AccumulatorError::ShapeMismatch {
                expected: 3,
                found: 2
            })
        );
        // Rejected write leaves the value untouched
        assert_eq!(cell.sample(), vec![0.0; 3]);
    }

    #[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
    #[test]
    fn test_pull_checks_length() {
        let obs = ObservableFn::new(vec![2], || vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            pull(&obs, 2),
            Err(AccumulatorError::ShapeMismatch { .. })
        ));
    }

    #[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
    #[test]
    fn test_empty_shape_rejected() {
        let obs = ObservableCell::new(vec![0]);
        assert!(bound_shape(&obs).is_err());
    }

    #[cfg(any(feature = "statistics", feature = "series", feature = "correlation"))]
    #[test]
    fn test_reshape() {
        let arr = reshape(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(arr.shape(), &[2, 2]);
        assert_eq!(arr[[1, 0]], 3.0);
    }
}
