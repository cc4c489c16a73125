//! Automatic accumulator updates driven by the simulation step loop
//!
//! The registry is an explicit object owned by the simulation context, so
//! independent simulations keep independent registries.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tauflow::observable::ObservableCell;
//! use tauflow::schedule::AutoUpdateAccumulators;
//! use tauflow::series::TimeSeries;
//!
//! let energy = Rc::new(ObservableCell::new(vec![1]));
//! let series = Rc::new(RefCell::new(TimeSeries::new(energy.clone(), 5).unwrap()));
//!
//! let mut auto_update = AutoUpdateAccumulators::new();
//! auto_update.add(series.clone()).unwrap();
//!
//! for step in 0..20 {
//!     energy.set_scalar(-(step as f64)).unwrap();
//!     auto_update.step(step).unwrap();
//! }
//!
//! // Sampled at steps 0, 5, 10 and 15
//! assert_eq!(series.borrow().len(), 4);
//! ```

use crate::traits::{Accumulator, AccumulatorError, Result};
use core::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Shared handle to a registered accumulator
pub type SharedAccumulator = Rc<RefCell<dyn Accumulator>>;

/// Registry of accumulators updated at their own step intervals
///
/// Accumulators are updated in registration order, which keeps results
/// reproducible when several are due on the same step.
#[derive(Debug, Default)]
pub struct AutoUpdateAccumulators {
    entries: Vec<SharedAccumulator>,
}

impl AutoUpdateAccumulators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accumulator
    ///
    /// Fails with [`AccumulatorError::AlreadyRegistered`] if this very
    /// accumulator is registered already.
    pub fn add(&mut self, accumulator: SharedAccumulator) -> Result<()> {
        if self.position(&accumulator).is_some() {
            return Err(AccumulatorError::AlreadyRegistered);
        }
        debug!(
            delta_n = accumulator.borrow().delta_n(),
            registered = self.entries.len() + 1,
            "registered accumulator for auto-update"
        );
        self.entries.push(accumulator);
        Ok(())
    }

    /// Unregister an accumulator; its accumulated state is left untouched
    pub fn remove<A: Accumulator + ?Sized>(&mut self, accumulator: &Rc<RefCell<A>>) -> Result<()> {
        let index = self
            .position(accumulator)
            .ok_or(AccumulatorError::NotRegistered)?;
        self.entries.remove(index);
        debug!(registered = self.entries.len(), "removed accumulator from auto-update");
        Ok(())
    }

    /// Unregister every accumulator
    pub fn clear(&mut self) {
        debug!(removed = self.entries.len(), "cleared auto-update accumulators");
        self.entries.clear();
    }

    pub fn contains<A: Accumulator + ?Sized>(&self, accumulator: &Rc<RefCell<A>>) -> bool {
        self.position(accumulator).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Update every accumulator due at simulation step `step`
    ///
    /// Returns the number of accumulators updated. A failing update does not
    /// stop the others: every due accumulator is updated once, and the first
    /// error is returned after the pass. An accumulator that is borrowed
    /// elsewhere when due fails with [`AccumulatorError::InUse`].
    pub fn step(&mut self, step: u64) -> Result<usize> {
        let mut updated = 0;
        let mut first_error = None;

        for entry in &self.entries {
            let outcome = match entry.try_borrow_mut() {
                Ok(mut accumulator) => {
                    if !accumulator.base().is_due(step) {
                        continue;
                    }
                    accumulator.update()
                }
                Err(_) => {
                    let due = entry
                        .try_borrow()
                        .map_or(true, |accumulator| accumulator.base().is_due(step));
                    if !due {
                        continue;
                    }
                    Err(AccumulatorError::InUse)
                }
            };

            match outcome {
                Ok(()) => updated += 1,
                Err(e) => {
                    warn!(step, error = %e, "accumulator update failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if updated > 0 {
            trace!(step, updated, "auto-updated accumulators");
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(updated),
        }
    }

    /// Steps from `step` until any registered accumulator is due
    ///
    /// `Some(0)` means an update is due at `step` itself; `None` means the
    /// registry is empty.
    ///
    /// # Panics
    ///
    /// Panics if a registered accumulator is mutably borrowed elsewhere.
    pub fn next_update(&self, step: u64) -> Option<u64> {
        self.entries
            .iter()
            .map(|entry| entry.borrow().base().steps_until_due(step))
            .min()
    }

    fn position<A: Accumulator + ?Sized>(&self, accumulator: &Rc<RefCell<A>>) -> Option<usize> {
        let target = Rc::as_ptr(accumulator).cast::<()>();
        self.entries
            .iter()
            .position(|entry| Rc::as_ptr(entry).cast::<()>() == target)
    }
}
