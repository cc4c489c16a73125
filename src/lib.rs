//! # Tauflow
//!
//! Online accumulators for simulation observables.
//!
//! Tauflow reduces a stream of sampled observable vectors into compact,
//! memory-bounded summaries while a simulation runs.
//!
//! ## Features
//!
//! - **Running Moments**: per-component mean, variance, and standard error
//! - **Time Series**: ordered record of every sample
//! - **Correlation**: multiple-tau correlator covering many decades of lag
//!   time in memory logarithmic in the longest lag
//! - **Auto-Update**: a registry that samples each accumulator at its own
//!   step interval
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tauflow::prelude::*;
//!
//! let velocity = Rc::new(ObservableCell::new(vec![3]));
//!
//! let config = CorrelatorConfig::new(10.0, 0.01).with_tau_lin(16);
//! let vacf = Rc::new(RefCell::new(
//!     Correlator::new(velocity.clone(), None, config, 1).unwrap(),
//! ));
//! let moments = Rc::new(RefCell::new(MeanVariance::new(velocity.clone(), 10).unwrap()));
//!
//! let mut auto_update = AutoUpdateAccumulators::new();
//! auto_update.add(vacf.clone()).unwrap();
//! auto_update.add(moments.clone()).unwrap();
//!
//! for step in 0..1000u64 {
//!     let t = step as f64 * 0.01;
//!     velocity.set(&[t.cos(), t.sin(), 0.0]).unwrap();
//!     auto_update.step(step).unwrap();
//! }
//!
//! vacf.borrow_mut().finalize();
//! let c = vacf.borrow().result();
//! println!("VACF at lag 0: {}", c[[0]]);
//! println!("Mean velocity: {}", moments.borrow().mean());
//! ```
//!
//! ## Feature Flags
//!
//! Accumulator families (all enabled by default):
//! - `statistics`: running mean and variance
//! - `series`: time series recording
//! - `correlation`: multiple-tau correlator
//!
//! Other features:
//! - `serde`: serialization of correlator configuration
//! - `full`: enable everything

#![cfg_attr(docsrs, feature(doc_cfg))]

// Core traits always available
pub mod observable;
pub mod schedule;
pub mod traits;

#[cfg(feature = "statistics")]
#[cfg_attr(docsrs, doc(cfg(feature = "statistics")))]
pub mod statistics;

#[cfg(feature = "series")]
#[cfg_attr(docsrs, doc(cfg(feature = "series")))]
pub mod series;

#[cfg(feature = "correlation")]
#[cfg_attr(docsrs, doc(cfg(feature = "correlation")))]
pub mod correlation;

pub mod prelude {
    pub use crate::observable::{Observable, ObservableCell, ObservableFn, ObservableRef};
    pub use crate::schedule::{AutoUpdateAccumulators, SharedAccumulator};
    pub use crate::traits::{Accumulator, AccumulatorBase, AccumulatorError};

    #[cfg(feature = "statistics")]
    pub use crate::statistics::MeanVariance;

    #[cfg(feature = "series")]
    pub use crate::series::TimeSeries;

    #[cfg(feature = "correlation")]
    pub use crate::correlation::{Compression, Correlator, CorrelatorConfig, Operation};
}

#[cfg(feature = "statistics")]
pub use statistics::MeanVariance;

#[cfg(feature = "series")]
pub use series::TimeSeries;

#[cfg(feature = "correlation")]
pub use correlation::{Correlator, CorrelatorConfig};

pub use schedule::AutoUpdateAccumulators;
