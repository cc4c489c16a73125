//! Running statistics over observable samples
//!
//! This module provides accumulators that summarize a stream of vector
//! samples in a single pass with memory bounded by the observable size.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tauflow::observable::ObservableCell;
//! use tauflow::statistics::MeanVariance;
//!
//! let velocity = Rc::new(ObservableCell::new(vec![3]));
//! let mut stats = MeanVariance::new(velocity, 1).unwrap();
//!
//! stats.add(&[1.0, 0.0, -1.0]).unwrap();
//! stats.add(&[3.0, 0.0, 1.0]).unwrap();
//!
//! println!("Mean: {}", stats.mean());
//! println!("Std error: {}", stats.std_error().unwrap());
//! ```

mod moments;

pub use moments::MeanVariance;
