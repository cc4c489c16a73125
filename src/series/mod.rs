//! Time series recording
//!
//! Stores every sample taken from an observable, in order, until cleared.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tauflow::observable::ObservableCell;
//! use tauflow::series::TimeSeries;
//!
//! let energy = Rc::new(ObservableCell::new(vec![1]));
//! let mut series = TimeSeries::new(energy, 10).unwrap();
//!
//! for e in [-1.0, -1.2, -0.9] {
//!     series.add(&[e]).unwrap();
//! }
//! assert_eq!(series.len(), 3);
//!
//! series.clear();
//! assert!(series.is_empty());
//! ```

mod recorder;

pub use recorder::TimeSeries;
