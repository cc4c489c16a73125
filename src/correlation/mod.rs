//! Time correlation functions
//!
//! This module provides the multiple-tau correlator, which estimates
//! correlation functions over lag times spanning many decades with memory
//! logarithmic in the longest lag.
//!
//! # Operations
//!
//! - `scalar_product`: `C = sum_i A_i B_i`
//! - `componentwise_product`: `C_i = A_i B_i`
//! - `square_distance_componentwise`: `C_i = (A_i - B_i)^2`
//! - `tensor_product`: `C_{i * len_B + j} = A_i B_j`
//! - `fcs_acf`: `C_i = exp(-dx_i^2 / w_x^2 - dy_i^2 / w_y^2 - dz_i^2 / w_z^2)`
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tauflow::correlation::{Correlator, CorrelatorConfig, Operation};
//! use tauflow::observable::ObservableCell;
//!
//! // Mean square displacement of one particle
//! let position = Rc::new(ObservableCell::new(vec![1, 3]));
//! let config = CorrelatorConfig::new(50.0, 0.01)
//!     .with_tau_lin(16)
//!     .with_operation(Operation::SquareDistanceComponentwise);
//! let mut msd = Correlator::new(position.clone(), None, config, 10).unwrap();
//!
//! for step in 0..100 {
//!     let x = step as f64 * 0.1;
//!     position.set(&[x, 0.0, -x]).unwrap();
//!     msd.add(&[x, 0.0, -x]).unwrap();
//! }
//! msd.finalize();
//!
//! assert_eq!(msd.result().shape(), &[msd.n_lags(), 3]);
//! ```

mod config;
mod correlator;
mod kernels;
mod level;

pub use config::{Compression, CorrelatorConfig, Operation};
pub use correlator::Correlator;
