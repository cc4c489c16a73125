//! Correctness and invariant tests for tauflow
//!
//! These tests drive the accumulators through the public API the way a
//! simulation loop does, and check properties that must hold for any input.
//! They complement the unit tests in each module.
//!
//! Run with: cargo test --test correctness

use std::cell::RefCell;
use std::rc::Rc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::Axis;
use proptest::prelude::*;

use tauflow::correlation::{Compression, Correlator, CorrelatorConfig, Operation};
use tauflow::observable::{ObservableCell, ObservableRef};
use tauflow::schedule::AutoUpdateAccumulators;
use tauflow::series::TimeSeries;
use tauflow::statistics::MeanVariance;
use tauflow::traits::{Accumulator, AccumulatorError};

fn scalar_cell() -> Rc<ObservableCell> {
    Rc::new(ObservableCell::new(vec![1]))
}

// ============================================================================
// Running Moments
// ============================================================================

mod statistics {
    use super::*;

    #[test]
    fn matches_two_pass_on_vector_observable() {
        let obs = Rc::new(ObservableCell::new(vec![2]));
        let mut stats = MeanVariance::new(obs.clone(), 1).unwrap();

        let samples = [[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        for s in &samples {
            obs.set(s).unwrap();
            stats.update().unwrap();
        }

        let mean = stats.mean();
        let var = stats.variance().unwrap();
        let err = stats.std_error().unwrap();

        assert_eq!(mean.shape(), &[2]);
        assert_relative_eq!(mean[[0]], 2.5);
        assert_relative_eq!(mean[[1]], 25.0);
        assert_relative_eq!(var[[0]], 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(var[[1]], 500.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(err[[0]], (5.0f64 / 12.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn variance_needs_two_samples() {
        let mut stats = MeanVariance::new(scalar_cell(), 1).unwrap();
        assert_eq!(
            stats.variance(),
            Err(AccumulatorError::InsufficientSamples {
                required: 2,
                available: 0
            })
        );

        stats.add(&[1.0]).unwrap();
        assert!(matches!(
            stats.std_error(),
            Err(AccumulatorError::InsufficientSamples { available: 1, .. })
        ));
    }

    #[test]
    fn wrong_length_sample_leaves_state_untouched() {
        let obs = Rc::new(ObservableCell::new(vec![3]));
        let mut stats = MeanVariance::new(obs, 1).unwrap();
        stats.add(&[1.0, 2.0, 3.0]).unwrap();

        assert!(matches!(
            stats.add(&[1.0, 2.0]),
            Err(AccumulatorError::ShapeMismatch { expected: 3, found: 2 })
        ));
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.n_updates(), 1);
    }

    #[test]
    fn tensor_shaped_observable_keeps_its_shape() {
        let obs = Rc::new(ObservableCell::new(vec![2, 3]));
        let stats = MeanVariance::new(obs, 1).unwrap();

        assert_eq!(stats.shape(), vec![2, 3]);
        assert_eq!(stats.mean().shape(), &[2, 3]);
    }
}

// ============================================================================
// Time Series
// ============================================================================

mod series {
    use super::*;

    #[test]
    fn records_in_order_with_leading_sample_axis() {
        let obs = Rc::new(ObservableCell::new(vec![2]));
        let mut series = TimeSeries::new(obs.clone(), 1).unwrap();

        for t in 0..5 {
            obs.set(&[t as f64, -(t as f64)]).unwrap();
            series.update().unwrap();
        }

        assert_eq!(series.shape(), vec![5, 2]);
        let view = series.time_series();
        assert_eq!(view.dim(), (5, 2));
        assert_eq!(view.column(0).to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(view[[3, 1]], -3.0);
    }

    #[test]
    fn clear_keeps_configuration() {
        let obs = scalar_cell();
        let mut series = TimeSeries::new(obs, 4).unwrap();
        series.add(&[1.0]).unwrap();
        series.clear();

        assert!(series.is_empty());
        assert_eq!(series.delta_n(), 4);
        assert_eq!(series.shape(), vec![0, 1]);
    }
}

// ============================================================================
// Multiple-Tau Correlator
// ============================================================================

mod correlation {
    use super::*;

    fn autocorrelator(config: CorrelatorConfig) -> Correlator {
        Correlator::new(scalar_cell(), None, config, 1).unwrap()
    }

    #[test]
    fn alternating_sequence_end_to_end() {
        let obs = scalar_cell();
        let config = CorrelatorConfig::new(10.0, 1.0).with_tau_lin(2);
        let corr = Rc::new(RefCell::new(
            Correlator::new(obs.clone(), None, config, 1).unwrap(),
        ));
        let mut auto_update = AutoUpdateAccumulators::new();
        auto_update.add(corr.clone()).unwrap();

        for (step, v) in [1.0, 2.0, 1.0, 2.0, 1.0, 2.0].into_iter().enumerate() {
            obs.set_scalar(v).unwrap();
            auto_update.step(step as u64).unwrap();
        }

        let corr = corr.borrow();
        let c = corr.result();
        let tau = corr.lag_times();
        assert_eq!(tau[0], 0.0);
        assert_eq!(tau[1], 1.0);
        assert_relative_eq!(c[[0]], 2.5);
        assert_relative_eq!(c[[1]], 2.0);
        assert_eq!(&corr.sample_sizes()[..2], &[6, 5]);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut corr = autocorrelator(CorrelatorConfig::new(40.0, 1.0).with_tau_lin(4));
        for t in 0..37 {
            corr.add(&[(t as f64 * 0.3).cos()]).unwrap();
        }

        corr.finalize();
        let sizes = corr.sample_sizes();
        let result = corr.result();

        corr.finalize();
        assert!(corr.is_finalized());
        assert_eq!(corr.sample_sizes(), sizes);
        for (x, y) in corr.result().iter().zip(result.iter()) {
            assert!(x == y || (x.is_nan() && y.is_nan()));
        }
    }

    #[test]
    fn finalized_correlator_rejects_samples() {
        let mut corr = autocorrelator(CorrelatorConfig::new(4.0, 1.0).with_tau_lin(2));
        corr.add(&[1.0]).unwrap();
        corr.finalize();
        assert_eq!(corr.add(&[1.0]), Err(AccumulatorError::Finalized));
    }

    #[test]
    fn odd_tau_lin_rejected() {
        let err = Correlator::new(
            scalar_cell(),
            None,
            CorrelatorConfig::new(10.0, 1.0).with_tau_lin(3),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, AccumulatorError::Configuration(_)));
    }

    #[test]
    fn invalid_configuration_rejected() {
        let bad = [
            CorrelatorConfig::new(0.0, 1.0),
            CorrelatorConfig::new(10.0, -1.0),
            CorrelatorConfig::new(10.0, 1.0).with_tau_lin(0),
        ];
        for config in bad {
            assert!(matches!(
                Correlator::new(scalar_cell(), None, config, 1),
                Err(AccumulatorError::Configuration(_))
            ));
        }
    }

    #[test]
    fn constant_signal_is_flat() {
        let mut corr = autocorrelator(CorrelatorConfig::new(100.0, 1.0).with_tau_lin(8));
        for _ in 0..500 {
            corr.add(&[3.0]).unwrap();
        }
        corr.finalize();

        for &c in corr.result().iter() {
            assert_relative_eq!(c, 9.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn linear_motion_msd() {
        let obs = Rc::new(ObservableCell::new(vec![3]));
        let config = CorrelatorConfig::new(64.0, 1.0)
            .with_tau_lin(8)
            .with_operation(Operation::SquareDistanceComponentwise)
            .with_compression(Compression::Discard1);
        let mut msd = Correlator::new(obs, None, config, 1).unwrap();

        for t in 0..256 {
            let x = t as f64;
            msd.add(&[x, 2.0 * x, 0.0]).unwrap();
        }

        // Positions stay exact under discarding, so MSD_x(tau) = tau^2
        let c = msd.result();
        for (row, tau) in msd.lag_times().into_iter().enumerate() {
            assert_abs_diff_eq!(c[[row, 0]], tau * tau, epsilon = 1e-9);
            assert_abs_diff_eq!(c[[row, 1]], 4.0 * tau * tau, epsilon = 1e-9);
            assert_abs_diff_eq!(c[[row, 2]], 0.0);
        }
    }

    #[test]
    fn fcs_acf_at_zero_lag_is_one() {
        let obs = Rc::new(ObservableCell::new(vec![2, 3]));
        let config = CorrelatorConfig::new(10.0, 1.0)
            .with_tau_lin(4)
            .with_operation(Operation::FcsAcf)
            .with_args([1.0, 1.0, 4.0]);
        let mut corr = Correlator::new(obs, None, config, 1).unwrap();

        corr.add(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
        corr.add(&[1.0, 0.0, 2.0, 1.0, 1.0, 1.0]).unwrap();

        let c = corr.result();
        assert_eq!(c.shape(), &[corr.n_lags(), 2]);
        assert_relative_eq!(c[[0, 0]], 1.0);
        assert_relative_eq!(c[[0, 1]], 1.0);
        // First particle moved by (1, 0, 2): exp(-(1 + 0 + 4 / 4))
        assert_relative_eq!(c[[1, 0]], (-2.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(c[[1, 1]], 1.0);
    }

    #[test]
    fn cross_correlation_of_distinct_observables() {
        let a = Rc::new(ObservableCell::new(vec![2]));
        let b = Rc::new(ObservableCell::new(vec![3]));
        let b_ref: ObservableRef = b.clone();
        let config = CorrelatorConfig::new(2.0, 1.0)
            .with_tau_lin(4)
            .with_operation(Operation::TensorProduct);
        let mut corr = Correlator::new(a.clone(), Some(b_ref), config, 1).unwrap();

        a.set(&[1.0, 2.0]).unwrap();
        b.set(&[1.0, 10.0, 100.0]).unwrap();
        corr.update().unwrap();

        let c = corr.result();
        assert_eq!(c.shape(), &[3, 6]);
        assert_eq!(
            c.index_axis(Axis(0), 0).iter().copied().collect::<Vec<_>>(),
            vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0]
        );
        assert!(c[[1, 0]].is_nan());
    }

    #[test]
    fn per_stream_compression_through_scheduler() {
        let a = scalar_cell();
        let b = scalar_cell();
        let b_ref: ObservableRef = b.clone();
        let config = CorrelatorConfig::new(3.0, 1.0)
            .with_tau_lin(2)
            .with_compression(Compression::Discard1)
            .with_compression2(Compression::Linear);
        let corr = Rc::new(RefCell::new(
            Correlator::new(a.clone(), Some(b_ref), config, 1).unwrap(),
        ));
        let mut auto_update = AutoUpdateAccumulators::new();
        auto_update.add(corr.clone()).unwrap();

        for step in 0..8u64 {
            a.set_scalar(step as f64).unwrap();
            b.set_scalar(10.0 * step as f64).unwrap();
            auto_update.step(step).unwrap();
        }

        // Level 1 holds A = 1, 3, 5, 7 (newer kept) and B = 5, 25, 45, 65 (averaged)
        let corr = corr.borrow();
        assert_eq!(corr.lag_times(), vec![0.0, 1.0, 2.0]);
        assert_relative_eq!(
            corr.result()[[2]],
            (25.0 + 3.0 * 45.0 + 5.0 * 65.0) / 3.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(corr.mean_b()[[0]], 35.0);
    }

    #[test]
    fn sampling_interval_scales_lag_times() {
        let config = CorrelatorConfig::new(1.0, 0.01).with_tau_lin(4);
        let corr = Correlator::new(scalar_cell(), None, config, 10).unwrap();

        assert_relative_eq!(corr.dt(), 0.1);
        let tau = corr.lag_times();
        assert_relative_eq!(*tau.last().unwrap(), 0.8, epsilon = 1e-12);
        assert!(tau.iter().all(|&t| t <= corr.tau_max() + 1e-12));
    }
}

// ============================================================================
// Auto-Update Registry
// ============================================================================

mod schedule {
    use super::*;

    #[test]
    fn mixed_accumulators_share_one_loop() {
        let obs = scalar_cell();
        let stats = Rc::new(RefCell::new(MeanVariance::new(obs.clone(), 2).unwrap()));
        let series = Rc::new(RefCell::new(TimeSeries::new(obs.clone(), 5).unwrap()));

        let mut auto_update = AutoUpdateAccumulators::new();
        auto_update.add(stats.clone()).unwrap();
        auto_update.add(series.clone()).unwrap();

        for step in 0..10u64 {
            obs.set_scalar(step as f64).unwrap();
            auto_update.step(step).unwrap();
        }

        // Steps 0, 2, 4, 6, 8
        assert_eq!(stats.borrow().count(), 5);
        assert_relative_eq!(stats.borrow().mean()[[0]], 4.0);
        // Steps 0, 5
        assert_eq!(
            series.borrow().time_series().column(0).to_vec(),
            vec![0.0, 5.0]
        );
    }

    #[test]
    fn delta_n_change_takes_effect_on_next_step() {
        let obs = scalar_cell();
        let series = Rc::new(RefCell::new(TimeSeries::new(obs.clone(), 1).unwrap()));
        let mut auto_update = AutoUpdateAccumulators::new();
        auto_update.add(series.clone()).unwrap();

        auto_update.step(0).unwrap();
        series.borrow_mut().set_delta_n(3).unwrap();
        assert_eq!(auto_update.next_update(1), Some(2));
        for step in 1..7 {
            auto_update.step(step).unwrap();
        }

        // Steps 0, 3, 6
        assert_eq!(series.borrow().len(), 3);
        assert!(matches!(
            series.borrow_mut().set_delta_n(0),
            Err(AccumulatorError::Configuration(_))
        ));
        assert_eq!(series.borrow().delta_n(), 3);
    }

    #[test]
    fn removed_accumulator_stops_updating() {
        let obs = scalar_cell();
        let series = Rc::new(RefCell::new(TimeSeries::new(obs.clone(), 1).unwrap()));
        let mut auto_update = AutoUpdateAccumulators::new();
        auto_update.add(series.clone()).unwrap();

        auto_update.step(0).unwrap();
        auto_update.remove(&series).unwrap();
        auto_update.step(1).unwrap();

        assert_eq!(series.borrow().len(), 1);
        assert_eq!(
            auto_update.remove(&series),
            Err(AccumulatorError::NotRegistered)
        );
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn welford_matches_two_pass(values in prop::collection::vec(-1e3f64..1e3, 2..64)) {
        let mut stats = MeanVariance::new(scalar_cell(), 1).unwrap();
        for &v in &values {
            stats.add(&[v]).unwrap();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert_abs_diff_eq!(stats.mean()[[0]], mean, epsilon = 1e-9);
        assert_relative_eq!(stats.variance().unwrap()[[0]], var, epsilon = 1e-7, max_relative = 1e-9);
    }

    #[test]
    fn sample_sizes_non_increasing(
        half_tau_lin in 1usize..8,
        tau_max in 1.0f64..500.0,
        n in 0usize..300,
        finalize in any::<bool>(),
    ) {
        let config = CorrelatorConfig::new(tau_max, 1.0).with_tau_lin(2 * half_tau_lin);
        let mut corr = Correlator::new(scalar_cell(), None, config, 1).unwrap();
        for t in 0..n {
            corr.add(&[t as f64]).unwrap();
        }
        if finalize {
            corr.finalize();
        }

        let sizes = corr.sample_sizes();
        prop_assert_eq!(sizes[0], n as u64);
        for pair in sizes.windows(2) {
            prop_assert!(pair[0] >= pair[1], "sizes increase: {:?}", sizes);
        }
    }

    #[test]
    fn lag_times_strictly_increasing(
        half_tau_lin in 1usize..16,
        tau_max in 0.5f64..1e4,
        time_step in 0.001f64..1.0,
    ) {
        let config = CorrelatorConfig::new(tau_max, time_step).with_tau_lin(2 * half_tau_lin);
        let corr = Correlator::new(scalar_cell(), None, config, 1).unwrap();

        let tau = corr.lag_times();
        prop_assert_eq!(tau[0], 0.0);
        prop_assert_eq!(tau.len(), corr.result().shape()[0]);
        prop_assert_eq!(tau.len(), corr.n_lags());
        for pair in tau.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        prop_assert!(*tau.last().unwrap() <= tau_max * (1.0 + 1e-9) + 1e-9);
    }

    #[test]
    fn zero_lag_autocorrelation_is_mean_square(
        samples in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 3), 1..100),
    ) {
        let obs = Rc::new(ObservableCell::new(vec![3]));
        let config = CorrelatorConfig::new(50.0, 1.0).with_tau_lin(4);
        let mut corr = Correlator::new(obs, None, config, 1).unwrap();
        for s in &samples {
            corr.add(s).unwrap();
        }

        let expected = samples
            .iter()
            .map(|s| s.iter().map(|x| x * x).sum::<f64>())
            .sum::<f64>()
            / samples.len() as f64;
        assert_relative_eq!(corr.result()[[0]], expected, epsilon = 1e-9, max_relative = 1e-12);
    }
}
