//! Contract tests shared by every process model
//!
//! Each model must treat a missing control as the zero control, produce a
//! symmetric PSD covariance for any non-negative time step, and map noise
//! to states deterministically.

use approx::assert_relative_eq;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;

use robust_depth_filters_rs::common::linalg::{is_positive_definite, is_symmetric};
use robust_depth_filters_rs::{
    AugmentedProcessModel, DampedWienerProcess, DynProcessModel, FilterError,
    IntegratedDampedWienerProcess, Mappable, Moments, OcclusionProcessModel, ProcessModel,
    Sampleable,
};

const TIME_STEPS: [f64; 6] = [0.0, 1e-6, 0.01, 0.1, 1.0, 10.0];

fn models() -> Vec<(&'static str, DynProcessModel)> {
    vec![
        (
            "brownian",
            Box::new(DampedWienerProcess::brownian(3, 0.5).unwrap()),
        ),
        (
            "damped",
            Box::new(DampedWienerProcess::new(2, 1.5, 0.3).unwrap()),
        ),
        (
            "integrated",
            Box::new(IntegratedDampedWienerProcess::new(2, 0.0, 0.2).unwrap()),
        ),
        (
            "integrated_damped",
            Box::new(IntegratedDampedWienerProcess::new(3, 2.0, 0.4).unwrap()),
        ),
        (
            "occlusion",
            Box::new(OcclusionProcessModel::new(4, 0.1, 0.5, 1.0).unwrap()),
        ),
        (
            "augmented",
            Box::new(AugmentedProcessModel::new(
                DampedWienerProcess::new(2, 0.5, 0.1).unwrap(),
                OcclusionProcessModel::new(3, 0.2, 0.1, 1.0).unwrap(),
            )),
        ),
    ]
}

fn test_state(dimension: usize) -> DVector<f64> {
    DVector::from_fn(dimension, |i, _| 0.3 * i as f64 - 0.5)
}

#[test]
fn test_missing_control_equals_zero_control() {
    for (name, model) in models() {
        let state = test_state(model.state_dimension());
        let zero = DVector::zeros(model.control_size());
        for &dt in &TIME_STEPS {
            let implicit = model.conditionals(dt, &state, None).unwrap();
            let explicit = model.conditionals(dt, &state, Some(&zero)).unwrap();
            assert_eq!(implicit, explicit, "{} at dt = {}", name, dt);
        }
    }
}

#[test]
fn test_conditional_covariance_is_symmetric_psd() {
    for (name, model) in models() {
        let state = test_state(model.state_dimension());
        for &dt in &TIME_STEPS {
            let next = model.conditionals(dt, &state, None).unwrap();
            let dense = next.covariance().to_dense();
            assert!(is_symmetric(&dense), "{} at dt = {}", name, dt);
            // positive definite after a tiny jitter means PSD
            let jittered =
                &dense + nalgebra::DMatrix::<f64>::identity(dense.nrows(), dense.ncols()) * 1e-12;
            assert!(is_positive_definite(&jittered), "{} at dt = {}", name, dt);
        }
    }
}

#[test]
fn test_zero_time_step_is_identity() {
    for (name, model) in models() {
        if name == "augmented" || name == "occlusion" {
            continue;
        }
        let state = test_state(model.state_dimension());
        let control = DVector::from_element(model.control_size(), 1.0);
        let next = model.conditionals(0.0, &state, Some(&control)).unwrap();
        for i in 0..state.len() {
            assert_relative_eq!(next.mean()[i], state[i], epsilon = 1e-12);
        }
        assert_relative_eq!(next.covariance().diagonal().amax(), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_noise_map_is_deterministic_and_affine() {
    for (name, model) in models() {
        let state = test_state(model.state_dimension());
        let next = model.conditionals(0.1, &state, None).unwrap();
        let n = next.randoms_size();
        let noise = DVector::from_fn(n, |i, _| (i as f64 * 0.7).sin());

        let first = next.map_standard_normal(&noise).unwrap();
        let second = next.map_standard_normal(&noise).unwrap();
        assert_eq!(first, second, "{}", name);

        // x(ε) - μ is linear in ε
        let doubled = next.map_standard_normal(&(&noise * 2.0)).unwrap();
        let expected = next.mean() + (&first - next.mean()) * 2.0;
        for i in 0..n {
            assert_relative_eq!(doubled[i], expected[i], epsilon = 1e-10);
        }

        let zero = next.map_standard_normal(&DVector::zeros(n)).unwrap();
        assert_eq!(&zero, next.mean(), "{}", name);
    }
}

#[test]
fn test_sample_statistics_match_conditional() {
    let model = IntegratedDampedWienerProcess::new(1, 0.5, 1.0).unwrap();
    let state = DVector::from_vec(vec![1.0, -0.5]);
    let next = model.conditionals(0.5, &state, None).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    let count = 20_000;
    let samples: Vec<DVector<f64>> = (0..count)
        .map(|_| next.sample(&mut rng).unwrap())
        .collect();
    let mean = samples
        .iter()
        .fold(DVector::zeros(2), |acc, s| acc + s)
        / count as f64;
    let mut covariance = nalgebra::DMatrix::zeros(2, 2);
    for s in &samples {
        let d = s - &mean;
        covariance += &d * d.transpose();
    }
    covariance /= (count - 1) as f64;

    let expected = next.covariance().to_dense();
    for i in 0..2 {
        assert_relative_eq!(mean[i], next.mean()[i], epsilon = 0.02);
        for j in 0..2 {
            assert_relative_eq!(covariance[(i, j)], expected[(i, j)], epsilon = 0.01);
        }
    }
}

#[test]
fn test_invalid_inputs_rejected() {
    for (name, model) in models() {
        let state = test_state(model.state_dimension());

        let err = model.conditionals(-0.1, &state, None).unwrap_err();
        assert!(matches!(err, FilterError::Configuration { .. }), "{}", name);
        let err = model.conditionals(f64::NAN, &state, None).unwrap_err();
        assert!(matches!(err, FilterError::Configuration { .. }), "{}", name);

        let short = DVector::zeros(model.state_dimension() + 1);
        let err = model.conditionals(0.1, &short, None).unwrap_err();
        assert!(matches!(err, FilterError::DimensionMismatch { .. }), "{}", name);

        let control = DVector::zeros(model.control_size() + 1);
        let err = model.conditionals(0.1, &state, Some(&control)).unwrap_err();
        assert!(matches!(err, FilterError::DimensionMismatch { .. }), "{}", name);
    }
}

#[test]
fn test_damped_process_decays_towards_zero() {
    let model = DampedWienerProcess::new(1, 2.0, 0.1).unwrap();
    let state = DVector::from_element(1, 1.0);
    let short = model.conditionals(0.1, &state, None).unwrap();
    let long = model.conditionals(5.0, &state, None).unwrap();
    assert_relative_eq!(short.mean()[0], (-0.2f64).exp(), epsilon = 1e-12);
    assert!(long.mean()[0] < 1e-4);
    // stationary variance σ²/(2γ)
    assert_relative_eq!(
        long.covariance().diagonal()[0],
        0.01 / 4.0,
        epsilon = 1e-8
    );
}

#[test]
fn test_occlusion_latents_revert_to_prior() {
    let model = OcclusionProcessModel::new(2, 0.1, 1.0, 0.5).unwrap();
    let means = DVector::from_vec(vec![4.0, -4.0]);
    let variances = DVector::from_vec(vec![0.01, 0.01]);
    let (next_means, next_variances) = model.propagate_moments(50.0, &means, &variances).unwrap();
    for i in 0..2 {
        assert_relative_eq!(next_means[i], model.prior_logit(), epsilon = 1e-9);
        // stationary variance σ²/(2λ)
        assert_relative_eq!(next_variances[i], 0.125, epsilon = 1e-9);
    }
}
