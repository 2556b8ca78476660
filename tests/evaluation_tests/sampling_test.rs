use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use modelflow::{
    evaluate_model, Dist, Distribution, EvaluationState, Family, Mixture, Model, Potential,
    Value,
};
use pretty_assertions::assert_eq;

use super::{counting_model, hierarchical_model, latent_model, setup_executor};

#[test]
fn test_one_distribution_per_variable() {
    let mut executor = setup_executor();
    let (value, state) = executor.sample(&latent_model()).unwrap();

    let names: Vec<&str> = state.distributions.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["latent/a", "latent/b", "latent/c"]);
    assert!(state.observed_values.is_empty());
    assert!(state.transformed_values.is_empty());
    // keep_return stores the node's value under its own name
    assert_eq!(state.untransformed_values.get("latent"), Some(&value));

    let expected: f64 = state
        .distributions
        .iter()
        .map(|(name, dist)| dist.log_prob(&state.untransformed_values[name]).unwrap())
        .sum();
    let total = state.collect_log_prob().unwrap();
    assert!((total - expected).abs() < 1e-12);
}

#[test]
fn test_observed_values_are_fed_back() {
    let mut executor = setup_executor();
    let (mu, state) = executor.sample(&hierarchical_model()).unwrap();

    assert_eq!(state.value("model/mu"), Some(&mu));
    assert_eq!(
        state.observed_values.get("model/y"),
        Some(&Some(Value::from(vec![0.1, -0.3, 0.4])))
    );
    assert!(!state.untransformed_values.contains_key("model/y"));
    assert!(state.collect_log_prob().unwrap().is_finite());
}

#[test]
fn test_supplied_values_are_reused() {
    let mut executor = setup_executor();
    let (first, sampled) = executor.sample(&latent_model()).unwrap();

    let supplied = EvaluationState::from_values(Some(sampled.untransformed_values.clone()), None);
    let (second, state_a) = executor
        .evaluate_with_state(&latent_model(), supplied.clone())
        .unwrap();
    let (third, state_b) = executor
        .evaluate_with_state(&latent_model(), supplied)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(state_a.untransformed_values, state_b.untransformed_values);
}

#[test]
fn test_posterior_predictive_sampling() {
    let mut executor = setup_executor();
    let (_, state) = executor
        .evaluate_with_values(
            &hierarchical_model(),
            IndexMap::new(),
            IndexMap::from([("model/y".to_string(), None)]),
        )
        .unwrap();

    assert!(!state.observed_values.contains_key("model/y"));
    match state.untransformed_values.get("model/y") {
        Some(Value::Float(_)) => {}
        other => panic!("expected a fresh scalar draw, got {:?}", other),
    }
}

#[test]
fn test_latent_override_of_observed_variable() {
    let mut executor = setup_executor();
    let (_, state) = executor
        .evaluate_with_values(
            &hierarchical_model(),
            IndexMap::from([("model/y".to_string(), Value::Float(2.5))]),
            IndexMap::from([("model/y".to_string(), None)]),
        )
        .unwrap();

    assert_eq!(state.untransformed_values.get("model/y"), Some(&Value::Float(2.5)));
    assert!(state.observed_values.is_empty());
}

#[test]
fn test_early_return_skips_body() {
    let runs = Arc::new(AtomicUsize::new(0));
    let model = counting_model("cached", runs.clone()).keep_auxiliary(false);
    let mut executor = setup_executor();

    let (value, state) = executor
        .evaluate_with_values(
            &model,
            IndexMap::from([("cached".to_string(), Value::Float(5.0))]),
            IndexMap::new(),
        )
        .unwrap();
    assert_eq!(value, Value::Float(5.0));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(state.distributions.is_empty());

    // without a known value the body runs as usual
    executor.sample(&model).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_keep_auxiliary_reenters_body() {
    let runs = Arc::new(AtomicUsize::new(0));
    let model = counting_model("cached", runs.clone());
    let mut executor = setup_executor();

    let (_, state) = executor
        .evaluate_with_values(
            &model,
            IndexMap::from([("cached".to_string(), Value::Float(5.0))]),
            IndexMap::new(),
        )
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(state.distributions.contains_key("cached/inner"));
}

#[test]
fn test_potentials_contribute_to_log_prob() {
    let model = Model::new("model", |co| async move {
        let x = co.sample(Dist::normal("x", 0.0, 1.0)?).await?;
        let fed_back = co.potential(-2.0).await?;
        Ok(Value::List(vec![x, fed_back]))
    });
    let mut executor = setup_executor();
    let (value, state) = executor.sample(&model).unwrap();

    let x = state.untransformed_values["model/x"].clone();
    assert_eq!(
        value,
        Value::List(vec![x.clone(), Value::Potential(Potential::new(-2.0))])
    );
    assert_eq!(state.potentials.len(), 1);

    let expected = state.distributions["model/x"].log_prob(&x).unwrap() - 2.0;
    assert!((state.collect_log_prob().unwrap() - expected).abs() < 1e-12);
}

#[test]
fn test_mixture_and_shaped_draws() {
    let model = Model::new("model", |co| async move {
        let components = vec![Family::normal(-2.0, 0.5)?, Family::normal(2.0, 0.5)?];
        let z = co
            .sample(Mixture::new("z", vec![1.0, 3.0], components)?)
            .await?;
        co.sample(Dist::normal("noise", 0.0, 1.0)?.with_shape(4))
            .await?;
        Ok(z)
    });
    let mut executor = setup_executor();
    let (_, state) = executor.sample(&model).unwrap();

    match state.value("model/noise") {
        Some(Value::List(items)) => assert_eq!(items.len(), 4),
        other => panic!("expected four draws, got {:?}", other),
    }
    assert_eq!(state.distributions["model/z"].kind(), "Mixture");
    assert!(state.collect_log_prob().unwrap().is_finite());
}

#[test]
fn test_evaluate_model_entry_point() {
    let (value, state) = evaluate_model(Dist::bernoulli("coin", 0.5).unwrap()).unwrap();
    assert!(matches!(value, Value::Integer(0) | Value::Integer(1)));
    assert_eq!(state.value("coin"), Some(&value));
}
