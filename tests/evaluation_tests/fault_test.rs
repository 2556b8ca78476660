use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use modelflow::{
    Coroutine, Dist, Error, EvaluationConfig, EvaluationError, EvaluationState, Model,
    SamplingExecutor, StateArgs, Value, Yield,
};

use super::{hierarchical_model, setup_executor};

fn evaluation_fault(result: Result<(Value, EvaluationState), Error>) -> EvaluationError {
    match result {
        Err(Error::Evaluation(fault)) => fault,
        other => panic!("expected an evaluation error, got {:?}", other),
    }
}

#[test]
fn test_duplicate_variable_name() {
    let inner = Model::new("inner", |co| async move {
        co.sample(Dist::normal("x", 0.0, 1.0)?).await
    });
    let outer = Model::new("outer", move |co| {
        let inner = inner.clone();
        async move {
            co.call(&inner).await?;
            co.call(&inner).await
        }
    });

    let fault = evaluation_fault(setup_executor().sample(&outer));
    assert_eq!(
        fault,
        EvaluationError::DuplicateVariable {
            name: "outer/inner/x".to_string()
        }
    );
}

#[test]
fn test_observed_and_untransformed_conflict() {
    let result = setup_executor().evaluate_with_values(
        &hierarchical_model(),
        IndexMap::from([("model/y".to_string(), Value::Float(1.0))]),
        IndexMap::from([("model/y".to_string(), Some(Value::Float(2.0)))]),
    );
    let fault = evaluation_fault(result);
    assert!(fault.to_string().contains("model/y"));
    assert_eq!(
        fault,
        EvaluationError::ObservedWithUntransformedValue {
            name: "model/y".to_string()
        }
    );
}

#[test]
fn test_anonymous_distribution() {
    let model = Model::new("model", |co| async move {
        co.sample(Dist::normal("x", 0.0, 1.0)?.anonymous()).await
    });
    let fault = evaluation_fault(setup_executor().sample(&model));
    assert_eq!(fault, EvaluationError::AnonymousDistribution);
}

#[test]
fn test_silenced_fault_escalates() {
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let flag = cleaned_up.clone();
    let model = Model::new("model", move |co| {
        let flag = flag.clone();
        async move {
            if co
                .sample(Dist::normal("x", 0.0, 1.0)?.anonymous())
                .await
                .is_err()
            {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(Value::Null)
        }
    });

    match setup_executor().sample(&model) {
        Err(Error::SilentFailure(fault)) => {
            assert_eq!(fault, EvaluationError::AnonymousDistribution)
        }
        other => panic!("expected a silent failure, got {:?}", other),
    }
    // the body saw the fault before being terminated
    assert!(cleaned_up.load(Ordering::SeqCst));
}

#[test]
fn test_silenced_fault_then_yield_escalates() {
    let model = Model::new("model", |co| async move {
        let _ = co.sample(Dist::normal("x", 0.0, 1.0)?.anonymous()).await;
        co.sample(Dist::normal("y", 0.0, 1.0)?).await
    });
    let result = setup_executor().sample(&model);
    assert!(matches!(
        result,
        Err(Error::SilentFailure(EvaluationError::AnonymousDistribution))
    ));
}

#[test]
fn test_unprocessable_yield() {
    let model = Model::new("model", |co| async move {
        co.yield_(Yield::Value(Value::from("not a distribution")))
            .await
    });
    let fault = evaluation_fault(setup_executor().sample(&model));
    assert_eq!(
        fault,
        EvaluationError::UnprocessableYield {
            kind: "Value".to_string()
        }
    );
}

#[test]
fn test_conflicting_state_sources() {
    let args = StateArgs {
        values: Some(IndexMap::new()),
        ..StateArgs::default()
    };
    let result = setup_executor().evaluate(
        &hierarchical_model(),
        Some(EvaluationState::new()),
        args,
    );
    assert_eq!(
        evaluation_fault(result),
        EvaluationError::ConflictingStateSources
    );
}

#[test]
fn test_transformed_values_rejected() {
    let result = setup_executor().evaluate_with_values(
        &hierarchical_model(),
        IndexMap::from([("model/__log_sigma".to_string(), Value::Float(0.0))]),
        IndexMap::new(),
    );
    assert_eq!(
        evaluation_fault(result),
        EvaluationError::TransformedValuesPresent {
            names: vec!["model/__log_sigma".to_string()]
        }
    );
}

#[test]
fn test_unnamed_node_keeping_return() {
    let body = |co: modelflow::Co| async move { co.sample(Dist::normal("x", 0.0, 1.0)?).await };

    let fault = evaluation_fault(setup_executor().sample(&Model::anonymous(body)));
    assert_eq!(fault, EvaluationError::UnnamedReturnValue);

    let (value, state) = setup_executor()
        .sample(&Model::anonymous(body).keep_return(false))
        .unwrap();
    assert_eq!(state.value("x"), Some(&value));
}

#[test]
fn test_return_value_containing_model() {
    let leaked = Model::new("leaked", |_co| async move { Ok(Value::Null) });
    let model = Model::new("model", move |_co| {
        let leaked = leaked.clone();
        async move { Ok(Value::List(vec![Value::Float(1.0), Value::from(leaked)])) }
    });

    let fault = evaluation_fault(setup_executor().sample(&model));
    assert_eq!(fault, EvaluationError::ReturnContainsModel);

    let config = EvaluationConfig {
        validate_return_values: false,
        ..EvaluationConfig::seeded(1)
    };
    assert!(SamplingExecutor::from_config(config).sample(&model).is_ok());
}

#[test]
fn test_recursion_limit() {
    let leaf = Model::new("leaf", |co| async move {
        co.sample(Dist::normal("x", 0.0, 1.0)?).await
    });
    let middle = Model::new("middle", move |co| {
        let leaf = leaf.clone();
        async move { co.call(&leaf).await }
    });
    let root = Model::new("root", {
        let middle = middle.clone();
        move |co| {
            let middle = middle.clone();
            async move { co.call(&middle).await }
        }
    });

    let shallow = EvaluationConfig {
        max_depth: 2,
        ..EvaluationConfig::seeded(3)
    };
    let mut executor = SamplingExecutor::from_config(shallow);
    assert!(executor.sample(&middle).is_ok());
    assert_eq!(
        evaluation_fault(executor.sample(&root)),
        EvaluationError::RecursionLimit { limit: 2 }
    );
}

#[test]
fn test_model_error_propagates_unchanged() {
    let model = Model::new("model", |co| async move {
        co.sample(Dist::normal("x", 0.0, 1.0)?).await?;
        Err::<Value, _>(Error::model("diverged"))
    });
    match setup_executor().sample(&model) {
        Err(Error::Model(message)) => assert_eq!(message, "diverged"),
        other => panic!("expected a model error, got {:?}", other),
    }
}

#[test]
fn test_raw_flow_is_anonymous() {
    let flow = Coroutine::new(|co| async move {
        co.sample(Dist::normal("x", 0.0, 1.0)?).await
    });
    let (value, state) = setup_executor()
        .evaluate(flow, None, StateArgs::default())
        .unwrap();
    assert_eq!(state.untransformed_values.len(), 1);
    assert_eq!(state.value("x"), Some(&value));
}

#[test]
fn test_failed_evaluation_keeps_caller_state() {
    let model = Model::new("model", |co| async move {
        co.sample(Dist::normal("x", 0.0, 1.0)?).await?;
        co.sample(Dist::normal("y", 0.0, 1.0)?).await?;
        Err::<Value, _>(Error::model("diverged"))
    });
    let mut state = EvaluationState::from_values(
        Some(IndexMap::from([("model/x".to_string(), Value::Float(0.25))])),
        None,
    );

    let result = setup_executor().evaluate_in_place(&model, &mut state);
    assert!(matches!(result, Err(Error::Model(_))));
    assert_eq!(state.value("model/x"), Some(&Value::Float(0.25)));
    assert!(state.distributions.contains_key("model/x"));
    assert!(state.distributions.contains_key("model/y"));
    assert!(state.untransformed_values.contains_key("model/y"));
}
