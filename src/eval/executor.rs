use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::coroutine::{ControlFlow, SingleYield, Step, Yield};
use super::model::{Evaluable, Model, ModelInfo};
use super::scope::ScopeStack;
use super::state::EvaluationState;
use crate::config::EvaluationConfig;
use crate::distribution::Distribution;
use crate::value::Value;
use crate::{Error, ModelResult};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Attempting to create an anonymous distribution")]
    AnonymousDistribution,
    #[error(
        "Attempting to create a duplicate variable {name:?}. This happens when the same \
         model or function is called twice without a fresh name scope; wrap it in a named \
         model so each call gets its own name"
    )]
    DuplicateVariable { name: String },
    #[error(
        "Attempting to evaluate a model with both an observed and an unobserved value for \
         {name:?}. Either mark it latent with an observed entry of `None` for {name:?} or \
         remove {name:?} from the untransformed values"
    )]
    ObservedWithUntransformedValue { name: String },
    #[error("Yielded item of type {kind} can't be processed in evaluation")]
    UnprocessableYield { kind: String },
    #[error("Attempting to create an unnamed return variable while keep_return is set")]
    UnnamedReturnValue,
    #[error("Return values should not contain model nodes")]
    ReturnContainsModel,
    #[error("Provided state construction arguments along with an existing state")]
    ConflictingStateSources,
    #[error("Sampling evaluation does not accept transformed values, but found {names:?}")]
    TransformedValuesPresent { names: Vec<String> },
    #[error("Model nesting exceeds the configured limit of {limit}")]
    RecursionLimit { limit: usize },
    #[error("Computation was resumed after it finished")]
    ComputationFinished,
    #[error("Computation suspended on something other than a yield")]
    SuspendedWithoutYield,
    #[error("Computation yielded again before its previous yield was resolved")]
    ConcurrentYield,
}

/// Inputs for building a fresh state.
#[derive(Debug, Clone, Default)]
pub struct StateArgs {
    pub state: Option<EvaluationState>,
    pub values: Option<IndexMap<String, Value>>,
    pub observed: Option<IndexMap<String, Option<Value>>>,
}

impl StateArgs {
    pub fn from_values(
        values: IndexMap<String, Value>,
        observed: IndexMap<String, Option<Value>>,
    ) -> Self {
        Self {
            state: None,
            values: Some(values),
            observed: Some(observed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.values.is_none() && self.observed.is_none()
    }
}

/// Result of preparing a model node for evaluation.
pub enum Prepared {
    Flow(Box<dyn ControlFlow>),
    /// The node's value is already known; skip its body entirely.
    EarlyReturn(Value),
}

/// How yielded distributions become values. The executor's loop is shared;
/// policies only decide what happens at each hook.
pub trait ExecutionPolicy {
    fn new_state(&mut self, args: StateArgs) -> ModelResult<EvaluationState>;

    fn validate_state(&self, state: &EvaluationState) -> ModelResult<()>;

    /// Rewrites a yielded distribution before resolution. `None` resumes the
    /// computation with [`Value::Null`].
    fn modify_distribution(
        &mut self,
        dist: Arc<dyn Distribution>,
        info: &ModelInfo,
        state: &EvaluationState,
    ) -> ModelResult<Option<Yield>>;

    fn proceed_distribution(
        &mut self,
        dist: &Arc<dyn Distribution>,
        info: &ModelInfo,
        scopes: &ScopeStack,
        state: &mut EvaluationState,
    ) -> ModelResult<Value>;

    fn prepare_model_control_flow(
        &mut self,
        model: &Model,
        scopes: &ScopeStack,
        state: &EvaluationState,
    ) -> ModelResult<Prepared>;

    fn finalize_control_flow(
        &mut self,
        return_value: Value,
        info: &ModelInfo,
        scopes: &ScopeStack,
        state: &mut EvaluationState,
    ) -> ModelResult<Value>;
}

enum Advance {
    Resume(Value),
    Finished(Value),
}

/// Drives model graphs to completion under an [`ExecutionPolicy`].
pub struct Executor<P: ExecutionPolicy> {
    policy: P,
    scopes: ScopeStack,
    config: EvaluationConfig,
    depth: usize,
}

impl<P: ExecutionPolicy> Executor<P> {
    pub fn new(policy: P) -> Self {
        Self::with_config(policy, EvaluationConfig::default())
    }

    pub fn with_config(policy: P, config: EvaluationConfig) -> Self {
        Self {
            policy,
            scopes: ScopeStack::new(),
            config,
            depth: 0,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluates `model` against `state`, or against a state built from
    /// `args` when no state is given. Supplying both is an error.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn evaluate(
        &mut self,
        model: impl Into<Evaluable>,
        state: Option<EvaluationState>,
        args: StateArgs,
    ) -> ModelResult<(Value, EvaluationState)> {
        let mut state = match state {
            None => self.policy.new_state(args)?,
            Some(_) if !args.is_empty() => {
                return Err(EvaluationError::ConflictingStateSources.into());
            }
            Some(state) => state,
        };
        let value = self.evaluate_in_place(model, &mut state)?;
        Ok((value, state))
    }

    /// Evaluates `model` against a caller-owned state. On failure the state
    /// keeps every value resolved before the fault.
    pub fn evaluate_in_place(
        &mut self,
        model: impl Into<Evaluable>,
        state: &mut EvaluationState,
    ) -> ModelResult<Value> {
        self.policy.validate_state(state)?;

        self.scopes = ScopeStack::new();
        self.depth = 0;
        let value = self.evaluate_nested(model.into(), state)?;
        debug!(
            distributions = state.distributions.len(),
            potentials = state.potentials.len(),
            "evaluation finished"
        );
        Ok(value)
    }

    /// Evaluates with a fresh state and no supplied values.
    pub fn sample(
        &mut self,
        model: impl Into<Evaluable>,
    ) -> ModelResult<(Value, EvaluationState)> {
        self.evaluate(model, None, StateArgs::default())
    }

    pub fn evaluate_with_state(
        &mut self,
        model: impl Into<Evaluable>,
        state: EvaluationState,
    ) -> ModelResult<(Value, EvaluationState)> {
        self.evaluate(model, Some(state), StateArgs::default())
    }

    pub fn evaluate_with_values(
        &mut self,
        model: impl Into<Evaluable>,
        values: IndexMap<String, Value>,
        observed: IndexMap<String, Option<Value>>,
    ) -> ModelResult<(Value, EvaluationState)> {
        self.evaluate(model, None, StateArgs::from_values(values, observed))
    }

    fn evaluate_nested(
        &mut self,
        model: Evaluable,
        state: &mut EvaluationState,
    ) -> ModelResult<Value> {
        if self.depth >= self.config.max_depth {
            return Err(EvaluationError::RecursionLimit {
                limit: self.config.max_depth,
            }
            .into());
        }

        let (flow, info): (Box<dyn ControlFlow>, ModelInfo) = match model {
            Evaluable::Distribution(dist) => {
                // evaluated in an anonymous scope so the variable keeps its own name
                (Box::new(SingleYield::new(dist)), ModelInfo::default())
            }
            Evaluable::Model(model) => {
                match self
                    .policy
                    .prepare_model_control_flow(&model, &self.scopes, state)?
                {
                    Prepared::Flow(flow) => (flow, model.info().clone()),
                    Prepared::EarlyReturn(value) => {
                        debug!(model = ?model.name(), "early return");
                        return Ok(value);
                    }
                }
            }
            Evaluable::Flow(flow) => (flow, ModelInfo::default()),
        };

        self.depth += 1;
        let result = self.drive(flow, &info, state);
        self.depth -= 1;
        result
    }

    fn drive(
        &mut self,
        mut flow: Box<dyn ControlFlow>,
        info: &ModelInfo,
        state: &mut EvaluationState,
    ) -> ModelResult<Value> {
        let mut input = Value::Null;
        let returned = loop {
            self.scopes.push_scope(info.name());
            let advanced = self.advance(flow.as_mut(), input, info, state);
            self.scopes.pop_scope();
            match advanced {
                Ok(Advance::Resume(next)) => input = next,
                Ok(Advance::Finished(value)) => break value,
                Err(error) => {
                    flow.terminate();
                    return Err(error);
                }
            }
        };

        if self.config.validate_return_values && returned.contains_model() {
            return Err(EvaluationError::ReturnContainsModel.into());
        }
        self.policy
            .finalize_control_flow(returned, info, &self.scopes, state)
    }

    fn advance(
        &mut self,
        flow: &mut dyn ControlFlow,
        input: Value,
        info: &ModelInfo,
        state: &mut EvaluationState,
    ) -> ModelResult<Advance> {
        let item = match flow.resume(input) {
            Step::Yielded(item) => item,
            Step::Done(value) => return Ok(Advance::Finished(value)),
            Step::Escaped(error) => return Err(error),
        };
        trace!(kind = %item, scope = %self.scopes.prefix(), "yielded");

        let item = match item {
            Yield::Distribution(dist) => self.policy.modify_distribution(dist, info, state)?,
            other => Some(other),
        };
        match item {
            None => Ok(Advance::Resume(Value::Null)),
            Some(Yield::Potential(potential)) => {
                state.potentials.push(potential);
                Ok(Advance::Resume(Value::Potential(potential)))
            }
            Some(Yield::Distribution(dist)) => {
                match self
                    .policy
                    .proceed_distribution(&dist, info, &self.scopes, state)
                {
                    Ok(value) => Ok(Advance::Resume(value)),
                    Err(Error::Evaluation(fault)) => Err(inject_fault(flow, fault)),
                    Err(error) => Err(error),
                }
            }
            Some(Yield::Model(model)) => self
                .evaluate_nested(Evaluable::Model(model), state)
                .map(Advance::Resume),
            Some(Yield::Flow(nested)) => self
                .evaluate_nested(Evaluable::Flow(nested), state)
                .map(Advance::Resume),
            Some(other @ Yield::Value(_)) => {
                let fault = EvaluationError::UnprocessableYield {
                    kind: other.to_string(),
                };
                Err(inject_fault(flow, fault))
            }
        }
    }
}

/// Raises `fault` inside `flow` so it can clean up, and returns the error to
/// propagate. A computation that swallows the fault is terminated and the
/// fault escalates to [`Error::SilentFailure`].
fn inject_fault(flow: &mut dyn ControlFlow, fault: EvaluationError) -> Error {
    debug!(%fault, "raising fault into computation");
    match flow.raise_into(fault.clone().into()) {
        Step::Escaped(error) => error,
        Step::Yielded(_) | Step::Done(_) => {
            warn!(%fault, "computation silenced an evaluation error");
            flow.terminate();
            Error::SilentFailure(fault)
        }
    }
}
