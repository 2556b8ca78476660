use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use super::coroutine::Yield;
use super::executor::{EvaluationError, ExecutionPolicy, Executor, Prepared, StateArgs};
use super::model::{Evaluable, Model, ModelInfo};
use super::scope::ScopeStack;
use super::state::EvaluationState;
use crate::config::EvaluationConfig;
use crate::distribution::Distribution;
use crate::value::Value;
use crate::ModelResult;

/// Resolves distributions in their natural parameterization: observed values
/// are used as-is, supplied values are reused, everything else is sampled.
pub struct SamplingPolicy {
    rng: StdRng,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        config.seed.map_or_else(Self::new, Self::seeded)
    }

    fn draw(&mut self, dist: &Arc<dyn Distribution>) -> ModelResult<Value> {
        Ok(dist.sample(&mut self.rng)?)
    }
}

pub type SamplingExecutor = Executor<SamplingPolicy>;

impl Executor<SamplingPolicy> {
    pub fn sampling() -> Self {
        Self::new(SamplingPolicy::new())
    }

    pub fn from_config(config: EvaluationConfig) -> Self {
        Self::with_config(SamplingPolicy::from_config(&config), config)
    }
}

/// Evaluates `model` once with a fresh, entropy-seeded sampling executor.
pub fn evaluate_model(model: impl Into<Evaluable>) -> ModelResult<(Value, EvaluationState)> {
    SamplingExecutor::sampling().sample(model)
}

/// The observed value in effect for `scoped_name`; the state's observed
/// entry wins over the one declared on the distribution.
fn observed_value_in_evaluation(
    scoped_name: &str,
    dist: &Arc<dyn Distribution>,
    state: &EvaluationState,
) -> Option<Value> {
    match state.observed_values.get(scoped_name) {
        Some(observed) => observed.clone(),
        None => dist.observed().cloned(),
    }
}

impl ExecutionPolicy for SamplingPolicy {
    fn new_state(&mut self, args: StateArgs) -> ModelResult<EvaluationState> {
        match args {
            StateArgs {
                state: Some(_),
                values,
                observed,
            } if values.is_some() || observed.is_some() => {
                Err(EvaluationError::ConflictingStateSources.into())
            }
            StateArgs {
                state: Some(state), ..
            } => Ok(state),
            StateArgs {
                values, observed, ..
            } => Ok(EvaluationState::from_values(values, observed)),
        }
    }

    fn validate_state(&self, state: &EvaluationState) -> ModelResult<()> {
        if state.transformed_values.is_empty() {
            return Ok(());
        }
        Err(EvaluationError::TransformedValuesPresent {
            names: state.transformed_values.keys().cloned().collect(),
        }
        .into())
    }

    fn modify_distribution(
        &mut self,
        dist: Arc<dyn Distribution>,
        _info: &ModelInfo,
        _state: &EvaluationState,
    ) -> ModelResult<Option<Yield>> {
        Ok(Some(Yield::Distribution(dist)))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(dist = ?dist.name()))]
    fn proceed_distribution(
        &mut self,
        dist: &Arc<dyn Distribution>,
        _info: &ModelInfo,
        scopes: &ScopeStack,
        state: &mut EvaluationState,
    ) -> ModelResult<Value> {
        let name = dist.name().ok_or(EvaluationError::AnonymousDistribution)?;
        let scoped_name = scopes.variable_name(name);
        if state.distributions.contains_key(&scoped_name) {
            return Err(EvaluationError::DuplicateVariable { name: scoped_name }.into());
        }

        let value = if state.observed_values.contains_key(&scoped_name) || dist.is_observed() {
            match observed_value_in_evaluation(&scoped_name, dist, state) {
                None => {
                    let value = match state.untransformed_values.get(&scoped_name) {
                        Some(existing) => {
                            debug!(name = %scoped_name, "observed variable overridden by supplied value");
                            existing.clone()
                        }
                        None => {
                            debug!(name = %scoped_name, "posterior predictive sample");
                            let value = self.draw(dist)?;
                            state
                                .untransformed_values
                                .insert(scoped_name.clone(), value.clone());
                            value
                        }
                    };
                    state.observed_values.shift_remove(&scoped_name);
                    value
                }
                Some(observed) => {
                    if state.untransformed_values.contains_key(&scoped_name) {
                        return Err(EvaluationError::ObservedWithUntransformedValue {
                            name: scoped_name,
                        }
                        .into());
                    }
                    trace!(name = %scoped_name, "observed");
                    state
                        .observed_values
                        .insert(scoped_name.clone(), Some(observed.clone()));
                    observed
                }
            }
        } else if let Some(existing) = state.untransformed_values.get(&scoped_name) {
            trace!(name = %scoped_name, "reusing supplied value");
            existing.clone()
        } else {
            let value = self.draw(dist)?;
            trace!(name = %scoped_name, "sampled");
            state
                .untransformed_values
                .insert(scoped_name.clone(), value.clone());
            value
        };

        state.distributions.insert(scoped_name, Arc::clone(dist));
        Ok(value)
    }

    fn prepare_model_control_flow(
        &mut self,
        model: &Model,
        scopes: &ScopeStack,
        state: &EvaluationState,
    ) -> ModelResult<Prepared> {
        let info = model.info();
        let return_name = scopes.scoped_name(info.name());
        if return_name.is_none() && info.keep_return {
            return Err(EvaluationError::UnnamedReturnValue.into());
        }
        if !info.keep_auxiliary {
            if let Some(existing) = return_name
                .as_ref()
                .and_then(|name| state.untransformed_values.get(name))
            {
                return Ok(Prepared::EarlyReturn(existing.clone()));
            }
        }
        Ok(Prepared::Flow(Box::new(model.control_flow())))
    }

    fn finalize_control_flow(
        &mut self,
        return_value: Value,
        info: &ModelInfo,
        scopes: &ScopeStack,
        state: &mut EvaluationState,
    ) -> ModelResult<Value> {
        if !return_value.is_null() && info.keep_return {
            if let Some(return_name) = scopes.scoped_name(info.name()) {
                state
                    .untransformed_values
                    .insert(return_name, return_value.clone());
            }
        }
        Ok(return_value)
    }
}
