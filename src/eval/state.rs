use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::distribution::{Distribution, Potential};
use crate::names::NameParts;
use crate::value::Value;
use crate::ModelResult;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error(
        "No distributions found in the state: the evaluated model is empty \
         and does not yield any distribution"
    )]
    NoDistributions,
    #[error(
        "Transformed value {transformed_name:?} is not found for {distribution} \
         distribution with name {name:?}. Evaluate the model with an executor that \
         records transformed values to get a sampling state"
    )]
    MissingTransformedValue {
        name: String,
        transformed_name: String,
        distribution: String,
    },
    #[error(
        "{distribution} distribution with name {name:?} does not have a corresponding \
         value in the state. This may happen if the state was modified outside of evaluation"
    )]
    MissingValue { name: String, distribution: String },
}

/// Bookkeeping produced by evaluating a model.
///
/// Latent values live in exactly one of `untransformed_values` /
/// `transformed_values`. An observed entry of `None` marks a nominally
/// observed variable that is to be treated as latent.
#[derive(Debug, Clone, Default)]
pub struct EvaluationState {
    pub transformed_values: IndexMap<String, Value>,
    pub untransformed_values: IndexMap<String, Value>,
    pub observed_values: IndexMap<String, Option<Value>>,
    pub distributions: IndexMap<String, Arc<dyn Distribution>>,
    pub potentials: Vec<Potential>,
}

impl EvaluationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `values` into transformed and untransformed partitions by the
    /// transform marker of each name.
    pub fn from_values(
        values: Option<IndexMap<String, Value>>,
        observed_values: Option<IndexMap<String, Option<Value>>>,
    ) -> Self {
        let mut state = Self {
            observed_values: observed_values.unwrap_or_default(),
            ..Self::default()
        };
        for (name, value) in values.unwrap_or_default() {
            if NameParts::parse(&name).is_transformed() {
                state.transformed_values.insert(name, value);
            } else {
                state.untransformed_values.insert(name, value);
            }
        }
        state
    }

    /// Layered lookup: untransformed, then transformed, then observed.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.untransformed_values
            .get(name)
            .or_else(|| self.transformed_values.get(name))
            .or_else(|| self.observed_values.get(name).and_then(Option::as_ref))
    }

    /// Every resolvable value, each name once, in lookup priority order.
    pub fn all_values(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        let untransformed = self
            .untransformed_values
            .iter()
            .map(|(name, value)| (name.as_str(), value));
        let transformed = self
            .transformed_values
            .iter()
            .filter(|(name, _)| !self.untransformed_values.contains_key(*name))
            .map(|(name, value)| (name.as_str(), value));
        let observed = self
            .observed_values
            .iter()
            .filter(|(name, _)| {
                !self.untransformed_values.contains_key(*name)
                    && !self.transformed_values.contains_key(*name)
            })
            .filter_map(|(name, value)| value.as_ref().map(|value| (name.as_str(), value)));
        untransformed.chain(transformed).chain(observed)
    }

    /// Sum of every recorded distribution's log-probability at its value,
    /// plus every potential.
    pub fn collect_log_prob(&self) -> ModelResult<f64> {
        let mut total = 0.0;
        for (name, dist) in &self.distributions {
            let value = self.value(name).ok_or_else(|| StateError::MissingValue {
                name: name.clone(),
                distribution: dist.kind().to_string(),
            })?;
            total += dist.log_prob(value)?;
        }
        Ok(total + self.potentials.iter().map(Potential::value).sum::<f64>())
    }

    /// State restricted to the values inference needs, without distributions
    /// or potentials. Transformed distributions contribute their transformed
    /// value unless observed; everything else contributes its observed or
    /// untransformed value.
    pub fn to_sampling_snapshot(&self) -> Result<EvaluationState, StateError> {
        if self.distributions.is_empty() {
            return Err(StateError::NoDistributions);
        }
        let mut snapshot = EvaluationState::default();
        for (name, dist) in &self.distributions {
            // an observed entry of `None` marks the variable latent
            let observed = self.observed_values.get(name).and_then(Option::as_ref);
            match dist.transform() {
                Some(transform) if observed.is_none() => {
                    let transformed_name = NameParts::parse(name)
                        .replace_transform(transform.name())
                        .full_original_name();
                    let value = self.transformed_values.get(&transformed_name).ok_or_else(|| {
                        StateError::MissingTransformedValue {
                            name: name.clone(),
                            transformed_name: transformed_name.clone(),
                            distribution: dist.kind().to_string(),
                        }
                    })?;
                    snapshot
                        .transformed_values
                        .insert(transformed_name, value.clone());
                }
                _ => {
                    if let Some(observed) = observed {
                        snapshot
                            .observed_values
                            .insert(name.clone(), Some(observed.clone()));
                    } else if let Some(value) = self.untransformed_values.get(name) {
                        snapshot
                            .untransformed_values
                            .insert(name.clone(), value.clone());
                    } else {
                        return Err(StateError::MissingValue {
                            name: name.clone(),
                            distribution: dist.kind().to_string(),
                        });
                    }
                }
            }
        }
        Ok(snapshot)
    }
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = |names: Vec<&String>| {
            names
                .into_iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let distributions = self
            .distributions
            .iter()
            .map(|(name, dist)| format!("{}:{}", dist.kind(), name))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            f,
            "EvaluationState(untransformed_values: [{}]",
            keys(self.untransformed_values.keys().collect())
        )?;
        writeln!(
            f,
            "                transformed_values: [{}]",
            keys(self.transformed_values.keys().collect())
        )?;
        writeln!(
            f,
            "                observed_values: [{}]",
            keys(self.observed_values.keys().collect())
        )?;
        writeln!(f, "                distributions: [{}]", distributions)?;
        write!(f, "                num_potentials={})", self.potentials.len())
    }
}
