use rand::distributions::{Distribution as _, WeightedIndex};
use rand::RngCore;

use super::{Distribution, DistributionError, DistributionResult, Family, Transform};
use crate::value::Value;

/// Finite mixture `f(x) = sum_i w_i f_i(x)` over built-in families.
#[derive(Debug, Clone)]
pub struct Mixture {
    name: Option<String>,
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
    components: Vec<Family>,
    observed: Option<Value>,
}

impl Mixture {
    /// `weights` are normalized; they must be non-negative with a positive sum.
    pub fn new(
        name: impl Into<String>,
        weights: Vec<f64>,
        components: Vec<Family>,
    ) -> DistributionResult<Self> {
        if components.is_empty() {
            return Err(DistributionError::InvalidMixture(
                "at least one component is required".to_string(),
            ));
        }
        if weights.len() != components.len() {
            return Err(DistributionError::InvalidMixture(format!(
                "{} weights given for {} components",
                weights.len(),
                components.len()
            )));
        }
        let index = WeightedIndex::new(&weights)
            .map_err(|e| DistributionError::InvalidMixture(e.to_string()))?;
        let total: f64 = weights.iter().sum();
        Ok(Self {
            name: Some(name.into()),
            weights: weights.iter().map(|w| w / total).collect(),
            index,
            components,
            observed: None,
        })
    }

    pub fn with_observed(mut self, observed: impl Into<Value>) -> Self {
        self.observed = Some(observed.into());
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn components(&self) -> &[Family] {
        &self.components
    }

    fn ln_density(&self, x: f64) -> f64 {
        let terms: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.components)
            .map(|(w, component)| w.ln() + component.ln_density(x))
            .collect();
        log_sum_exp(&terms)
    }
}

fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}

impl Distribution for Mixture {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn kind(&self) -> &str {
        "Mixture"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> DistributionResult<Value> {
        let component = self.index.sample(&mut *rng);
        Ok(self.components[component].sample_scalar(rng))
    }

    fn log_prob(&self, value: &Value) -> DistributionResult<f64> {
        match value {
            Value::List(items) => items.iter().map(|item| self.log_prob(item)).sum(),
            other => other
                .as_f64()
                .map(|x| self.ln_density(x))
                .ok_or_else(|| DistributionError::unsupported_value(self.kind(), other)),
        }
    }

    fn observed(&self) -> Option<&Value> {
        self.observed.as_ref()
    }

    fn transform(&self) -> Option<Transform> {
        None
    }
}
