use std::f64::consts::LN_2;

use rand::distributions::Distribution as _;
use rand::RngCore;
use statrs::distribution::{Bernoulli, Continuous, Discrete, Exp, Normal};

use super::{Distribution, DistributionError, DistributionResult, Transform};
use crate::value::Value;

/// Parametric family backing a [`Dist`].
#[derive(Debug, Clone)]
pub enum Family {
    Normal(Normal),
    /// `|X|` for `X ~ Normal(0, scale)`.
    HalfNormal(Normal),
    Exponential(Exp),
    Bernoulli(Bernoulli),
}

impl Family {
    pub fn normal(loc: f64, scale: f64) -> DistributionResult<Self> {
        Normal::new(loc, scale)
            .map(Family::Normal)
            .map_err(|e| DistributionError::invalid_parameter("Normal", e))
    }

    pub fn half_normal(scale: f64) -> DistributionResult<Self> {
        Normal::new(0.0, scale)
            .map(Family::HalfNormal)
            .map_err(|e| DistributionError::invalid_parameter("HalfNormal", e))
    }

    pub fn exponential(rate: f64) -> DistributionResult<Self> {
        Exp::new(rate)
            .map(Family::Exponential)
            .map_err(|e| DistributionError::invalid_parameter("Exponential", e))
    }

    pub fn bernoulli(p: f64) -> DistributionResult<Self> {
        Bernoulli::new(p)
            .map(Family::Bernoulli)
            .map_err(|e| DistributionError::invalid_parameter("Bernoulli", e))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Family::Normal(_) => "Normal",
            Family::HalfNormal(_) => "HalfNormal",
            Family::Exponential(_) => "Exponential",
            Family::Bernoulli(_) => "Bernoulli",
        }
    }

    /// Positive-support families are sampled in log space by default.
    pub fn default_transform(&self) -> Option<Transform> {
        match self {
            Family::HalfNormal(_) | Family::Exponential(_) => Some(Transform::Log),
            Family::Normal(_) | Family::Bernoulli(_) => None,
        }
    }

    pub fn sample_scalar(&self, rng: &mut dyn RngCore) -> Value {
        match self {
            Family::Normal(normal) => Value::Float(normal.sample(rng)),
            Family::HalfNormal(normal) => Value::Float(normal.sample(rng).abs()),
            Family::Exponential(exp) => Value::Float(exp.sample(rng)),
            Family::Bernoulli(bernoulli) => {
                let draw: f64 = bernoulli.sample(rng);
                Value::Integer(draw as i64)
            }
        }
    }

    pub fn ln_density(&self, x: f64) -> f64 {
        match self {
            Family::Normal(normal) => normal.ln_pdf(x),
            Family::HalfNormal(normal) => {
                if x < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    LN_2 + normal.ln_pdf(x)
                }
            }
            Family::Exponential(exp) => exp.ln_pdf(x),
            Family::Bernoulli(bernoulli) => {
                if x == 0.0 || x == 1.0 {
                    bernoulli.ln_pmf(x as u64)
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    /// Scores a scalar or a list of iid draws.
    pub fn log_prob_of(&self, value: &Value) -> DistributionResult<f64> {
        match value {
            Value::List(items) => items.iter().map(|item| self.log_prob_of(item)).sum(),
            other => other
                .as_f64()
                .map(|x| self.ln_density(x))
                .ok_or_else(|| DistributionError::unsupported_value(self.kind(), other)),
        }
    }
}

/// A named random variable from one of the built-in families.
#[derive(Debug, Clone)]
pub struct Dist {
    name: Option<String>,
    family: Family,
    observed: Option<Value>,
    transform: Option<Transform>,
    shape: Option<usize>,
}

impl Dist {
    pub fn new(name: impl Into<String>, family: Family) -> Self {
        Self {
            name: Some(name.into()),
            transform: family.default_transform(),
            family,
            observed: None,
            shape: None,
        }
    }

    pub fn normal(name: impl Into<String>, loc: f64, scale: f64) -> DistributionResult<Self> {
        Ok(Self::new(name, Family::normal(loc, scale)?))
    }

    pub fn half_normal(name: impl Into<String>, scale: f64) -> DistributionResult<Self> {
        Ok(Self::new(name, Family::half_normal(scale)?))
    }

    pub fn exponential(name: impl Into<String>, rate: f64) -> DistributionResult<Self> {
        Ok(Self::new(name, Family::exponential(rate)?))
    }

    pub fn bernoulli(name: impl Into<String>, p: f64) -> DistributionResult<Self> {
        Ok(Self::new(name, Family::bernoulli(p)?))
    }

    pub fn with_observed(mut self, observed: impl Into<Value>) -> Self {
        self.observed = Some(observed.into());
        self
    }

    /// Draw `size` iid values per sample instead of a scalar.
    pub fn with_shape(mut self, size: usize) -> Self {
        self.shape = Some(size);
        self
    }

    pub fn with_transform(mut self, transform: Option<Transform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn family(&self) -> &Family {
        &self.family
    }
}

impl Distribution for Dist {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn kind(&self) -> &str {
        self.family.kind()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> DistributionResult<Value> {
        Ok(match self.shape {
            Some(size) => Value::List(
                (0..size)
                    .map(|_| self.family.sample_scalar(&mut *rng))
                    .collect(),
            ),
            None => self.family.sample_scalar(rng),
        })
    }

    fn log_prob(&self, value: &Value) -> DistributionResult<f64> {
        self.family.log_prob_of(value)
    }

    fn observed(&self) -> Option<&Value> {
        self.observed.as_ref()
    }

    fn transform(&self) -> Option<Transform> {
        self.transform
    }
}
