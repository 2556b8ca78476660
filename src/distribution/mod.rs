//! Distribution capability consumed by the evaluation engine.
//!
//! The executor never looks inside a distribution: it only needs a name to
//! file the variable under, a way to draw a value, a way to score a value and
//! the observed/transform metadata that decides how a value is resolved.
//! [`Dist`] and [`Mixture`] are `statrs`-backed implementations.

pub mod families;
pub mod mixture;

use core::fmt;

use rand::RngCore;
use thiserror::Error;

use crate::value::Value;

pub use families::{Dist, Family};
pub use mixture::Mixture;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("Invalid parameter for {distribution}: {message}")]
    InvalidParameter {
        distribution: String,
        message: String,
    },
    #[error("{distribution} cannot score value {value}")]
    UnsupportedValue { distribution: String, value: String },
    #[error("Invalid mixture: {0}")]
    InvalidMixture(String),
}

impl DistributionError {
    pub fn invalid_parameter(distribution: &str, message: impl fmt::Display) -> Self {
        DistributionError::InvalidParameter {
            distribution: distribution.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unsupported_value(distribution: &str, value: &Value) -> Self {
        DistributionError::UnsupportedValue {
            distribution: distribution.to_string(),
            value: value.to_string(),
        }
    }
}

pub type DistributionResult<T> = Result<T, DistributionError>;

/// Reparameterization of a latent variable onto the real line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Transform {
    /// (0, inf) -> R
    Log,
    /// (0, 1) -> R
    LogOdds,
}

impl Transform {
    /// Marker used in transformed variable names, e.g. `__log_sigma`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn forward(&self, x: f64) -> f64 {
        match self {
            Transform::Log => x.ln(),
            Transform::LogOdds => (x / (1.0 - x)).ln(),
        }
    }

    pub fn inverse(&self, y: f64) -> f64 {
        match self {
            Transform::Log => y.exp(),
            Transform::LogOdds => 1.0 / (1.0 + (-y).exp()),
        }
    }
}

/// A random variable the executor can resolve into a value.
pub trait Distribution: fmt::Debug + Send + Sync {
    /// Local (unscoped) name. `None` for anonymous distributions.
    fn name(&self) -> Option<&str>;

    /// Family name used in diagnostics.
    fn kind(&self) -> &str;

    fn sample(&self, rng: &mut dyn RngCore) -> DistributionResult<Value>;

    fn log_prob(&self, value: &Value) -> DistributionResult<f64>;

    /// Observed payload declared on the distribution itself.
    fn observed(&self) -> Option<&Value>;

    fn transform(&self) -> Option<Transform>;

    fn is_observed(&self) -> bool {
        self.observed().is_some()
    }

    fn is_anonymous(&self) -> bool {
        self.name().is_none()
    }
}

/// An unnamed additive log-probability term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Potential {
    value: f64,
}

impl Potential {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}
