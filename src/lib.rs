//! # modelflow: coroutine-driven evaluation of probabilistic models
//!
//! A model is a suspendable computation that yields random variables and
//! receives concrete values back. Evaluating it builds an
//! [`EvaluationState`] from which inference algorithms compute the joint
//! log-probability.
//!
//! ## Building Blocks
//! - Distributions ([`distribution`]): sampling and scoring capability
//! - Names ([`names`]): scoped variable names and transform markers
//! - Values ([`value`]): data exchanged with model bodies
//! - Evaluation ([`eval`]): executor, sampling policy and state
//! - Configuration ([`config`]) and errors ([`error`])
//!
//! ## Example
//!
//! ```
//! use modelflow::{Dist, Model, SamplingExecutor, EvaluationConfig, Value};
//!
//! let model = Model::new("model", |co| async move {
//!     let mu = co.sample(Dist::normal("mu", 0.0, 1.0)?).await?;
//!     let loc = mu.as_f64().unwrap_or_default();
//!     co.sample(Dist::normal("y", loc, 1.0)?.with_observed(0.3)).await?;
//!     Ok(mu)
//! });
//!
//! let mut executor = SamplingExecutor::from_config(EvaluationConfig::seeded(7));
//! let (mu, state) = executor.sample(&model).unwrap();
//! assert_eq!(state.value("model/mu"), Some(&mu));
//! assert_eq!(state.value("model/y"), Some(&Value::Float(0.3)));
//! assert!(state.collect_log_prob().unwrap().is_finite());
//! ```

pub mod config;
pub mod distribution;
pub mod error;
pub mod eval;
pub mod names;
pub mod value;

// Re-exports
pub use config::EvaluationConfig;
pub use distribution::{Dist, Distribution, DistributionError, Family, Mixture, Potential, Transform};
pub use error::*;
pub use eval::*;
pub use names::NameParts;
pub use value::Value;
