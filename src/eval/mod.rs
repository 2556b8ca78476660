//! Model Evaluation System
//!
//! The evaluation system drives probabilistic models to completion. A model
//! body is a suspendable computation: it yields distributions, potentials
//! and nested models, and receives back the value each one resolves to,
//! while the executor records everything in an [`EvaluationState`].
//!
//! # Core Components
//!
//! ## Executor
//! The control loop shared by every policy. It resumes the computation,
//! dispatches each yielded item, recurses into nested models, raises faults
//! back into the computation that caused them and escalates faults a model
//! silences.
//!
//! ## Sampling Policy
//! Decides how each distribution becomes a value: observed data, a value
//! supplied by the caller, or a fresh draw.
//!
//! ## Evaluation State
//! Untransformed, transformed and observed values, the distribution behind
//! each variable, and free potential terms.
//!
//! ## Scope Stack
//! Name prefixes opened by the model nodes currently being driven.
//!
//! # Evaluation Pipeline
//!
//! 1. A state is built (or validated when supplied)
//! 2. The model node is prepared, possibly returning early with a known value
//! 3. The computation is resumed item by item inside its name scope
//! 4. The return value is checked and recorded by the policy

pub mod coroutine;
pub mod executor;
pub mod model;
pub mod sampling;
pub mod scope;
pub mod state;

pub use coroutine::{Co, ControlFlow, Coroutine, SingleYield, Step, Yield};
pub use executor::{EvaluationError, ExecutionPolicy, Executor, Prepared, StateArgs};
pub use model::{Evaluable, Model, ModelInfo};
pub use sampling::{evaluate_model, SamplingExecutor, SamplingPolicy};
pub use scope::ScopeStack;
pub use state::{EvaluationState, StateError};
