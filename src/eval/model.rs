use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};

use super::coroutine::{Co, ControlFlow, Coroutine};
use crate::distribution::{Dist, Distribution, Mixture};
use crate::value::Value;
use crate::ModelResult;

type Body = dyn Fn(Co) -> LocalBoxFuture<'static, ModelResult<Value>> + Send + Sync;

/// Metadata attached to a model node.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: Option<String>,
    /// Store the returned value under the node's scoped name.
    pub keep_return: bool,
    /// Re-run the body even when the node's value is already known.
    pub keep_auxiliary: bool,
    /// Observed override recorded with the node. Metadata only: the
    /// executor resolves observations from distributions and the state.
    pub observed: Option<Box<Value>>,
}

/// Metadata for raw computations: anonymous, nothing kept.
impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            name: None,
            keep_return: false,
            keep_auxiliary: false,
            observed: None,
        }
    }
}

impl ModelInfo {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A named, re-runnable probabilistic computation.
///
/// Every evaluation obtains a fresh [`Coroutine`] from the body, so one
/// `Model` can be evaluated any number of times.
#[derive(Clone)]
pub struct Model {
    info: ModelInfo,
    body: Arc<Body>,
}

impl Model {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Co) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ModelResult<Value>> + 'static,
    {
        Self::build(Some(name.into()), body)
    }

    pub fn anonymous<F, Fut>(body: F) -> Self
    where
        F: Fn(Co) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ModelResult<Value>> + 'static,
    {
        Self::build(None, body)
    }

    fn build<F, Fut>(name: Option<String>, body: F) -> Self
    where
        F: Fn(Co) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ModelResult<Value>> + 'static,
    {
        Self {
            info: ModelInfo {
                name,
                keep_return: true,
                keep_auxiliary: true,
                observed: None,
            },
            body: Arc::new(move |co| body(co).boxed_local()),
        }
    }

    pub fn keep_return(mut self, keep: bool) -> Self {
        self.info.keep_return = keep;
        self
    }

    pub fn keep_auxiliary(mut self, keep: bool) -> Self {
        self.info.keep_auxiliary = keep;
        self
    }

    pub fn with_observed(mut self, observed: impl Into<Value>) -> Self {
        self.info.observed = Some(Box::new(observed.into()));
        self
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn name(&self) -> Option<&str> {
        self.info.name()
    }

    /// A fresh, not yet started computation of this model's body.
    pub fn control_flow(&self) -> Coroutine {
        let body = Arc::clone(&self.body);
        Coroutine::new(move |co| body(co))
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("info", &self.info).finish()
    }
}

/// Models compare by identity of their body.
impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body) && self.info == other.info
    }
}

/// Anything [`Executor::evaluate`](super::executor::Executor::evaluate) accepts.
pub enum Evaluable {
    Model(Model),
    Flow(Box<dyn ControlFlow>),
    /// A bare distribution; evaluated through an anonymous single-yield wrapper.
    Distribution(Arc<dyn Distribution>),
}

impl From<Model> for Evaluable {
    fn from(model: Model) -> Self {
        Evaluable::Model(model)
    }
}

impl From<&Model> for Evaluable {
    fn from(model: &Model) -> Self {
        Evaluable::Model(model.clone())
    }
}

impl From<Box<dyn ControlFlow>> for Evaluable {
    fn from(flow: Box<dyn ControlFlow>) -> Self {
        Evaluable::Flow(flow)
    }
}

impl From<Coroutine> for Evaluable {
    fn from(flow: Coroutine) -> Self {
        Evaluable::Flow(Box::new(flow))
    }
}

impl From<Arc<dyn Distribution>> for Evaluable {
    fn from(dist: Arc<dyn Distribution>) -> Self {
        Evaluable::Distribution(dist)
    }
}

impl From<Dist> for Evaluable {
    fn from(dist: Dist) -> Self {
        Evaluable::Distribution(Arc::new(dist))
    }
}

impl From<Mixture> for Evaluable {
    fn from(dist: Mixture) -> Self {
        Evaluable::Distribution(Arc::new(dist))
    }
}
