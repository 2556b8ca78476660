//! Suspendable computations.
//!
//! A model body is a computation that repeatedly hands an item (a
//! distribution, a potential, a nested model) to the executor and waits for
//! the value the executor resolves it into. [`ControlFlow`] is the protocol
//! the executor drives; [`Coroutine`] implements it on top of a local `async`
//! body, [`SingleYield`] is a hand-written state machine.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::noop_waker_ref;

use super::executor::EvaluationError;
use super::model::Model;
use crate::distribution::{Distribution, Potential};
use crate::value::Value;
use crate::{Error, ModelResult};

/// Item handed from a computation to the executor.
#[derive(strum::Display)]
pub enum Yield {
    Distribution(Arc<dyn Distribution>),
    Potential(Potential),
    Model(Model),
    Flow(Box<dyn ControlFlow>),
    /// A plain value. The executor cannot process it.
    Value(Value),
}

impl fmt::Debug for Yield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yield::Distribution(dist) => f.debug_tuple("Distribution").field(dist).finish(),
            Yield::Potential(potential) => f.debug_tuple("Potential").field(potential).finish(),
            Yield::Model(model) => f.debug_tuple("Model").field(model).finish(),
            Yield::Flow(_) => f.write_str("Flow(..)"),
            Yield::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Outcome of advancing a computation by one step.
#[derive(Debug)]
pub enum Step {
    Yielded(Yield),
    Done(Value),
    /// The computation terminated with an error.
    Escaped(Error),
}

pub trait ControlFlow {
    /// Resumes the computation, delivering `input` at the pending suspension
    /// point. The first call starts the computation and ignores `input`.
    fn resume(&mut self, input: Value) -> Step;

    /// Delivers `fault` at the pending suspension point instead of a value.
    fn raise_into(&mut self, fault: Error) -> Step;

    /// Aborts the computation, releasing whatever it holds.
    fn terminate(&mut self);

    fn is_finished(&self) -> bool;
}

#[derive(Default)]
struct Channel {
    pending: Option<Yield>,
    reply: Option<ModelResult<Value>>,
}

/// Handle a coroutine body uses to suspend on the executor.
#[derive(Clone)]
pub struct Co {
    channel: Rc<RefCell<Channel>>,
}

impl Co {
    pub async fn yield_(&self, item: Yield) -> ModelResult<Value> {
        {
            let mut channel = self.channel.borrow_mut();
            if channel.pending.is_some() {
                return Err(EvaluationError::ConcurrentYield.into());
            }
            channel.pending = Some(item);
        }
        Suspend {
            channel: Rc::clone(&self.channel),
            suspended: false,
        }
        .await
    }

    /// Resolves `dist` into a value: sampled, supplied or observed.
    pub async fn sample<D: Distribution + 'static>(&self, dist: D) -> ModelResult<Value> {
        self.yield_(Yield::Distribution(Arc::new(dist))).await
    }

    pub async fn sample_shared(&self, dist: Arc<dyn Distribution>) -> ModelResult<Value> {
        self.yield_(Yield::Distribution(dist)).await
    }

    pub async fn potential(&self, value: f64) -> ModelResult<Value> {
        self.yield_(Yield::Potential(Potential::new(value))).await
    }

    /// Evaluates a nested model node and returns its value.
    pub async fn call(&self, model: &Model) -> ModelResult<Value> {
        self.yield_(Yield::Model(model.clone())).await
    }

    pub async fn call_flow<F: ControlFlow + 'static>(&self, flow: F) -> ModelResult<Value> {
        self.yield_(Yield::Flow(Box::new(flow))).await
    }
}

struct Suspend {
    channel: Rc<RefCell<Channel>>,
    suspended: bool,
}

impl Future for Suspend {
    type Output = ModelResult<Value>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.suspended {
            self.suspended = true;
            return Poll::Pending;
        }
        match self.channel.borrow_mut().reply.take() {
            Some(reply) => Poll::Ready(reply),
            None => Poll::Pending,
        }
    }
}

/// [`ControlFlow`] over an `async` body. The body only ever awaits its
/// [`Co`] handle; any other pending await is a protocol violation.
pub struct Coroutine {
    channel: Rc<RefCell<Channel>>,
    body: Option<LocalBoxFuture<'static, ModelResult<Value>>>,
    started: bool,
}

impl Coroutine {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output = ModelResult<Value>> + 'static,
    {
        let channel = Rc::new(RefCell::new(Channel::default()));
        let co = Co {
            channel: Rc::clone(&channel),
        };
        Self {
            channel,
            body: Some(body(co).boxed_local()),
            started: false,
        }
    }

    fn poll_body(&mut self, reply: ModelResult<Value>) -> Step {
        let Some(body) = self.body.as_mut() else {
            return Step::Escaped(EvaluationError::ComputationFinished.into());
        };
        if self.started {
            self.channel.borrow_mut().reply = Some(reply);
        }
        self.started = true;

        let mut cx = Context::from_waker(noop_waker_ref());
        match body.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                self.body = None;
                match result {
                    Ok(value) => Step::Done(value),
                    Err(error) => Step::Escaped(error),
                }
            }
            Poll::Pending => {
                let pending = self.channel.borrow_mut().pending.take();
                match pending {
                    Some(item) => Step::Yielded(item),
                    None => {
                        self.terminate();
                        Step::Escaped(EvaluationError::SuspendedWithoutYield.into())
                    }
                }
            }
        }
    }
}

impl ControlFlow for Coroutine {
    fn resume(&mut self, input: Value) -> Step {
        self.poll_body(Ok(input))
    }

    fn raise_into(&mut self, fault: Error) -> Step {
        if !self.started {
            // nothing to catch the fault yet
            self.terminate();
            return Step::Escaped(fault);
        }
        self.poll_body(Err(fault))
    }

    fn terminate(&mut self) {
        self.body = None;
        let mut channel = self.channel.borrow_mut();
        channel.pending = None;
        channel.reply = None;
    }

    fn is_finished(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SingleYieldState {
    Fresh,
    Suspended,
    Finished,
}

/// Yields one distribution and returns the value it is resolved into.
#[derive(Debug)]
pub struct SingleYield {
    dist: Arc<dyn Distribution>,
    state: SingleYieldState,
}

impl SingleYield {
    pub fn new(dist: Arc<dyn Distribution>) -> Self {
        Self {
            dist,
            state: SingleYieldState::Fresh,
        }
    }
}

impl ControlFlow for SingleYield {
    fn resume(&mut self, input: Value) -> Step {
        match self.state {
            SingleYieldState::Fresh => {
                self.state = SingleYieldState::Suspended;
                Step::Yielded(Yield::Distribution(Arc::clone(&self.dist)))
            }
            SingleYieldState::Suspended => {
                self.state = SingleYieldState::Finished;
                Step::Done(input)
            }
            SingleYieldState::Finished => {
                Step::Escaped(EvaluationError::ComputationFinished.into())
            }
        }
    }

    fn raise_into(&mut self, fault: Error) -> Step {
        self.state = SingleYieldState::Finished;
        Step::Escaped(fault)
    }

    fn terminate(&mut self) {
        self.state = SingleYieldState::Finished;
    }

    fn is_finished(&self) -> bool {
        self.state == SingleYieldState::Finished
    }
}
