use thiserror::Error;

use crate::distribution::DistributionError;
use crate::eval::executor::EvaluationError;
use crate::eval::state::StateError;

#[derive(Error, Debug, Clone)]
pub enum Error {
    // misuse detected while driving a model
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    /// The model caught an injected fault and kept running instead of
    /// propagating it.
    #[error(
        "Model silenced an evaluation error instead of propagating it; \
         the computation was terminated. Original error: {0}"
    )]
    SilentFailure(EvaluationError),
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),
    #[error("Config error: {0}")]
    Config(String),
    // raised by a model body on its own behalf
    #[error("Model error: {0}")]
    Model(String),
}

pub type ModelResult<T> = Result<T, Error>;

impl Error {
    pub fn model<S: Into<String>>(message: S) -> Self {
        Error::Model(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    /// The evaluation fault carried by this error, if any.
    pub fn evaluation_error(&self) -> Option<&EvaluationError> {
        match self {
            Error::Evaluation(error) | Error::SilentFailure(error) => Some(error),
            _ => None,
        }
    }
}
