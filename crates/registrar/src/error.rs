use serde_json::Value;
use thiserror::Error;

/// Rejection returned by a `validate` hook.
///
/// Carries whatever value the hook chose to describe the problem; callers
/// read it back through [`crate::Model::validation_error`] or from the
/// `Err` of the rejected mutation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed: {0}")]
pub struct ValidationError(pub Value);

impl ValidationError {
    pub fn new(reason: impl Into<Value>) -> Self {
        Self(reason.into())
    }

    pub fn reason(&self) -> &Value {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("unknown event name: {0:?}")]
    UnknownEvent(String),
}
