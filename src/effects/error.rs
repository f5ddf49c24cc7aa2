//! Failure values produced by gated methods, transitions and hooks.

use crate::builder::ApiMember;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Result alias used by every hook and operation of a machine.
pub type FsmResult<T> = Result<T, FsmError>;

/// Errors surfaced through a rejected operation.
///
/// Gate failures (`MethodNotAllowed`, `TransitionNotAllowed`) are produced by
/// the machine itself. Anything a hook or a wrapped method fails with travels
/// unchanged as `Application`.
#[derive(Debug, Clone, Error)]
pub enum FsmError {
    /// The current state forbids the method, or there is no current state.
    #[error("Method \"{0}\" not allowed.")]
    MethodNotAllowed(String),

    /// The target is unreachable, equal to the current state, or the machine is busy.
    #[error("Transition \"{0}\" not allowed.")]
    TransitionNotAllowed(String),

    /// The method is not part of the gated method set of this machine.
    #[error("Method \"{0}\" is not gated by this machine")]
    UnknownMethod(String),

    /// The API member was suppressed through the `omit` option.
    #[error("API member `{0}` was omitted from this machine")]
    Omitted(ApiMember),

    /// A hook failed without supplying a reason.
    ///
    /// Replaced by the operation's own default error before it reaches the caller.
    #[error("Rejected without a reason")]
    Rejected,

    /// Application-level failure raised by a hook or a wrapped method.
    #[error(transparent)]
    Application(Arc<dyn StdError + Send + Sync>),
}

impl FsmError {
    /// Wrap an application error.
    pub fn application<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Application(Arc::new(error))
    }

    /// Build an application error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = message.into().into();
        Self::Application(Arc::from(boxed))
    }

    pub fn is_method_not_allowed(&self) -> bool {
        matches!(self, Self::MethodNotAllowed(_))
    }

    pub fn is_transition_not_allowed(&self) -> bool {
        matches!(self, Self::TransitionNotAllowed(_))
    }

    /// Substitute `default` for a reasonless rejection.
    pub(crate) fn or_default(self, default: impl FnOnce() -> FsmError) -> Self {
        match self {
            Self::Rejected => default(),
            other => other,
        }
    }
}
