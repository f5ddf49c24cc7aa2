//! The running machine: everything that executes hooks or touches the target.
//!
//! # Key Concepts
//!
//! - **Pipeline**: hooks are async callbacks run strictly in series; the
//!   first failure wins
//! - **Method gate**: a gated method only runs while the current state lists
//!   it, after the subject's method hooks
//! - **Transitions**: admitted one at a time; a forced request made while
//!   one is in flight is queued, and a failed attempt rolls back
//! - **Subject**: the machine API lives either on the target or on a proxy
//!   referencing it

mod bindings;
mod error;
mod events;
mod gate;
mod machine;
mod pipeline;
mod subject;
mod transition;

pub use bindings::{
    Bindings, DataProvider, ExecuteFailHook, MethodCall, MethodFn, MethodFuture, MethodHook,
    SubjectHooks, TransitionHook,
};
pub use error::{FsmError, FsmResult};
pub use events::{EventBus, EventPayload, Listener, ALL_EVENTS};
pub use machine::{MachineHook, StateMachine};
pub use pipeline::{callback, run_series, Callback, HookFuture};
pub use transition::{TransitionInfo, TransitionOutcome, TransitionRecord};
