//! Problems found in a state definition.

use thiserror::Error;

/// A single problem in a state table, relative to a target.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("Several initial states ({}); the first one wins", .states.join(", "))]
    MultipleInitialStates { states: Vec<String> },

    #[error("State `{from}` lists unknown transition target `{to}`")]
    UnknownTransitionTarget { from: String, to: String },

    #[error("Trigger `{trigger}` is declared by both `{first}` and `{second}`")]
    DuplicateTrigger {
        trigger: String,
        first: String,
        second: String,
    },

    #[error("Trigger `{trigger}` of state `{state}` is not a gated method")]
    TriggerNotGated { state: String, trigger: String },

    #[error("State `{state}` {hook} callback `{name}` is not registered on the target")]
    UnresolvedCallback {
        state: String,
        hook: &'static str,
        name: String,
    },

    #[error("State `{state}` allows method `{method}` which the target does not implement")]
    UnimplementedMethod { state: String, method: String },

    #[error("State `{state}` data provider `{name}` is not registered on the target")]
    UnresolvedDataProvider { state: String, name: String },
}
