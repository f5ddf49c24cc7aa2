//! Construction options and loadable machine configuration.

use crate::core::StateTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Members of the machine API that can be suppressed with `omit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiMember {
    InitialState,
    HasState,
    SetState,
    GetState,
    GetStates,
    GetStateTransitions,
    GetStateMethods,
    GetStateData,
    OnMethod,
    OnTransition,
    OnFailure,
    InTransition,
    ApplyTransition,
    Transition,
    TransitionAllowed,
}

impl ApiMember {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialState => "initialState",
            Self::HasState => "hasState",
            Self::SetState => "setState",
            Self::GetState => "getState",
            Self::GetStates => "getStates",
            Self::GetStateTransitions => "getStateTransitions",
            Self::GetStateMethods => "getStateMethods",
            Self::GetStateData => "getStateData",
            Self::OnMethod => "onMethod",
            Self::OnTransition => "onTransition",
            Self::OnFailure => "onFailure",
            Self::InTransition => "inTransition",
            Self::ApplyTransition => "applyTransition",
            Self::Transition => "transition",
            Self::TransitionAllowed => "transitionAllowed",
        }
    }
}

impl fmt::Display for ApiMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options recognized at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineOptions {
    /// Install on a separate receiver that references the target.
    pub proxy: bool,
    /// Run the built-in handler dispatch on every transition.
    pub apply: bool,
    /// API members to leave out.
    pub omit: Vec<ApiMember>,
    /// Gate every method registered on the target, not only the listed ones.
    pub gate_all_methods: bool,
}

impl MachineOptions {
    pub fn is_omitted(&self, member: ApiMember) -> bool {
        self.omit.contains(&member)
    }
}

/// Options and state table loaded together.
#[derive(Deserialize)]
#[serde(bound = "")]
pub struct MachineConfig<T> {
    #[serde(default)]
    pub options: MachineOptions,
    pub states: StateTable<T>,
}

impl<T> MachineConfig<T> {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<T> fmt::Debug for MachineConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineConfig")
            .field("options", &self.options)
            .field("states", &self.states)
            .finish()
    }
}
