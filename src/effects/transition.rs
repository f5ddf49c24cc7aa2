//! Transition descriptors handed to every hook of a transition attempt.

use crate::core::DataMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Descriptor of one admitted transition attempt.
///
/// Created right after the attempt is admitted and passed to the apply step,
/// the global transition hooks, the exit/enter hooks and the failure hooks.
/// The machine drops it once the attempt settles.
pub struct TransitionInfo<T> {
    /// Unique id of this attempt, for correlating hooks and events.
    pub id: Uuid,
    /// State the machine was in, `None` on the first transition.
    pub from: Option<String>,
    pub to: String,
    /// The target object the machine governs.
    pub context: Arc<T>,
    /// Transitions allowed from `to`.
    pub transitions: Vec<String>,
    /// Methods allowed in `to`.
    pub methods: Vec<String>,
    /// Fresh copy of the data of `to`.
    pub data: DataMap,
    pub started_at: DateTime<Utc>,
}

impl<T> TransitionInfo<T> {
    /// Serializable projection without the target object.
    pub fn record(&self) -> TransitionRecord {
        TransitionRecord {
            id: self.id,
            from: self.from.clone(),
            to: self.to.clone(),
            transitions: self.transitions.clone(),
            methods: self.methods.clone(),
            data: self.data.clone(),
            started_at: self.started_at,
        }
    }
}

impl<T> Clone for TransitionInfo<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            from: self.from.clone(),
            to: self.to.clone(),
            context: Arc::clone(&self.context),
            transitions: self.transitions.clone(),
            methods: self.methods.clone(),
            data: self.data.clone(),
            started_at: self.started_at,
        }
    }
}

impl<T> fmt::Debug for TransitionInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionInfo")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("transitions", &self.transitions)
            .field("methods", &self.methods)
            .field("data", &self.data)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Target-free copy of a [`TransitionInfo`], used as event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: Uuid,
    pub from: Option<String>,
    pub to: String,
    pub transitions: Vec<String>,
    pub methods: Vec<String>,
    pub data: DataMap,
    pub started_at: DateTime<Utc>,
}

/// How a `transition` request settled successfully.
pub enum TransitionOutcome<T> {
    /// The transition ran to completion.
    Completed(TransitionInfo<T>),
    /// A forced request arrived while another transition was in flight and
    /// was queued to run once that one settles.
    Queued(String),
}

impl<T> TransitionOutcome<T> {
    pub fn info(&self) -> Option<&TransitionInfo<T>> {
        match self {
            Self::Completed(info) => Some(info),
            Self::Queued(_) => None,
        }
    }

    pub fn into_info(self) -> Option<TransitionInfo<T>> {
        match self {
            Self::Completed(info) => Some(info),
            Self::Queued(_) => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

impl<T> fmt::Debug for TransitionOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(info) => f.debug_tuple("Completed").field(info).finish(),
            Self::Queued(target) => f.debug_tuple("Queued").field(target).finish(),
        }
    }
}
