//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::builder::options::{ApiMember, MachineConfig, MachineOptions};
use crate::core::{StateDefinition, StateTable};
use crate::effects::{Bindings, StateMachine, SubjectHooks};
use crate::validation::{problems, validate};
use std::sync::Arc;
use tracing::warn;

/// Builder for layering a machine over a target with a fluent API.
pub struct MachineBuilder<T> {
    target: Arc<T>,
    states: StateTable<T>,
    bindings: Bindings<T>,
    options: MachineOptions,
    proxy_hooks: SubjectHooks<T>,
    strict: bool,
}

impl<T: Send + Sync + 'static> MachineBuilder<T> {
    /// Create a builder for a machine over `target`.
    pub fn new(target: Arc<T>) -> Self {
        Self {
            target,
            states: StateTable::new(),
            bindings: Bindings::new(),
            options: MachineOptions::default(),
            proxy_hooks: SubjectHooks::new(),
            strict: false,
        }
    }

    /// Replace the whole state table.
    pub fn states(mut self, states: StateTable<T>) -> Self {
        self.states = states;
        self
    }

    /// Add or replace one state.
    pub fn state(mut self, name: impl Into<String>, definition: StateDefinition<T>) -> Self {
        self.states.insert(name, definition);
        self
    }

    /// Set the target's callable surface.
    pub fn bindings(mut self, bindings: Bindings<T>) -> Self {
        self.bindings = bindings;
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: MachineOptions) -> Self {
        self.options = options;
        self
    }

    /// Take options and states from a loaded configuration.
    pub fn config(mut self, config: MachineConfig<T>) -> Self {
        self.options = config.options;
        self.states = config.states;
        self
    }

    /// Wrap the target instead of working in place.
    pub fn proxy(mut self) -> Self {
        self.options.proxy = true;
        self
    }

    /// Run per-state apply handlers on every transition.
    pub fn apply(mut self) -> Self {
        self.options.apply = true;
        self
    }

    /// Leave `member` off the public surface.
    pub fn omit(mut self, member: ApiMember) -> Self {
        if !self.options.is_omitted(member) {
            self.options.omit.push(member);
        }
        self
    }

    /// Gate every method registered in the bindings.
    pub fn gate_all_methods(mut self) -> Self {
        self.options.gate_all_methods = true;
        self
    }

    /// Subject-level method hooks carried by the proxy.
    ///
    /// Ignored unless the machine is built as a proxy.
    pub fn proxy_hooks(mut self, hooks: SubjectHooks<T>) -> Self {
        self.proxy_hooks = hooks;
        self
    }

    /// Refuse to build when the definition lint reports any problem.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Build the state machine.
    ///
    /// Only a strict builder can fail; a lenient one logs what the lint found.
    pub fn build(self) -> Result<StateMachine<T>, BuildError> {
        let report = validate(&self.states, &self.bindings, self.options.gate_all_methods);
        let found = problems(&report);

        if !found.is_empty() {
            if self.strict {
                return Err(BuildError::InvalidDefinition(found));
            }
            for problem in &found {
                warn!(%problem, "questionable state definition");
            }
        }

        Ok(StateMachine::assemble(
            self.target,
            self.states,
            self.bindings,
            self.options,
            self.proxy_hooks,
        ))
    }
}
