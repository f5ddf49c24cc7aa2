//! Lookup tables derived once per machine from a state table.

use crate::core::definition::{CallbackSpec, StateTable};
use crate::effects::{Bindings, TransitionHook};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Read-only tables consumed by the method gate and the transition engine.
///
/// Compilation is deterministic and never touches the target.
pub struct CompiledDefinition<T> {
    names: Vec<String>,
    initial: Option<String>,
    enter: HashMap<String, Vec<TransitionHook<T>>>,
    exit: HashMap<String, Vec<TransitionHook<T>>>,
    triggers: HashMap<String, String>,
    gated: Vec<String>,
}

impl<T> CompiledDefinition<T> {
    /// Compile `table` against the target's `bindings`.
    ///
    /// With `gate_all_methods` every method registered on the target is gated;
    /// otherwise the gated set is the union of the states' `methods` lists,
    /// restricted to methods the target implements.
    pub fn compile(table: &StateTable<T>, bindings: &Bindings<T>, gate_all_methods: bool) -> Self {
        let names = table.names();
        let initial = table
            .iter()
            .find(|(_, definition)| definition.initial)
            .map(|(name, _)| name.to_string());

        let mut enter = HashMap::new();
        let mut exit = HashMap::new();
        let mut triggers = HashMap::new();
        let mut listed: Vec<String> = Vec::new();

        for (name, definition) in table.iter() {
            if let Some(trigger) = &definition.trigger {
                triggers.insert(trigger.clone(), name.to_string());
            }
            enter.insert(name.to_string(), resolve(name, &definition.enter, bindings));
            exit.insert(name.to_string(), resolve(name, &definition.exit, bindings));
            for method in definition.methods.iter().flatten() {
                if !listed.contains(method) {
                    listed.push(method.clone());
                }
            }
        }

        let gated = if gate_all_methods {
            bindings.method_names().to_vec()
        } else {
            listed
                .into_iter()
                .filter(|method| {
                    let implemented = bindings.has_method(method);
                    if !implemented {
                        debug!(method = %method, "listed method is not implemented by the target; not gated");
                    }
                    implemented
                })
                .collect()
        };

        Self {
            names,
            initial,
            enter,
            exit,
            triggers,
            gated,
        }
    }

    /// State names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    pub fn is_state(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// State implied by a successful call of `method`.
    pub fn trigger_target(&self, method: &str) -> Option<&str> {
        self.triggers.get(method).map(String::as_str)
    }

    pub fn triggers(&self) -> &HashMap<String, String> {
        &self.triggers
    }

    /// Gated methods, in first-seen order.
    pub fn gated(&self) -> &[String] {
        &self.gated
    }

    pub fn is_gated(&self, method: &str) -> bool {
        self.gated.iter().any(|gated| gated == method)
    }

    pub fn enter_hooks(&self, state: &str) -> Vec<TransitionHook<T>> {
        self.enter.get(state).cloned().unwrap_or_default()
    }

    pub fn exit_hooks(&self, state: &str) -> Vec<TransitionHook<T>> {
        self.exit.get(state).cloned().unwrap_or_default()
    }
}

fn resolve<T>(state: &str, specs: &[CallbackSpec<T>], bindings: &Bindings<T>) -> Vec<TransitionHook<T>> {
    specs
        .iter()
        .filter_map(|spec| match spec {
            CallbackSpec::Hook(hook) => Some(Arc::clone(hook)),
            CallbackSpec::Named(name) => {
                let resolved = bindings.named_callback(name).cloned();
                if resolved.is_none() {
                    debug!(state, callback = %name, "dropping unresolved callback");
                }
                resolved
            }
        })
        .collect()
}
