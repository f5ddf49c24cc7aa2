//! Where the machine API lives: on the target itself or on a proxy.

use crate::builder::{MachineBuilder, MachineOptions};
use crate::core::StateTable;
use crate::effects::bindings::{Bindings, SubjectHooks};
use crate::effects::events::EventBus;
use crate::effects::machine::StateMachine;
use std::sync::Arc;

/// Receiver of the machine API.
pub(crate) enum Receiver<T> {
    /// Installed on the target; subject hooks and events are the target's.
    InPlace,
    /// A separate object referencing the target.
    Proxy(ProxyReceiver<T>),
}

pub(crate) struct ProxyReceiver<T> {
    hooks: SubjectHooks<T>,
    events: EventBus,
}

impl<T> Receiver<T> {
    pub(crate) fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }
}

impl<T: Send + Sync + 'static> StateMachine<T> {
    /// Layer a machine over `target`.
    ///
    /// The state table is compiled against `bindings` once, here. Without an
    /// `initial` flag the machine starts with no state.
    pub fn new(
        target: Arc<T>,
        states: StateTable<T>,
        bindings: Bindings<T>,
        options: MachineOptions,
    ) -> Self {
        Self::assemble(target, states, bindings, options, SubjectHooks::default())
    }

    /// Start building a machine over `target`.
    pub fn builder(target: Arc<T>) -> MachineBuilder<T> {
        MachineBuilder::new(target)
    }

    pub(crate) fn assemble(
        target: Arc<T>,
        states: StateTable<T>,
        bindings: Bindings<T>,
        options: MachineOptions,
        proxy_hooks: SubjectHooks<T>,
    ) -> Self {
        let receiver = if options.proxy {
            Receiver::Proxy(ProxyReceiver {
                hooks: proxy_hooks,
                events: EventBus::new(),
            })
        } else {
            Receiver::InPlace
        };
        Self::from_parts(target, states, bindings, options, receiver)
    }

    /// Whether the machine wraps its target instead of working in place.
    pub fn is_proxy(&self) -> bool {
        self.inner.receiver.is_proxy()
    }

    /// Emitter receiving `exec`, `exec:fail`, `transition` and
    /// `transition:fail`.
    ///
    /// A proxy always has one of its own. In place this is the target's
    /// emitter, if it has one.
    pub fn events(&self) -> Option<&EventBus> {
        match &self.inner.receiver {
            Receiver::Proxy(proxy) => Some(&proxy.events),
            Receiver::InPlace => self.inner.bindings.event_emitter(),
        }
    }

    pub(crate) fn subject_hooks(&self) -> &SubjectHooks<T> {
        match &self.inner.receiver {
            Receiver::Proxy(proxy) => &proxy.hooks,
            Receiver::InPlace => self.inner.bindings.subject_hooks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateDefinition;
    use crate::effects::events::EventPayload;
    use serde_json::Value;
    use std::sync::Mutex;

    struct Player;

    fn table() -> StateTable<Player> {
        StateTable::new()
            .state("stopped", StateDefinition::new().initial())
            .state("playing", StateDefinition::new())
    }

    #[test]
    fn in_place_uses_target_emitter() {
        let emitter = EventBus::new();
        let bindings = Bindings::new().emitter(emitter.clone());
        let machine = StateMachine::new(Arc::new(Player), table(), bindings, MachineOptions::default());

        assert!(!machine.is_proxy());
        machine.events().unwrap().on("x", |_, _| {});
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn in_place_without_emitter_has_no_events() {
        let machine = StateMachine::new(Arc::new(Player), table(), Bindings::new(), MachineOptions::default());
        assert!(machine.events().is_none());
    }

    #[tokio::test]
    async fn proxy_owns_a_separate_emitter() {
        let target_events = EventBus::new();
        let bindings = Bindings::new()
            .method("noop", |_, _| async { Ok(Value::Null) })
            .emitter(target_events.clone());
        let options = MachineOptions {
            proxy: true,
            ..MachineOptions::default()
        };
        let proxy = StateMachine::new(Arc::new(Player), table(), bindings, options);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        proxy.events().unwrap().on("transition", move |name, payload| {
            if let EventPayload::Transition(record) = payload {
                sink.lock().unwrap().push((name.to_string(), record.to.clone()));
            }
        });

        proxy.transition("playing", false).await.unwrap();

        assert!(proxy.is_proxy());
        assert_eq!(target_events.listener_count(), 0);
        assert_eq!(*seen.lock().unwrap(), [("transition".to_string(), "playing".to_string())]);
    }
}
