//! Explicit callable surface of a target object.
//!
//! A target declares the methods the machine may gate, the named callbacks
//! and data providers that string specs in a state table resolve to, and the
//! conventional handlers the apply step and the method gate look for.

use crate::core::DataMap;
use crate::effects::error::{FsmError, FsmResult};
use crate::effects::events::EventBus;
use crate::effects::machine::StateMachine;
use crate::effects::pipeline::{callback, Callback};
use crate::effects::transition::TransitionInfo;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a target method.
pub type MethodFuture = BoxFuture<'static, FsmResult<Value>>;

/// Implementation of a target method.
pub type MethodFn<T> = Arc<dyn Fn(Arc<T>, Vec<Value>) -> MethodFuture + Send + Sync>;

/// Hook receiving the descriptor of a transition.
pub type TransitionHook<T> = Callback<TransitionInfo<T>>;

/// Hook run around a gated method call.
pub type MethodHook<T> = Callback<MethodCall<T>>;

/// Hook run after a gated method's hook chain failed.
pub type ExecuteFailHook<T> = Callback<(MethodCall<T>, FsmError)>;

/// Produces the data of a state on demand.
pub type DataProvider<T> = Arc<dyn Fn(&StateMachine<T>, &str) -> DataMap + Send + Sync>;

/// Arguments shared by every hook of one gated method call.
pub struct MethodCall<T> {
    /// The subject the method was invoked on.
    pub machine: StateMachine<T>,
    pub method: String,
    pub args: Vec<Value>,
}

impl<T> Clone for MethodCall<T> {
    fn clone(&self) -> Self {
        Self {
            machine: self.machine.clone(),
            method: self.method.clone(),
            args: self.args.clone(),
        }
    }
}

impl<T> fmt::Debug for MethodCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("method", &self.method)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Hooks looked up on the subject around a gated method call.
///
/// When installing in place these come from the target's [`Bindings`]; a
/// proxy carries its own set.
pub struct SubjectHooks<T> {
    before: HashMap<String, MethodHook<T>>,
    before_execute: Option<MethodHook<T>>,
    execute: Option<MethodHook<T>>,
    execute_fail: Option<ExecuteFailHook<T>>,
}

impl<T: Send + Sync + 'static> SubjectHooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `onBefore<Method>`: runs first, only for `method`.
    pub fn on_before<F, Fut>(mut self, method: impl Into<String>, hook: F) -> Self
    where
        F: Fn(MethodCall<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.before.insert(method.into(), callback(hook));
        self
    }

    /// `onBeforeExecute`: runs for every gated method, before the global method hooks.
    pub fn on_before_execute<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(MethodCall<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.before_execute = Some(callback(hook));
        self
    }

    /// `onExecute`: runs for every gated method, after the global method hooks.
    pub fn on_execute<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(MethodCall<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.execute = Some(callback(hook));
        self
    }

    /// `onExecuteFail`: best-effort notification after a failed hook chain.
    pub fn on_execute_fail<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(MethodCall<T>, FsmError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.execute_fail = Some(callback(move |(call, error): (MethodCall<T>, FsmError)| hook(call, error)));
        self
    }
}

impl<T> SubjectHooks<T> {
    pub(crate) fn before(&self, method: &str) -> Option<&MethodHook<T>> {
        self.before.get(method)
    }

    pub(crate) fn before_execute(&self) -> Option<&MethodHook<T>> {
        self.before_execute.as_ref()
    }

    pub(crate) fn execute(&self) -> Option<&MethodHook<T>> {
        self.execute.as_ref()
    }

    pub(crate) fn execute_fail(&self) -> Option<&ExecuteFailHook<T>> {
        self.execute_fail.as_ref()
    }
}

impl<T> Default for SubjectHooks<T> {
    fn default() -> Self {
        Self {
            before: HashMap::new(),
            before_execute: None,
            execute: None,
            execute_fail: None,
        }
    }
}

/// Callable surface of a target object.
pub struct Bindings<T> {
    method_order: Vec<String>,
    methods: HashMap<String, MethodFn<T>>,
    callbacks: HashMap<String, TransitionHook<T>>,
    data_providers: HashMap<String, DataProvider<T>>,
    route_handlers: HashMap<(String, String), TransitionHook<T>>,
    state_handlers: HashMap<String, TransitionHook<T>>,
    on_transition_complete: Option<TransitionHook<T>>,
    on_transition: Option<TransitionHook<T>>,
    hooks: SubjectHooks<T>,
    emitter: Option<EventBus>,
}

impl<T: Send + Sync + 'static> Bindings<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method the machine can gate.
    pub fn method<F, Fut>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<T>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<Value>> + Send + 'static,
    {
        let name = name.into();
        if !self.methods.contains_key(&name) {
            self.method_order.push(name.clone());
        }
        self.methods
            .insert(name, Arc::new(move |target: Arc<T>, args: Vec<Value>| method(target, args).boxed()));
        self
    }

    /// Register a callback that `enter`/`exit` specs may name.
    pub fn callback<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.callbacks.insert(name.into(), callback(hook));
        self
    }

    /// Register a data provider that `data` specs may name.
    pub fn data_provider<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&StateMachine<T>, &str) -> DataMap + Send + Sync + 'static,
    {
        self.data_providers.insert(name.into(), Arc::new(provider));
        self
    }

    /// `on<From>To<To>`: most specific apply handler.
    pub fn on_route<F, Fut>(mut self, from: impl Into<String>, to: impl Into<String>, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.route_handlers
            .insert((from.into(), to.into()), callback(hook));
        self
    }

    /// `on<To>`: apply handler for every transition into `to`.
    pub fn on_state<F, Fut>(mut self, to: impl Into<String>, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.state_handlers.insert(to.into(), callback(hook));
        self
    }

    /// `onTransitionComplete`: generic apply handler, preferred over `on_transition`.
    pub fn on_transition_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.on_transition_complete = Some(callback(hook));
        self
    }

    /// The target's own `onTransition` handler.
    ///
    /// Only dispatched by the apply step when proxying or when the machine's
    /// `onTransition` member is omitted, since in place the machine's member
    /// shadows it.
    pub fn on_transition<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.on_transition = Some(callback(hook));
        self
    }

    /// Subject-level method hooks used when installing in place.
    pub fn hooks(mut self, hooks: SubjectHooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Event emitter the target already owns.
    pub fn emitter(mut self, emitter: EventBus) -> Self {
        self.emitter = Some(emitter);
        self
    }
}

impl<T> Bindings<T> {
    /// Names of the registered methods, in registration order.
    pub fn method_names(&self) -> &[String] {
        &self.method_order
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn has_callback(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn has_data_provider(&self, name: &str) -> bool {
        self.data_providers.contains_key(name)
    }

    pub(crate) fn method_fn(&self, name: &str) -> Option<&MethodFn<T>> {
        self.methods.get(name)
    }

    pub(crate) fn named_callback(&self, name: &str) -> Option<&TransitionHook<T>> {
        self.callbacks.get(name)
    }

    pub(crate) fn named_data_provider(&self, name: &str) -> Option<&DataProvider<T>> {
        self.data_providers.get(name)
    }

    pub(crate) fn route_handler(&self, from: &str, to: &str) -> Option<&TransitionHook<T>> {
        self.route_handlers.get(&(from.to_string(), to.to_string()))
    }

    pub(crate) fn state_handler(&self, to: &str) -> Option<&TransitionHook<T>> {
        self.state_handlers.get(to)
    }

    pub(crate) fn transition_complete_handler(&self) -> Option<&TransitionHook<T>> {
        self.on_transition_complete.as_ref()
    }

    pub(crate) fn generic_transition_handler(&self) -> Option<&TransitionHook<T>> {
        self.on_transition.as_ref()
    }

    pub(crate) fn subject_hooks(&self) -> &SubjectHooks<T> {
        &self.hooks
    }

    pub(crate) fn event_emitter(&self) -> Option<&EventBus> {
        self.emitter.as_ref()
    }
}

impl<T> Default for Bindings<T> {
    fn default() -> Self {
        Self {
            method_order: Vec::new(),
            methods: HashMap::new(),
            callbacks: HashMap::new(),
            data_providers: HashMap::new(),
            route_handlers: HashMap::new(),
            state_handlers: HashMap::new(),
            on_transition_complete: None,
            on_transition: None,
            hooks: SubjectHooks::default(),
            emitter: None,
        }
    }
}

impl<T> fmt::Debug for Bindings<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("methods", &self.method_order)
            .field("callbacks", &self.callbacks.len())
            .field("data_providers", &self.data_providers.len())
            .field("route_handlers", &self.route_handlers.len())
            .field("state_handlers", &self.state_handlers.len())
            .field("emitter", &self.emitter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Door;

    #[test]
    fn methods_keep_registration_order() {
        let bindings = Bindings::<Door>::new()
            .method("openDoor", |_, _| async { Ok(Value::Null) })
            .method("closeDoor", |_, _| async { Ok(json!(42)) })
            .method("openDoor", |_, _| async { Ok(json!("again")) });

        assert_eq!(bindings.method_names(), ["openDoor", "closeDoor"]);
        assert!(bindings.has_method("closeDoor"));
        assert!(!bindings.has_method("lock"));
    }

    #[tokio::test]
    async fn registered_method_is_invoked_with_target_and_args() {
        let bindings = Bindings::<Door>::new()
            .method("sum", |_, args: Vec<Value>| async move {
                Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
            });

        let method = bindings.method_fn("sum").unwrap();
        let result = method(Arc::new(Door), vec![json!(1), json!(2), json!(3)]).await;

        assert_eq!(result.unwrap(), json!(6));
    }

    #[test]
    fn handlers_are_keyed_by_route_and_state() {
        let bindings = Bindings::<Door>::new()
            .on_route("open", "shut", |_| async { Ok(()) })
            .on_state("shut", |_| async { Ok(()) });

        assert!(bindings.route_handler("open", "shut").is_some());
        assert!(bindings.route_handler("shut", "open").is_none());
        assert!(bindings.state_handler("shut").is_some());
        assert!(bindings.transition_complete_handler().is_none());
    }
}
