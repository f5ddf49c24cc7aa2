//! The transition engine and the machine's introspection surface.

use crate::builder::{ApiMember, MachineOptions};
use crate::core::{
    route_event, route_label, state_label, CompiledDefinition, DataMap, DataSpec, StateDefinition,
    StateTable,
};
use crate::effects::bindings::{Bindings, MethodCall, MethodHook};
use crate::effects::error::{FsmError, FsmResult};
use crate::effects::events::EventPayload;
use crate::effects::pipeline::{callback, run_series, Callback, HookFuture};
use crate::effects::subject::Receiver;
use crate::effects::transition::{TransitionInfo, TransitionOutcome};
use chrono::Utc;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Global hook receiving the machine and the transition descriptor.
pub type MachineHook<T> = Callback<(StateMachine<T>, TransitionInfo<T>)>;

#[derive(Debug, Default)]
struct MachineState {
    current: Option<String>,
    in_transition: bool,
    pending: Option<String>,
}

pub(crate) struct HookRegistry<T> {
    pub(crate) on_method: Vec<MethodHook<T>>,
    on_transition: Vec<MachineHook<T>>,
    on_failure: Vec<MachineHook<T>>,
}

impl<T> Default for HookRegistry<T> {
    fn default() -> Self {
        Self {
            on_method: Vec::new(),
            on_transition: Vec::new(),
            on_failure: Vec::new(),
        }
    }
}

pub(crate) struct Inner<T> {
    pub(crate) target: Arc<T>,
    pub(crate) table: StateTable<T>,
    pub(crate) bindings: Bindings<T>,
    pub(crate) compiled: CompiledDefinition<T>,
    pub(crate) options: MachineOptions,
    pub(crate) receiver: Receiver<T>,
    state: Mutex<MachineState>,
    hooks: Mutex<HookRegistry<T>>,
}

enum Admission {
    Queued,
    Admitted { previous: Option<String> },
}

/// Holds the in-flight slot of an admitted transition.
///
/// Dropped before [`InFlight::release`] means the transition future was
/// cancelled: the machine goes back to the state it left and forgets any
/// queued request, so later transitions are not refused forever.
struct InFlight<T: Send + Sync + 'static> {
    machine: StateMachine<T>,
    previous: Option<String>,
    target: String,
    armed: bool,
}

impl<T: Send + Sync + 'static> InFlight<T> {
    fn release(mut self) -> Option<String> {
        self.armed = false;
        self.machine.release(&self.target)
    }
}

impl<T: Send + Sync + 'static> Drop for InFlight<T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.machine.lock_state();
        warn!(to = %self.target, restored = ?self.previous, "transition dropped before settling");
        state.in_transition = false;
        state.pending = None;
        if state.current.as_deref() == Some(self.target.as_str()) {
            state.current = self.previous.take();
        }
    }
}

/// A finite state machine layered over a target object.
///
/// This is the subject callers talk to. It is a cheap handle: clones share
/// the same machine.
///
/// # Example
///
/// ```rust
/// use deferred_fsm::core::{StateDefinition, StateTable};
/// use deferred_fsm::effects::{Bindings, StateMachine};
/// use deferred_fsm::builder::MachineOptions;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// struct Door;
///
/// let states = StateTable::new()
///     .state("open", StateDefinition::new().methods(["closeDoor"]).transitions(["shut"]))
///     .state("shut", StateDefinition::new().transitions(["open"]));
/// let bindings = Bindings::new().method("closeDoor", |_door: Arc<Door>, _args| async { Ok(json!(42)) });
///
/// let door = StateMachine::new(Arc::new(Door), states, bindings, MachineOptions::default());
///
/// futures::executor::block_on(async {
///     assert!(door.call("closeDoor", vec![]).await.is_err());
///     door.transition("open", false).await.unwrap();
///     assert_eq!(door.call("closeDoor", vec![]).await.unwrap(), json!(42));
/// });
/// ```
pub struct StateMachine<T> {
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T> Clone for StateMachine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> StateMachine<T> {
    pub(crate) fn from_parts(
        target: Arc<T>,
        table: StateTable<T>,
        bindings: Bindings<T>,
        options: MachineOptions,
        receiver: Receiver<T>,
    ) -> Self {
        let compiled = CompiledDefinition::compile(&table, &bindings, options.gate_all_methods);
        let current = compiled.initial().map(str::to_string);
        debug!(
            states = ?compiled.names(),
            initial = ?current,
            gated = ?compiled.gated(),
            proxy = receiver.is_proxy(),
            "state machine assembled"
        );

        Self {
            inner: Arc::new(Inner {
                target,
                table,
                bindings,
                compiled,
                options,
                receiver,
                state: Mutex::new(MachineState {
                    current,
                    ..MachineState::default()
                }),
                hooks: Mutex::new(HookRegistry::default()),
            }),
        }
    }

    /// The target object, never copied.
    pub fn context(&self) -> &Arc<T> {
        &self.inner.target
    }

    /// Options the machine was assembled with.
    pub fn options(&self) -> &MachineOptions {
        &self.inner.options
    }

    /// Whether `member` was left off the public surface.
    pub fn is_omitted(&self, member: ApiMember) -> bool {
        self.inner.options.is_omitted(member)
    }

    /// Name of the initial state, if one is marked.
    pub fn initial_state(&self) -> Option<&str> {
        self.inner.compiled.initial()
    }

    /// Whether the machine currently is in `name`.
    pub fn has_state(&self, name: &str) -> bool {
        self.state().as_deref() == Some(name)
    }

    /// Current state, `None` before the first successful transition.
    pub fn state(&self) -> Option<String> {
        self.lock_state().current.clone()
    }

    /// Definition of the state `name`.
    pub fn state_definition(&self, name: &str) -> Option<&StateDefinition<T>> {
        self.inner.table.get(name)
    }

    /// Definition of the current state.
    pub fn current_definition(&self) -> Option<&StateDefinition<T>> {
        let current = self.state()?;
        self.inner.table.get(&current)
    }

    /// State names in declaration order.
    pub fn states(&self) -> &[String] {
        self.inner.compiled.names()
    }

    /// All state definitions in table order.
    pub fn definitions(&self) -> &StateTable<T> {
        &self.inner.table
    }

    /// Methods governed by this machine.
    pub fn gated_methods(&self) -> &[String] {
        self.inner.compiled.gated()
    }

    /// Transitions allowed from `name`, or from the current state.
    ///
    /// States without a `transitions` list may move to any other state.
    pub fn state_transitions(&self, name: Option<&str>) -> Vec<String> {
        let name = self.resolve(name);
        let listed = name
            .as_deref()
            .and_then(|name| self.inner.table.get(name))
            .and_then(|definition| definition.transitions.clone());

        listed.unwrap_or_else(|| {
            self.states()
                .iter()
                .filter(|state| Some(state.as_str()) != name.as_deref())
                .cloned()
                .collect()
        })
    }

    /// Methods allowed in `name`, or in the current state.
    ///
    /// States without a `methods` list allow every method of the target.
    pub fn state_methods(&self, name: Option<&str>) -> Vec<String> {
        self.resolve(name)
            .and_then(|name| self.inner.table.get(&name))
            .and_then(|definition| definition.methods.clone())
            .unwrap_or_else(|| self.inner.bindings.method_names().to_vec())
    }

    /// Fresh copy of the data of `name`, or of the current state.
    pub fn state_data(&self, name: Option<&str>) -> DataMap {
        let Some(name) = self.resolve(name) else {
            return DataMap::new();
        };
        let Some(definition) = self.inner.table.get(&name) else {
            return DataMap::new();
        };

        match &definition.data {
            Some(DataSpec::Static(data)) => data.clone(),
            Some(DataSpec::Provider(provider)) => provider(self, &name),
            Some(DataSpec::Method(provider)) => self
                .inner
                .bindings
                .named_data_provider(provider)
                .map(|provider| provider(self, &name))
                .unwrap_or_default(),
            None => DataMap::new(),
        }
    }

    /// Whether a transition is in flight.
    pub fn in_transition(&self) -> bool {
        self.lock_state().in_transition
    }

    /// Whether a non-forced transition to `target` would be admitted now,
    /// ignoring an in-flight transition.
    pub fn transition_allowed(&self, target: &str) -> bool {
        let current = self.state();
        self.allowed_from(current.as_deref(), target)
    }

    /// Register a hook run for every gated method call.
    pub fn on_method<F, Fut>(&self, hook: F)
    where
        F: Fn(MethodCall<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        if self.skip_omitted(ApiMember::OnMethod) {
            return;
        }
        self.lock_hooks().on_method.push(callback(hook));
    }

    /// Register a hook run before the exit/enter hooks of every transition.
    pub fn on_transition<F, Fut>(&self, hook: F)
    where
        F: Fn(StateMachine<T>, TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        if self.skip_omitted(ApiMember::OnTransition) {
            return;
        }
        self.lock_hooks().on_transition.push(machine_hook(hook));
    }

    /// Like [`on_transition`](Self::on_transition), but runs before the
    /// hooks registered so far.
    pub fn on_transition_prepend<F, Fut>(&self, hook: F)
    where
        F: Fn(StateMachine<T>, TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        if self.skip_omitted(ApiMember::OnTransition) {
            return;
        }
        self.lock_hooks().on_transition.insert(0, machine_hook(hook));
    }

    /// Register a hook run after a failed transition has been rolled back.
    pub fn on_failure<F, Fut>(&self, hook: F)
    where
        F: Fn(StateMachine<T>, TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        if self.skip_omitted(ApiMember::OnFailure) {
            return;
        }
        self.lock_hooks().on_failure.push(machine_hook(hook));
    }

    /// Move the machine to `target`.
    ///
    /// A forced request skips the `transitions` allow-list and, while another
    /// transition is in flight, is queued to run once that one settles.
    pub fn transition(
        &self,
        target: impl Into<String>,
        force: bool,
    ) -> BoxFuture<'static, FsmResult<TransitionOutcome<T>>> {
        self.guarded_transition(ApiMember::Transition, target.into(), force)
    }

    /// Alias of [`transition`](Self::transition).
    pub fn set_state(
        &self,
        target: impl Into<String>,
        force: bool,
    ) -> BoxFuture<'static, FsmResult<TransitionOutcome<T>>> {
        self.guarded_transition(ApiMember::SetState, target.into(), force)
    }

    /// The built-in apply step.
    ///
    /// Runs the `(from, to)` handler, the `to` handler, then
    /// `onTransitionComplete` or the target's generic `onTransition`, and
    /// finally triggers `<from>:to:<to>`, `<to>` and, when proxying,
    /// `transition` on the target's own emitter.
    pub fn apply_transition(&self, info: TransitionInfo<T>) -> HookFuture {
        if self.is_omitted(ApiMember::ApplyTransition) {
            return future::ready(Err(FsmError::Omitted(ApiMember::ApplyTransition))).boxed();
        }
        self.dispatch_handlers(info)
    }

    pub(crate) fn request_transition(
        &self,
        target: String,
        force: bool,
    ) -> BoxFuture<'static, FsmResult<TransitionOutcome<T>>> {
        let machine = self.clone();
        async move { machine.run_transition(target, force).await }.boxed()
    }

    pub(crate) fn emit(&self, event: &str, payload: EventPayload) {
        if let Some(events) = self.events() {
            events.trigger(event, &payload);
        }
    }

    pub(crate) fn lock_hooks(&self) -> MutexGuard<'_, HookRegistry<T>> {
        self.inner.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, MachineState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, name: Option<&str>) -> Option<String> {
        name.map(str::to_string).or_else(|| self.state())
    }

    fn skip_omitted(&self, member: ApiMember) -> bool {
        let omitted = self.is_omitted(member);
        if omitted {
            debug!(%member, "registration ignored, member is omitted");
        }
        omitted
    }

    fn allowed_from(&self, current: Option<&str>, target: &str) -> bool {
        if !self.inner.compiled.is_state(target) {
            return false;
        }
        match current {
            None => true,
            Some(current) if current == target => false,
            Some(current) => match self
                .inner
                .table
                .get(current)
                .and_then(|definition| definition.transitions.as_ref())
            {
                Some(allowed) => allowed.iter().any(|state| state == target),
                None => true,
            },
        }
    }

    fn guarded_transition(
        &self,
        member: ApiMember,
        target: String,
        force: bool,
    ) -> BoxFuture<'static, FsmResult<TransitionOutcome<T>>> {
        if self.is_omitted(member) {
            return future::ready(Err(FsmError::Omitted(member))).boxed();
        }
        self.request_transition(target, force)
    }

    async fn run_transition(&self, target: String, force: bool) -> FsmResult<TransitionOutcome<T>> {
        let previous = match self.admit(&target, force)? {
            Admission::Queued => return Ok(TransitionOutcome::Queued(target)),
            Admission::Admitted { previous } => previous,
        };
        let in_flight = InFlight {
            machine: self.clone(),
            previous: previous.clone(),
            target: target.clone(),
            armed: true,
        };

        let info = self.describe(previous, &target);
        debug!(id = %info.id, from = ?info.from, to = %target, force, "transition admitted");

        let result = match self.run_hooks(&info).await {
            Ok(()) => Ok(info.clone()),
            Err(error) => {
                let error = error.or_default(|| FsmError::TransitionNotAllowed(target.clone()));
                debug!(id = %info.id, to = %target, %error, "transition failed, rolling back");
                self.recover(&info).await;
                Err(error)
            }
        };

        let pending = in_flight.release();
        let event = if result.is_ok() { "transition" } else { "transition:fail" };
        self.emit(event, EventPayload::Transition(info.record()));

        if let Some(next) = pending {
            debug!(from = %target, to = %next, "running queued transition");
            if let Err(error) = self.request_transition(next.clone(), false).await {
                warn!(to = %next, %error, "queued transition failed");
            }
        }

        result.map(TransitionOutcome::Completed)
    }

    fn admit(&self, target: &str, force: bool) -> FsmResult<Admission> {
        let mut state = self.lock_state();

        if state.in_transition {
            if force {
                debug!(to = target, "transition in flight, queueing forced request");
                state.pending = Some(target.to_string());
                return Ok(Admission::Queued);
            }
            debug!(to = target, "transition in flight, request rejected");
            return Err(FsmError::TransitionNotAllowed(target.to_string()));
        }

        let current = state.current.as_deref();
        let admitted = self.allowed_from(current, target)
            || (force && self.inner.compiled.is_state(target) && current != Some(target));
        if !admitted {
            debug!(from = ?current, to = target, force, "transition rejected");
            return Err(FsmError::TransitionNotAllowed(target.to_string()));
        }

        state.in_transition = true;
        let previous = state.current.replace(target.to_string());
        Ok(Admission::Admitted { previous })
    }

    fn describe(&self, from: Option<String>, to: &str) -> TransitionInfo<T> {
        TransitionInfo {
            id: Uuid::new_v4(),
            from,
            to: to.to_string(),
            context: Arc::clone(&self.inner.target),
            transitions: self.state_transitions(Some(to)),
            methods: self.state_methods(Some(to)),
            data: self.state_data(Some(to)),
            started_at: Utc::now(),
        }
    }

    async fn run_hooks(&self, info: &TransitionInfo<T>) -> FsmResult<()> {
        let mut before: Vec<MachineHook<T>> = Vec::new();
        if self.inner.options.apply {
            before.push(Arc::new(|(machine, info): (StateMachine<T>, TransitionInfo<T>)| {
                machine.dispatch_handlers(info)
            }));
        }
        before.extend(self.lock_hooks().on_transition.iter().cloned());
        run_series(before, (self.clone(), info.clone())).await?;

        let exit = info
            .from
            .as_deref()
            .map(|from| self.inner.compiled.exit_hooks(from))
            .unwrap_or_default();
        run_series(exit, info.clone()).await?;

        run_series(self.inner.compiled.enter_hooks(&info.to), info.clone()).await
    }

    async fn recover(&self, info: &TransitionInfo<T>) {
        let rollback: MachineHook<T> = Arc::new(|(machine, info): (StateMachine<T>, TransitionInfo<T>)| {
            machine.roll_back(info)
        });
        let mut chain = vec![rollback];
        chain.extend(self.lock_hooks().on_failure.iter().cloned());

        if let Err(error) = run_series(chain, (self.clone(), info.clone())).await {
            warn!(id = %info.id, %error, "failure hook failed");
        }
    }

    /// Request a forced transition back to where the failed attempt started.
    ///
    /// The attempt is still in flight, so the request is queued and runs
    /// once it settles. Nothing happens on a failed first transition.
    fn roll_back(&self, info: TransitionInfo<T>) -> HookFuture {
        match info.from {
            Some(previous) => {
                let request = self.request_transition(previous, true);
                async move { request.await.map(|_| ()) }.boxed()
            }
            None => future::ready(Ok(())).boxed(),
        }
    }

    fn release(&self, reached: &str) -> Option<String> {
        let mut state = self.lock_state();
        state.in_transition = false;
        state.pending.take().filter(|pending| pending != reached)
    }

    fn dispatch_handlers(&self, info: TransitionInfo<T>) -> HookFuture {
        let bindings = &self.inner.bindings;
        let generic_allowed = self.is_proxy() || self.is_omitted(ApiMember::OnTransition);
        let mut handlers = Vec::new();

        if let Some(from) = info.from.as_deref() {
            if let Some(handler) = bindings.route_handler(from, &info.to) {
                trace!(handler = %route_label(from, &info.to), "dispatching");
                handlers.push(Arc::clone(handler));
            }
        }
        if let Some(handler) = bindings.state_handler(&info.to) {
            trace!(handler = %state_label(&info.to), "dispatching");
            handlers.push(Arc::clone(handler));
        }
        if let Some(handler) = bindings.transition_complete_handler() {
            trace!(handler = "onTransitionComplete", "dispatching");
            handlers.push(Arc::clone(handler));
        } else if let Some(handler) = bindings.generic_transition_handler().filter(|_| generic_allowed) {
            trace!(handler = "onTransition", "dispatching");
            handlers.push(Arc::clone(handler));
        }

        let emitter = bindings.event_emitter().cloned();
        let proxy = self.is_proxy();

        async move {
            run_series(handlers, info.clone()).await?;

            if let Some(events) = emitter {
                let payload = EventPayload::Transition(info.record());
                if let Some(from) = info.from.as_deref() {
                    events.trigger(&route_event(from, &info.to), &payload);
                }
                events.trigger(&info.to, &payload);
                if proxy {
                    events.trigger("transition", &payload);
                }
            }
            Ok(())
        }
        .boxed()
    }
}

fn machine_hook<T, F, Fut>(hook: F) -> MachineHook<T>
where
    T: Send + Sync + 'static,
    F: Fn(StateMachine<T>, TransitionInfo<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FsmResult<()>> + Send + 'static,
{
    callback(move |(machine, info): (StateMachine<T>, TransitionInfo<T>)| hook(machine, info))
}
