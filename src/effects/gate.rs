//! The method gate: runs a target method only when the current state allows it.

use crate::core::before_hook_label;
use crate::effects::bindings::{MethodCall, MethodFn, MethodHook};
use crate::effects::error::{FsmError, FsmResult};
use crate::effects::events::EventPayload;
use crate::effects::machine::StateMachine;
use crate::effects::pipeline::run_series;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

impl<T: Send + Sync + 'static> StateMachine<T> {
    /// Call the gated method `method` with `args`.
    ///
    /// Fails with [`FsmError::MethodNotAllowed`] while the machine has no
    /// state or the current state does not list the method. Before the
    /// method runs, the subject's `onBefore<Method>` and `onBeforeExecute`
    /// hooks, the global method hooks and `onExecute` run in series,
    /// followed by the transition implied by the method's trigger.
    ///
    /// `exec` or `exec:fail` is emitted once the call settles, not when it
    /// starts. Calls refused by the gate itself emit neither.
    pub fn call(&self, method: impl Into<String>, args: Vec<Value>) -> BoxFuture<'static, FsmResult<Value>> {
        let machine = self.clone();
        let method = method.into();
        async move { machine.dispatch(method, args).await }.boxed()
    }

    async fn dispatch(&self, method: String, args: Vec<Value>) -> FsmResult<Value> {
        let implementation = match self.inner.bindings.method_fn(&method) {
            Some(implementation) if self.inner.compiled.is_gated(&method) => Arc::clone(implementation),
            _ => return Err(FsmError::UnknownMethod(method)),
        };
        self.check_gate(&method)?;

        let result = self.execute(&method, implementation, args.clone()).await;
        let event = if result.is_ok() { "exec" } else { "exec:fail" };
        self.emit(event, EventPayload::Exec { method, args });
        result
    }

    fn check_gate(&self, method: &str) -> FsmResult<()> {
        let Some(current) = self.state() else {
            debug!(method, "no current state, method rejected");
            return Err(FsmError::MethodNotAllowed(method.to_string()));
        };

        let allowed = match self
            .inner
            .table
            .get(&current)
            .and_then(|definition| definition.methods.as_ref())
        {
            Some(listed) if !listed.is_empty() => listed.iter().any(|listed| listed == method),
            _ => true,
        };

        if allowed {
            Ok(())
        } else {
            debug!(method, state = %current, "method not allowed in state");
            Err(FsmError::MethodNotAllowed(method.to_string()))
        }
    }

    async fn execute(&self, method: &str, implementation: MethodFn<T>, args: Vec<Value>) -> FsmResult<Value> {
        let hooks = self.subject_hooks();
        let mut chain: Vec<MethodHook<T>> = Vec::new();
        if let Some(before) = hooks.before(method) {
            trace!(handler = %before_hook_label(method), "dispatching");
            chain.push(Arc::clone(before));
        }
        chain.extend(hooks.before_execute().cloned());
        chain.extend(self.lock_hooks().on_method.iter().cloned());
        chain.extend(hooks.execute().cloned());

        if let Some(state) = self.inner.compiled.trigger_target(method) {
            let state = state.to_string();
            chain.push(Arc::new(move |call: MethodCall<T>| {
                let request = call.machine.request_transition(state.clone(), false);
                async move { request.await.map(|_| ()) }.boxed()
            }));
        }

        let call = MethodCall {
            machine: self.clone(),
            method: method.to_string(),
            args: args.clone(),
        };

        match run_series(chain, call.clone()).await {
            Ok(()) => implementation(Arc::clone(&self.inner.target), args).await,
            Err(error) => {
                let error = error.or_default(|| FsmError::MethodNotAllowed(method.to_string()));
                debug!(method, %error, "method hook chain failed");
                if let Some(on_fail) = hooks.execute_fail() {
                    if let Err(hook_error) = on_fail((call, error.clone())).await {
                        warn!(method, error = %hook_error, "execute-fail hook failed");
                    }
                }
                Err(error)
            }
        }
    }
}
