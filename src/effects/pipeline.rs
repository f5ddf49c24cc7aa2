//! Sequential hook runner shared by every callback chain.

use crate::effects::error::FsmResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a hook.
pub type HookFuture = BoxFuture<'static, FsmResult<()>>;

/// A hook taking a fixed argument bundle `A`.
pub type Callback<A> = Arc<dyn Fn(A) -> HookFuture + Send + Sync>;

/// Box an async closure into a [`Callback`].
pub fn callback<A, F, Fut>(hook: F) -> Callback<A>
where
    A: 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FsmResult<()>> + Send + 'static,
{
    Arc::new(move |args: A| hook(args).boxed())
}

/// Run `callbacks` one after another with the same arguments.
///
/// Each callback's future is awaited before the next callback is invoked.
/// The first failure stops the chain and is returned as is; an empty chain
/// succeeds immediately.
pub async fn run_series<A>(callbacks: Vec<Callback<A>>, args: A) -> FsmResult<()>
where
    A: Clone,
{
    for callback in callbacks {
        callback(args.clone()).await?;
    }
    Ok(())
}
