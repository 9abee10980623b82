use std::future::Future;
use std::panic::resume_unwind;

use tokio::task::JoinHandle;

use crate::agent::Agent;
use crate::engine::error::{panic_text, ErrorLike};
use crate::engine::report::EntryKind;
use crate::wrap::{BindContext, GuardedSection};

/// Spawn a future whose unwind is reported with kind `task` before being
/// resumed, so the outer join handle observes the original panic
/// untouched. Scheduling is untouched: wrapping never changes when or
/// where the future runs, only observes how it ends.
pub fn spawn_watched<F>(agent: &Agent, future: F, context: &str) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let sink = agent.sink();
    let bind = BindContext {
        context: context.to_string(),
        bound_at_ms: agent.inner().host.now_ms(),
        bind_stack: None,
    };
    tokio::spawn(async move {
        // The panic hook sees the unwind first; marking the polls as
        // guarded leaves the report to the join-side handling below.
        let mut future = Box::pin(future);
        let inner = tokio::spawn(std::future::poll_fn(move |cx| {
            let _section = GuardedSection::enter();
            future.as_mut().poll(cx)
        }));
        match inner.await {
            Ok(value) => value,
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                sink.failure(
                    ErrorLike::Panic {
                        message: panic_text(payload.as_ref()),
                        location: None,
                    },
                    EntryKind::Task,
                    Some(bind),
                );
                resume_unwind(payload)
            }
            Err(err) => {
                // Runtime shutdown cancellation; surface it as an unwind
                // so the outer join does not hang on a vanished task.
                resume_unwind(Box::new(err.to_string()))
            }
        }
    })
}
