use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics::Metrics;

/// Live feed registration. The feed runs as a task until `unsubscribe` is
/// called or the handle is dropped.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns `feed` with a token it must watch for cancellation.
    pub(crate) fn spawn<F, Fut>(metrics: &Metrics, feed: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let gauge = metrics.active_subscriptions.clone();
        let future = feed(token.clone());

        gauge.inc();
        let task = tokio::spawn(async move {
            future.await;
            gauge.dec();
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Handle with nothing behind it, for feeds the runtime cannot provide.
    pub fn inert() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self { token, task: None }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(self) {
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
