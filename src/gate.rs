use std::future::Future;

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Runs `task` for every item with at most `limit` futures past the gate at
/// once. Results come back in input order.
pub async fn gated_fan_out<I, T, F, Fut, R>(items: I, limit: usize, task: F) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let gate = Semaphore::new(limit.max(1));
    let gate = &gate;
    let pending = items.into_iter().map(|item| {
        let work = task(item);
        async move {
            // The semaphore lives for the whole call and is never closed.
            let _permit = gate.acquire().await.ok();
            work.await
        }
    });
    join_all(pending).await
}
