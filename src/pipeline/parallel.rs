use futures_util::stream::{self, StreamExt};
use std::future::Future;

/// Run `task` over `items` with at most `limit` in flight
///
/// Results land in the slot of the item that produced them, so the output
/// order matches the input order whatever the completion order was.
pub async fn map_indexed<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let len = items.len();
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(len).collect();

    let mut results = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = task(index, item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((index, result)) = results.next().await {
        slots[index] = Some(result);
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        // Later items finish first
        let items = vec![40u64, 30, 20, 10, 0];

        let results = map_indexed(items, 5, |index, delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            index * 10
        })
        .await;

        assert_eq!(results, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn test_respects_concurrency_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = map_indexed((0..8).collect(), 2, |_, value: usize| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                value
            }
        })
        .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<usize> = map_indexed(Vec::<usize>::new(), 4, |i, _| async move { i }).await;
        assert!(results.is_empty());
    }
}
