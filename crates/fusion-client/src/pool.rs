//! Bounded concurrent execution of part operations
//!
//! One pool instance exists per transfer call and is torn down when the
//! call returns, success or failure. The first fatal part failure is what
//! the caller sees; sibling results arriving after it are disregarded.

use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A bounded worker pool for part fetch/put operations
pub(crate) struct PartPool {
    width: usize,
}

impl PartPool {
    /// Create a pool of the given width
    pub(crate) fn new(width: usize) -> Result<Self> {
        if width == 0 {
            return Err(Error::Validation("worker pool size must be positive".into()));
        }
        Ok(Self { width })
    }

    /// A dispatcher for incremental spawn/reap cycles (upload backpressure)
    pub(crate) fn dispatcher<T: Send + 'static>(&self) -> PartDispatcher<T> {
        PartDispatcher {
            semaphore: Arc::new(Semaphore::new(self.width)),
            tasks: JoinSet::new(),
        }
    }

    /// Run every operation to completion, bounded by the pool width, and
    /// return the results ordered by part number.
    ///
    /// On the first failure the remaining work is abandoned and the causal
    /// error is returned with its part number attached.
    pub(crate) async fn run<T, F>(&self, ops: Vec<(u32, F)>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut dispatcher = self.dispatcher();
        for (number, op) in ops {
            dispatcher.spawn(number, op);
        }

        let mut results = Vec::new();
        while let Some(reaped) = dispatcher.reap().await {
            results.push(reaped?);
        }
        results.sort_by_key(|(number, _)| *number);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}

/// Incremental interface to the pool: spawn part operations one at a time
/// and reap acknowledgements as they land.
pub(crate) struct PartDispatcher<T> {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<(u32, Result<T>)>,
}

impl<T: Send + 'static> PartDispatcher<T> {
    /// Dispatch one part operation; it waits for a pool permit before
    /// doing any work
    pub(crate) fn spawn<F>(&mut self, number: u32, op: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        self.tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (number, Err(Error::Validation("worker pool closed".into()))),
            };
            (number, op.await)
        });
    }

    /// Await the next completed operation.
    ///
    /// Returns `None` once nothing is outstanding. A failed operation
    /// shuts the pool down (abandoning siblings) and surfaces the causal
    /// error tagged with its part number.
    pub(crate) async fn reap(&mut self) -> Option<Result<(u32, T)>> {
        match self.tasks.join_next().await? {
            Ok((number, Ok(value))) => Some(Ok((number, value))),
            Ok((number, Err(e))) => {
                self.tasks.shutdown().await;
                Some(Err(Error::Part {
                    number,
                    source: Box::new(e),
                }))
            }
            Err(join) => {
                self.tasks.shutdown().await;
                Some(Err(Error::Task(join)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn results_are_ordered_by_part_number() {
        let pool = PartPool::new(4).unwrap();
        // Later parts finish first.
        let ops = (1u32..=4)
            .map(|n| {
                (n, async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(5 - n) * 10)).await;
                    Ok(n * 100)
                })
            })
            .collect();
        let results = pool.run(ops).await.unwrap();
        assert_eq!(results, vec![100, 200, 300, 400]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_pool_width() {
        let pool = PartPool::new(2).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let ops = (1u32..=8)
            .map(|n| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                (n, async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();
        pool.run(ops).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn first_failure_wins_with_part_attribution() {
        let pool = PartPool::new(4).unwrap();
        let ops = (1u32..=4)
            .map(|n| {
                (n, async move {
                    if n == 3 {
                        Err(Error::Validation("boom".into()))
                    } else {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(n)
                    }
                })
            })
            .collect::<Vec<_>>();

        let err = pool.run(ops).await.unwrap_err();
        match err {
            Error::Part { number, source } => {
                assert_eq!(number, 3);
                assert!(matches!(*source, Error::Validation(_)));
            }
            other => panic!("expected part error, got {other}"),
        }
    }

    #[tokio::test]
    async fn zero_width_pool_is_rejected() {
        assert!(matches!(
            PartPool::new(0),
            Err(Error::Validation(_))
        ));
    }
}
