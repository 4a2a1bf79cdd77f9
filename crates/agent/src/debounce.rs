//! Trailing-window call coalescing.
//!
//! Partial transcripts can arrive far faster than a completion round-trip.
//! [`Debouncer`] keeps a single pending slot: each new call replaces the
//! slot's input and pushes the deadline out, and exactly one invocation runs
//! at the trailing edge. Every caller queued within the window awaits that
//! one invocation's result. Only one timer is ever live, so superseded calls
//! need no cancellation token - their waiters are simply resolved by the
//! trailing invocation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

struct Pending<T, R> {
    input: T,
    deadline: Instant,
    waiters: Vec<oneshot::Sender<R>>,
}

struct Slot<T, R> {
    pending: Option<Pending<T, R>>,
    driver_live: bool,
}

pub struct Debouncer<T, R> {
    window: Duration,
    run: Arc<dyn Fn(T) -> BoxFuture<'static, R> + Send + Sync>,
    slot: Arc<Mutex<Slot<T, R>>>,
}

impl<T, R> Debouncer<T, R>
where
    T: Send + 'static,
    R: Clone + Send + 'static,
{
    pub fn new<F>(window: Duration, run: F) -> Self
    where
        F: Fn(T) -> BoxFuture<'static, R> + Send + Sync + 'static,
    {
        Self {
            window,
            run: Arc::new(run),
            slot: Arc::new(Mutex::new(Slot { pending: None, driver_live: false })),
        }
    }

    /// Queue an input and await the trailing-edge invocation's result.
    ///
    /// Returns `None` only if the driver task was torn down mid-flight
    /// (runtime shutdown); callers treat that as an empty result.
    pub async fn call(&self, input: T) -> Option<R> {
        let (result_tx, result_rx) = oneshot::channel();

        let spawn_driver = {
            let mut slot = self.slot.lock().await;
            let deadline = Instant::now() + self.window;

            match &mut slot.pending {
                Some(pending) => {
                    pending.input = input;
                    pending.deadline = deadline;
                    pending.waiters.push(result_tx);
                }
                None => {
                    slot.pending =
                        Some(Pending { input, deadline, waiters: vec![result_tx] });
                }
            }

            if slot.driver_live {
                false
            } else {
                slot.driver_live = true;
                true
            }
        };

        if spawn_driver {
            let slot = Arc::clone(&self.slot);
            let run = Arc::clone(&self.run);

            tokio::spawn(async move {
                loop {
                    let deadline = {
                        let guard = slot.lock().await;
                        match &guard.pending {
                            Some(pending) => pending.deadline,
                            None => break,
                        }
                    };

                    tokio::time::sleep_until(deadline).await;

                    let taken = {
                        let mut guard = slot.lock().await;
                        let expired = guard
                            .pending
                            .as_ref()
                            .map(|pending| pending.deadline <= Instant::now())
                            .unwrap_or(false);
                        if expired {
                            // Release the slot before running: calls that
                            // arrive while the invocation is in flight start
                            // a fresh window instead of piggybacking on a
                            // result computed from stale input.
                            guard.driver_live = false;
                            guard.pending.take()
                        } else {
                            None
                        }
                    };

                    match taken {
                        Some(pending) => {
                            let result = run(pending.input).await;
                            for waiter in pending.waiters {
                                let _ = waiter.send(result.clone());
                            }
                            break;
                        }
                        // Deadline was pushed out by a newer call; sleep again.
                        None => continue,
                    }
                }
            });
        }

        result_rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::FutureExt;

    use super::Debouncer;

    fn counting_debouncer(
        window_ms: u64,
        invocations: Arc<AtomicUsize>,
    ) -> Debouncer<String, String> {
        Debouncer::new(Duration::from_millis(window_ms), move |input: String| {
            let invocations = Arc::clone(&invocations);
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                format!("ran:{input}")
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_calls_coalesce_into_one_invocation() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let debouncer = Arc::new(counting_debouncer(500, Arc::clone(&invocations)));

        let first = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.call("first".to_string()).await }
        });
        let second = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.call("second".to_string()).await }
        });

        let first = first.await.expect("task").expect("result");
        let second = second.await.expect("task").expect("result");

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        // Both callers resolve with the trailing invocation's result.
        assert_eq!(first, second);
        assert!(first.starts_with("ran:"));
    }

    #[tokio::test(start_paused = true)]
    async fn last_input_within_the_window_wins() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let debouncer = Arc::new(counting_debouncer(500, Arc::clone(&invocations)));

        let stale = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.call("stale".to_string()).await }
        });
        tokio::task::yield_now().await;
        let fresh = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.call("fresh".to_string()).await }
        });

        assert_eq!(stale.await.expect("task"), Some("ran:fresh".to_string()));
        assert_eq!(fresh.await.expect("task"), Some("ran:fresh".to_string()));
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_calls_each_invoke() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let debouncer = counting_debouncer(100, Arc::clone(&invocations));

        assert_eq!(debouncer.call("one".to_string()).await, Some("ran:one".to_string()));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(debouncer.call("two".to_string()).await, Some("ran:two".to_string()));

        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }
}
