//! Cooperatively cancellable periodic maintenance tasks.
//!
//! Both the TTL cache and the connection pool purge stale entries on a
//! fixed interval. [`spawn_periodic`] runs such a pass until its
//! [`CancellationToken`] fires or the pass reports that its target is gone.
//!
//! Each pass runs in its own spawned task, so a panicking pass surfaces as
//! a `JoinError`, is logged, and the loop carries on with the next tick.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// What a sweep pass wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Keep sweeping on the next tick.
    Continue,
    /// The swept structure no longer exists; stop the loop.
    Stop,
}

/// Spawn a loop that calls `pass` every `interval`.
///
/// The first tick fires one full `interval` after spawning. Ticks missed
/// while a slow pass runs are delayed rather than bursted.
///
/// # Panics
///
/// Requires a tokio runtime context.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    token: CancellationToken,
    mut pass: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = SweepOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(sweeper = name, "sweeper cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    match tokio::spawn(pass()).await {
                        Ok(SweepOutcome::Continue) => {}
                        Ok(SweepOutcome::Stop) => {
                            debug!(sweeper = name, "sweep target dropped, stopping");
                            break;
                        }
                        Err(e) => {
                            error!(sweeper = name, error = %e, "sweep pass failed");
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_each_interval_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let counter = Arc::clone(&count);
        let handle = spawn_periodic("test", Duration::from_secs(10), token.clone(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                SweepOutcome::Continue
            }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_pass_does_not_stop_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let counter = Arc::clone(&count);
        let handle = spawn_periodic("flaky", Duration::from_secs(1), token.clone(), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    panic!("first pass blows up");
                }
                SweepOutcome::Continue
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_outcome_ends_loop() {
        let token = CancellationToken::new();
        let handle = spawn_periodic("once", Duration::from_secs(1), token, || async {
            SweepOutcome::Stop
        });
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.await.unwrap();
    }
}
