//! Restart-on-exit supervision for the long-running loops.
//!
//! Every loop runs in its own tokio task. When it panics or returns, the
//! supervisor waits `restart_delay` and builds a fresh instance from the
//! loop's factory. Loops never observe each other's failures.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Supervisor {
    restart_delay: Duration,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn new(restart_delay: Duration) -> Self {
        Self {
            restart_delay,
            tasks: Vec::new(),
        }
    }

    /// Run `factory()` forever, restarting it whenever it ends
    pub fn spawn<F, Fut>(&mut self, name: &'static str, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.restart_delay;
        let handle = tokio::spawn(async move {
            loop {
                info!("{} loop started", name);
                let mut run = AbortOnDrop(tokio::spawn(factory()));
                match (&mut run.0).await {
                    Ok(()) => warn!("{} loop exited, restarting in {:?}", name, delay),
                    Err(e) if e.is_panic() => {
                        error!("{} loop panicked, restarting in {:?}", name, delay)
                    }
                    Err(e) => {
                        warn!("{} loop cancelled: {}", name, e);
                        return;
                    }
                }
                tokio::time::sleep(delay).await;
            }
        });
        self.tasks.push((name, handle));
    }

    /// Number of supervised loops
    pub fn loop_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every supervised loop
    pub fn shutdown(self) {
        for (name, handle) in self.tasks {
            info!("Stopping {} loop", name);
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn wait_for(counter: &AtomicUsize, target: usize) {
        while counter.load(Ordering::SeqCst) < target {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_restarts_after_panic() {
        let starts = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(Duration::from_millis(10));

        let counter = starts.clone();
        supervisor.spawn("flaky", move || {
            let counter = counter.clone();
            async move {
                let run = counter.fetch_add(1, Ordering::SeqCst);
                if run == 0 {
                    panic!("first run fails");
                }
                std::future::pending::<()>().await;
            }
        });

        tokio::time::timeout(Duration::from_secs(2), wait_for(&starts, 2))
            .await
            .expect("loop was not restarted");
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn test_restarts_after_exit() {
        let starts = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(Duration::from_millis(1));

        let counter = starts.clone();
        supervisor.spawn("short", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::timeout(Duration::from_secs(2), wait_for(&starts, 3))
            .await
            .expect("loop was not restarted");
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn test_panic_does_not_stop_other_loops() {
        let healthy = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(Duration::from_millis(5));

        supervisor.spawn("broken", || async {
            panic!("always fails");
        });

        let counter = healthy.clone();
        supervisor.spawn("healthy", move || {
            let counter = counter.clone();
            async move {
                loop {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        });
        assert_eq!(supervisor.loop_count(), 2);

        tokio::time::timeout(Duration::from_secs(2), wait_for(&healthy, 20))
            .await
            .expect("healthy loop stalled");
        supervisor.shutdown();
    }
}
