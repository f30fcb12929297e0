use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

use tokio::sync::oneshot;

/// Coalesces rapid calls: only the last call of a quiet window runs its
/// operation, and every caller of that window receives the same value.
pub struct Debouncer<T> {
    quiet: Duration,
    window: Mutex<Window<T>>,
}

struct Window<T> {
    generation: u64,
    waiters: Vec<oneshot::Sender<T>>,
}

impl<T: Clone> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            window: Mutex::new(Window {
                generation: 0,
                waiters: vec![],
            }),
        }
    }

    /// Returns `None` when the caller owning the window is dropped before
    /// its operation finishes: every other caller of that window is released
    /// with `None` too.
    pub async fn call<F, Fut>(&self, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut window = self.window.lock().unwrap();
            window.generation += 1;
            window.waiters.push(tx);
            window.generation
        };

        let owner = WindowOwner {
            window: &self.window,
            generation,
        };

        tokio::time::sleep(self.quiet).await;

        // Calls arriving while the operation runs open the next window.
        let trailing = {
            let mut window = self.window.lock().unwrap();
            (window.generation == generation).then(|| std::mem::take(&mut window.waiters))
        };
        drop(owner);

        if let Some(waiters) = trailing {
            log::debug!("debounce window closed with {} callers", waiters.len());
            let value = op().await;
            for waiter in waiters {
                let _ = waiter.send(value.clone());
            }
        }

        rx.await.ok()
    }
}

/// Held by a caller while it may still own the open window. Dropping it
/// mid-sleep drops that window's senders, so earlier callers see `None`
/// instead of waiting for an operation nobody will run.
struct WindowOwner<'a, T> {
    window: &'a Mutex<Window<T>>,
    generation: u64,
}

impl<T> Drop for WindowOwner<'_, T> {
    fn drop(&mut self) {
        let Ok(mut window) = self.window.lock() else {
            return;
        };

        if window.generation == self.generation && !window.waiters.is_empty() {
            let abandoned = std::mem::take(&mut window.waiters);
            log::debug!("debounce window abandoned with {} callers", abandoned.len());
        }
    }
}

/// Monotonic request counter: the last request to start wins.
#[derive(Debug, Default)]
pub struct Sequencer {
    latest: AtomicU64,
}

impl Sequencer {
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, sequence: u64) -> bool {
        sequence >= self.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_rapid_calls_share_trailing_result() {
        let debouncer = Debouncer::<String>::new(Duration::from_millis(300));
        let runs = AtomicUsize::new(0);

        let call = |text: &'static str, delay: u64| {
            let debouncer = &debouncer;
            let runs = &runs;
            async move {
                sleep(Duration::from_millis(delay)).await;
                debouncer
                    .call(|| async move {
                        runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        text.to_string()
                    })
                    .await
            }
        };

        let (a, b, c) = tokio::join!(call("r", 0), call("re", 100), call("rea", 200));

        assert_eq!(a.as_deref(), Some("rea"));
        assert_eq!(b.as_deref(), Some("rea"));
        assert_eq!(c.as_deref(), Some("rea"));
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_run_separately() {
        let debouncer = Debouncer::<u32>::new(Duration::from_millis(300));
        let start = Instant::now();

        let first = debouncer.call(|| async { 1 }).await;
        assert_eq!(first, Some(1));
        assert!(start.elapsed() >= Duration::from_millis(300));

        let second = debouncer.call(|| async { 2 }).await;
        assert_eq!(second, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_during_operation_opens_new_window() {
        let debouncer = Debouncer::<u32>::new(Duration::from_millis(300));

        let slow = debouncer.call(|| async {
            sleep(Duration::from_millis(1000)).await;
            1
        });
        let late = async {
            sleep(Duration::from_millis(500)).await;
            debouncer.call(|| async { 2 }).await
        };

        let (slow, late) = tokio::join!(slow, late);
        assert_eq!(slow, Some(1));
        assert_eq!(late, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trailing_caller_releases_window() {
        let debouncer = Debouncer::<u32>::new(Duration::from_millis(300));
        let start = Instant::now();

        let first = debouncer.call(|| async { 1 });
        let dropped = async {
            sleep(Duration::from_millis(100)).await;
            tokio::time::timeout(Duration::from_millis(50), debouncer.call(|| async { 2 })).await
        };

        let (first, dropped) = tokio::join!(first, dropped);
        assert!(dropped.is_err());
        assert_eq!(first, None);
        assert!(start.elapsed() <= Duration::from_millis(300));

        // the next window works normally
        assert_eq!(debouncer.call(|| async { 3 }).await, Some(3));
    }

    #[test]
    fn test_sequencer_last_started_wins() {
        let sequencer = Sequencer::default();
        let first = sequencer.issue();
        let second = sequencer.issue();

        assert!(second > first);
        assert!(!sequencer.is_current(first));
        assert!(sequencer.is_current(second));
        assert_eq!(sequencer.latest(), second);
    }
}
