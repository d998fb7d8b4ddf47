//! Observable batch progress

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Snapshot published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub visible: bool,
    pub status: String,
    /// Percentage in `0..=100`
    pub progress: f64,
}

/// Shared progress cell.
///
/// Writers publish through [`update`](Self::update); observers hold a
/// [`watch::Receiver`] from [`subscribe`](Self::subscribe). Within one
/// visible session the percentage never decreases.
#[derive(Debug)]
pub struct Progress {
    tx: watch::Sender<ProgressState>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.tx.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> ProgressState {
        self.tx.borrow().clone()
    }

    /// Start a new session at 0%
    pub fn show(&self, status: impl Into<String>) {
        let status = status.into();
        self.tx.send_modify(|state| {
            state.visible = true;
            state.status = status;
            state.progress = 0.0;
        });
    }

    /// Publish a status and percentage; a lower percentage than the current
    /// one keeps the current value
    pub fn update(&self, status: impl Into<String>, progress: f64) {
        let status = status.into();
        let progress = progress.clamp(0.0, 100.0);
        self.tx.send_modify(|state| {
            state.visible = true;
            state.status = status;
            if progress > state.progress {
                state.progress = progress;
            }
        });
    }

    pub fn hide(&self) {
        self.tx.send_modify(|state| {
            state.visible = false;
        });
    }

    /// Reporter for one phase mapped into `range` of the overall percentage
    pub fn phase(&self, range: Range<f64>, total: usize) -> PhaseProgress<'_> {
        PhaseProgress {
            progress: self,
            range,
            total,
            done: AtomicUsize::new(0),
        }
    }
}

/// Completion counter for one phase.
///
/// Concurrent items call [`tick`](Self::tick) on completion; the published
/// percentage is derived from the counter, not from the item's position.
#[derive(Debug)]
pub struct PhaseProgress<'a> {
    progress: &'a Progress,
    range: Range<f64>,
    total: usize,
    done: AtomicUsize,
}

impl PhaseProgress<'_> {
    fn scaled(&self, done: usize) -> f64 {
        if self.total == 0 {
            return self.range.end;
        }
        let fraction = done.min(self.total) as f64 / self.total as f64;
        self.range.start + fraction * (self.range.end - self.range.start)
    }

    /// Announce an item before work starts, at the already-completed share
    pub fn begin(&self, status: impl Into<String>) {
        let done = self.done.load(Ordering::SeqCst);
        self.progress.update(status, self.scaled(done));
    }

    /// Record one completed item
    pub fn tick(&self, status: impl Into<String>) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.update(status, self.scaled(done));
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_update_hide() {
        let progress = Progress::new();
        let rx = progress.subscribe();

        progress.show("Extracting files...");
        assert!(rx.borrow().visible);
        assert_eq!(rx.borrow().progress, 0.0);

        progress.update("Halfway", 50.0);
        progress.update("Late writer", 30.0);
        assert_eq!(rx.borrow().progress, 50.0);
        assert_eq!(rx.borrow().status, "Late writer");

        progress.update("Over", 150.0);
        assert_eq!(progress.snapshot().progress, 100.0);

        progress.hide();
        assert!(!rx.borrow().visible);

        progress.show("Next batch");
        assert_eq!(rx.borrow().progress, 0.0);
    }

    #[test]
    fn test_phase_scaling() {
        let progress = Progress::new();
        progress.show("start");
        let phase = progress.phase(50.0..100.0, 4);

        phase.begin("first");
        assert_eq!(progress.snapshot().progress, 50.0);
        phase.tick("one");
        assert_eq!(progress.snapshot().progress, 62.5);
        phase.tick("two");
        phase.tick("three");
        phase.tick("four");
        assert_eq!(progress.snapshot().progress, 100.0);
        assert_eq!(phase.completed(), 4);
    }

    #[test]
    fn test_empty_phase_jumps_to_end() {
        let progress = Progress::new();
        progress.phase(0.0..50.0, 0).begin("nothing");
        assert_eq!(progress.snapshot().progress, 50.0);
    }

    #[tokio::test]
    async fn test_concurrent_ticks_never_regress() {
        let progress = Progress::new();
        progress.show("go");
        let mut rx = progress.subscribe();
        let phase = progress.phase(0.0..100.0, 50);

        let observer = async {
            let mut last = 0.0;
            while rx.changed().await.is_ok() {
                let now = rx.borrow().progress;
                assert!(now >= last);
                last = now;
                if now >= 100.0 {
                    break;
                }
            }
        };
        let writers = futures::future::join_all((0..50).map(|i| {
            let phase = &phase;
            async move {
                tokio::task::yield_now().await;
                phase.tick(format!("item {}", i));
            }
        }));

        tokio::join!(observer, writers);
        assert_eq!(progress.snapshot().progress, 100.0);
    }
}
