//! Background change watcher.
//!
//! ```text
//!   notify callback ──unbounded──► collect task ──spawn_blocking──► Reconciler::apply_batch
//!   (backend thread)               first event, then the                    │
//!                                  coalescing window                        ▼
//!                                                               broadcast BatchOutcome
//! ```
//!
//! The callback runs on the backend's own thread, so it only maps and
//! forwards. The channel is unbounded: dropping an event could leave an item
//! stale until its next change, and bursts are short.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::WatchConfig;
use crate::reconciler::{BatchOutcome, Change, ChangeKind, Reconciler};
use crate::vfs::{VfsError, VfsResult};

/// Capacity of the batch outcome broadcast.
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// Handle to a running watcher.
pub struct WatcherHandle {
    /// Keeps the subscription alive.
    watcher: RecommendedWatcher,
    /// Sender to signal shutdown.
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    outcomes: broadcast::Sender<BatchOutcome>,
}

impl WatcherHandle {
    /// Receive the outcome of every batch applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchOutcome> {
        self.outcomes.subscribe()
    }

    /// Release the subscription, stop the task and wait for it.
    ///
    /// A batch already handed to the reconciler finishes first.
    pub async fn stop(self) {
        let WatcherHandle {
            watcher,
            shutdown_tx,
            task,
            ..
        } = self;
        drop(watcher);
        let _ = shutdown_tx.send(());
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "watcher task ended abnormally");
        }
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}

/// Start watching the reconciler's library.
///
/// Must be called from within a tokio runtime.
pub fn start_watcher(reconciler: Reconciler, config: &WatchConfig) -> VfsResult<WatcherHandle> {
    let reconciler = Arc::new(reconciler);
    let root = reconciler.layout().root().to_path_buf();
    let (tx, rx) = mpsc::unbounded_channel();

    let normalizer = Arc::clone(&reconciler);
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "change notification error");
                    return;
                }
            };
            let Some(kind) = change_kind(&event.kind) else {
                return;
            };
            for path in event.paths {
                match normalizer.normalize(&path) {
                    Some(rel) => {
                        // Closed only once the task has exited.
                        let _ = tx.send(Change::new(kind, rel));
                    }
                    None => {
                        tracing::debug!(path = %path.display(), "dropping event outside library root");
                    }
                }
            }
        },
        notify::Config::default().with_poll_interval(config.poll_interval()),
    )
    .map_err(|e| VfsError::other(format!("failed to create watcher: {}", e)))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| VfsError::other(format!("failed to watch {}: {}", root.display(), e)))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);

    let task = tokio::spawn(run(
        reconciler,
        rx,
        shutdown_rx,
        config.coalesce_window(),
        outcomes.clone(),
    ));

    tracing::info!(path = %root.display(), coalesce_ms = config.coalesce_ms, "library watcher started");

    Ok(WatcherHandle {
        watcher,
        shutdown_tx,
        task,
        outcomes,
    })
}

async fn run(
    reconciler: Arc<Reconciler>,
    mut rx: mpsc::UnboundedReceiver<Change>,
    mut shutdown_rx: oneshot::Receiver<()>,
    window: Duration,
    outcomes: broadcast::Sender<BatchOutcome>,
) {
    let mut stopping = false;
    while !stopping {
        let first = tokio::select! {
            _ = &mut shutdown_rx => break,
            change = rx.recv() => match change {
                Some(change) => change,
                None => break,
            },
        };

        let mut pending = HashSet::from([first]);
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = &mut shutdown_rx => {
                    stopping = true;
                    break;
                }
                change = rx.recv() => match change {
                    Some(change) => {
                        pending.insert(change);
                    }
                    None => {
                        stopping = true;
                        break;
                    }
                },
            }
        }

        let changes: Vec<Change> = pending.into_iter().collect();
        let events = changes.len();
        let worker = Arc::clone(&reconciler);
        match tokio::task::spawn_blocking(move || worker.apply_batch(&changes)).await {
            Ok(outcome) => {
                tracing::debug!(
                    events,
                    updated = outcome.updated,
                    removed = outcome.removed,
                    skipped = outcome.skipped,
                    ignored = outcome.ignored,
                    tree_reloaded = outcome.tree_reloaded,
                    "applied change batch"
                );
                // No subscribers is fine.
                let _ = outcomes.send(outcome);
            }
            Err(e) => {
                tracing::warn!(events, error = %e, "change batch panicked");
            }
        }
    }

    tracing::info!("library watcher stopped");
}
