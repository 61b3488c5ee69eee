//! Mailbox listener feeding agent messages into the reconciler.

use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::status::Reconciler;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub received: usize,
    pub applied: usize,
}

pub struct MessageListener {
    mailbox: Mailbox,
    reconciler: Arc<Reconciler>,
    poll_interval: Duration,
    watch: bool,
}

impl MessageListener {
    pub fn new(mailbox: Mailbox, reconciler: Arc<Reconciler>) -> Self {
        Self {
            mailbox,
            reconciler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            watch: true,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wake on mailbox file-system changes in addition to polling.
    pub fn watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Claim pending messages and process them one at a time, in order.
    ///
    /// Each message is acknowledged after the reconciler has seen it, whether
    /// or not it produced a status change.
    pub async fn tick(&self) -> Result<TickReport> {
        let batch = self.mailbox.claim()?;
        if batch.is_empty() {
            return Ok(TickReport::default());
        }

        if let Err(e) = self.reconciler.refresh_tasks().await {
            tracing::warn!("Task refresh failed, using cached list: {}", e);
        }

        let mut report = TickReport {
            received: batch.len(),
            applied: 0,
        };
        for entry in &batch {
            let change = self
                .reconciler
                .process_message(&entry.message.content, entry.message.agent_id.as_deref())
                .await;
            if change.is_some() {
                report.applied += 1;
            }
            if let Err(e) = self.mailbox.ack(&entry.id) {
                tracing::warn!("Failed to acknowledge message {}: {}", entry.id, e);
            }
        }

        tracing::debug!(
            received = report.received,
            applied = report.applied,
            "Processed mailbox batch"
        );
        Ok(report)
    }

    /// Run in the background until [`ListenerHandle::stop`].
    pub fn spawn(self) -> Result<ListenerHandle> {
        match self.mailbox.recover_orphaned() {
            Ok(0) => {}
            Ok(n) => tracing::info!("Recovered {} unacknowledged messages", n),
            Err(e) => tracing::warn!("Mailbox recovery failed: {}", e),
        }

        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let watcher = if self.watch {
            Some(watch_dir(&self.mailbox.incoming_dir(), wake_tx)?)
        } else {
            None
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            watching = watcher.is_some(),
            "Message listener started on {}",
            self.mailbox.root().display()
        );
        let join = tokio::spawn(self.run(wake_rx, shutdown_rx));

        Ok(ListenerHandle {
            shutdown: shutdown_tx,
            join,
            _watcher: watcher,
        })
    }

    async fn run(self, mut wake: mpsc::UnboundedReceiver<()>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
                Some(()) = wake.recv() => {
                    while wake.try_recv().is_ok() {}
                }
            }
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.tick().await {
                tracing::error!("Listener tick failed: {}", e);
            }
        }

        tracing::info!("Message listener stopped");
    }
}

fn watch_dir(dir: &std::path::Path, wake: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
            let _ = wake.send(());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Mailbox watch error: {}", e),
    })
    .map_err(|e| Error::Mailbox(format!("Failed to create watcher: {}", e)))?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Mailbox(format!("Failed to watch {}: {}", dir.display(), e)))?;
    Ok(watcher)
}

/// Running listener. Stopping ends future ticks; a tick in progress finishes.
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    _watcher: Option<RecommendedWatcher>,
}

impl ListenerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        drop(self._watcher);
        if let Err(e) = self.join.await {
            tracing::warn!("Listener task ended abnormally: {}", e);
        }
    }
}
