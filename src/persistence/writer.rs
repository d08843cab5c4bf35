//! Debounced background writer for the store snapshot.
//!
//! One task owns the sink. Producers only flip a shared dirty flag and
//! send a command; bursts of writes collapse into one snapshot once the
//! debounce window has been quiet.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::Instant;

use crate::error::ExplorerError;
use crate::store::{IndexedStore, PersistedState};

/// Destination for serialized snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync + fmt::Debug {
    /// Persists one complete snapshot.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] if the snapshot could not be written.
    async fn write(&self, state: &PersistedState) -> Result<(), ExplorerError>;
}

#[derive(Debug)]
enum WriterCommand {
    Dirty,
    Flush(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Handle to the background persistence task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriterCommand>,
    dirty: Arc<AtomicBool>,
}

impl PersistenceWriter {
    /// Spawns the writer task on the current runtime.
    #[must_use]
    pub fn spawn(
        source: Arc<RwLock<IndexedStore>>,
        sink: Arc<dyn SnapshotSink>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dirty = Arc::new(AtomicBool::new(false));
        let task = WriterTask {
            rx,
            source,
            sink,
            debounce,
            dirty: Arc::clone(&dirty),
        };
        tokio::spawn(task.run());
        Self { tx, dirty }
    }

    /// Flags the store as changed and re-arms the debounce timer.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        if self.tx.send(WriterCommand::Dirty).is_err() {
            tracing::debug!("persistence writer already closed");
        }
    }

    /// Returns `true` if changes are waiting to be written.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Writes a snapshot immediately and waits for it to finish.
    pub async fn flush_now(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Cancels the pending timer, writes a final snapshot if dirty and
    /// stops the task. Later calls are no-ops.
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriterCommand::Close(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

struct WriterTask {
    rx: mpsc::UnboundedReceiver<WriterCommand>,
    source: Arc<RwLock<IndexedStore>>,
    sink: Arc<dyn SnapshotSink>,
    debounce: Duration,
    dirty: Arc<AtomicBool>,
}

impl WriterTask {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;
        loop {
            let command = match deadline {
                Some(at) => {
                    tokio::select! {
                        command = self.rx.recv() => command,
                        () = tokio::time::sleep_until(at) => {
                            deadline = None;
                            self.flush(false).await;
                            continue;
                        }
                    }
                }
                None => self.rx.recv().await,
            };

            match command {
                Some(WriterCommand::Dirty) => deadline = Some(Instant::now() + self.debounce),
                Some(WriterCommand::Flush(ack)) => {
                    deadline = None;
                    self.flush(true).await;
                    let _ = ack.send(());
                }
                Some(WriterCommand::Close(ack)) => {
                    self.flush(false).await;
                    let _ = ack.send(());
                    break;
                }
                None => {
                    self.flush(false).await;
                    break;
                }
            }
        }
        tracing::debug!("persistence writer stopped");
    }

    async fn flush(&self, force: bool) {
        let was_dirty = self.dirty.swap(false, Ordering::AcqRel);
        if !was_dirty && !force {
            return;
        }
        let state = self.source.read().await.to_persisted();
        match self.sink.write(&state).await {
            Ok(()) => tracing::debug!(blocks = state.blocks.len(), "snapshot written"),
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                tracing::warn!(error = %e, "snapshot write failed");
            }
        }
    }
}

impl fmt::Debug for WriterTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterTask")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}
