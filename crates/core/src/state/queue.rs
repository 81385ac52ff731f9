//! Sequential message queue.
//!
//! `MessageQueue` accepts user messages without blocking and feeds them,
//! one at a time and in arrival order, to a `MessageHandler`. The worker
//! task is started by the first `enqueue`. Each message is handled on its
//! own task, so a message that is in flight when `shutdown` gives up still
//! runs to the end and records its final status.

use crate::state::message::{
    announce_message, complete_message, create_message, fail_message, start_message,
};
use async_trait::async_trait;
use chrono::Utc;
use nk_protocol::config_models::GlobalConfig;
use nk_protocol::ipc::Event;
use nk_protocol::message_models::{MessageResult, MessageStatus, QueueStatus, QueuedMessage};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Processes the content of one queued message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// An `Err` marks the message Failed with the error's display text.
    async fn handle(&self, content: &str) -> anyhow::Result<MessageResult>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is shutting down and accepts no new messages")]
    ShuttingDown,

    /// The in-flight message did not finish within the shutdown timeout.
    /// It keeps running; the report lists what was left behind.
    #[error("Timed out waiting for the in-flight message")]
    Timeout { report: ShutdownReport },
}

/// What `shutdown` left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Messages that never started. They stay Queued.
    pub abandoned: Vec<u64>,
    /// Message still running when the timeout expired.
    pub in_flight: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// How long the idle worker waits before housekeeping.
    pub poll_interval: Duration,
    /// How long finished messages are kept when nobody acknowledges them.
    pub retention: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for QueueSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.queue_poll_ms),
            retention: Duration::from_secs(config.retention_secs),
        }
    }
}

/// Messages plus the shutdown flags, guarded together so the worker never
/// starts a message after shutdown began.
#[derive(Default)]
struct Book {
    messages: BTreeMap<u64, QueuedMessage>,
    shutting_down: bool,
    stopped: bool,
}

impl Book {
    fn processing(&self) -> Option<u64> {
        self.messages
            .values()
            .find(|m| m.status == MessageStatus::Processing)
            .map(|m| m.id)
    }

    fn queued(&self) -> Vec<u64> {
        self.messages
            .values()
            .filter(|m| m.status == MessageStatus::Queued)
            .map(|m| m.id)
            .collect()
    }
}

struct Shared {
    book: Mutex<Book>,
    next_id: AtomicU64,
    ids_tx: UnboundedSender<u64>,
    ids_rx: Mutex<Option<UnboundedReceiver<u64>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    handler: Arc<dyn MessageHandler>,
    events_tx: UnboundedSender<Event>,
    settings: QueueSettings,
    /// Signalled on every status change and on shutdown.
    changed: Notify,
    stop: Notify,
}

/// FIFO queue with a single lazily started worker.
pub struct MessageQueue {
    shared: Arc<Shared>,
}

impl MessageQueue {
    /// Create a new MessageQueue.
    ///
    /// # Arguments
    ///
    /// * `handler` - Processes each message's content
    /// * `events_tx` - Channel receiving status events
    /// * `settings` - Worker poll interval and retention of finished messages
    pub fn new(
        handler: Arc<dyn MessageHandler>,
        events_tx: UnboundedSender<Event>,
        settings: QueueSettings,
    ) -> Self {
        let (ids_tx, ids_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                book: Mutex::new(Book::default()),
                next_id: AtomicU64::new(1),
                ids_tx,
                ids_rx: Mutex::new(Some(ids_rx)),
                worker: Mutex::new(None),
                handler,
                events_tx,
                settings,
                changed: Notify::new(),
                stop: Notify::new(),
            }),
        }
    }

    /// Add a message and return its id without waiting for processing.
    ///
    /// # Errors
    ///
    /// `QueueError::ShuttingDown` once `shutdown` was called.
    pub async fn enqueue(&self, content: impl Into<String>) -> Result<u64, QueueError> {
        let id = {
            let mut book = self.shared.book.lock().await;
            if book.shutting_down {
                return Err(QueueError::ShuttingDown);
            }
            let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
            let message = create_message(id, content.into());
            let position = book.queued().len() + 1;
            announce_message(&message, position, &self.shared.events_tx);
            book.messages.insert(id, message);
            let _ = self.shared.ids_tx.send(id);
            id
        };

        self.ensure_worker().await;
        debug!(message_id = id, "message queued");
        Ok(id)
    }

    /// Current status of a message, `None` for unknown or pruned ids.
    pub async fn status(&self, id: u64) -> Option<MessageStatus> {
        self.shared.book.lock().await.messages.get(&id).map(|m| m.status)
    }

    /// A snapshot of a message.
    pub async fn message(&self, id: u64) -> Option<QueuedMessage> {
        self.shared.book.lock().await.messages.get(&id).cloned()
    }

    /// Number of unfinished messages: Queued plus the one Processing.
    pub async fn pending_count(&self) -> usize {
        self.shared
            .book
            .lock()
            .await
            .messages
            .values()
            .filter(|m| !m.status.is_terminal())
            .count()
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let book = self.shared.book.lock().await;
        let count = |status: MessageStatus| book.messages.values().filter(|m| m.status == status).count();
        QueueStatus {
            total: book.messages.len(),
            queued: book.queued(),
            processing: book.processing(),
            completed_count: count(MessageStatus::Completed),
            failed_count: count(MessageStatus::Failed),
        }
    }

    /// Wait until a message is finished and return it.
    ///
    /// Resolves without polling. A message abandoned by `shutdown` is
    /// returned in its Queued state. `None` for unknown ids.
    pub async fn wait_for(&self, id: u64) -> Option<QueuedMessage> {
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let book = self.shared.book.lock().await;
                let message = book.messages.get(&id)?;
                let abandoned = book.stopped && message.status == MessageStatus::Queued;
                if message.status.is_terminal() || abandoned {
                    return Some(message.clone());
                }
            }

            notified.await;
        }
    }

    /// Remove a finished message and return it.
    ///
    /// Messages that are not finished yet are left untouched.
    pub async fn acknowledge(&self, id: u64) -> Option<QueuedMessage> {
        let mut book = self.shared.book.lock().await;
        match book.messages.get(&id) {
            Some(message) if message.status.is_terminal() => book.messages.remove(&id),
            _ => None,
        }
    }

    /// Drop finished messages older than the retention period.
    ///
    /// Returns the number of messages removed.
    pub async fn prune_finished(&self) -> usize {
        self.shared.prune_finished().await
    }

    /// Stop the queue.
    ///
    /// No message starts after this call. The in-flight message, if any,
    /// gets up to `timeout` to finish; messages that never started stay
    /// Queued and are listed in the report and a `QueueShutdown` event.
    ///
    /// # Errors
    ///
    /// `QueueError::Timeout` when the in-flight message is still running
    /// after `timeout`. It keeps running on its own task.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> Result<ShutdownReport, QueueError> {
        {
            let mut book = self.shared.book.lock().await;
            book.shutting_down = true;
            info!(in_flight = ?book.processing(), pending = book.queued().len(), "queue shutting down");
        }

        let finished = tokio::time::timeout(timeout, self.shared.wait_idle()).await.is_ok();

        self.shared.stop.notify_one();
        let worker = self.shared.worker.lock().await.take();
        if let Some(worker) = worker {
            if finished {
                let _ = worker.await;
            } else {
                // Aborting the worker drops its handle on the in-flight task, which keeps running.
                worker.abort();
            }
        }

        let report = {
            let mut book = self.shared.book.lock().await;
            book.stopped = true;
            ShutdownReport {
                abandoned: book.queued(),
                in_flight: book.processing(),
            }
        };
        self.shared.changed.notify_waiters();
        let _ = self.shared.events_tx.send(Event::QueueShutdown {
            abandoned: report.abandoned.clone(),
        });

        if finished {
            info!(abandoned = report.abandoned.len(), "queue stopped");
            Ok(report)
        } else {
            warn!(in_flight = ?report.in_flight, "queue stopped before the in-flight message finished");
            Err(QueueError::Timeout { report })
        }
    }

    async fn ensure_worker(&self) {
        let mut worker = self.shared.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let Some(ids) = self.shared.ids_rx.lock().await.take() else {
            return;
        };
        *worker = Some(tokio::spawn(run_worker(Arc::clone(&self.shared), ids)));
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        self.shared.stop.notify_one();
    }
}

async fn run_worker(shared: Arc<Shared>, mut ids: UnboundedReceiver<u64>) {
    debug!("queue worker started");
    loop {
        let next = tokio::select! {
            _ = shared.stop.notified() => break,
            next = tokio::time::timeout(shared.settings.poll_interval, ids.recv()) => next,
        };

        match next {
            Ok(Some(id)) => {
                if !shared.process(id).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                shared.prune_finished().await;
            }
        }
    }
    debug!("queue worker stopped");
}

impl Shared {
    /// Run one message to completion. Returns `false` once the queue is
    /// shutting down and the message was left Queued.
    async fn process(self: &Arc<Self>, id: u64) -> bool {
        let content = {
            let mut book = self.book.lock().await;
            if book.shutting_down {
                return false;
            }
            let Some(message) = book.messages.get_mut(&id) else {
                return true;
            };
            if message.status != MessageStatus::Queued {
                return true;
            }
            start_message(message, &self.events_tx);
            message.content.clone()
        };
        self.changed.notify_waiters();
        info!(message_id = id, "processing message");

        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = shared.handler.handle(&content).await;
            shared.finish(id, outcome.map_err(|e| format!("{e:#}"))).await;
        });

        if let Err(e) = task.await {
            self.finish(id, Err(format!("message handler panicked: {e}"))).await;
        }
        true
    }

    async fn finish(&self, id: u64, outcome: Result<MessageResult, String>) {
        {
            let mut book = self.book.lock().await;
            let Some(message) = book.messages.get_mut(&id) else {
                return;
            };
            if message.status != MessageStatus::Processing {
                return;
            }
            match outcome {
                Ok(result) => {
                    complete_message(message, &self.events_tx, result);
                    info!(message_id = id, "message completed");
                }
                Err(error) => {
                    warn!(message_id = id, error = %error, "message failed");
                    fail_message(message, &self.events_tx, error);
                }
            }
        }
        self.changed.notify_waiters();
    }

    /// Resolve once no message is Processing.
    async fn wait_idle(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.book.lock().await.processing().is_none() {
                return;
            }
            notified.await;
        }
    }

    async fn prune_finished(&self) -> usize {
        let retention = self.settings.retention;
        let now = Utc::now();
        let mut book = self.book.lock().await;
        let before = book.messages.len();
        book.messages.retain(|_, message| {
            let expired = message.status.is_terminal()
                && message
                    .finished_at
                    .and_then(|at| (now - at).to_std().ok())
                    .is_some_and(|age| age >= retention);
            !expired
        });
        let removed = before - book.messages.len();
        if removed > 0 {
            debug!(removed, "pruned finished messages");
        }
        removed
    }
}
