//! Retry Scheduler
//!
//! Delayed work queue for pending deliveries. A single background task owns
//! a [`DelayQueue`]; callers talk to it over a channel and receive expired
//! delivery ids on the `due` receiver returned by [`RetryScheduler::spawn`].
//!
//! Waiting is timer-driven: no task sleeps per pending retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, warn};
use uuid::Uuid;

enum Command {
    Schedule { delivery_id: Uuid, delay: Duration },
}

/// A retry waiting in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledRetry {
    pub delivery_id: Uuid,
    pub due_at: DateTime<Utc>,
}

/// Handle to the scheduler task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    commands: mpsc::UnboundedSender<Command>,
    scheduled: Arc<DashMap<Uuid, ScheduledRetry>>,
    shutdown: CancellationToken,
}

impl RetryScheduler {
    /// Start the scheduler task. Must be called inside a tokio runtime.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let scheduled = Arc::new(DashMap::new());
        let shutdown = CancellationToken::new();

        tokio::spawn(run(
            command_rx,
            due_tx,
            Arc::clone(&scheduled),
            shutdown.clone(),
        ));

        (
            Self {
                commands,
                scheduled,
                shutdown,
            },
            due_rx,
        )
    }

    /// Queue `delivery_id` to come due after `delay`.
    ///
    /// `due_at` is informational; the timer itself runs on tokio time.
    /// Rescheduling an id replaces its previous entry.
    pub fn schedule(&self, delivery_id: Uuid, delay: Duration, due_at: DateTime<Utc>) {
        self.scheduled.insert(
            delivery_id,
            ScheduledRetry {
                delivery_id,
                due_at,
            },
        );
        if self
            .commands
            .send(Command::Schedule { delivery_id, delay })
            .is_err()
        {
            self.scheduled.remove(&delivery_id);
            warn!(delivery_id = %delivery_id, "Retry scheduler is stopped, retry dropped");
        }
    }

    /// Queued retries, soonest first.
    pub fn scheduled(&self) -> Vec<ScheduledRetry> {
        let mut items: Vec<ScheduledRetry> = self.scheduled.iter().map(|r| *r.value()).collect();
        items.sort_by_key(|r| r.due_at);
        items
    }

    /// Stop the scheduler. Queued retries are discarded.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.scheduled.clear();
    }
}

async fn run(
    mut commands: mpsc::UnboundedReceiver<Command>,
    due: mpsc::UnboundedSender<Uuid>,
    scheduled: Arc<DashMap<Uuid, ScheduledRetry>>,
    shutdown: CancellationToken,
) {
    let mut queue: DelayQueue<Uuid> = DelayQueue::new();
    let mut keys: HashMap<Uuid, delay_queue::Key> = HashMap::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(Command::Schedule { delivery_id, delay }) => {
                    if let Some(key) = keys.remove(&delivery_id) {
                        queue.remove(&key);
                    }
                    keys.insert(delivery_id, queue.insert(delivery_id, delay));
                }
                None => break,
            },
            Some(expired) = queue.next(), if !queue.is_empty() => {
                let delivery_id = expired.into_inner();
                keys.remove(&delivery_id);
                scheduled.remove(&delivery_id);
                if due.send(delivery_id).is_err() {
                    break;
                }
            }
        }
    }

    debug!(dropped = keys.len(), "Retry scheduler stopped");
}
