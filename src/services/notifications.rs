use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{notification::NotificationDraft, Notification};
use crate::repository::{NotificationRepository, UserRepository};

enum Job {
    Direct { user_id: Uuid, draft: NotificationDraft },
    Broadcast { draft: NotificationDraft },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget notification queue drained by a single worker task.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Job>,
}

impl NotificationDispatcher {
    /// Starts the worker on the current runtime.
    pub fn spawn(
        queue_size: usize,
        notifications: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        tokio::spawn(run_worker(rx, notifications, users, clock));
        Self { tx }
    }

    pub fn notify(&self, user_id: Uuid, draft: NotificationDraft) {
        self.enqueue(Job::Direct { user_id, draft });
    }

    pub fn notify_many(&self, user_ids: impl IntoIterator<Item = Uuid>, draft: &NotificationDraft) {
        for user_id in user_ids {
            self.notify(user_id, draft.clone());
        }
    }

    /// Addresses the draft to every active user.
    pub fn broadcast(&self, draft: NotificationDraft) {
        self.enqueue(Job::Broadcast { draft });
    }

    /// Waits until every job queued before this call has been handled.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Job::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    fn enqueue(&self, job: Job) {
        if let Err(e) = self.tx.try_send(job) {
            warn!("Notification dropped: {}", e);
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Direct { user_id, draft } => {
                if let Err(e) = deliver(notifications.as_ref(), user_id, &draft, clock.as_ref()).await {
                    error!("Failed to create notification for user {}: {}", user_id, e);
                }
            }
            Job::Broadcast { draft } => match users.list_active_ids().await {
                Ok(ids) => {
                    debug!("Broadcasting {:?} notification to {} users", draft.kind, ids.len());
                    for user_id in ids {
                        if let Err(e) =
                            deliver(notifications.as_ref(), user_id, &draft, clock.as_ref()).await
                        {
                            error!("Failed to create notification for user {}: {}", user_id, e);
                        }
                    }
                }
                Err(e) => error!("Failed to load active users for broadcast: {}", e),
            },
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Notification worker stopped");
}

async fn deliver(
    notifications: &dyn NotificationRepository,
    user_id: Uuid,
    draft: &NotificationDraft,
    clock: &dyn Clock,
) -> Result<Notification, AppError> {
    notifications.create(user_id, draft, clock.now()).await
}

/// Reads for the notification endpoints.
pub async fn list_for_user(
    notifications: &dyn NotificationRepository,
    user_id: Uuid,
) -> Result<Vec<Notification>, AppError> {
    notifications.list_by_user(user_id).await
}

pub async fn mark_read(
    notifications: &dyn NotificationRepository,
    id: Uuid,
    user_id: Uuid,
) -> Result<Notification, AppError> {
    notifications
        .mark_read(id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification not found"))
}

pub async fn mark_all_read(
    notifications: &dyn NotificationRepository,
    user_id: Uuid,
) -> Result<u64, AppError> {
    notifications.mark_all_read(user_id).await
}

pub async fn unread_count(
    notifications: &dyn NotificationRepository,
    user_id: Uuid,
) -> Result<i64, AppError> {
    notifications.count_unread(user_id).await
}
