//! User directory collaborator
//!
//! The directory owns durable presence (`isOnline` on the user record).
//! The hub never awaits it: status updates are queued to a
//! [`PresenceWriter`] task that applies them in order, each bounded by
//! a timeout, and only logs failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::DirectoryError;
use crate::types::UserId;

/// Persists a user's online flag
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn set_online_status(&self, user_id: &UserId, is_online: bool) -> Result<(), DirectoryError>;
}

/// Directory kept in process memory
///
/// Used by the standalone binary and by tests. Remembers the last
/// status written for each user.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    statuses: RwLock<HashMap<UserId, bool>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status(&self, user_id: &UserId) -> Option<bool> {
        self.statuses.read().await.get(user_id).copied()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn set_online_status(&self, user_id: &UserId, is_online: bool) -> Result<(), DirectoryError> {
        self.statuses.write().await.insert(user_id.clone(), is_online);
        Ok(())
    }
}

#[derive(Debug)]
struct StatusUpdate {
    user_id: UserId,
    is_online: bool,
}

/// Handle to the background status writer
///
/// Cloning is cheap; the task stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct PresenceWriter {
    sender: mpsc::Sender<StatusUpdate>,
}

impl PresenceWriter {
    /// Spawn the writer task for `directory`
    pub fn spawn(directory: Arc<dyn UserDirectory>, queue: usize, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(queue);
        tokio::spawn(run_writer(directory, receiver, timeout));
        Self { sender }
    }

    /// Queue a status update without waiting
    ///
    /// Dropped with a warning if the queue is full.
    pub fn record(&self, user_id: UserId, is_online: bool) {
        let update = StatusUpdate { user_id, is_online };
        if let Err(e) = self.sender.try_send(update) {
            match e {
                mpsc::error::TrySendError::Full(update) => warn!(
                    "Presence queue full, dropping status {} for {}",
                    update.is_online, update.user_id
                ),
                mpsc::error::TrySendError::Closed(update) => warn!(
                    "Presence writer stopped, dropping status {} for {}",
                    update.is_online, update.user_id
                ),
            }
        }
    }
}

async fn run_writer(
    directory: Arc<dyn UserDirectory>,
    mut receiver: mpsc::Receiver<StatusUpdate>,
    timeout: Duration,
) {
    debug!("Presence writer started");

    while let Some(StatusUpdate { user_id, is_online }) = receiver.recv().await {
        let call = directory.set_online_status(&user_id, is_online);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => debug!("Persisted status {} for {}", is_online, user_id),
            Ok(Err(e)) => error!("Error updating user status for {}: {}", user_id, e),
            Err(_) => error!(
                "Timed out after {:?} updating user status for {}",
                timeout, user_id
            ),
        }
    }

    info!("Presence writer shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FailingDirectory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn set_online_status(&self, user_id: &UserId, _is_online: bool) -> Result<(), DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DirectoryError::UnknownUser(user_id.clone()))
        }
    }

    /// Hangs on the first call, records every later one
    struct StallsOnceDirectory {
        stalled: AtomicBool,
        inner: InMemoryDirectory,
    }

    #[async_trait]
    impl UserDirectory for StallsOnceDirectory {
        async fn set_online_status(&self, user_id: &UserId, is_online: bool) -> Result<(), DirectoryError> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.set_online_status(user_id, is_online).await
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_updates_applied_in_order() {
        let directory = Arc::new(InMemoryDirectory::new());
        let writer = PresenceWriter::spawn(directory.clone(), 16, Duration::from_secs(1));

        writer.record(UserId::from("alice"), true);
        writer.record(UserId::from("alice"), false);
        writer.record(UserId::from("bob"), true);
        settle().await;

        assert_eq!(directory.status(&UserId::from("alice")).await, Some(false));
        assert_eq!(directory.status(&UserId::from("bob")).await, Some(true));
        assert_eq!(directory.status(&UserId::from("carol")).await, None);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_writer() {
        let directory = Arc::new(FailingDirectory {
            calls: AtomicUsize::new(0),
        });
        let writer = PresenceWriter::spawn(directory.clone(), 16, Duration::from_secs(1));

        writer.record(UserId::from("alice"), true);
        writer.record(UserId::from("bob"), true);
        settle().await;

        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stalled_call_times_out_and_writer_continues() {
        let directory = Arc::new(StallsOnceDirectory {
            stalled: AtomicBool::new(false),
            inner: InMemoryDirectory::new(),
        });
        let writer = PresenceWriter::spawn(directory.clone(), 16, Duration::from_millis(20));

        writer.record(UserId::from("alice"), true);
        writer.record(UserId::from("bob"), true);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(directory.inner.status(&UserId::from("alice")).await, None);
        assert_eq!(directory.inner.status(&UserId::from("bob")).await, Some(true));
    }
}
