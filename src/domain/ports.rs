use super::document::{Document, Filter, Update, UpdateResult};
use super::payment::Side;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// A collection of documents with single- and multi-document writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Collection name, used in diagnostics.
    fn name(&self) -> &str;

    async fn insert_one(&self, document: Document) -> Result<()>;
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>>;
    async fn find_all(&self) -> Result<Vec<Document>>;

    /// Updates the first document matching `filter`.
    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult>;

    /// Updates the first document matching `filter` and returns it as it is
    /// after the update.
    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>>;

    async fn update_many(&self, filter: &Filter, update: &Update) -> Result<UpdateResult>;

    /// The side whose payment mirroring is already attached to this store.
    fn mirror_side(&self) -> Option<Side> {
        None
    }
}

pub type DocumentStoreRef = Arc<dyn DocumentStore>;

/// Identifies one acquisition of a lock key.
///
/// Releasing with a token only frees the acquisition it was issued for, never
/// a later holder of the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(pub u64);

/// Non-blocking, time-bounded mutual exclusion keyed by string.
///
/// Implementations may be process-local or backed by a shared TTL store.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Returns `None` straight away when `key` is already held.
    async fn try_acquire(&self, key: &str) -> Result<Option<LockToken>>;

    /// Releasing an acquisition that is no longer held is a no-op.
    async fn release(&self, key: &str, token: LockToken) -> Result<()>;
}

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs deferred work after a delay without the caller awaiting it.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask;
}

/// Handle to a deferred task. Dropping the handle leaves the task running.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: AbortHandle,
}

impl ScheduledTask {
    pub fn new(handle: AbortHandle) -> Self {
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Source of wall-clock time for stamping paid-on dates.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
