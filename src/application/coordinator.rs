use super::config::SyncConfig;
use super::interceptor::SyncedCollection;
use super::writer::MirrorWriter;
use crate::domain::payment::{PaymentChange, Side, format_timestamp};
use crate::domain::ports::{
    Clock, DocumentStore, DocumentStoreRef, LockProvider, LockToken, Scheduler, SystemClock,
};
use crate::error::{Result, SyncError};
use crate::infrastructure::lock_registry::InMemoryLockRegistry;
use crate::infrastructure::scheduler::TokioScheduler;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::Notify;

/// Why a propagation did not reach the Mirror Writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another propagation for the same key is in flight or cooling down.
    LockHeld,
    /// The lock provider could not be consulted.
    LockUnavailable,
    /// No collection is attached for the opposite side.
    NoTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationOutcome {
    Applied,
    Skipped(SkipReason),
    /// The sibling write failed. Logged, never surfaced to the writer.
    Failed,
}

/// Mirrors payment-status changes between the two collections.
///
/// At most one propagation per business key is in flight at a time: both
/// directions contend for the same lock, which is what stops a mirrored write
/// from echoing back to its origin. A key is also tracked as active for as
/// long as its mirror write runs, so the echo is dropped even when the lock
/// lapsed mid-write. Propagation is best-effort; nothing here ever fails the
/// write that triggered it.
pub struct SyncCoordinator {
    config: SyncConfig,
    locks: Arc<dyn LockProvider>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    writer: MirrorWriter,
    targets: RwLock<HashMap<Side, Weak<dyn DocumentStore>>>,
    active: Mutex<HashSet<String>>,
    in_flight: Arc<AtomicUsize>,
    settled: Arc<Notify>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        locks: Arc<dyn LockProvider>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            locks,
            scheduler,
            writer: MirrorWriter::new(Arc::clone(&clock)),
            clock,
            targets: RwLock::new(HashMap::new()),
            active: Mutex::new(HashSet::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            settled: Arc::new(Notify::new()),
        }))
    }

    /// Process-local locks, tokio timers and the system clock.
    pub fn in_process(config: SyncConfig) -> Result<Arc<Self>> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler);
        let locks = Arc::new(InMemoryLockRegistry::new(
            config.lock_ttl,
            Arc::clone(&scheduler),
        ));
        Self::new(config, locks, scheduler, Arc::new(SystemClock))
    }

    /// The clock paid-on dates are stamped with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Intercepts writes to `store` as the given side and registers it as the
    /// mirror target for the opposite side.
    ///
    /// Attaching a store that is already intercepted as `side` returns it
    /// unchanged, so repeated composition is harmless.
    pub fn attach(self: &Arc<Self>, side: Side, store: DocumentStoreRef) -> Result<DocumentStoreRef> {
        let synced = match store.mirror_side() {
            Some(existing) if existing == side => {
                tracing::debug!(collection = store.name(), %side, "payment mirroring already attached");
                store
            }
            Some(existing) => {
                return Err(SyncError::ValidationError(format!(
                    "collection {} is already mirrored as {existing}",
                    store.name()
                )));
            }
            None => Arc::new(SyncedCollection::new(side, store, Arc::clone(self))) as DocumentStoreRef,
        };

        self.targets_mut().insert(side, Arc::downgrade(&synced));
        Ok(synced)
    }

    /// Copies `change` onto the sibling of the side it was written to.
    pub async fn propagate(&self, change: PaymentChange) -> PropagationOutcome {
        let lock_key = self.config.lock_key(&change.business_key);
        let token = match self.locks.try_acquire(&lock_key).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::trace!(
                    business_key = %change.business_key,
                    from = %change.side,
                    "propagation already in flight, skipping"
                );
                return PropagationOutcome::Skipped(SkipReason::LockHeld);
            }
            Err(error) => {
                tracing::warn!(
                    business_key = %change.business_key,
                    from = %change.side,
                    %error,
                    "lock provider unavailable, skipping propagation"
                );
                return PropagationOutcome::Skipped(SkipReason::LockUnavailable);
            }
        };

        if !self.enter(&lock_key) {
            // the running propagation outlived its lock
            tracing::warn!(
                business_key = %change.business_key,
                from = %change.side,
                "lock lapsed while its propagation was still running, skipping"
            );
            if let Err(error) = self.locks.release(&lock_key, token).await {
                tracing::warn!(key = %lock_key, %error, "lock release failed, left to TTL");
            }
            return PropagationOutcome::Skipped(SkipReason::LockHeld);
        }

        // released after the cool-down however this function exits
        let _release = PendingRelease::new(self, lock_key, token);

        let target_side = change.side.opposite();
        let Some(target) = self.target(target_side) else {
            tracing::warn!(
                business_key = %change.business_key,
                from = %change.side,
                to = %target_side,
                "no collection attached to mirror onto"
            );
            return PropagationOutcome::Skipped(SkipReason::NoTarget);
        };

        match self
            .writer
            .apply_mirror(target.as_ref(), target_side, &change)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    business_key = %change.business_key,
                    from = %change.side,
                    to = %target_side,
                    paid = change.paid,
                    "payment status mirrored"
                );
                PropagationOutcome::Applied
            }
            Err(error) => {
                tracing::error!(
                    business_key = %change.business_key,
                    from = %change.side,
                    to = %target_side,
                    paid = change.paid,
                    paid_on = ?change.paid_on.map(format_timestamp),
                    %error,
                    "payment mirror failed"
                );
                PropagationOutcome::Failed
            }
        }
    }

    /// Locks taken by this coordinator that are not released yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until every propagation started so far has released its lock.
    pub async fn settle(&self) {
        loop {
            let released = self.settled.notified();
            if self.in_flight() == 0 {
                return;
            }
            released.await;
        }
    }

    fn target(&self, side: Side) -> Option<DocumentStoreRef> {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&side)
            .and_then(Weak::upgrade)
    }

    fn targets_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Side, Weak<dyn DocumentStore>>> {
        self.targets.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, lock_key: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(lock_key.to_owned())
    }

    fn leave(&self, lock_key: &str) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(lock_key);
    }

    fn schedule_release(&self, lock_key: String, token: LockToken) {
        let locks = Arc::clone(&self.locks);
        let in_flight = Arc::clone(&self.in_flight);
        let settled = Arc::clone(&self.settled);
        self.scheduler.schedule(
            self.config.cooldown,
            Box::pin(async move {
                if let Err(error) = locks.release(&lock_key, token).await {
                    tracing::warn!(key = %lock_key, %error, "lock release failed, left to TTL");
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
                settled.notify_waiters();
            }),
        );
    }
}

/// Schedules the cool-down release when dropped, so a panicking or cancelled
/// propagation still gives its lock back.
struct PendingRelease<'a> {
    coordinator: &'a SyncCoordinator,
    lock_key: Option<String>,
    token: LockToken,
}

impl<'a> PendingRelease<'a> {
    fn new(coordinator: &'a SyncCoordinator, lock_key: String, token: LockToken) -> Self {
        coordinator.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            coordinator,
            lock_key: Some(lock_key),
            token,
        }
    }
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if let Some(lock_key) = self.lock_key.take() {
            self.coordinator.leave(&lock_key);
            self.coordinator.schedule_release(lock_key, self.token);
        }
    }
}
