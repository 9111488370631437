#![allow(dead_code)]

use async_trait::async_trait;
use invoice_sync::application::config::SyncConfig;
use invoice_sync::application::coordinator::SyncCoordinator;
use invoice_sync::domain::document::{Document, Filter, Update, UpdateResult};
use invoice_sync::domain::payment::{ContractPayment, Invoice, PaymentChange, Side};
use invoice_sync::domain::ports::{DocumentStore, LockProvider, LockToken, Scheduler, SystemClock};
use invoice_sync::error::{Result, SyncError};
use invoice_sync::infrastructure::in_memory::InMemoryCollection;
use invoice_sync::infrastructure::lock_registry::InMemoryLockRegistry;
use invoice_sync::infrastructure::scheduler::TokioScheduler;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory collection that counts single-document updates and can be made
/// slow or failing.
pub struct ProbeStore {
    inner: InMemoryCollection,
    update_one_calls: AtomicUsize,
    delay: Duration,
    failing: AtomicBool,
}

impl ProbeStore {
    pub fn new(name: &str) -> Self {
        Self::with_delay(name, Duration::ZERO)
    }

    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self {
            inner: InMemoryCollection::new(name),
            update_one_calls: AtomicUsize::new(0),
            delay,
            failing: AtomicBool::new(false),
        }
    }

    pub fn update_one_calls(&self) -> usize {
        self.update_one_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for ProbeStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert_one(&self, document: Document) -> Result<()> {
        self.inner.insert_one(document).await
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        self.inner.find_one(filter).await
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        self.inner.find_all().await
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        self.update_one_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::InternalError(Box::new(std::io::Error::other(
                "connection reset",
            ))));
        }
        self.inner.update_one(filter, update).await
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>> {
        self.inner.find_one_and_update(filter, update).await
    }

    async fn update_many(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        self.inner.update_many(filter, update).await
    }
}

/// Lock provider that records every acquisition attempt and can refuse to
/// release, leaving expiry to the registry's TTL.
pub struct RecordingLocks {
    pub registry: InMemoryLockRegistry,
    attempts: Mutex<Vec<(String, bool)>>,
    acquire_fails: AtomicBool,
    release_fails: AtomicBool,
}

impl RecordingLocks {
    pub fn new(ttl: Duration) -> Self {
        Self {
            registry: InMemoryLockRegistry::new(ttl, Arc::new(TokioScheduler)),
            attempts: Mutex::new(Vec::new()),
            acquire_fails: AtomicBool::new(false),
            release_fails: AtomicBool::new(false),
        }
    }

    pub fn attempts(&self) -> Vec<(String, bool)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn set_acquire_fails(&self, fails: bool) {
        self.acquire_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_release_fails(&self, fails: bool) {
        self.release_fails.store(fails, Ordering::SeqCst);
    }
}

#[async_trait]
impl LockProvider for RecordingLocks {
    async fn try_acquire(&self, key: &str) -> Result<Option<LockToken>> {
        if self.acquire_fails.load(Ordering::SeqCst) {
            return Err(SyncError::InternalError(Box::new(std::io::Error::other(
                "lock store unreachable",
            ))));
        }
        let acquired = self.registry.try_acquire_now(key);
        self.attempts
            .lock()
            .unwrap()
            .push((key.to_owned(), acquired.is_some()));
        Ok(acquired)
    }

    async fn release(&self, key: &str, token: LockToken) -> Result<()> {
        if self.release_fails.load(Ordering::SeqCst) {
            return Err(SyncError::InternalError(Box::new(std::io::Error::other(
                "lock store unreachable",
            ))));
        }
        self.registry.release_now(key, token);
        Ok(())
    }
}

/// A coordinator over `locks`, using tokio timers and the system clock.
pub fn coordinator_with(config: SyncConfig, locks: Arc<dyn LockProvider>) -> Arc<SyncCoordinator> {
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler);
    SyncCoordinator::new(config, locks, scheduler, Arc::new(SystemClock)).unwrap()
}

pub async fn seed_invoice(store: &dyn DocumentStore, invoice: Invoice) {
    store.insert_one(invoice.to_document().unwrap()).await.unwrap();
}

pub async fn seed_payment(store: &dyn DocumentStore, payment: ContractPayment) {
    store.insert_one(payment.to_document().unwrap()).await.unwrap();
}

pub async fn invoice(store: &dyn DocumentStore, key: &str) -> (Invoice, Document) {
    let document = store
        .find_one(&Filter::eq("invoiceNumber", key))
        .await
        .unwrap()
        .expect("invoice should exist");
    (Invoice::from_document(&document).unwrap(), document)
}

pub async fn payment(store: &dyn DocumentStore, key: &str) -> (ContractPayment, Document) {
    let document = store
        .find_one(&Filter::eq("invoiceNo", key))
        .await
        .unwrap()
        .expect("payment should exist");
    (ContractPayment::from_document(&document).unwrap(), document)
}

pub fn change(side: Side, key: &str, paid: bool) -> PaymentChange {
    PaymentChange {
        side,
        business_key: key.to_owned(),
        paid,
        paid_on: None,
    }
}
