use super::coordinator::SyncCoordinator;
use crate::domain::document::{Document, Filter, Update, UpdateResult};
use crate::domain::payment::{PaymentChange, Side, parse_timestamp};
use crate::domain::ports::{DocumentStore, DocumentStoreRef};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Decorates a collection so that single-document writes which set the paid
/// flag are mirrored onto the sibling collection once they have completed.
///
/// `update_many` is passed straight through: bulk writes are never mirrored.
pub struct SyncedCollection {
    side: Side,
    inner: DocumentStoreRef,
    coordinator: Arc<SyncCoordinator>,
}

impl SyncedCollection {
    pub fn new(side: Side, inner: DocumentStoreRef, coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            side,
            inner,
            coordinator,
        }
    }
}

/// Paid value and optional explicit date a write intends to set on `side`.
pub fn requested_payment(side: Side, update: &Update) -> Option<(bool, Option<DateTime<Utc>>)> {
    let fields = side.fields();
    let paid = update.set_value(fields.paid)?.as_bool()?;
    let paid_on = update.set_value(fields.paid_on).and_then(parse_timestamp);
    Some((paid, paid_on))
}

/// Change carried by an `update_one`, keyed from its filter.
pub fn change_from_filter(side: Side, filter: &Filter, update: &Update) -> Option<PaymentChange> {
    let (paid, paid_on) = requested_payment(side, update)?;
    let Some(business_key) = filter.string_value(side.fields().key) else {
        tracing::debug!(%side, "paid flag written without a business key in the filter, not mirrored");
        return None;
    };
    Some(PaymentChange {
        side,
        business_key: business_key.to_owned(),
        paid,
        paid_on,
    })
}

/// Change carried by a `find_one_and_update`, keyed from the resulting
/// document.
pub fn change_from_document(side: Side, document: &Document, update: &Update) -> Option<PaymentChange> {
    let (paid, paid_on) = requested_payment(side, update)?;
    let Some(business_key) = document.get(side.fields().key).and_then(Value::as_str) else {
        tracing::debug!(%side, "updated document has no business key, not mirrored");
        return None;
    };
    Some(PaymentChange {
        side,
        business_key: business_key.to_owned(),
        paid,
        paid_on,
    })
}

#[async_trait]
impl DocumentStore for SyncedCollection {
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
        let result = self.inner.update_one(filter, update).await?;
        if result.matched > 0
            && let Some(change) = change_from_filter(self.side, filter, update)
        {
            self.coordinator.propagate(change).await;
        }
        Ok(result)
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>> {
        let document = self.inner.find_one_and_update(filter, update).await?;
        if let Some(updated) = &document
            && let Some(change) = change_from_document(self.side, updated, update)
        {
            self.coordinator.propagate(change).await;
        }
        Ok(document)
    }

    async fn update_many(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        if requested_payment(self.side, update).is_some() {
            tracing::debug!(collection = self.name(), "bulk update sets the paid flag, not mirrored");
        }
        self.inner.update_many(filter, update).await
    }

    fn mirror_side(&self) -> Option<Side> {
        Some(self.side)
    }
}
