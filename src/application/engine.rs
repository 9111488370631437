use super::coordinator::SyncCoordinator;
use crate::domain::document::{Document, Filter, Update};
use crate::domain::operation::{Operation, OperationType};
use crate::domain::payment::{ContractPayment, Invoice, PaymentStatus, Side, format_timestamp};
use crate::domain::ports::DocumentStoreRef;
use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Replays write operations against the two mirrored collections.
///
/// `ReplayEngine` attaches payment mirroring to both stores on construction
/// and waits for the coordinator to settle after each operation, so that every
/// replayed write sees the effect of the ones before it.
pub struct ReplayEngine {
    coordinator: Arc<SyncCoordinator>,
    invoices: DocumentStoreRef,
    payments: DocumentStoreRef,
}

impl ReplayEngine {
    /// Creates a new `ReplayEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `coordinator` - Mirrors payment status between the collections.
    /// * `invoices` - The invoice collection.
    /// * `payments` - The contract payment collection.
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        invoices: DocumentStoreRef,
        payments: DocumentStoreRef,
    ) -> Result<Self> {
        let invoices = coordinator.attach(Side::Source, invoices)?;
        let payments = coordinator.attach(Side::Mirror, payments)?;
        Ok(Self {
            coordinator,
            invoices,
            payments,
        })
    }

    /// The intercepted collection for `side`.
    pub fn collection(&self, side: Side) -> &DocumentStoreRef {
        match side {
            Side::Source => &self.invoices,
            Side::Mirror => &self.payments,
        }
    }

    /// Applies one operation and waits for any propagation it caused to
    /// release its lock.
    pub async fn process_operation(&self, op: Operation) -> Result<()> {
        let side = op.collection;
        let store = self.collection(side);
        let filter = Filter::eq(side.fields().key, op.key.as_str());
        let now = self.coordinator.clock().now();

        match op.operation {
            OperationType::Insert => {
                store.insert_one(new_document(&op, now)?).await?;
            }
            OperationType::UpdateOne => {
                let result = store.update_one(&filter, &update_for(&op, now)?).await?;
                if result.matched == 0 {
                    return Err(not_found(&op));
                }
            }
            OperationType::FindOneAndUpdate => {
                if store
                    .find_one_and_update(&filter, &update_for(&op, now)?)
                    .await?
                    .is_none()
                {
                    return Err(not_found(&op));
                }
            }
            OperationType::UpdateMany => {
                store.update_many(&filter, &update_for(&op, now)?).await?;
            }
        }

        self.coordinator.settle().await;
        Ok(())
    }

    /// Consumes the engine and returns the final payment status of every
    /// document, ordered by collection then key.
    pub async fn into_results(self) -> Result<Vec<PaymentStatus>> {
        self.coordinator.settle().await;

        let mut statuses: Vec<PaymentStatus> = Vec::new();
        for document in self.invoices.find_all().await? {
            statuses.push(Invoice::from_document(&document)?.into());
        }
        for document in self.payments.find_all().await? {
            statuses.push(ContractPayment::from_document(&document)?.into());
        }
        statuses.sort_by(|a, b| (a.collection, &a.key).cmp(&(b.collection, &b.key)));
        Ok(statuses)
    }
}

/// Fields outside the mirrored payment state, per side: (amount, note).
fn detail_fields(side: Side) -> (&'static str, &'static str) {
    match side {
        Side::Source => ("total", "description"),
        Side::Mirror => ("amount", "note"),
    }
}

/// The paid-on date a write stores on its own side: absent unless paid, and
/// stamped with `now` when paid without an explicit date.
fn paid_on_for(op: &Operation, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    match (op.paid, op.paid_on) {
        (Some(true), paid_on) => Ok(Some(paid_on.unwrap_or(now))),
        (_, None) => Ok(None),
        (_, Some(_)) => Err(SyncError::ValidationError(format!(
            "{}: paid_on given without marking paid",
            op.key
        ))),
    }
}

fn new_document(op: &Operation, now: DateTime<Utc>) -> Result<Document> {
    let paid = op.paid.unwrap_or(false);
    let paid_on = paid_on_for(op, now)?;
    match op.collection {
        Side::Source => Invoice {
            invoice_number: op.key.clone(),
            description: op.note.clone(),
            total: op.amount,
            paid,
            paid_on_date: paid_on,
        }
        .to_document(),
        Side::Mirror => ContractPayment {
            invoice_no: op.key.clone(),
            note: op.note.clone(),
            amount: op.amount,
            paid,
            paid_date: paid_on,
        }
        .to_document(),
    }
}

fn update_for(op: &Operation, now: DateTime<Utc>) -> Result<Update> {
    let fields = op.collection.fields();
    let (amount_field, note_field) = detail_fields(op.collection);
    let mut update = Update::new();

    let paid_on = paid_on_for(op, now)?;
    if let Some(paid) = op.paid {
        update = update.set(fields.paid, paid);
        update = match paid_on {
            Some(paid_on) => update.set(fields.paid_on, format_timestamp(paid_on)),
            None => update.unset(fields.paid_on),
        };
    }
    if let Some(amount) = op.amount {
        update = update.set(amount_field, serde_json::to_value(amount)?);
    }
    if let Some(note) = &op.note {
        update = update.set(note_field, note.as_str());
    }

    if update.is_empty() {
        return Err(SyncError::ValidationError(format!(
            "{}: operation changes no field",
            op.key
        )));
    }
    Ok(update)
}

fn not_found(op: &Operation) -> SyncError {
    SyncError::ValidationError(format!(
        "no {} document with {} = {}",
        op.collection,
        op.collection.fields().key,
        op.key
    ))
}
