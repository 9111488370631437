use crate::domain::document::{Filter, Update};
use crate::domain::payment::{PaymentChange, Side, format_timestamp};
use crate::domain::ports::{Clock, DocumentStore};
use crate::error::{Result, SyncError};
use std::sync::Arc;

/// Writes a payment-status change onto the sibling collection.
#[derive(Debug, Clone)]
pub struct MirrorWriter {
    clock: Arc<dyn Clock>,
}

impl MirrorWriter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// The update `change` translates to on `target`'s field names.
    ///
    /// Marking paid stamps the supplied date, or now if none was given.
    /// Marking unpaid removes the date field rather than nulling it.
    pub fn mirror_update(&self, target: Side, change: &PaymentChange) -> Update {
        let fields = target.fields();
        if change.paid {
            let paid_on = change.paid_on.unwrap_or_else(|| self.clock.now());
            Update::new()
                .set(fields.paid, true)
                .set(fields.paid_on, format_timestamp(paid_on))
        } else {
            Update::new().set(fields.paid, false).unset(fields.paid_on)
        }
    }

    /// Issues exactly one `update_one` against `store`, filtered by the
    /// target's own key field. Nothing is read back or retried.
    pub async fn apply_mirror(
        &self,
        store: &dyn DocumentStore,
        target: Side,
        change: &PaymentChange,
    ) -> Result<()> {
        let fields = target.fields();
        let filter = Filter::eq(fields.key, change.business_key.as_str());
        let update = self.mirror_update(target, change);

        let result = store.update_one(&filter, &update).await?;
        if result.matched == 0 {
            return Err(SyncError::MirrorTargetMissing {
                collection: store.name().to_owned(),
                field: fields.key.to_owned(),
                key: change.business_key.clone(),
            });
        }
        Ok(())
    }
}
