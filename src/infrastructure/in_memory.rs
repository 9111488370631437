use crate::domain::document::{Document, Filter, Update, UpdateResult};
use crate::domain::ports::DocumentStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Documents {
    by_id: BTreeMap<u64, Document>,
    next_id: u64,
}

/// A thread-safe in-memory document collection.
///
/// Documents are kept in insertion order; single-document operations act on
/// the earliest inserted match. `Clone` shares the underlying collection.
#[derive(Clone)]
pub struct InMemoryCollection {
    name: String,
    documents: Arc<RwLock<Documents>>,
}

impl InMemoryCollection {
    /// Creates a new, empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Documents::default())),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> Result<()> {
        let mut documents = self.documents.write().await;
        let id = documents.next_id;
        documents.next_id += 1;
        documents.by_id.insert(id, document);
        Ok(())
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .by_id
            .values()
            .find(|document| filter.matches(document))
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.by_id.values().cloned().collect())
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let mut documents = self.documents.write().await;
        let Some(document) = documents
            .by_id
            .values_mut()
            .find(|document| filter.matches(document))
        else {
            return Ok(UpdateResult::default());
        };

        let modified = update.apply_to(document);
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>> {
        let mut documents = self.documents.write().await;
        Ok(documents
            .by_id
            .values_mut()
            .find(|document| filter.matches(document))
            .map(|document| {
                update.apply_to(document);
                document.clone()
            }))
    }

    async fn update_many(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let mut documents = self.documents.write().await;
        let mut result = UpdateResult::default();
        for document in documents
            .by_id
            .values_mut()
            .filter(|document| filter.matches(document))
        {
            result.matched += 1;
            if update.apply_to(document) {
                result.modified += 1;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{ContractPayment, Invoice};
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_collection_insert_and_find() {
        let store = InMemoryCollection::new("invoices");
        let invoice = Invoice::new("INV-1");

        store.insert_one(invoice.to_document().unwrap()).await.unwrap();

        let found = store
            .find_one(&Filter::eq("invoiceNumber", "INV-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Invoice::from_document(&found).unwrap(), invoice);

        assert!(
            store
                .find_one(&Filter::eq("invoiceNumber", "INV-2"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_one_touches_first_match_only() {
        let store = InMemoryCollection::new("payments");
        for _ in 0..2 {
            store
                .insert_one(ContractPayment::new("INV-1").to_document().unwrap())
                .await
                .unwrap();
        }

        let result = store
            .update_one(
                &Filter::eq("invoiceNo", "INV-1"),
                &Update::new().set("paid", true),
            )
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 1, modified: 1 });

        let paid: Vec<bool> = store
            .find_all()
            .await
            .unwrap()
            .iter()
            .map(|document| document["paid"] == json!(true))
            .collect();
        assert_eq!(paid, vec![true, false]);
    }

    #[tokio::test]
    async fn test_update_one_without_match() {
        let store = InMemoryCollection::new("payments");
        let result = store
            .update_one(
                &Filter::eq("invoiceNo", "missing"),
                &Update::new().set("paid", true),
            )
            .await
            .unwrap();
        assert_eq!(result, UpdateResult::default());
    }

    #[tokio::test]
    async fn test_find_one_and_update_returns_updated_document() {
        let store = InMemoryCollection::new("invoices");
        store
            .insert_one(Invoice::new("INV-1").to_document().unwrap())
            .await
            .unwrap();

        let updated = store
            .find_one_and_update(
                &Filter::eq("invoiceNumber", "INV-1"),
                &Update::new().set("description", "March retainer"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["description"], json!("March retainer"));
    }

    #[tokio::test]
    async fn test_update_many_counts_matches() {
        let store = InMemoryCollection::new("payments");
        for key in ["INV-1", "INV-1", "INV-2"] {
            store
                .insert_one(ContractPayment::new(key).to_document().unwrap())
                .await
                .unwrap();
        }

        let result = store
            .update_many(
                &Filter::eq("invoiceNo", "INV-1"),
                &Update::new().set("paid", false),
            )
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 2, modified: 0 });
        assert_eq!(store.len().await, 3);
    }
}
