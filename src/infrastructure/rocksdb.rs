use crate::domain::document::{Document, Filter, Update, UpdateResult};
use crate::domain::payment::Side;
use crate::domain::ports::DocumentStore;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// A persistent document store backed by RocksDB.
///
/// Each collection lives in its own column family ("invoices" and
/// "payments"), documents are JSON-encoded and keyed by a big-endian id.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating the
    /// column family of every collection if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [Side::Source, Side::Mirror]
            .map(|side| ColumnFamilyDescriptor::new(side.collection_name(), Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Handle on one collection of this database.
    pub fn collection(&self, side: Side) -> Result<RocksDbCollection> {
        let name = side.collection_name();
        let cf = self.db.cf_handle(name).ok_or_else(|| missing_family(name))?;

        let next_id = match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => decode_id(&item?.0)? + 1,
            None => 0,
        };

        Ok(RocksDbCollection {
            db: Arc::clone(&self.db),
            name,
            next_id: Arc::new(AtomicU64::new(next_id)),
            writer: Arc::new(Mutex::new(())),
        })
    }
}

/// One column family of a [`RocksDBStore`].
///
/// Writes are serialized through a per-collection mutex so that find-then-put
/// is atomic with respect to other writers in this process.
#[derive(Clone)]
pub struct RocksDbCollection {
    db: Arc<DB>,
    name: &'static str,
    next_id: Arc<AtomicU64>,
    writer: Arc<Mutex<()>>,
}

impl RocksDbCollection {
    fn scan(&self) -> Result<Vec<(u64, Document)>> {
        let cf = self
            .db
            .cf_handle(self.name)
            .ok_or_else(|| missing_family(self.name))?;

        let mut documents = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let document: Document = serde_json::from_slice(&value)?;
            documents.push((decode_id(&key)?, document));
        }
        Ok(documents)
    }

    fn put(&self, id: u64, document: &Document) -> Result<()> {
        let cf = self
            .db
            .cf_handle(self.name)
            .ok_or_else(|| missing_family(self.name))?;
        let value = serde_json::to_vec(document)?;
        self.db.put_cf(&cf, id.to_be_bytes(), value)?;
        Ok(())
    }
}

fn missing_family(name: &str) -> SyncError {
    SyncError::InternalError(Box::new(std::io::Error::other(format!(
        "{name} column family not found"
    ))))
}

fn decode_id(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| {
        SyncError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed document key of {} bytes", key.len()),
        )))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl DocumentStore for RocksDbCollection {
    fn name(&self) -> &str {
        self.name
    }

    async fn insert_one(&self, document: Document) -> Result<()> {
        let _writer = self.writer.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.put(id, &document)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        Ok(self
            .scan()?
            .into_iter()
            .map(|(_, document)| document)
            .find(|document| filter.matches(document)))
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        Ok(self.scan()?.into_iter().map(|(_, document)| document).collect())
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let _writer = self.writer.lock().await;
        let Some((id, mut document)) = self
            .scan()?
            .into_iter()
            .find(|(_, document)| filter.matches(document))
        else {
            return Ok(UpdateResult::default());
        };

        let modified = update.apply_to(&mut document);
        if modified {
            self.put(id, &document)?;
        }
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
        let _writer = self.writer.lock().await;
        let Some((id, mut document)) = self
            .scan()?
            .into_iter()
            .find(|(_, document)| filter.matches(document))
        else {
            return Ok(None);
        };

        if update.apply_to(&mut document) {
            self.put(id, &document)?;
        }
        Ok(Some(document))
    }

    async fn update_many(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let _writer = self.writer.lock().await;
        let mut result = UpdateResult::default();
        for (id, mut document) in self.scan()? {
            if !filter.matches(&document) {
                continue;
            }
            result.matched += 1;
            if update.apply_to(&mut document) {
                self.put(id, &document)?;
                result.modified += 1;
            }
        }
        Ok(result)
    }
}
