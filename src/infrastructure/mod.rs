pub mod in_memory;
pub mod lock_registry;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod scheduler;
