//! Object storage abstraction
//!
//! The pipeline treats storage as an opaque key/value byte-blob store. Backends
//! implement [`ObjectStore`]; the crate ships a filesystem backend
//! ([`LocalStorage`]) and an in-memory backend ([`MemoryStorage`]).

use async_trait::async_trait;
use std::io;
use thiserror::Error;

pub mod local;
pub mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Default lifetime of a presigned URL: seven days
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error from the underlying medium
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No object stored under the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The key is not acceptable to this backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend-specific failure
    #[error("{0}")]
    Other(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage collaborator contract
///
/// Backends create their bucket (root directory, map, ...) lazily on the first
/// `put`. None of the operations retry; retry policy belongs to the backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return the key
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Fetch the bytes stored under `key`; `NotFound` when absent
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove the object stored under `key`
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List every key starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Produce a time-limited URL for reading `key`
    async fn presign(&self, key: &str, ttl_secs: u64) -> StorageResult<String>;
}
