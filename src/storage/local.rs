//! Filesystem object store

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::{fs, io::AsyncWriteExt, sync::OnceCell};

use super::{ObjectStore, StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Object store rooted at a directory
///
/// Keys map to relative paths below `root_dir`; the directory itself is the
/// bucket and is created on the first `put`. Presigned URLs are built from
/// `public_url` and signed with `secret`.
#[derive(Debug)]
pub struct LocalStorage {
    root_dir: PathBuf,
    public_url: String,
    secret: String,
    bucket: OnceCell<()>,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root_dir: P, public_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
            bucket: OnceCell::new(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Check a signature produced by [`ObjectStore::presign`] at Unix time `now`
    ///
    /// The MAC comparison is constant-time.
    pub fn verify_signature(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, expires)
            .map(|mac| mac.verify_slice(&signature).is_ok())
            .unwrap_or(false)
    }

    /// Check a full presigned URL at Unix time `now`
    pub fn verify_presigned(&self, presigned: &str, now: i64) -> bool {
        let Some(rest) = presigned.strip_prefix(&self.public_url) else {
            return false;
        };
        let Ok(parsed) = url::Url::parse(presigned) else {
            return false;
        };
        let key = rest.trim_start_matches('/').split('?').next().unwrap_or_default();
        let mut expires = None;
        let mut signature = None;
        for (name, value) in parsed.query_pairs() {
            match name.as_ref() {
                "expires" => expires = value.parse::<i64>().ok(),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }
        match (expires, signature) {
            (Some(expires), Some(signature)) => self.verify_signature(key, expires, &signature, now),
            _ => false,
        }
    }

    /// HMAC-SHA-256 keyed by the secret over `key \n expires`
    fn mac(&self, key: &str, expires: i64) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| StorageError::Other(format!("invalid signing secret: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn sign(&self, key: &str, expires: i64) -> StorageResult<String> {
        Ok(hex::encode(self.mac(key, expires)?.finalize().into_bytes()))
    }

    /// Resolve `key` below the root, refusing anything that would escape it
    fn full_path(&self, key: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty() || rel.is_absolute() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root_dir.join(rel))
    }

    async fn ensure_bucket(&self) -> io::Result<()> {
        self.bucket
            .get_or_try_init(|| async {
                if !fs::try_exists(&self.root_dir).await? {
                    debug!("Creating storage root {}", self.root_dir.display());
                    fs::create_dir_all(&self.root_dir).await?;
                }
                Ok::<(), io::Error>(())
            })
            .await
            .map(|_| ())
    }
}

fn not_found_as(key: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        let full_path = self.full_path(key)?;
        self.ensure_bucket().await?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!("Stored {} ({} bytes, {})", key, bytes.len(), content_type);
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.full_path(key)?;
        fs::read(&full_path).await.map_err(|e| not_found_as(key, e))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let full_path = self.full_path(key)?;
        fs::remove_file(&full_path).await.map_err(|e| not_found_as(key, e))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        if !fs::try_exists(&self.root_dir).await? {
            return Ok(keys);
        }

        let mut pending = vec![self.root_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.root_dir) else { continue };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn presign(&self, key: &str, ttl_secs: u64) -> StorageResult<String> {
        let full_path = self.full_path(key)?;
        if !fs::try_exists(&full_path).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let ttl = i64::try_from(ttl_secs).map_err(|_| StorageError::Other(format!("TTL out of range: {}", ttl_secs)))?;
        let expires = chrono::Utc::now().timestamp().saturating_add(ttl);
        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.public_url,
            key,
            expires,
            self.sign(key, expires)?
        ))
    }
}
