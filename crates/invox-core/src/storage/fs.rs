//! Object store backed by a local directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::ObjectStore;
use crate::error::StoreError;
use crate::models::invoice::OBJECT_EXTENSION;

const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores each object as a file named by its key in one flat directory.
///
/// Writes go to a hidden temp file that is renamed into place, so readers
/// never see a partial object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Use `root` as the object directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the object stored under `key`.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{}.{}.{}{}", key, std::process::id(), n, TEMP_SUFFIX))
    }
}

/// Keys are plain file names: no separators, no leading dot.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
        || key.contains("..")
        || key.chars().any(char::is_control);
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn is_object_name(name: &str) -> bool {
    !name.starts_with('.')
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(OBJECT_EXTENSION))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        fs::create_dir_all(&self.root).await?;

        let temp = self.temp_path(key);
        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!("Stored {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn list_keys(&self) -> Result<HashSet<String>, StoreError> {
        let mut keys = HashSet::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_object_name(name) {
                    keys.insert(name.to_string());
                }
            }
        }

        Ok(keys)
    }

    async fn presigned_link(&self, key: &str, ttl: Duration) -> Result<Url, StoreError> {
        let path = self.object_path(key)?;
        let path = match fs::canonicalize(&path).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut url =
            Url::from_file_path(&path).map_err(|_| StoreError::InvalidKey(key.to_string()))?;
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("abc.pdf").is_ok());
        for bad in ["", ".hidden.pdf", "a/b.pdf", "..", "a\\b.pdf"] {
            assert!(matches!(validate_key(bad), Err(StoreError::InvalidKey(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_put_and_list() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("objects"));

        assert!(store.list_keys().await.unwrap().is_empty());

        store.put("aa.pdf", Bytes::from_static(b"one")).await.unwrap();
        store.put("bb.pdf", Bytes::from_static(b"two")).await.unwrap();
        store.put("aa.pdf", Bytes::from_static(b"three")).await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, HashSet::from(["aa.pdf".to_string(), "bb.pdf".to_string()]));
        let stored = std::fs::read(store.object_path("aa.pdf").unwrap()).unwrap();
        assert_eq!(stored, b"three");
    }

    #[tokio::test]
    async fn test_list_ignores_temp_and_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        std::fs::write(dir.path().join("cc.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join(".cc.pdf.1.0.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("dd.pdf")).unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, HashSet::from(["cc.pdf".to_string()]));
    }

    #[tokio::test]
    async fn test_presigned_link() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.put("ee.pdf", Bytes::from_static(b"pdf")).await.unwrap();

        let before = chrono::Utc::now().timestamp();
        let url = store
            .presigned_link("ee.pdf", Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/ee.pdf"));

        let expires: i64 = url
            .query_pairs()
            .find(|(k, _)| k == "expires")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();
        assert!(expires >= before + 600);

        let missing = store.presigned_link("ff.pdf", Duration::from_secs(1)).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }
}
