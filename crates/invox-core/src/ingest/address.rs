//! Content addressing of uploads and the duplicate check.

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::AddressError;
use crate::models::invoice::ContentHash;

/// Default maximum upload size: 10 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

/// An upload read in full, with its content hash.
#[derive(Debug, Clone)]
pub struct Addressed {
    pub hash: ContentHash,
    pub bytes: Bytes,
}

/// Reads an upload under a size limit and computes its SHA-256 identity.
#[derive(Debug, Clone, Copy)]
pub struct ContentAddresser {
    max_size: u64,
}

impl Default for ContentAddresser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl ContentAddresser {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Reject a declared size above the limit before any byte is read.
    pub fn check_declared_size(&self, declared: u64) -> Result<(), AddressError> {
        if declared > self.max_size {
            return Err(AddressError::TooLarge {
                size: declared,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Read the stream to the end, hashing as it goes. Fails as soon as more
    /// than `max_size` bytes have been read.
    pub async fn read<R>(&self, reader: &mut R) -> Result<Addressed, AddressError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut hasher = Sha256::new();
        let mut buf = BytesMut::new();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if total > self.max_size {
                return Err(AddressError::TooLarge {
                    size: total,
                    max: self.max_size,
                });
            }
            hasher.update(&chunk[..n]);
            buf.extend_from_slice(&chunk[..n]);
        }

        Ok(Addressed {
            hash: ContentHash::from_digest(&hasher.finalize()),
            bytes: buf.freeze(),
        })
    }
}

/// Snapshot of stored object keys used to detect re-uploads.
#[derive(Debug, Clone, Default)]
pub struct DuplicateGuard {
    existing: HashSet<String>,
}

impl DuplicateGuard {
    pub fn new(existing: HashSet<String>) -> Self {
        Self { existing }
    }

    /// Whether an object for `hash` is already stored.
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.existing.contains(&hash.object_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_read_hashes_whole_stream() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 13];
        let addressed = ContentAddresser::default()
            .read(&mut data.as_slice())
            .await
            .unwrap();
        assert_eq!(addressed.hash, ContentHash::of(&data));
        assert_eq!(addressed.bytes.len(), data.len());
    }

    #[tokio::test]
    async fn test_same_bytes_same_hash() {
        let addresser = ContentAddresser::default();
        let a = addresser.read(&mut &b"invoice"[..]).await.unwrap();
        let b = addresser.read(&mut &b"invoice"[..]).await.unwrap();
        assert_eq!(a.hash, b.hash);
    }

    #[tokio::test]
    async fn test_stream_over_limit_rejected() {
        let addresser = ContentAddresser::new(10);
        assert!(addresser.read(&mut &[0u8; 10][..]).await.is_ok());

        let err = addresser.read(&mut &[0u8; 11][..]).await.unwrap_err();
        assert!(matches!(err, AddressError::TooLarge { size: 11, max: 10 }));
    }

    #[test]
    fn test_declared_size_checked() {
        let addresser = ContentAddresser::default();
        assert!(addresser.check_declared_size(DEFAULT_MAX_SIZE).is_ok());
        assert!(addresser.check_declared_size(DEFAULT_MAX_SIZE + 1).is_err());
    }

    #[test]
    fn test_duplicate_guard() {
        let hash = ContentHash::of(b"stored");
        let guard = DuplicateGuard::new(HashSet::from([hash.object_key()]));
        assert!(guard.contains(&hash));
        assert!(!guard.contains(&ContentHash::of(b"new")));
    }
}
