//! Streaming BLAKE3 hashing engine.
//!
//! Files are read in fixed-size chunks so peak memory is independent of
//! file size; a multi-terabyte file hashes in the same footprint as a
//! small one. For large files the BLAKE3 compression fans out across
//! the rayon pool while reads stay sequential, which keeps mechanical
//! drives on a single streaming access pattern.
//!
//! A read failure mid-hash (file deleted, permissions revoked, media
//! error) surfaces as the `io::Error`; the caller decides how to
//! recover. Nothing here touches the inventory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake3::Hasher;

pub use driftwatch_core::ContentHash;

/// Files at or above this size use multi-threaded BLAKE3 compression.
const RAYON_THRESHOLD: u64 = 128 * 1024;

/// Hash a file's content, reading `chunk_size` bytes at a time.
pub fn hash_file(path: &Path, chunk_size: usize) -> io::Result<ContentHash> {
    let mut file = File::open(path)?;
    let use_rayon = file.metadata().map(|m| m.len() >= RAYON_THRESHOLD).unwrap_or(false);

    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        if use_rayon {
            hasher.update_rayon(&buffer[..bytes_read]);
        } else {
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Hash an in-memory byte slice. Shares the digest with [`hash_file`];
/// used by tests and by callers that already hold the content.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::new(*blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"backup-utility-test").unwrap();
        file.flush().unwrap();

        let from_file = hash_file(file.path(), 4096).unwrap();
        assert_eq!(from_file, hash_bytes(b"backup-utility-test"));
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let content: Vec<u8> = (0..10_000u32).flat_map(|n| n.to_le_bytes()).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        let small_chunks = hash_file(file.path(), 7).unwrap();
        let big_chunks = hash_file(file.path(), 1 << 20).unwrap();
        assert_eq!(small_chunks, big_chunks);
        assert_eq!(small_chunks, hash_bytes(&content));
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let digest = hash_file(file.path(), 4096).unwrap();
        assert_eq!(digest, hash_bytes(b""));
    }

    #[test]
    fn test_missing_file_is_an_error_not_a_panic() {
        let err = hash_file(Path::new("/nonexistent/driftwatch-test"), 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_large_file_crosses_rayon_threshold() {
        let content = vec![0x5a_u8; (RAYON_THRESHOLD as usize) + 1];
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        assert_eq!(hash_file(file.path(), 64 * 1024).unwrap(), hash_bytes(&content));
    }
}
