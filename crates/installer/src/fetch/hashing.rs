//! Streaming SHA-512 over files on disk

use sha2::{Digest, Sha512};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{FileOperation, Result, SyncError};

const BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-512 of the file at `path`
pub async fn sha512_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| SyncError::fs(path, FileOperation::Read, e))?;

    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .await
            .map_err(|e| SyncError::fs(path, FileOperation::Read, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex digests compare case-insensitively
pub fn hashes_match(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}
