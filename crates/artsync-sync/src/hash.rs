//! Content hashing for change detection.
//!
//! SHA-256, lowercase hex. The digest is only ever compared against other
//! digests produced here, so the algorithm choice is an implementation
//! detail; what matters is that identical bytes yield identical strings.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 8192;

/// Hash an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a reader in fixed-size chunks, without loading it whole.
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file on disk. Missing or unreadable paths surface as I/O errors.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    hash_reader(std::io::BufReader::new(file))
}
