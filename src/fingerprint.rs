//! Content fingerprints for face crops.
//!
//! A fingerprint is the lowercase hex SHA-256 of the exact file bytes, so two
//! payloads match only when they are byte-for-byte identical. A re-encoded
//! copy of the same picture gets a different fingerprint.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{RegistryError, Result};

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn fingerprint_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| RegistryError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| RegistryError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
