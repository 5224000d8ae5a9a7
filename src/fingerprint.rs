//! Content fingerprints using BLAKE3
//!
//! A fingerprint is a 32-byte digest of a byte stream. Identical content always
//! yields the same fingerprint; the mirror compares fingerprints to decide
//! whether a target file still matches its source.

use blake3::Hasher;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// 32-byte content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

/// Digest an in-memory buffer
pub fn digest_bytes(content: &[u8]) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(content);
    Fingerprint(*hasher.finalize().as_bytes())
}

/// Digest a stream until EOF
///
/// Read errors are propagated unchanged; the caller decides how to treat them.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(Fingerprint(*hasher.finalize().as_bytes()))
}

/// Digest the full content of a file
pub fn digest_file(path: &Path) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    digest_reader(io::BufReader::new(file))
}
