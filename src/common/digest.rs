//! Content fingerprints for reports

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;

use super::errors::Result;

/// SHA-256 hex digest of a value's JSON serialization
///
/// Every map in the report types is a `BTreeMap`, so equal values always
/// serialize to the same bytes.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), value)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Streams serializer output into a digest
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_fingerprint_is_stable() {
        let value: BTreeMap<&str, u32> = [("b", 2), ("a", 1)].into_iter().collect();
        let first = fingerprint(&value).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, fingerprint(&value).unwrap());
    }

    #[test]
    fn test_fingerprint_matches_plain_digest() {
        let expected = hex::encode(Sha256::digest(br#"{"a":1}"#));
        let value: BTreeMap<&str, u32> = [("a", 1)].into_iter().collect();
        assert_eq!(fingerprint(&value).unwrap(), expected);
    }
}
