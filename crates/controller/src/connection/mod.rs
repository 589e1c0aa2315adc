//! # Connection Details
//!
//! Connection details are the key/value credentials a resource exposes so its
//! consumers can reach it. They are published to a Secret named by the
//! resource's `writeConnectionSecretToRef`.
//!
//! Publishing is gated on a content digest: a resource records the digest of
//! what it last published and skips the write while it is unchanged.

mod kubernetes;
mod memory;

pub use kubernetes::KubeSecretStore;
pub use memory::MemorySecretStore;

use crate::crd::SecretReference;
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Connection detail keys and their raw values
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Storage for published connection details
#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Replace the contents of the destination secret
    async fn publish(&self, dest: &SecretReference, details: &ConnectionDetails) -> Result<()>;

    /// Remove the destination secret; a missing secret is not an error
    async fn unpublish(&self, dest: &SecretReference) -> Result<()>;

    /// Read a secret; a missing secret yields no details
    async fn fetch(&self, src: &SecretReference) -> Result<ConnectionDetails>;
}

/// Stable hex SHA-256 of a set of connection details
#[must_use]
pub fn digest(details: &ConnectionDetails) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in details {
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Merge several detail sets in order; later keys win
#[must_use]
pub fn merge<I>(sets: I) -> ConnectionDetails
where
    I: IntoIterator<Item = ConnectionDetails>,
{
    sets.into_iter().fold(ConnectionDetails::new(), |mut acc, set| {
        acc.extend(set);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(pairs: &[(&str, &str)]) -> ConnectionDetails {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_digest_is_stable_and_content_sensitive() {
        let a = details(&[("user", "admin"), ("password", "s3cret")]);
        let b = details(&[("password", "s3cret"), ("user", "admin")]);
        assert_eq!(digest(&a), digest(&b));
        assert_eq!(digest(&a).len(), 64);
        assert_ne!(digest(&a), digest(&details(&[("user", "admin")])));
    }

    #[test]
    fn test_digest_separates_keys_from_values() {
        let a = details(&[("ab", "c")]);
        let b = details(&[("a", "bc")]);
        assert_ne!(digest(&a), digest(&b));
    }

    #[test]
    fn test_merge_later_keys_win() {
        let merged = merge([
            details(&[("endpoint", "db-1"), ("port", "5432")]),
            details(&[("endpoint", "db-2")]),
        ]);
        assert_eq!(merged["endpoint"], b"db-2".to_vec());
        assert_eq!(merged["port"], b"5432".to_vec());
    }
}
