//! Signing key derivation and the bounded per-signer key cache
//!
//! A signing key depends only on (date, region, service, credential), so it
//! is derived once per scope and reused. Cache keys carry an HMAC of the
//! credential, never the secret itself.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::{HashMap, VecDeque};

use crate::s3::constants::{KEY_TYPE_IDENTIFIER, MAX_CACHE_SIZE};
use crate::s3::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 returning fixed-size array (no heap allocation)
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    let result = mac.finalize().into_bytes();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// `shortDate/region/service/aws4_request`
pub fn create_scope(short_date: &str, region: &str, service: &str) -> String {
    format!("{}/{}/{}/{}", short_date, region, service, KEY_TYPE_IDENTIFIER)
}

/// Derive the signing key with the four chained HMAC operations
pub fn derive_signing_key(
    secret_access_key: &str,
    short_date: &str,
    region: &str,
    service: &str,
) -> [u8; 32] {
    let aws4_key = format!("AWS4{}", secret_access_key).into_bytes();
    let k_date = hmac_sha256(&aws4_key, short_date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, KEY_TYPE_IDENTIFIER.as_bytes())
}

/// Bounded map of derived signing keys with first-in-first-out eviction
#[derive(Debug)]
pub struct SigningKeyCache {
    capacity: usize,
    keys: HashMap<String, [u8; 32]>,
    queue: VecDeque<String>,
}

impl Default for SigningKeyCache {
    fn default() -> Self {
        Self::with_capacity(MAX_CACHE_SIZE)
    }
}

impl SigningKeyCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            keys: HashMap::with_capacity(capacity),
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Cache key for a scope and credential
    ///
    /// The credential part is `hex(HMAC(secret, access_key_id))` so that the
    /// secret never appears in the map.
    pub fn cache_key(credentials: &Credentials, short_date: &str, region: &str, service: &str) -> String {
        let creds_hash = hmac_sha256(
            credentials.secret_access_key.as_bytes(),
            credentials.access_key_id.as_bytes(),
        );
        format!(
            "{}:{}:{}:{}:{}",
            short_date,
            region,
            service,
            hex::encode(creds_hash),
            credentials.session_token.as_deref().unwrap_or("")
        )
    }

    /// Return the cached key for this scope, deriving (and caching) it on a miss
    pub fn get_or_derive(
        &mut self,
        credentials: &Credentials,
        short_date: &str,
        region: &str,
        service: &str,
    ) -> [u8; 32] {
        let cache_key = Self::cache_key(credentials, short_date, region, service);
        if let Some(key) = self.keys.get(&cache_key) {
            return *key;
        }

        self.queue.push_back(cache_key.clone());
        while self.queue.len() > self.capacity {
            if let Some(evicted) = self.queue.pop_front() {
                self.keys.remove(&evicted);
            }
        }

        let key = derive_signing_key(&credentials.secret_access_key, short_date, region, service);
        self.keys.insert(cache_key, key);
        key
    }

    pub fn contains(&self, credentials: &Credentials, short_date: &str, region: &str, service: &str) -> bool {
        self.keys
            .contains_key(&Self::cache_key(credentials, short_date, region, service))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    #[test]
    fn test_hmac_sha256_fixed_size() {
        let result = hmac_sha256(b"test_key", b"test_message");
        assert_eq!(result.len(), 32);
    }

    #[test]
    fn test_derive_signing_key_reference() {
        // Key derivation example from the AWS SigV4 documentation
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_cache_hit_matches_direct_derivation() {
        let mut cache = SigningKeyCache::default();
        let c = creds();

        let first = cache.get_or_derive(&c, "20150830", "us-east-1", "service");
        let second = cache.get_or_derive(&c, "20150830", "us-east-1", "service");
        let direct = derive_signing_key(&c.secret_access_key, "20150830", "us-east-1", "service");

        assert_eq!(first, second);
        assert_eq!(first, direct);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_key_hides_secret() {
        let c = creds();
        let key = SigningKeyCache::cache_key(&c, "20150830", "us-east-1", "s3");
        assert!(!key.contains(&c.secret_access_key));
        assert!(key.starts_with("20150830:us-east-1:s3:"));
        assert!(key.ends_with(':'));

        let with_token = c.clone().with_session_token("token");
        let key = SigningKeyCache::cache_key(&with_token, "20150830", "us-east-1", "s3");
        assert!(key.ends_with(":token"));
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = SigningKeyCache::with_capacity(2);
        let c = creds();

        cache.get_or_derive(&c, "20260101", "us-east-1", "s3");
        cache.get_or_derive(&c, "20260102", "us-east-1", "s3");
        // Re-reading an entry does not refresh its position
        cache.get_or_derive(&c, "20260101", "us-east-1", "s3");
        cache.get_or_derive(&c, "20260103", "us-east-1", "s3");

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&c, "20260101", "us-east-1", "s3"));
        assert!(cache.contains(&c, "20260102", "us-east-1", "s3"));
        assert!(cache.contains(&c, "20260103", "us-east-1", "s3"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
