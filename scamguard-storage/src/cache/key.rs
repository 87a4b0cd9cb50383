//! Content-addressed cache keys.
//!
//! A key is the normalized domain plus a hash of the first
//! `HASHED_PREFIX_CHARS` characters of the page content. Two pages on the
//! same domain whose content differs only after that prefix share a key.

use scamguard_core::normalize_domain;
use std::fmt;

/// Characters of content that take part in the hash.
pub const HASHED_PREFIX_CHARS: usize = 1000;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Cache key of the form `domain:hash`.
///
/// Can only be built through [`CacheKey::new`] or [`CacheKey::parse`], so
/// the domain part is always normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    domain: String,
    digest: String,
}

impl CacheKey {
    /// Derive the key for a domain and content sample.
    pub fn new(domain: &str, content: &str) -> Self {
        Self {
            domain: normalize_domain(domain),
            digest: hex::encode(content_hash(content).to_be_bytes()),
        }
    }

    /// Parse the `domain:hash` form back into a key.
    pub fn parse(raw: &str) -> Option<Self> {
        let (domain, digest) = raw.rsplit_once(':')?;
        if domain.is_empty() || digest.is_empty() || hex::decode(digest).is_err() {
            return None;
        }
        Some(Self {
            domain: normalize_domain(domain),
            digest: digest.to_ascii_lowercase(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.digest)
    }
}

/// Shorthand for [`CacheKey::new`].
pub fn generate_cache_key(domain: &str, content: &str) -> CacheKey {
    CacheKey::new(domain, content)
}

/// FNV-1a over the UTF-8 bytes of the first `HASHED_PREFIX_CHARS` chars.
pub fn content_hash(content: &str) -> u64 {
    let end = content
        .char_indices()
        .nth(HASHED_PREFIX_CHARS)
        .map(|(idx, _)| idx)
        .unwrap_or(content.len());

    content.as_bytes()[..end]
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
        })
}


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
