use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use subtle::ConstantTimeEq;

/// Freshly minted token strings, handed back to the caller once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Persisted form of a principal's live token pair.
///
/// Only SHA-256 digests are kept. A principal has at most one row; a new
/// login overwrites it in place.
#[derive(Debug, Clone, FromRow)]
pub struct StoredTokenPair {
    pub principal_id: i64,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub updated_utc: DateTime<Utc>,
}

impl StoredTokenPair {
    pub fn from_pair(principal_id: i64, pair: &TokenPair) -> Self {
        Self {
            principal_id,
            access_token_hash: hash_token(&pair.access_token),
            refresh_token_hash: hash_token(&pair.refresh_token),
            updated_utc: Utc::now(),
        }
    }

    pub fn access_matches(&self, access_token: &str) -> bool {
        digest_eq(&self.access_token_hash, &hash_token(access_token))
    }

    pub fn refresh_matches(&self, refresh_token: &str) -> bool {
        digest_eq(&self.refresh_token_hash, &hash_token(refresh_token))
    }
}

/// Hash a token using SHA-256, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn digest_eq(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}
