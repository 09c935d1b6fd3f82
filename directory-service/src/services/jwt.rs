use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{JwtConfig, SigningSecret};
use crate::models::{PrincipalKind, Tier, TokenPair};

/// Token subject tag, carried in the `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSubject {
    Access,
    Refresh,
}

impl TokenSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSubject::Access => "access",
            TokenSubject::Refresh => "refresh",
        }
    }
}

/// Claims for both access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject tag ("access" or "refresh")
    pub sub: TokenSubject,
    /// Principal ID
    pub uid: i64,
    /// Permission tier marker
    pub perm: Tier,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID, unique per minted token
    pub jti: String,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &SigningSecret) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.expose().as_bytes()),
            decoding: DecodingKey::from_secret(secret.expose().as_bytes()),
        }
    }
}

/// HS256 token codec holding one key per (principal kind, subject).
#[derive(Clone)]
pub struct JwtService {
    user_access: SigningKeys,
    user_refresh: SigningKeys,
    admin_access: SigningKeys,
    admin_refresh: SigningKeys,
    access_token_expiry_days: i64,
    refresh_token_expiry_days: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid JWT configuration: {}", e))?;

        tracing::info!("JWT service initialized with HS256 keys");

        Ok(Self {
            user_access: SigningKeys::from_secret(&config.user_access_secret),
            user_refresh: SigningKeys::from_secret(&config.user_refresh_secret),
            admin_access: SigningKeys::from_secret(&config.admin_access_secret),
            admin_refresh: SigningKeys::from_secret(&config.admin_refresh_secret),
            access_token_expiry_days: config.access_token_expiry_days,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    fn keys(&self, kind: PrincipalKind, subject: TokenSubject) -> &SigningKeys {
        match (kind, subject) {
            (PrincipalKind::User, TokenSubject::Access) => &self.user_access,
            (PrincipalKind::User, TokenSubject::Refresh) => &self.user_refresh,
            (PrincipalKind::Admin, TokenSubject::Access) => &self.admin_access,
            (PrincipalKind::Admin, TokenSubject::Refresh) => &self.admin_refresh,
        }
    }

    /// Sign `claims` with the key for `kind` and the claims' own subject.
    pub fn encode(&self, kind: PrincipalKind, claims: &Claims) -> Result<String, anyhow::Error> {
        let keys = self.keys(kind, claims.sub);
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", claims.sub.as_str(), e))
    }

    /// Verify signature, algorithm, expiry and subject tag.
    ///
    /// Only an expired but otherwise valid token yields `Expired`.
    pub fn decode(
        &self,
        kind: PrincipalKind,
        subject: TokenSubject,
        token: &str,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.sub = Some(subject.as_str().to_string());

        decode::<Claims>(token, &self.keys(kind, subject).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })
    }

    /// Mint a token for `uid` valid for the subject's configured lifetime.
    pub fn issue(
        &self,
        kind: PrincipalKind,
        subject: TokenSubject,
        uid: i64,
        perm: Tier,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let lifetime = match subject {
            TokenSubject::Access => Duration::days(self.access_token_expiry_days),
            TokenSubject::Refresh => Duration::days(self.refresh_token_expiry_days),
        };

        let claims = Claims {
            sub: subject,
            uid,
            perm,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        self.encode(kind, &claims)
    }

    /// Generate both access and refresh tokens
    pub fn issue_pair(
        &self,
        kind: PrincipalKind,
        uid: i64,
        perm: Tier,
    ) -> Result<TokenPair, anyhow::Error> {
        Ok(TokenPair {
            access_token: self.issue(kind, TokenSubject::Access, uid, perm)?,
            refresh_token: self.issue(kind, TokenSubject::Refresh, uid, perm)?,
        })
    }

    /// Get access token expiry in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_days * 24 * 60 * 60
    }
}
