//! Session lifecycle: login, refresh, authenticate, logout.
//!
//! A presented access token is accepted only if its signature verifies with
//! the right kind's key *and* its digest matches the principal's persisted
//! pair. A later login or a logout therefore invalidates older tokens even
//! though they are still correctly signed.

use std::sync::Arc;

use super::jwt::{Claims, JwtService, TokenError, TokenSubject};
use super::{PrincipalStore, ServiceError};
use crate::models::{hash_token, PrincipalKind, StoredTokenPair, Tier, TokenPair};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub kind: PrincipalKind,
    pub claims: Claims,
}

impl Session {
    pub fn principal_id(&self) -> i64 {
        self.claims.uid
    }

    pub fn tier(&self) -> Tier {
        self.claims.perm
    }
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn PrincipalStore>,
    jwt: JwtService,
    /// Verified against when the handle is unknown, so both failures cost one hash.
    dummy_hash: PasswordHashString,
}

impl SessionService {
    pub fn new(store: Arc<dyn PrincipalStore>, jwt: JwtService) -> Result<Self, anyhow::Error> {
        let dummy_hash = hash_password(&Password::new("directory-service-dummy".to_string()))?;
        Ok(Self {
            store,
            jwt,
            dummy_hash,
        })
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Verify credentials and mint a fresh pair, replacing any previous one.
    pub async fn login(
        &self,
        kind: PrincipalKind,
        handle: &str,
        password: Password,
    ) -> Result<TokenPair, ServiceError> {
        let account = match kind {
            PrincipalKind::Admin => self
                .store
                .find_admin_by_username(handle)
                .await?
                .map(|a| (a.id, Tier::Admin, a.password_hash)),
            PrincipalKind::User => self
                .store
                .find_user_by_employee_id(handle)
                .await?
                .map(|u| (u.id, u.tier(), u.password_hash)),
        };

        let Some((principal_id, tier, password_hash)) = account else {
            let _ = verify_password(&password, &self.dummy_hash);
            tracing::info!(kind = %kind, "Login failed: unknown handle");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(&password, &PasswordHashString::new(password_hash)) {
            tracing::info!(kind = %kind, principal_id, "Login failed: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let pair = self.jwt.issue_pair(kind, principal_id, tier)?;
        self.store
            .save_token_pair(kind, &StoredTokenPair::from_pair(principal_id, &pair))
            .await?;

        tracing::info!(kind = %kind, principal_id, "Login successful");
        Ok(pair)
    }

    /// Mint a new access token from a refresh token. The refresh token is not rotated.
    pub async fn refresh(
        &self,
        kind: PrincipalKind,
        refresh_token: &str,
    ) -> Result<TokenPair, ServiceError> {
        let claims = self.decode(kind, TokenSubject::Refresh, refresh_token)?;

        let access_token = self
            .jwt
            .issue(kind, TokenSubject::Access, claims.uid, claims.perm)?;

        let replaced = self
            .store
            .replace_access_token(
                kind,
                claims.uid,
                &hash_token(refresh_token),
                &hash_token(&access_token),
            )
            .await?;

        if !replaced {
            tracing::info!(kind = %kind, principal_id = claims.uid, "Refresh rejected: superseded or revoked");
            return Err(ServiceError::SessionRevoked);
        }

        tracing::debug!(kind = %kind, principal_id = claims.uid, "Access token refreshed");
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
        })
    }

    /// Validate an access token for `kind` against signature and persisted record.
    pub async fn authenticate(
        &self,
        kind: PrincipalKind,
        access_token: &str,
    ) -> Result<Session, ServiceError> {
        let claims = self.decode(kind, TokenSubject::Access, access_token)?;

        let stored = self
            .store
            .find_token_pair(kind, claims.uid)
            .await?
            .ok_or(ServiceError::SessionRevoked)?;

        if !stored.access_matches(access_token) {
            tracing::debug!(kind = %kind, principal_id = claims.uid, "Access token does not match stored pair");
            return Err(ServiceError::SessionRevoked);
        }

        Ok(Session { kind, claims })
    }

    /// Authenticate a token from either surface, admin first.
    pub async fn authenticate_any(&self, access_token: &str) -> Result<Session, ServiceError> {
        match self.authenticate(PrincipalKind::Admin, access_token).await {
            Err(ServiceError::InvalidSignature) => {
                self.authenticate(PrincipalKind::User, access_token).await
            }
            other => other,
        }
    }

    /// Drop the principal's pair. Outstanding tokens stop authenticating.
    pub async fn logout(&self, kind: PrincipalKind, principal_id: i64) -> Result<(), ServiceError> {
        let removed = self.store.delete_token_pair(kind, principal_id).await?;
        tracing::info!(kind = %kind, principal_id, removed, "Logged out");
        Ok(())
    }

    fn decode(
        &self,
        kind: PrincipalKind,
        subject: TokenSubject,
        token: &str,
    ) -> Result<Claims, ServiceError> {
        self.jwt.decode(kind, subject, token).map_err(|e| {
            match e {
                TokenError::Expired => {
                    tracing::debug!(kind = %kind, subject = subject.as_str(), "Token expired")
                }
                TokenError::InvalidSignature => {
                    tracing::debug!(kind = %kind, subject = subject.as_str(), "Token signature invalid")
                }
            }
            ServiceError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAdmin, NewUser};
    use crate::services::jwt::tests::test_jwt_config;
    use crate::services::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        sessions: SessionService,
        admin_id: i64,
        leader_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let jwt = JwtService::new(&test_jwt_config()).unwrap();
        let sessions = SessionService::new(store.clone(), jwt).unwrap();

        let admin = store
            .insert_admin(NewAdmin {
                username: "root".to_string(),
                password_hash: hash_password(&Password::new("pw1".to_string()))
                    .unwrap()
                    .into_string(),
            })
            .await
            .unwrap();

        let department = store.insert_department("Platform").await.unwrap();
        let job_group = store.insert_job_group("Engineer").await.unwrap();
        let leader = store
            .insert_user(NewUser {
                employee_id: "E001".to_string(),
                name: "Kim".to_string(),
                password_hash: hash_password(&Password::new("pw2".to_string()))
                    .unwrap()
                    .into_string(),
                department_id: department.id,
                job_group_id: job_group.id,
                tier: Tier::Leader,
            })
            .await
            .unwrap();

        Fixture {
            store,
            sessions,
            admin_id: admin.id,
            leader_id: leader.id,
        }
    }

    fn pw(s: &str) -> Password {
        Password::new(s.to_string())
    }

    /// A correctly signed token whose `exp` is a minute in the past.
    fn expired(
        sessions: &SessionService,
        kind: PrincipalKind,
        sub: TokenSubject,
        uid: i64,
        perm: Tier,
    ) -> String {
        let now = chrono::Utc::now().timestamp();
        sessions
            .jwt()
            .encode(
                kind,
                &Claims {
                    sub,
                    uid,
                    perm,
                    iat: now - 120,
                    exp: now - 60,
                    jti: "expired".to_string(),
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_then_authenticate() {
        let f = fixture().await;

        let pair = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();
        let session = f
            .sessions
            .authenticate(PrincipalKind::User, &pair.access_token)
            .await
            .unwrap();

        assert_eq!(session.kind, PrincipalKind::User);
        assert_eq!(session.principal_id(), f.leader_id);
        assert_eq!(session.tier(), Tier::Leader);
    }

    #[tokio::test]
    async fn test_admin_login_carries_admin_tier() {
        let f = fixture().await;

        let pair = f
            .sessions
            .login(PrincipalKind::Admin, "root", pw("pw1"))
            .await
            .unwrap();
        let session = f
            .sessions
            .authenticate(PrincipalKind::Admin, &pair.access_token)
            .await
            .unwrap();

        assert_eq!(session.principal_id(), f.admin_id);
        assert_eq!(session.tier(), Tier::Admin);
    }

    #[tokio::test]
    async fn test_unknown_handle_and_wrong_password_look_the_same() {
        let f = fixture().await;

        let unknown = f
            .sessions
            .login(PrincipalKind::User, "E999", pw("pw2"))
            .await
            .unwrap_err();
        let wrong = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("nope"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_handles_are_scoped_by_kind() {
        let f = fixture().await;
        // "root" is an admin handle, not a user one
        let err = f
            .sessions
            .login(PrincipalKind::User, "root", pw("pw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_repeated_logins_keep_one_record() {
        let f = fixture().await;

        let mut last = None;
        for _ in 0..5 {
            last = Some(
                f.sessions
                    .login(PrincipalKind::User, "E001", pw("pw2"))
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(f.store.token_pair_count(PrincipalKind::User), 1);
        let last = last.unwrap();
        assert!(f
            .sessions
            .authenticate(PrincipalKind::User, &last.access_token)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_relogin_invalidates_previous_tokens() {
        let f = fixture().await;

        let first = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();
        let second = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();
        assert_ne!(first.access_token, second.access_token);

        let err = f
            .sessions
            .authenticate(PrincipalKind::User, &first.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SessionRevoked));

        let err = f
            .sessions
            .refresh(PrincipalKind::User, &first.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SessionRevoked));
    }

    #[tokio::test]
    async fn test_refresh_replaces_access_only() {
        let f = fixture().await;

        let pair = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();
        let refreshed = f
            .sessions
            .refresh(PrincipalKind::User, &pair.refresh_token)
            .await
            .unwrap();

        assert_eq!(refreshed.refresh_token, pair.refresh_token);
        assert_ne!(refreshed.access_token, pair.access_token);

        let session = f
            .sessions
            .authenticate(PrincipalKind::User, &refreshed.access_token)
            .await
            .unwrap();
        assert_eq!(session.tier(), Tier::Leader);

        // The replaced access token no longer matches the record
        assert!(f
            .sessions
            .authenticate(PrincipalKind::User, &pair.access_token)
            .await
            .is_err());

        // Refresh may be used again while the pair stands
        assert!(f
            .sessions
            .refresh(PrincipalKind::User, &pair.refresh_token)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let f = fixture().await;

        let pair = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();
        let err = f
            .sessions
            .refresh(PrincipalKind::User, &pair.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_token_of_other_kind_is_rejected() {
        let f = fixture().await;

        let user_pair = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();
        let err = f
            .sessions
            .authenticate(PrincipalKind::Admin, &user_pair.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_logout_revokes_pair() {
        let f = fixture().await;

        let pair = f
            .sessions
            .login(PrincipalKind::Admin, "root", pw("pw1"))
            .await
            .unwrap();
        f.sessions
            .logout(PrincipalKind::Admin, f.admin_id)
            .await
            .unwrap();

        assert!(matches!(
            f.sessions
                .authenticate(PrincipalKind::Admin, &pair.access_token)
                .await,
            Err(ServiceError::SessionRevoked)
        ));
        assert!(matches!(
            f.sessions
                .refresh(PrincipalKind::Admin, &pair.refresh_token)
                .await,
            Err(ServiceError::SessionRevoked)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_any_accepts_both_kinds() {
        let f = fixture().await;

        let admin = f
            .sessions
            .login(PrincipalKind::Admin, "root", pw("pw1"))
            .await
            .unwrap();
        let user = f
            .sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();

        let s = f
            .sessions
            .authenticate_any(&admin.access_token)
            .await
            .unwrap();
        assert_eq!(s.kind, PrincipalKind::Admin);

        let s = f
            .sessions
            .authenticate_any(&user.access_token)
            .await
            .unwrap();
        assert_eq!(s.kind, PrincipalKind::User);

        assert!(matches!(
            f.sessions.authenticate_any("not-a-token").await,
            Err(ServiceError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_expired_tokens_are_reported_as_expired() {
        let f = fixture().await;
        f.sessions
            .login(PrincipalKind::Admin, "root", pw("pw1"))
            .await
            .unwrap();
        f.sessions
            .login(PrincipalKind::User, "E001", pw("pw2"))
            .await
            .unwrap();

        let admin_access = expired(
            &f.sessions,
            PrincipalKind::Admin,
            TokenSubject::Access,
            f.admin_id,
            Tier::Admin,
        );
        let user_access = expired(
            &f.sessions,
            PrincipalKind::User,
            TokenSubject::Access,
            f.leader_id,
            Tier::Leader,
        );
        let user_refresh = expired(
            &f.sessions,
            PrincipalKind::User,
            TokenSubject::Refresh,
            f.leader_id,
            Tier::Leader,
        );

        assert!(matches!(
            f.sessions
                .authenticate(PrincipalKind::User, &user_access)
                .await,
            Err(ServiceError::TokenExpired)
        ));
        assert!(matches!(
            f.sessions.authenticate_any(&admin_access).await,
            Err(ServiceError::TokenExpired)
        ));
        // Falls through the admin key, then expires under the user key
        assert!(matches!(
            f.sessions.authenticate_any(&user_access).await,
            Err(ServiceError::TokenExpired)
        ));
        assert!(matches!(
            f.sessions.refresh(PrincipalKind::User, &user_refresh).await,
            Err(ServiceError::TokenExpired)
        ));
    }
}
