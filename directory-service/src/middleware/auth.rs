use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use subtle::ConstantTimeEq;

use crate::{
    models::PrincipalKind,
    services::{permission, Session},
    AppState,
};

pub const BOOTSTRAP_KEY_HEADER: &str = "x-bootstrap-key";

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn not_authenticated() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("Not authenticated"))
}

async fn authenticate(
    state: &AppState,
    kind: PrincipalKind,
    headers: &HeaderMap,
) -> Result<Session, AppError> {
    let token = bearer_token(headers).ok_or_else(not_authenticated)?;
    Ok(state.sessions.authenticate(kind, token).await?)
}

/// Requires a live User-kind access token.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate(&state, PrincipalKind::User, req.headers()).await?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Requires a live Admin-kind access token at tier ADMIN.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate(&state, PrincipalKind::Admin, req.headers()).await?;
    permission::require_admin(&session)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Accepts an access token from either surface.
pub async fn any_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or_else(not_authenticated)?;
    let session = state.sessions.authenticate_any(token).await?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Guards admin creation: a matching bootstrap key, otherwise an admin token.
pub async fn admin_or_bootstrap_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = req
        .headers()
        .get(BOOTSTRAP_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Some(presented) = presented {
        let Some(expected) = state.config.security.bootstrap_api_key.as_ref() else {
            tracing::warn!("Bootstrap key presented but bootstrap is disabled");
            return Err(not_authenticated());
        };

        if bool::from(presented.as_bytes().ct_eq(expected.expose().as_bytes())) {
            tracing::info!("Admin creation authorised by bootstrap key");
            return Ok(next.run(req).await);
        }

        tracing::warn!("Invalid bootstrap key");
        return Err(not_authenticated());
    }

    let session = authenticate(&state, PrincipalKind::Admin, req.headers()).await?;
    permission::require_admin(&session)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Extractor for the session placed by one of the auth middlewares.
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Session missing from request extensions"
            ))
        })?;

        Ok(AuthSession(session.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
