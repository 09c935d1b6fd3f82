use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::TokenPair;

/// OAuth2 password-style login form, shared by both surfaces.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginForm {
    /// Admin username or employee id
    #[validate(length(min = 1, max = 50, message = "Username is required"))]
    #[schema(example = "E001")]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "pw1")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub refresh_token: String,
}

/// Token response returned to client
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 604800)]
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn bearer(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
            expires_in,
        }
    }
}
