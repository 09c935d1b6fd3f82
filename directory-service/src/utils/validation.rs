use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::dtos::ErrorResponse;

fn reject(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// JSON body that has passed `validator` checks.
///
/// Malformed JSON is a 400; a well-formed body failing validation is a 422.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("Json parse error: {}", e)))?;

        value.validate().map_err(|e| {
            reject(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Validation error: {}", e),
            )
        })?;

        Ok(ValidatedJson(value))
    }
}

/// URL-encoded form body that has passed `validator` checks. Used by the login routes.
pub struct ValidatedForm<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedForm<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("Form parse error: {}", e)))?;

        value.validate().map_err(|e| {
            reject(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Validation error: {}", e),
            )
        })?;

        Ok(ValidatedForm(value))
    }
}
