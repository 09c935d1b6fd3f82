pub mod auth;

pub use auth::{
    admin_auth_middleware, admin_or_bootstrap_middleware, any_auth_middleware, bearer_token,
    user_auth_middleware, AuthSession, BOOTSTRAP_KEY_HEADER,
};
