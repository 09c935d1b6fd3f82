//! HTTP handlers for directory-service.

pub mod admin;
pub mod common;
pub mod user;
