//! Services layer for directory-service.
//!
//! The token codec, session manager and permission gate form the auth core;
//! the directory service builds on them for admin and experience operations.

mod database;
pub mod directory;
pub mod error;
pub mod jwt;
mod memory;
pub mod permission;
pub mod session;
mod store;

pub use database::Database;
pub use directory::{DirectoryService, ExperienceSummary, UserDraft};
pub use error::ServiceError;
pub use jwt::{Claims, JwtService, TokenError, TokenSubject};
pub use memory::InMemoryStore;
pub use session::{Session, SessionService};
pub use store::PrincipalStore;
