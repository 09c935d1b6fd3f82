pub mod directory;
pub mod principal;
pub mod token_pair;

pub use directory::{Department, Experience, JobGroup, Level, LevelProgress};
pub use principal::{Admin, NewAdmin, NewUser, PrincipalKind, Tier, User, UserListing};
pub use token_pair::{hash_token, StoredTokenPair, TokenPair};
