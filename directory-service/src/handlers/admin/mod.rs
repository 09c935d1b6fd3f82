pub mod auth;
pub mod catalog;
pub mod users;

pub use auth::{create_admin, login, logout, refresh};
pub use catalog::{
    create_department, create_job_group, create_level, list_departments, list_job_groups,
};
pub use users::{
    add_favorite, create_user, delete_user, get_user, list_favorites, list_users, remove_favorite,
};
