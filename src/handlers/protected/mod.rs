// handlers/protected/mod.rs - Tier 2: JWT authentication required
pub mod auth;
pub mod users;

pub use auth::whoami;
pub use users::{create_user, list_users};
