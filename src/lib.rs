pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod mail;
pub mod middleware;
pub mod provisioning;
pub mod session;
pub mod state;
pub mod store;
pub mod tenant;
pub mod theme;

pub use app::app;
pub use state::AppState;
