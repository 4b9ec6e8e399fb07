//! Claim-derived sessions.
//!
//! A [`SessionMaterializer`] subscribes to the identity provider and
//! publishes a [`SessionState`] per activation. Role and tenant always come
//! from the principal's claim set.
pub mod materializer;
pub mod model;

pub use materializer::{SessionHandle, SessionMaterializer};
pub use model::{Session, SessionError, SessionState};
