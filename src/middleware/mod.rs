pub mod auth;
pub mod response;
pub mod tenant;

pub use auth::{jwt_auth_middleware, AuthSession};
pub use response::{ApiResponse, ApiResult};
pub use tenant::tenant_resolver_middleware;
