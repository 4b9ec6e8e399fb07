//! Host-header tenant routing.
pub mod resolver;

pub use resolver::{is_valid_label, HostClass, MalformedHost, TenantContext, TenantResolver, TENANT_SUBDOMAIN_HEADER};
