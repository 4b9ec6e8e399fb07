use thiserror::Error;

use crate::config::TenantRoutingConfig;

/// Forwarding header carrying the candidate tenant label to downstream handlers
pub const TENANT_SUBDOMAIN_HEADER: &str = "x-tenant-subdomain";

/// Request-scoped tenant signal derived from the host header alone.
///
/// `subdomain` is only a candidate: nothing here checks that a tenant with
/// that label exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    pub subdomain: Option<String>,
}

impl TenantContext {
    pub fn none() -> Self {
        Self { subdomain: None }
    }

    pub fn subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }
}

/// Host header that cannot be classified. Never leaves this module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedHost {
    #[error("host header missing")]
    Missing,
    #[error("host header is empty")]
    Empty,
    #[error("invalid host label in '{0}'")]
    InvalidLabel(String),
}

/// How a host relates to the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostClass {
    /// Root domain, its `www` variant, or a localhost address
    Platform,
    /// Hosting-provider preview deployment
    Preview,
    /// Candidate tenant subdomain
    Tenant(String),
    /// Anything else
    Foreign,
}

#[derive(Debug, Clone)]
pub struct TenantResolver {
    routing: TenantRoutingConfig,
    www_domain: String,
}

impl TenantResolver {
    pub fn new(routing: TenantRoutingConfig) -> Self {
        let www_domain = format!("www.{}", routing.root_domain);
        Self { routing, www_domain }
    }

    pub fn routing(&self) -> &TenantRoutingConfig {
        &self.routing
    }

    /// Resolve a raw host header value. Missing or malformed hosts resolve to
    /// no tenant.
    pub fn resolve(&self, host: Option<&str>) -> TenantContext {
        match self.classify(host) {
            Ok(HostClass::Tenant(label)) => TenantContext {
                subdomain: Some(label),
            },
            Ok(_) => TenantContext::none(),
            Err(err) => {
                tracing::debug!("Treating host {:?} as no tenant: {}", host, err);
                TenantContext::none()
            }
        }
    }

    /// Classify a host, first match wins.
    pub fn classify(&self, host: Option<&str>) -> Result<HostClass, MalformedHost> {
        let host = normalize_host(host.ok_or(MalformedHost::Missing)?)?;

        if host == self.routing.root_domain || host == self.www_domain || host.contains("localhost") {
            return Ok(HostClass::Platform);
        }

        if !self.routing.preview_suffix.is_empty() && host.contains(&self.routing.preview_suffix) {
            return Ok(HostClass::Preview);
        }

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() >= 3 && labels[labels.len() - 2] == self.routing.root_label() {
            return Ok(HostClass::Tenant(labels[0].to_string()));
        }

        Ok(HostClass::Foreign)
    }
}

/// Single DNS label: alphanumerics and inner hyphens
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Lower-case, drop a trailing port and a trailing root dot, and reject
/// anything that is not a dotted list of hostname labels.
fn normalize_host(raw: &str) -> Result<String, MalformedHost> {
    let mut host = raw.trim().to_ascii_lowercase();

    if let Some((name, port)) = host.rsplit_once(':') {
        if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            host = name.to_string();
        }
    }

    if let Some(stripped) = host.strip_suffix('.') {
        host = stripped.to_string();
    }

    if host.is_empty() {
        return Err(MalformedHost::Empty);
    }

    if !host.split('.').all(is_valid_label) {
        return Err(MalformedHost::InvalidLabel(host));
    }

    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TenantResolver {
        TenantResolver::new(TenantRoutingConfig::new("seth.ng", ".vercel.app"))
    }

    fn subdomain(host: &str) -> Option<String> {
        resolver().resolve(Some(host)).subdomain
    }

    #[test]
    fn platform_hosts_have_no_tenant() {
        for host in ["seth.ng", "www.seth.ng", "localhost", "localhost:3000", "archwood1.localhost"] {
            assert_eq!(subdomain(host), None, "host {host}");
        }
    }

    #[test]
    fn preview_hosts_are_never_tenant_scoped() {
        assert_eq!(subdomain("portal-git-main.vercel.app"), None);
        // Matches the subdomain pattern too, still no tenant
        assert_eq!(subdomain("archwood1.seth.ng.vercel.app"), None);
        assert_eq!(
            resolver().classify(Some("archwood1.seth.ng.vercel.app")),
            Ok(HostClass::Preview)
        );
    }

    #[test]
    fn tenant_subdomain_is_extracted() {
        assert_eq!(subdomain("archwood1.seth.ng"), Some("archwood1".to_string()));
        assert_eq!(subdomain("Archwood1.Seth.NG:443"), Some("archwood1".to_string()));
        assert_eq!(subdomain("archwood1.seth.ng."), Some("archwood1".to_string()));
    }

    #[test]
    fn foreign_or_short_hosts_have_no_tenant() {
        assert_eq!(subdomain("seth.ng"), None);
        assert_eq!(subdomain("api.other.com"), None);
        assert_eq!(resolver().classify(Some("api.other.com")), Ok(HostClass::Foreign));
    }

    #[test]
    fn malformed_hosts_degrade_to_no_tenant() {
        let resolver = resolver();
        assert_eq!(resolver.resolve(None), TenantContext::none());
        assert_eq!(resolver.classify(None), Err(MalformedHost::Missing));
        for host in ["", "   ", "a..seth.ng", "bad_label.seth.ng", "-x.seth.ng", "[::1]:8080"] {
            assert_eq!(resolver.resolve(Some(host)), TenantContext::none(), "host {host:?}");
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let resolver = resolver();
        for host in ["archwood1.seth.ng", "seth.ng", "x.vercel.app", "junk..", "a.b.seth.ng"] {
            assert_eq!(resolver.resolve(Some(host)), resolver.resolve(Some(host)));
        }
    }

    #[test]
    fn root_label_follows_configuration() {
        let resolver = TenantResolver::new(TenantRoutingConfig::new("campus.io", ".netlify.app"));
        assert_eq!(resolver.resolve(Some("oak.campus.io")).subdomain, Some("oak".to_string()));
        assert_eq!(resolver.resolve(Some("oak.seth.ng")).subdomain, None);
        assert_eq!(resolver.resolve(Some("oak.netlify.app")).subdomain, None);
    }
}
