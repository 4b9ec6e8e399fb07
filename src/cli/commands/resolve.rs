use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::config::config;
use crate::tenant::{HostClass, TenantResolver};

pub fn handle(host: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let resolver = TenantResolver::new(config().tenant.clone());

    let class = match resolver.classify(Some(host)) {
        Ok(HostClass::Platform) => "platform",
        Ok(HostClass::Preview) => "preview",
        Ok(HostClass::Tenant(_)) => "tenant",
        Ok(HostClass::Foreign) => "foreign",
        Err(e) => {
            tracing::debug!("{}", e);
            "malformed"
        }
    };
    let context = resolver.resolve(Some(host));

    utils::output_success(
        &output_format,
        &format!("Resolved {}", host),
        Some(json!({
            "host": host,
            "class": class,
            "subdomain": context.subdomain(),
            "rootDomain": resolver.routing().root_domain,
        })),
    )
}
