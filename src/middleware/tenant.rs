use axum::{
    extract::{Request, State},
    http::{header::HOST, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::tenant::{TenantResolver, TENANT_SUBDOMAIN_HEADER};

/// Runs before every route. Attaches `x-tenant-subdomain` for candidate
/// tenant hosts and always inserts the `TenantContext` extension.
pub async fn tenant_resolver_middleware(
    State(resolver): State<TenantResolver>,
    mut request: Request,
    next: Next,
) -> Response {
    // Only the resolver may set the forwarding header
    request.headers_mut().remove(TENANT_SUBDOMAIN_HEADER);

    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()));

    let context = resolver.resolve(host.as_deref());

    if let Some(subdomain) = context.subdomain() {
        if let Ok(value) = HeaderValue::from_str(subdomain) {
            request.headers_mut().insert(TENANT_SUBDOMAIN_HEADER, value);
        }
    }
    request.extensions_mut().insert(context);

    next.run(request).await
}
