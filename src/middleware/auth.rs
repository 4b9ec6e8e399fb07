use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::verify_token;
use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// Session materialized from a verified bearer token
#[derive(Clone, Debug)]
pub struct AuthSession(pub Session);

/// Bearer-token middleware. Role and tenant come from the signed claims;
/// the document store is not consulted.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(ApiError::unauthorized)?;

    let claims = verify_token(&token, &state.config.security)?;
    let session = Session::from_claims(claims.sub, claims.email, &claims.custom)?;

    tracing::debug!("Authenticated {} as {}", session.subject_id, session.role);
    request.extensions_mut().insert(AuthSession(session));

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}
