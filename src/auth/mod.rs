use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::SecurityConfig;

/// Claim keys written by provisioning and read back by sessions
pub const ROLE_CLAIM: &str = "role";
pub const TENANT_CLAIM: &str = "tenantId";

/// Closed set of portal roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Parent,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Superadmin => "superadmin",
        }
    }

    /// Every role except superadmin is bound to exactly one tenant
    pub fn requires_tenant(&self) -> bool {
        !matches!(self, Role::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(ClaimError::UnknownRole(other.to_string())),
        }
    }
}

/// Claim set could not be narrowed into a role and tenant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("claim set has no role")]
    MissingRole,
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("role '{0}' requires a tenantId claim")]
    MissingTenant(Role),
}

/// Untyped custom claims as the identity provider hands them out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Claims written by provisioning: `{ role, tenantId }`
    pub fn for_role(role: Role, tenant_id: Option<&str>) -> Self {
        let mut claims = Self::new();
        claims.insert(ROLE_CLAIM, Value::String(role.as_str().to_string()));
        if let Some(tenant_id) = tenant_id {
            claims.insert(TENANT_CLAIM, Value::String(tenant_id.to_string()));
        }
        claims
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Narrow the `role` claim into [`Role`]
    pub fn role(&self) -> Result<Role, ClaimError> {
        match self.get(ROLE_CLAIM) {
            None | Some(Value::Null) => Err(ClaimError::MissingRole),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(ClaimError::UnknownRole(other.to_string())),
        }
    }

    /// Non-empty `tenantId` claim, if any
    pub fn tenant_id(&self) -> Option<&str> {
        self.get_str(TENANT_CLAIM)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Bearer token payload: principal attributes plus the custom claim set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(flatten)]
    pub custom: ClaimSet,
}

impl Claims {
    pub fn new(sub: String, email: String, custom: ClaimSet, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub,
            email,
            exp,
            iat: now.timestamp(),
            custom,
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
}

impl fmt::Display for JwtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn issue_token(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());

    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn verify_token(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());

    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}
