use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub tenant: TenantRoutingConfig,
    pub session: SessionConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Host-based tenant routing. The root label is the first label of the
/// root domain ("seth" for "seth.ng").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantRoutingConfig {
    pub root_domain: String,
    pub preview_suffix: String,
}

impl TenantRoutingConfig {
    pub fn new(root_domain: impl Into<String>, preview_suffix: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into().trim().to_ascii_lowercase(),
            preview_suffix: preview_suffix.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn root_label(&self) -> &str {
        self.root_domain.split('.').next().unwrap_or_default()
    }
}

impl Default for TenantRoutingConfig {
    fn default() -> Self {
        Self::new("seth.ng", ".vercel.app")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub claim_fetch_timeout_ms: u64,
}

impl SessionConfig {
    pub fn claim_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.claim_fetch_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            claim_fetch_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// When unset the portal runs against the in-memory document store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub require_https: bool,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Transactional mail API endpoint. Without it invitations are only logged.
    pub api_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub from_address: String,
    pub login_scheme: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Tenant routing overrides
        if let Ok(v) = env::var("TENANT_ROOT_DOMAIN") {
            self.tenant = TenantRoutingConfig::new(v, self.tenant.preview_suffix.clone());
        }
        if let Ok(v) = env::var("TENANT_PREVIEW_SUFFIX") {
            self.tenant = TenantRoutingConfig::new(self.tenant.root_domain.clone(), v);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_CLAIM_FETCH_TIMEOUT_MS") {
            self.session.claim_fetch_timeout_ms = v.parse().unwrap_or(self.session.claim_fetch_timeout_ms);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("PORTAL_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_REQUIRE_HTTPS") {
            self.security.require_https = v.parse().unwrap_or(self.security.require_https);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_API_URL") {
            self.mail.api_url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("MAIL_API_KEY") {
            self.mail.api_key = Some(v);
        }
        if let Ok(v) = env::var("MAIL_FROM_ADDRESS") {
            self.mail.from_address = v;
        }

        // Links in invitation emails follow the transport the portal is served on
        self.mail.login_scheme = if self.security.require_https { "https" } else { "http" }.to_string();

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            tenant: TenantRoutingConfig::default(),
            session: SessionConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
                require_https: false,
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from_address: "no-reply@localhost".to_string(),
                login_scheme: "http".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            tenant: TenantRoutingConfig::default(),
            session: SessionConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.seth.ng".to_string()],
                require_https: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from_address: "no-reply@seth.ng".to_string(),
                login_scheme: "https".to_string(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            tenant: TenantRoutingConfig::default(),
            session: SessionConfig {
                claim_fetch_timeout_ms: 5_000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://seth.ng".to_string()],
                require_https: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from_address: "no-reply@seth.ng".to_string(),
                login_scheme: "https".to_string(),
            },
        }
    }
}

// Process-wide config for the binaries; components take the pieces they need explicitly
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}
