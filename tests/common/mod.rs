#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use campus_portal::auth::{issue_token, ClaimSet, Claims, Role};
use campus_portal::config::AppConfig;
use campus_portal::identity::MemoryIdentityProvider;
use campus_portal::mail::{Email, MailError, Mailer};
use campus_portal::store::{Branding, DocumentStore, MemoryStore, TenantRecord};
use campus_portal::{app, AppState};

pub const HILLSIDE: &str = "T1";
pub const ARCHWOOD: &str = "T2";

struct OutboxMailer(mpsc::UnboundedSender<Email>);

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let _ = self.0.send(email);
        Ok(())
    }
}

/// In-process portal backed by memory collaborators
pub struct TestApp {
    pub router: Router,
    pub config: AppConfig,
    pub identity: MemoryIdentityProvider,
    pub store: MemoryStore,
    pub outbox: mpsc::UnboundedReceiver<Email>,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "integration-test-secret".to_string();
        config.api.enable_request_logging = false;

        let store = MemoryStore::new();
        seed_tenants(&store).await?;

        let identity = MemoryIdentityProvider::new(config.security.clone());
        let (tx, outbox) = mpsc::unbounded_channel();

        let state = AppState::new(
            config.clone(),
            Arc::new(identity.clone()),
            Arc::new(store.clone()),
            Arc::new(OutboxMailer(tx)),
        );

        Ok(Self {
            router: app(state),
            config,
            identity,
            store,
            outbox,
        })
    }

    /// Bearer token for an arbitrary claim set
    pub fn token_with_claims(&self, sub: &str, custom: ClaimSet) -> Result<String> {
        let claims = Claims::new(
            sub.to_string(),
            format!("{}@campus.test", sub),
            custom,
            self.config.security.jwt_expiry_hours,
        );
        issue_token(&claims, &self.config.security).context("failed to sign test token")
    }

    pub fn token(&self, sub: &str, role: Role, tenant: Option<&str>) -> Result<String> {
        self.token_with_claims(sub, ClaimSet::for_role(role, tenant))
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        host: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri).header(header::HOST, host);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        Ok(self.router.clone().oneshot(request).await?)
    }

    pub async fn get(&self, uri: &str, host: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let response = self.send(Method::GET, uri, host, token, None).await?;
        json_response(response).await
    }

    pub async fn post(&self, uri: &str, host: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        let response = self.send(Method::POST, uri, host, token, Some(body)).await?;
        json_response(response).await
    }
}

pub async fn body_text(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

pub async fn json_response(response: Response) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let text = body_text(response).await?;
    let value = serde_json::from_str(&text).with_context(|| format!("non-JSON body: {}", text))?;
    Ok((status, value))
}

async fn seed_tenants(store: &MemoryStore) -> Result<()> {
    let tenants = [
        TenantRecord {
            id: HILLSIDE.to_string(),
            name: "Hillside Academy".to_string(),
            subdomain: "hillside".to_string(),
            branding: Branding {
                primary_color: "#0f766e".to_string(),
                secondary_color: "#facc15".to_string(),
                accent_color: None,
                logo_url: None,
            },
            is_active: true,
        },
        TenantRecord {
            id: ARCHWOOD.to_string(),
            name: "Archwood School".to_string(),
            subdomain: "archwood1".to_string(),
            branding: Branding::default(),
            is_active: true,
        },
        TenantRecord {
            id: "T3".to_string(),
            name: "Closed College".to_string(),
            subdomain: "closed".to_string(),
            branding: Branding::default(),
            is_active: false,
        },
    ];

    for tenant in tenants {
        store.put_tenant(tenant).await?;
    }
    Ok(())
}
