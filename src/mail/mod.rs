//! Outbound email. Delivery is always best effort relative to the operation
//! that triggered it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Records messages in the log instead of delivering them. Only the
/// envelope is logged; bodies carry credentials.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    fn log_line(email: &Email) -> String {
        format!(
            "Email not delivered (log transport): to={} subject={:?} body_bytes={}",
            email.to,
            email.subject,
            email.text.len()
        )
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!("{}", Self::log_line(&email));
        Ok(())
    }
}

/// Posts messages to a transactional mail HTTP API
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": email.from,
            "to": [email.to],
            "subject": email.subject,
            "text": email.text,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Mail API accepted message to {}", email.to);
        Ok(())
    }
}

/// Pick the transport from configuration
pub fn mailer_from_config(config: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    match &config.api_url {
        Some(url) => std::sync::Arc::new(HttpMailer::new(url.clone(), config.api_key.clone())),
        None => {
            tracing::warn!("MAIL_API_URL not set, invitation emails will not be delivered");
            std::sync::Arc::new(LogMailer)
        }
    }
}

pub struct Invitation<'a> {
    pub school_name: &'a str,
    pub recipient_name: &'a str,
    pub recipient_email: &'a str,
    pub role: &'a str,
    pub temporary_password: &'a str,
    pub login_url: &'a str,
}

pub fn invitation_email(from: &str, invitation: &Invitation<'_>) -> Email {
    let text = format!(
        "Hello {name},\n\n\
         You have been added to {school} as a {role}.\n\n\
         Sign in at {url}\n\
         Email: {email}\n\
         Temporary password: {password}\n\n\
         You will be asked to choose a new password the first time you sign in.\n",
        name = invitation.recipient_name,
        school = invitation.school_name,
        role = invitation.role,
        url = invitation.login_url,
        email = invitation.recipient_email,
        password = invitation.temporary_password,
    );

    Email {
        from: from.to_string(),
        to: invitation.recipient_email.to_string(),
        subject: format!("Your {} portal account", invitation.school_name),
        text,
    }
}
