use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::auth::{issue_token, verify_token, ClaimSet, Claims, Role};
use crate::cli::{utils, OutputFormat};
use crate::config::config;
use crate::session::Session;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a bearer token for a principal")]
    Issue {
        #[arg(long, help = "Subject (principal uid)")]
        sub: String,
        #[arg(long, help = "Email address")]
        email: String,
        #[arg(long, help = "Role: admin, teacher, parent or superadmin")]
        role: String,
        #[arg(long, help = "Tenant id (required unless superadmin)")]
        tenant: Option<String>,
    },

    #[command(about = "Verify a token and show the session it grants")]
    Verify {
        #[arg(help = "Bearer token")]
        token: String,
    },
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config().security;

    match cmd {
        TokenCommands::Issue {
            sub,
            email,
            role,
            tenant,
        } => {
            let role: Role = role.parse()?;
            let custom = ClaimSet::for_role(role, tenant.as_deref());

            // Refuse to sign claims the server would reject
            let session = Session::from_claims(&sub, &email, &custom)?;

            let claims = Claims::new(sub, email, custom, security.jwt_expiry_hours);
            let token = issue_token(&claims, security).context("Failed to sign token")?;

            utils::output_success(
                &output_format,
                &format!("Issued {} token for {}", session.role, session.email),
                Some(json!({
                    "token": token,
                    "expiresAt": claims.exp,
                    "tenantId": session.tenant_id,
                })),
            )
        }
        TokenCommands::Verify { token } => {
            let claims = match verify_token(&token, security) {
                Ok(claims) => claims,
                Err(e) => {
                    utils::output_error(&output_format, &e.to_string(), Some("INVALID_TOKEN"))?;
                    anyhow::bail!("token rejected");
                }
            };
            let session = Session::from_claims(claims.sub, claims.email, &claims.custom)?;

            utils::output_success(
                &output_format,
                "Token is valid",
                Some(json!({
                    "subjectId": session.subject_id,
                    "email": session.email,
                    "role": session.role,
                    "tenantId": session.tenant_id,
                    "expiresAt": claims.exp,
                })),
            )
        }
    }
}
