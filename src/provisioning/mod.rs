//! Account provisioning: identity, claims, user document, invitation.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::auth::{ClaimSet, Role};
use crate::config::{MailConfig, TenantRoutingConfig};
use crate::identity::{IdentityError, IdentityProvider, NewIdentity};
use crate::mail::{invitation_email, Invitation, Mailer};
use crate::session::Session;
use crate::store::{DocumentStore, StoreError, TenantRecord, UserRecord};

pub mod password;

pub use password::{generate_password, DEFAULT_PASSWORD_LENGTH};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Defaults to the acting admin's tenant
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("Tenant '{0}' not found")]
    UnknownTenant(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct UserProvisioner {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    mailer: Arc<dyn Mailer>,
    routing: TenantRoutingConfig,
    mail: MailConfig,
}

impl UserProvisioner {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        routing: TenantRoutingConfig,
        mail: MailConfig,
    ) -> Self {
        Self {
            identity,
            store,
            mailer,
            routing,
            mail,
        }
    }

    /// Create an account in a tenant on behalf of `actor`.
    ///
    /// The identity and its claims are created first, then the user
    /// document. If the document write fails the identity is deleted again.
    /// The invitation email is sent in the background and its outcome never
    /// affects the result.
    pub async fn create_user(&self, actor: &Session, request: CreateUserRequest) -> Result<UserRecord, ProvisionError> {
        let tenant_id = request
            .tenant_id
            .clone()
            .or_else(|| actor.tenant_id.clone())
            .ok_or_else(|| ProvisionError::Validation("tenantId is required".to_string()))?;

        if !actor.can_manage_users(&tenant_id) {
            tracing::warn!("{} ({}) may not manage users of tenant {}", actor.email, actor.role, tenant_id);
            return Err(ProvisionError::Forbidden("Not allowed to manage users of this tenant".to_string()));
        }
        if request.role == Role::Superadmin {
            return Err(ProvisionError::Forbidden("Superadmin accounts cannot be provisioned".to_string()));
        }

        let email = validate_email(&request.email)?;
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ProvisionError::Validation("name is required".to_string()));
        }

        let tenant = self.active_tenant(&tenant_id).await?;

        let temporary_password = generate_password(DEFAULT_PASSWORD_LENGTH);
        let principal = self
            .identity
            .create_user(NewIdentity {
                email: email.clone(),
                password: temporary_password.clone(),
                display_name: Some(name.clone()),
            })
            .await?;

        let claims = ClaimSet::for_role(request.role, Some(&tenant.id));
        if let Err(e) = self.identity.set_custom_claims(&principal.uid, claims).await {
            self.rollback_identity(&principal.uid).await;
            return Err(e.into());
        }

        let record = UserRecord {
            uid: principal.uid.clone(),
            email,
            name,
            role: request.role,
            tenant_id: Some(tenant.id.clone()),
            is_active: true,
            must_change_password: true,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.put_user(record.clone()).await {
            tracing::error!("Failed to write user document for {}: {}", principal.uid, e);
            self.rollback_identity(&principal.uid).await;
            return Err(e.into());
        }

        tracing::info!(
            "Provisioned {} {} in tenant {} by {}",
            record.role,
            record.uid,
            tenant.id,
            actor.subject_id
        );

        self.dispatch_invitation(&tenant, &record, temporary_password);
        Ok(record)
    }

    pub async fn list_users(&self, actor: &Session, tenant_id: &str) -> Result<Vec<UserRecord>, ProvisionError> {
        if !actor.can_access_tenant(tenant_id) || actor.role == Role::Parent {
            return Err(ProvisionError::Forbidden("Not allowed to list users of this tenant".to_string()));
        }
        self.active_tenant(tenant_id).await?;
        Ok(self.store.users_for_tenant(tenant_id).await?)
    }

    /// Deactivated tenants are treated as missing, as on the host path
    async fn active_tenant(&self, tenant_id: &str) -> Result<TenantRecord, ProvisionError> {
        self.store
            .tenant(tenant_id)
            .await?
            .filter(|tenant| tenant.is_active)
            .ok_or_else(|| ProvisionError::UnknownTenant(tenant_id.to_string()))
    }

    /// Login page on the tenant's own subdomain
    pub fn login_url(&self, tenant: &TenantRecord) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "{}://{}.{}",
            self.mail.login_scheme, tenant.subdomain, self.routing.root_domain
        ))?;
        url.set_path("/login");
        Ok(url)
    }

    fn dispatch_invitation(&self, tenant: &TenantRecord, user: &UserRecord, temporary_password: String) {
        let login_url = match self.login_url(tenant) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::error!("Cannot build login URL for tenant {}: {}", tenant.id, e);
                return;
            }
        };

        let email = invitation_email(
            &self.mail.from_address,
            &Invitation {
                school_name: &tenant.name,
                recipient_name: &user.name,
                recipient_email: &user.email,
                role: user.role.as_str(),
                temporary_password: &temporary_password,
                login_url: &login_url,
            },
        );

        let mailer = self.mailer.clone();
        let uid = user.uid.clone();
        tokio::spawn(async move {
            match mailer.send(email).await {
                Ok(()) => tracing::debug!("Invitation sent to {}", uid),
                Err(e) => tracing::error!("Invitation email for {} failed: {}", uid, e),
            }
        });
    }

    async fn rollback_identity(&self, uid: &str) {
        if let Err(e) = self.identity.delete_user(uid).await {
            tracing::error!("Rollback of identity {} failed: {}", uid, e);
        }
    }
}

fn validate_email(raw: &str) -> Result<String, ProvisionError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ProvisionError::Validation(format!("invalid email '{}'", raw.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::identity::MemoryIdentityProvider;
    use crate::mail::{Email, MailError};
    use crate::store::{Branding, MemoryStore};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct RecordingMailer {
        tx: mpsc::UnboundedSender<Email>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Email) -> Result<(), MailError> {
            let _ = self.tx.send(email);
            if self.fail {
                return Err(MailError::Rejected {
                    status: 503,
                    body: "mail outage".into(),
                });
            }
            Ok(())
        }
    }

    /// Store that refuses user documents
    struct ReadOnlyUsers(MemoryStore);

    #[async_trait]
    impl DocumentStore for ReadOnlyUsers {
        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<TenantRecord>, StoreError> {
            self.0.tenant_by_subdomain(subdomain).await
        }
        async fn tenant(&self, id: &str) -> Result<Option<TenantRecord>, StoreError> {
            self.0.tenant(id).await
        }
        async fn put_tenant(&self, tenant: TenantRecord) -> Result<(), StoreError> {
            self.0.put_tenant(tenant).await
        }
        async fn user(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
            self.0.user(uid).await
        }
        async fn put_user(&self, _user: UserRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("write quota exceeded".into()))
        }
        async fn users_for_tenant(&self, tenant_id: &str) -> Result<Vec<UserRecord>, StoreError> {
            self.0.users_for_tenant(tenant_id).await
        }
    }

    struct Fixture {
        identity: MemoryIdentityProvider,
        provisioner: UserProvisioner,
        outbox: mpsc::UnboundedReceiver<Email>,
    }

    async fn fixture(mail_fails: bool, store: Option<Arc<dyn DocumentStore>>) -> Fixture {
        let identity = MemoryIdentityProvider::new(SecurityConfig {
            enable_cors: false,
            cors_origins: Vec::new(),
            require_https: false,
            jwt_secret: "provisioning-test".into(),
            jwt_expiry_hours: 1,
        });

        let memory = MemoryStore::new();
        memory
            .put_tenant(TenantRecord {
                id: "T1".into(),
                name: "Archwood Academy".into(),
                subdomain: "archwood1".into(),
                branding: Branding::default(),
                is_active: true,
            })
            .await
            .unwrap();
        let store = store.unwrap_or_else(|| Arc::new(memory.clone()) as Arc<dyn DocumentStore>);

        let (tx, outbox) = mpsc::unbounded_channel();
        let provisioner = UserProvisioner::new(
            Arc::new(identity.clone()),
            store,
            Arc::new(RecordingMailer { tx, fail: mail_fails }),
            TenantRoutingConfig::default(),
            MailConfig {
                api_url: None,
                api_key: None,
                from_address: "no-reply@seth.ng".into(),
                login_scheme: "https".into(),
            },
        );

        Fixture {
            identity,
            provisioner,
            outbox,
        }
    }

    fn session(role: Role, tenant: Option<&str>) -> Session {
        Session::from_claims("actor", "actor@archwood.sch", &ClaimSet::for_role(role, tenant)).unwrap()
    }

    fn request(email: &str, role: Role) -> CreateUserRequest {
        CreateUserRequest {
            email: email.into(),
            name: "Ada Obi".into(),
            role,
            tenant_id: None,
        }
    }

    #[tokio::test]
    async fn admin_creates_teacher_with_claims_and_invitation() {
        let mut fx = fixture(false, None).await;
        let admin = session(Role::Admin, Some("T1"));

        let user = fx
            .provisioner
            .create_user(&admin, request(" Ada@Archwood.sch ", Role::Teacher))
            .await
            .unwrap();

        assert_eq!(user.email, "ada@archwood.sch");
        assert_eq!(user.tenant_id.as_deref(), Some("T1"));
        assert!(user.must_change_password && user.is_active);

        let principal = crate::identity::Principal {
            uid: user.uid.clone(),
            email: user.email.clone(),
            display_name: None,
        };
        let claims = fx.identity.fetch_claims(&principal).await.unwrap();
        assert_eq!(claims.role(), Ok(Role::Teacher));
        assert_eq!(claims.tenant_id(), Some("T1"));

        let email = tokio::time::timeout(Duration::from_secs(2), fx.outbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(email.to, "ada@archwood.sch");
        assert!(email.text.contains("https://archwood1.seth.ng/login"));
    }

    #[tokio::test]
    async fn email_failure_does_not_fail_creation() {
        let mut fx = fixture(true, None).await;
        let admin = session(Role::Admin, Some("T1"));

        let user = fx.provisioner.create_user(&admin, request("p@x.io", Role::Parent)).await;
        assert!(user.is_ok());
        // The send was attempted
        assert!(tokio::time::timeout(Duration::from_secs(2), fx.outbox.recv()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cross_tenant_and_non_admin_actors_are_forbidden() {
        let fx = fixture(false, None).await;

        let other_admin = session(Role::Admin, Some("T2"));
        let mut req = request("a@x.io", Role::Teacher);
        req.tenant_id = Some("T1".into());
        assert!(matches!(
            fx.provisioner.create_user(&other_admin, req).await,
            Err(ProvisionError::Forbidden(_))
        ));

        let teacher = session(Role::Teacher, Some("T1"));
        assert!(matches!(
            fx.provisioner.create_user(&teacher, request("b@x.io", Role::Parent)).await,
            Err(ProvisionError::Forbidden(_))
        ));

        let admin = session(Role::Admin, Some("T1"));
        assert!(matches!(
            fx.provisioner.create_user(&admin, request("c@x.io", Role::Superadmin)).await,
            Err(ProvisionError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn superadmin_must_name_an_existing_tenant() {
        let fx = fixture(false, None).await;
        let root = session(Role::Superadmin, None);

        assert!(matches!(
            fx.provisioner.create_user(&root, request("a@x.io", Role::Admin)).await,
            Err(ProvisionError::Validation(_))
        ));

        let mut req = request("a@x.io", Role::Admin);
        req.tenant_id = Some("T404".into());
        assert!(matches!(
            fx.provisioner.create_user(&root, req).await,
            Err(ProvisionError::UnknownTenant(_))
        ));

        let mut req = request("a@x.io", Role::Admin);
        req.tenant_id = Some("T1".into());
        assert!(fx.provisioner.create_user(&root, req).await.is_ok());
    }

    #[tokio::test]
    async fn deactivated_tenant_accepts_no_new_users() {
        let memory = MemoryStore::new();
        memory
            .put_tenant(TenantRecord {
                id: "T1".into(),
                name: "Archwood Academy".into(),
                subdomain: "archwood1".into(),
                branding: Branding::default(),
                is_active: false,
            })
            .await
            .unwrap();
        let mut fx = fixture(false, Some(Arc::new(memory.clone()))).await;
        let admin = session(Role::Admin, Some("T1"));

        assert!(matches!(
            fx.provisioner.create_user(&admin, request("late@x.io", Role::Teacher)).await,
            Err(ProvisionError::UnknownTenant(_))
        ));
        assert!(matches!(
            fx.provisioner.list_users(&admin, "T1").await,
            Err(ProvisionError::UnknownTenant(_))
        ));

        assert!(memory.users_for_tenant("T1").await.unwrap().is_empty());
        assert!(fx.identity.sign_in_with_password("late@x.io", "irrelevant").await.is_err());
        assert!(fx.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let fx = fixture(false, None).await;
        let admin = session(Role::Admin, Some("T1"));

        for email in ["", "no-at-sign", "a@nodot", "a@.x.io", "a b@x.io"] {
            assert!(
                matches!(
                    fx.provisioner.create_user(&admin, request(email, Role::Teacher)).await,
                    Err(ProvisionError::Validation(_))
                ),
                "email {email:?}"
            );
        }

        let mut blank_name = request("ok@x.io", Role::Teacher);
        blank_name.name = "   ".into();
        assert!(matches!(
            fx.provisioner.create_user(&admin, blank_name).await,
            Err(ProvisionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn failed_document_write_rolls_back_identity() {
        let memory = MemoryStore::new();
        memory
            .put_tenant(TenantRecord {
                id: "T1".into(),
                name: "Archwood Academy".into(),
                subdomain: "archwood1".into(),
                branding: Branding::default(),
                is_active: true,
            })
            .await
            .unwrap();
        let fx = fixture(false, Some(Arc::new(ReadOnlyUsers(memory)))).await;
        let admin = session(Role::Admin, Some("T1"));

        let err = fx
            .provisioner
            .create_user(&admin, request("ada@x.io", Role::Teacher))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Store(_)));

        // Same email can be provisioned again: the identity was removed
        assert!(fx
            .identity
            .create_user(NewIdentity {
                email: "ada@x.io".into(),
                password: "another-pass".into(),
                display_name: None,
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn parents_cannot_list_users() {
        let fx = fixture(false, None).await;
        let admin = session(Role::Admin, Some("T1"));
        fx.provisioner.create_user(&admin, request("t@x.io", Role::Teacher)).await.unwrap();

        let listed = fx.provisioner.list_users(&session(Role::Teacher, Some("T1")), "T1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            fx.provisioner.list_users(&session(Role::Parent, Some("T1")), "T1").await,
            Err(ProvisionError::Forbidden(_))
        ));
        assert!(matches!(
            fx.provisioner.list_users(&admin, "T2").await,
            Err(ProvisionError::Forbidden(_))
        ));
    }
}
