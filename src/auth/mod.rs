//! Authentication
//!
//! A [`Session`] is the token plus the user it belongs to. It is produced by a
//! [`CredentialVerifier`], persisted by the [`SessionStore`], and handed
//! explicitly to whatever needs to know who is logged in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::types::{User, UserRole};
use crate::api::{ApiClient, LmsApi};
use crate::errors::{ApiError, AuthError, LecternError};

mod store;

pub use store::SessionStore;

/// The logged-in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Turns an email and password into a [`Session`].
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<Session, LecternError>;
}

#[async_trait]
impl CredentialVerifier for ApiClient {
    async fn verify(&self, email: &str, password: &str) -> Result<Session, LecternError> {
        match self.login(email, password).await {
            Ok(resp) => Ok(Session {
                token: resp.token,
                user: resp.user,
            }),
            Err(ApiError::Unauthorized(_)) => Err(AuthError::InvalidCredentials.into()),
            Err(ApiError::Forbidden(_)) => Err(AuthError::AccountDisabled {
                email: email.to_string(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Offline verifier over a fixed user list sharing one password.
#[derive(Debug, Clone)]
pub struct StaticVerifier {
    users: Vec<User>,
    password: String,
}

impl StaticVerifier {
    pub fn new(users: Vec<User>, password: impl Into<String>) -> Self {
        Self {
            users,
            password: password.into(),
        }
    }

    /// One admin and one student, password `demo`.
    pub fn demo() -> Self {
        let user = |id: &str, email: &str, name: &str, role: UserRole| User {
            id: id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            registration_date: "2024-01-01".to_string(),
            last_active: "2024-01-01".to_string(),
            position: None,
            department: None,
            phone: None,
            avatar: None,
            is_active: true,
        };
        Self::new(
            vec![
                user("1", "admin@company.com", "Administrator", UserRole::Admin),
                user("2", "student@company.com", "Student", UserRole::Student),
            ],
            "demo",
        )
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }
}

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, email: &str, password: &str) -> Result<Session, LecternError> {
        let user = self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .ok_or(AuthError::InvalidCredentials)?;

        if password != self.password {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled {
                email: user.email.clone(),
            }
            .into());
        }

        Ok(Session {
            token: format!("static-{}", user.id),
            user: user.clone(),
        })
    }
}

/// Verify credentials and persist the resulting session.
pub async fn login(
    verifier: &dyn CredentialVerifier,
    store: &SessionStore,
    email: &str,
    password: &str,
) -> Result<Session, LecternError> {
    let session = verifier.verify(email, password).await?;
    store.save(&session)?;
    info!(user = session.user.id.as_str(), role = %session.role(), "Logged in");
    Ok(session)
}

/// Tell the server, then clear the local session whatever it answered.
pub async fn logout(api: &dyn LmsApi, store: &SessionStore) -> Result<(), LecternError> {
    if let Err(e) = api.logout().await {
        warn!("Server logout failed, clearing local session anyway: {}", e);
    }
    store.clear()?;
    info!("Logged out");
    Ok(())
}

/// The persisted session, or `NotLoggedIn`.
pub fn require_session(store: &SessionStore) -> Result<Session, LecternError> {
    store.load()?.ok_or_else(|| AuthError::NotLoggedIn.into())
}
