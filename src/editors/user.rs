use async_trait::async_trait;
use tracing::info;

use super::ordered::is_local_id;
use super::{require, Editor};
use crate::api::types::{User, UserRole};
use crate::api::LmsApi;
use crate::errors::{EditorError, LecternError};

#[derive(Debug, Clone)]
pub struct UserEditor {
    draft: User,
}

impl UserEditor {
    pub fn new(role: UserRole) -> Self {
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        Self {
            draft: User {
                id: String::new(),
                email: String::new(),
                name: String::new(),
                role,
                registration_date: today.clone(),
                last_active: today,
                position: None,
                department: None,
                phone: None,
                avatar: None,
                is_active: true,
            },
        }
    }

    pub fn from_user(user: User) -> Self {
        Self { draft: user }
    }

    pub fn draft(&self) -> &User {
        &self.draft
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.draft.email = email.into().trim().to_string();
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.draft.name = name.into();
        self
    }

    pub fn set_role(&mut self, role: UserRole) -> &mut Self {
        self.draft.role = role;
        self
    }

    pub fn set_active(&mut self, active: bool) -> &mut Self {
        self.draft.is_active = active;
        self
    }

    pub fn set_profile(
        &mut self,
        position: Option<String>,
        department: Option<String>,
        phone: Option<String>,
    ) -> &mut Self {
        self.draft.position = position;
        self.draft.department = department;
        self.draft.phone = phone;
        self
    }
}

#[async_trait]
impl Editor for UserEditor {
    type Saved = User;

    fn validate(&self) -> Result<(), EditorError> {
        require("email", &self.draft.email)?;
        require("name", &self.draft.name)?;
        if !self.draft.email.contains('@') {
            return Err(EditorError::InvalidField {
                field: "email",
                reason: format!("'{}' is not an email address", self.draft.email),
            });
        }
        Ok(())
    }

    async fn save(&mut self, api: &dyn LmsApi) -> Result<User, LecternError> {
        self.validate()?;
        let saved = if is_local_id(&self.draft.id) {
            api.create_user(&self.draft).await?
        } else {
            api.update_user(&self.draft.id, &self.draft).await?
        };
        info!(user = saved.id.as_str(), "User saved");
        self.draft = saved.clone();
        Ok(saved)
    }
}
