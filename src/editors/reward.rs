use async_trait::async_trait;
use tracing::info;

use super::ordered::is_local_id;
use super::{require, Editor};
use crate::api::types::Reward;
use crate::api::LmsApi;
use crate::errors::{EditorError, LecternError};

pub const DEFAULT_ICON: &str = "🏆";
pub const DEFAULT_COLOR: &str = "#F97316";

#[derive(Debug, Clone)]
pub struct RewardEditor {
    draft: Reward,
}

impl Default for RewardEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardEditor {
    pub fn new() -> Self {
        Self {
            draft: Reward {
                icon: DEFAULT_ICON.to_string(),
                color: DEFAULT_COLOR.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn from_reward(reward: Reward) -> Self {
        Self { draft: reward }
    }

    pub fn draft(&self) -> &Reward {
        &self.draft
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.draft.name = name.into();
        self
    }

    pub fn set_course(&mut self, course_id: impl Into<String>) -> &mut Self {
        self.draft.course_id = course_id.into();
        self
    }

    pub fn set_icon(&mut self, icon: impl Into<String>) -> &mut Self {
        self.draft.icon = icon.into();
        self
    }

    /// `#RRGGBB`
    pub fn set_color(&mut self, color: &str) -> Result<&mut Self, EditorError> {
        let valid = color.len() == 7
            && color.starts_with('#')
            && color[1..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(EditorError::InvalidField {
                field: "color",
                reason: format!("'{}' is not a #RRGGBB color", color),
            });
        }
        self.draft.color = color.to_string();
        Ok(self)
    }

    pub fn set_description(&mut self, description: Option<String>) -> &mut Self {
        self.draft.description = description;
        self
    }

    pub fn set_condition(&mut self, condition: Option<String>) -> &mut Self {
        self.draft.condition = condition;
        self
    }

    pub fn add_bonus(&mut self, bonus: impl Into<String>) -> &mut Self {
        self.draft.bonuses.push(bonus.into());
        self
    }

    pub fn remove_bonus(&mut self, bonus: &str) -> &mut Self {
        self.draft.bonuses.retain(|b| b != bonus);
        self
    }
}

#[async_trait]
impl Editor for RewardEditor {
    type Saved = Reward;

    fn validate(&self) -> Result<(), EditorError> {
        require("name", &self.draft.name)?;
        require("courseId", &self.draft.course_id)
    }

    async fn save(&mut self, api: &dyn LmsApi) -> Result<Reward, LecternError> {
        self.validate()?;
        let saved = if is_local_id(&self.draft.id) {
            api.create_reward(&self.draft).await?
        } else {
            api.update_reward(&self.draft.id, &self.draft).await?
        };
        info!(reward = saved.id.as_str(), "Reward saved");
        self.draft = saved.clone();
        Ok(saved)
    }
}
