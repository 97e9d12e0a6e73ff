use async_trait::async_trait;
use tracing::info;

use super::ordered::is_local_id;
use super::{require, Editor};
use crate::api::types::{Lesson, LessonMaterial, LessonType, MaterialType};
use crate::api::LmsApi;
use crate::errors::{EditorError, LecternError};

/// Draft of a single lesson, saved on its own (outside a course draft).
#[derive(Debug, Clone, Default)]
pub struct LessonEditor {
    draft: Lesson,
}

impl LessonEditor {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            draft: Lesson {
                course_id: course_id.into(),
                kind: LessonType::Video,
                duration: 10,
                ..Default::default()
            },
        }
    }

    pub fn from_lesson(lesson: Lesson) -> Self {
        Self { draft: lesson }
    }

    pub async fn load(api: &dyn LmsApi, id: &str) -> Result<Self, LecternError> {
        Ok(Self::from_lesson(api.get_lesson(id).await?))
    }

    pub fn draft(&self) -> &Lesson {
        &self.draft
    }

    pub fn into_draft(self) -> Lesson {
        self.draft
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.draft.title = title.into();
        self
    }

    pub fn set_kind(&mut self, kind: LessonType) -> &mut Self {
        self.draft.kind = kind;
        self
    }

    pub fn set_content(&mut self, content: impl Into<String>) -> &mut Self {
        self.draft.content = content.into();
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.draft.description = description.into();
        self
    }

    /// Minutes
    pub fn set_duration(&mut self, minutes: u32) -> &mut Self {
        self.draft.duration = minutes;
        self
    }

    pub fn set_video_url(&mut self, url: Option<String>) -> &mut Self {
        self.draft.video_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn set_requires_previous(&mut self, requires: bool) -> &mut Self {
        self.draft.requires_previous = requires;
        self
    }

    pub fn set_test_id(&mut self, test_id: Option<String>) -> &mut Self {
        self.draft.test_id = test_id.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn set_order(&mut self, order: u32) -> &mut Self {
        self.draft.order = order;
        self
    }

    /// Attach a material to an already saved lesson.
    pub async fn add_material(
        &mut self,
        api: &dyn LmsApi,
        title: &str,
        kind: MaterialType,
        url: &str,
    ) -> Result<LessonMaterial, LecternError> {
        if is_local_id(&self.draft.id) {
            return Err(EditorError::InvalidField {
                field: "lessonId",
                reason: "save the lesson before attaching materials".to_string(),
            }
            .into());
        }
        require("material title", title)?;
        require("material url", url)?;

        let material = LessonMaterial {
            id: String::new(),
            title: title.trim().to_string(),
            kind,
            url: url.trim().to_string(),
        };
        let saved = api.add_material(&self.draft.id, &material).await?;
        self.draft.materials.push(saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl Editor for LessonEditor {
    type Saved = Lesson;

    fn validate(&self) -> Result<(), EditorError> {
        require("title", &self.draft.title)?;
        require("courseId", &self.draft.course_id)
    }

    async fn save(&mut self, api: &dyn LmsApi) -> Result<Lesson, LecternError> {
        self.validate()?;
        let saved = if is_local_id(&self.draft.id) {
            let mut body = self.draft.clone();
            body.id.clear();
            api.create_lesson(&body).await?
        } else {
            api.update_lesson(&self.draft.id, &self.draft).await?
        };
        info!(lesson = saved.id.as_str(), "Lesson saved");
        self.draft = saved.clone();
        Ok(saved)
    }
}
