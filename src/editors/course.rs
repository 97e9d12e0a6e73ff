use async_trait::async_trait;
use tracing::{info, warn};

use super::ordered::{is_local_id, Direction, OrderedList};
use super::{percent_field, require, Editor};
use crate::api::types::{AccessType, Course, CourseStatus, Lesson};
use crate::api::LmsApi;
use crate::errors::{EditorError, LecternError};

/// Course draft plus its ordered lesson list.
#[derive(Debug, Clone, Default)]
pub struct CourseEditor {
    draft: Course,
    lessons: OrderedList<Lesson>,
}

/// What a course save touched.
#[derive(Debug, Clone)]
pub struct CourseSaved {
    pub course: Course,
    pub lessons: Vec<Lesson>,
    pub deleted_lessons: Vec<String>,
    /// Lesson id and error for each delete the server refused; retried on
    /// the next save.
    pub failed_deletes: Vec<(String, String)>,
}

impl CourseEditor {
    pub fn new() -> Self {
        Self {
            draft: Course {
                pass_score: 70,
                status: Some(CourseStatus::Draft),
                ..Default::default()
            },
            lessons: OrderedList::default(),
        }
    }

    /// Fetch a course and its lessons for editing.
    pub async fn load(api: &dyn LmsApi, id: &str) -> Result<Self, LecternError> {
        let course = api.get_course(id).await?;
        let lessons = api.list_lessons(id).await?;
        Ok(Self {
            draft: course,
            lessons: OrderedList::from_items(lessons, |l| l.order),
        })
    }

    pub fn draft(&self) -> &Course {
        &self.draft
    }

    pub fn lessons(&self) -> &[Lesson] {
        self.lessons.items()
    }

    pub fn is_new(&self) -> bool {
        is_local_id(&self.draft.id)
    }

    /// Saved lessons removed from the draft but not yet deleted on the server.
    pub fn pending_deletes(&self) -> &[String] {
        self.lessons.removed()
    }

    pub fn total_duration(&self) -> u32 {
        self.lessons.items().iter().map(|l| l.duration).sum()
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.draft.title = title.into();
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.draft.description = description.into();
        self
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> &mut Self {
        self.draft.category = category.into();
        self
    }

    pub fn set_image(&mut self, image: impl Into<String>) -> &mut Self {
        self.draft.image = image.into();
        self
    }

    pub fn set_duration(&mut self, minutes: u32) -> &mut Self {
        self.draft.duration = minutes;
        self
    }

    pub fn set_pass_score(&mut self, score: u32) -> Result<&mut Self, EditorError> {
        self.draft.pass_score = percent_field("passScore", score)?;
        Ok(self)
    }

    pub fn set_access_type(&mut self, access: AccessType) -> &mut Self {
        self.draft.access_type = access;
        self
    }

    pub fn set_status(&mut self, status: CourseStatus) -> &mut Self {
        self.draft.status = Some(status);
        self.draft.published = status == CourseStatus::Published;
        self
    }

    pub fn set_level(&mut self, level: Option<String>) -> &mut Self {
        self.draft.level = level;
        self
    }

    pub fn set_instructor(&mut self, instructor: Option<String>) -> &mut Self {
        self.draft.instructor = instructor;
        self
    }

    pub fn set_dates(&mut self, start: Option<String>, end: Option<String>) -> &mut Self {
        self.draft.start_date = start;
        self.draft.end_date = end;
        self
    }

    pub fn set_prerequisites(&mut self, courses: Vec<String>) -> &mut Self {
        self.draft.prerequisite_courses = courses;
        self
    }

    /// Append a lesson; returns its (possibly local) id.
    pub fn add_lesson(&mut self, lesson: Lesson) -> Result<String, EditorError> {
        require("lesson title", &lesson.title)?;
        Ok(self.lessons.add(lesson))
    }

    pub fn update_lesson(&mut self, lesson: Lesson) -> Result<(), EditorError> {
        require("lesson title", &lesson.title)?;
        self.lessons.update(lesson)
    }

    pub fn delete_lesson(&mut self, id: &str) -> Result<Lesson, EditorError> {
        self.lessons.delete(id)
    }

    pub fn move_lesson(&mut self, id: &str, direction: Direction) -> Result<(), EditorError> {
        self.lessons.move_item(id, direction)
    }
}

#[async_trait]
impl Editor for CourseEditor {
    type Saved = CourseSaved;

    fn validate(&self) -> Result<(), EditorError> {
        require("title", &self.draft.title)?;
        for lesson in self.lessons.items() {
            require("lesson title", &lesson.title)?;
        }
        Ok(())
    }

    async fn save(&mut self, api: &dyn LmsApi) -> Result<CourseSaved, LecternError> {
        self.validate()?;

        self.draft.lessons_count = self.lessons.len() as u32;
        let course = if self.is_new() {
            let mut body = self.draft.clone();
            body.id.clear();
            api.create_course(&body).await?
        } else {
            api.update_course(&self.draft.id, &self.draft).await?
        };
        info!(course = course.id.as_str(), "Course saved");
        self.draft = course.clone();

        let mut saved_lessons = Vec::with_capacity(self.lessons.len());
        for lesson in self.lessons.items_mut() {
            lesson.course_id = course.id.clone();
            let saved = if is_local_id(&lesson.id) {
                let mut body = lesson.clone();
                body.id.clear();
                api.create_lesson(&body).await?
            } else {
                api.update_lesson(&lesson.id, lesson).await?
            };
            *lesson = saved.clone();
            saved_lessons.push(saved);
        }

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for id in self.lessons.removed().to_vec() {
            match api.delete_lesson(&id).await {
                Ok(()) => deleted.push(id),
                Err(e) => {
                    warn!("Failed to delete lesson {}: {}", id, e);
                    failed.push((id, e.to_string()));
                }
            }
        }
        self.lessons.forget_removed(&deleted);

        Ok(CourseSaved {
            course,
            lessons: saved_lessons,
            deleted_lessons: deleted,
            failed_deletes: failed,
        })
    }
}
