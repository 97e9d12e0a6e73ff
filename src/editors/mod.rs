//! Admin editors.
//!
//! Each editor owns an in-memory draft, exposes setters for its fields and
//! saves by create-or-update: `POST` while the draft has no server id, `PUT
//! ?id=` afterwards. Validation is required-field presence; a draft that
//! fails it is never sent.

use async_trait::async_trait;

use crate::api::LmsApi;
use crate::errors::{EditorError, LecternError};

pub mod course;
pub mod lesson;
pub mod ordered;
pub mod question;
pub mod reward;
pub mod user;

pub use course::CourseEditor;
pub use lesson::LessonEditor;
pub use ordered::{Direction, OrderedList};
pub use question::QuestionEditor;
pub use reward::RewardEditor;
pub use test::TestEditor;
pub use user::UserEditor;

#[async_trait]
pub trait Editor: Send {
    type Saved: Send;

    fn validate(&self) -> Result<(), EditorError>;

    fn can_save(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate, then create or update on the server. On success the draft
    /// is replaced by what the server returned.
    async fn save(&mut self, api: &dyn LmsApi) -> Result<Self::Saved, LecternError>;
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), EditorError> {
    if value.trim().is_empty() {
        return Err(EditorError::MissingField { field });
    }
    Ok(())
}

pub(crate) fn percent_field(field: &'static str, value: u32) -> Result<u32, EditorError> {
    if value > 100 {
        return Err(EditorError::InvalidField {
            field,
            reason: format!("{} is above 100", value),
        });
    }
    Ok(value)
}

pub(crate) fn at_least_one(field: &'static str, value: u32) -> Result<u32, EditorError> {
    if value == 0 {
        return Err(EditorError::InvalidField {
            field,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
