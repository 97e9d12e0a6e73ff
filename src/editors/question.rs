use async_trait::async_trait;
use tracing::info;

use super::ordered::is_local_id;
use super::{at_least_one, require, Editor};
use crate::api::types::{CorrectAnswer, MatchingPair, Question, QuestionType, TextCheckType};
use crate::api::LmsApi;
use crate::errors::{EditorError, LecternError};

/// Draft of one question.
#[derive(Debug, Clone, Default)]
pub struct QuestionEditor {
    draft: Question,
}

impl QuestionEditor {
    pub fn new(test_id: impl Into<String>, kind: QuestionType) -> Self {
        let mut editor = Self {
            draft: Question {
                test_id: test_id.into(),
                points: 1,
                ..Default::default()
            },
        };
        editor.set_kind(kind);
        editor
    }

    pub fn from_question(question: Question) -> Self {
        Self { draft: question }
    }

    pub fn draft(&self) -> &Question {
        &self.draft
    }

    pub fn into_draft(self) -> Question {
        self.draft
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.draft.text = text.into();
        self
    }

    /// Switching kind resets the answer key to the new shape.
    pub fn set_kind(&mut self, kind: QuestionType) -> &mut Self {
        self.draft.kind = kind;
        self.draft.correct_answer = match kind {
            QuestionType::Multiple => CorrectAnswer::Many(Vec::new()),
            _ => CorrectAnswer::One(String::new()),
        };
        self.draft.text_check_type = match kind {
            QuestionType::Text => Some(TextCheckType::Automatic),
            _ => None,
        };
        if kind != QuestionType::Matching {
            self.draft.matching_pairs.clear();
        }
        self
    }

    pub fn set_points(&mut self, points: u32) -> Result<&mut Self, EditorError> {
        self.draft.points = at_least_one("points", points)?;
        Ok(self)
    }

    pub fn add_option(&mut self, option: impl Into<String>) -> &mut Self {
        let option = option.into();
        if !self.draft.options.contains(&option) {
            self.draft.options.push(option);
        }
        self
    }

    /// Remove an option and drop it from the answer key.
    pub fn remove_option(&mut self, option: &str) -> &mut Self {
        self.draft.options.retain(|o| o != option);
        match &mut self.draft.correct_answer {
            CorrectAnswer::One(s) if s == option => s.clear(),
            CorrectAnswer::Many(list) => list.retain(|o| o != option),
            _ => {}
        }
        self
    }

    /// Single choice: this option becomes the only correct one.
    /// Multiple choice: toggles the option in the key.
    pub fn mark_correct(&mut self, option: &str) -> Result<&mut Self, EditorError> {
        if !self.draft.options.iter().any(|o| o == option) {
            return Err(EditorError::InvalidField {
                field: "correctAnswer",
                reason: format!("'{}' is not one of the options", option),
            });
        }
        match self.draft.kind {
            QuestionType::Single => {
                self.draft.correct_answer = CorrectAnswer::One(option.to_string());
            }
            QuestionType::Multiple => {
                let mut list = match &self.draft.correct_answer {
                    CorrectAnswer::Many(list) => list.clone(),
                    CorrectAnswer::One(s) if !s.is_empty() => vec![s.clone()],
                    CorrectAnswer::One(_) => Vec::new(),
                };
                if let Some(pos) = list.iter().position(|o| o == option) {
                    list.remove(pos);
                } else {
                    list.push(option.to_string());
                }
                self.draft.correct_answer = CorrectAnswer::Many(list);
            }
            other => {
                return Err(EditorError::InvalidField {
                    field: "correctAnswer",
                    reason: format!("{} questions have no options", other),
                })
            }
        }
        Ok(self)
    }

    /// Empty the answer key, keeping options and kind.
    pub fn clear_key(&mut self) -> &mut Self {
        self.draft.correct_answer = match self.draft.kind {
            QuestionType::Multiple => CorrectAnswer::Many(Vec::new()),
            _ => CorrectAnswer::One(String::new()),
        };
        self
    }

    pub fn set_expected_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.draft.correct_answer = CorrectAnswer::One(text.into());
        self
    }

    /// Several accepted spellings for a text question; one collapses to a
    /// plain expected answer.
    pub fn set_accepted_texts(&mut self, mut texts: Vec<String>) -> &mut Self {
        texts.retain(|t| !t.trim().is_empty());
        self.draft.correct_answer = if texts.len() == 1 {
            CorrectAnswer::One(texts.remove(0))
        } else {
            CorrectAnswer::Many(texts)
        };
        self
    }

    pub fn set_text_check(&mut self, check: TextCheckType) -> &mut Self {
        self.draft.text_check_type = Some(check);
        self
    }

    pub fn add_pair(&mut self, left: impl Into<String>, right: impl Into<String>) -> &mut Self {
        self.draft.matching_pairs.push(MatchingPair {
            left: left.into(),
            right: right.into(),
        });
        self
    }

    pub fn set_order(&mut self, order: u32) -> &mut Self {
        self.draft.order = order;
        self
    }
}

#[async_trait]
impl Editor for QuestionEditor {
    type Saved = Question;

    fn validate(&self) -> Result<(), EditorError> {
        require("text", &self.draft.text)?;
        require("testId", &self.draft.test_id)
    }

    async fn save(&mut self, api: &dyn LmsApi) -> Result<Question, LecternError> {
        self.validate()?;
        let saved = if is_local_id(&self.draft.id) {
            let mut body = self.draft.clone();
            body.id.clear();
            api.create_question(&body).await?
        } else {
            api.update_question(&self.draft.id, &self.draft).await?
        };
        info!(question = saved.id.as_str(), "Question saved");
        self.draft = saved.clone();
        Ok(saved)
    }
}
