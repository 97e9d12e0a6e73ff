//! The test-taking state machine.
//!
//! `InProgress { index, remaining_secs }` moves one way to `Finished(result)`.
//! Answers live beside the state so navigation never loses them, and the
//! result is computed once, from the answers as they stood at `finish()`.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use super::scoring::{self, Answer, QuestionOutcome};
use crate::api::types::{Question, QuestionType, SubmittedAnswer, Test};
use crate::errors::EngineError;
use crate::observability::telemetry::record_state_transition;

/// Final grading of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    pub score: u32,
    pub passed: bool,
    pub earned: u64,
    pub max: u64,
    pub correct: usize,
    pub total: usize,
    pub outcomes: Vec<QuestionOutcome>,
    /// Ids of manually checked free-text questions
    pub needs_review: Vec<String>,
    /// Finished because the clock ran out
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    InProgress { index: usize, remaining_secs: u64 },
    Finished(SessionResult),
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::InProgress { .. } => "in_progress",
            SessionState::Finished(_) => "finished",
        }
    }
}

/// What one clock tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Running { remaining_secs: u64 },
    Expired(SessionResult),
}

#[derive(Debug, Clone)]
pub struct TestSession {
    test: Test,
    questions: Vec<Question>,
    answers: HashMap<String, Answer>,
    state: SessionState,
    attempts_used: u32,
}

impl TestSession {
    /// Start the first attempt. Questions are put in their `order`. With a
    /// zero time limit the attempt is already finished and timed out.
    pub fn new(test: Test, mut questions: Vec<Question>) -> Result<Self, EngineError> {
        if questions.is_empty() {
            return Err(EngineError::Empty);
        }
        questions.sort_by_key(|q| q.order);
        let remaining_secs = u64::from(test.time_limit) * 60;
        debug!(
            test_id = test.id.as_str(),
            questions = questions.len(),
            remaining_secs,
            "Test session started"
        );
        let mut session = Self {
            test,
            questions,
            answers: HashMap::new(),
            state: SessionState::InProgress {
                index: 0,
                remaining_secs,
            },
            attempts_used: 1,
        };
        session.expire_if_out_of_time();
        Ok(session)
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished(_))
    }

    /// Current position; `None` once finished.
    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::InProgress { index, .. } => Some(index),
            SessionState::Finished(_) => None,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_index().and_then(|i| self.questions.get(i))
    }

    pub fn remaining_secs(&self) -> u64 {
        match self.state {
            SessionState::InProgress { remaining_secs, .. } => remaining_secs,
            SessionState::Finished(_) => 0,
        }
    }

    pub fn answers(&self) -> &HashMap<String, Answer> {
        &self.answers
    }

    pub fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn result(&self) -> Option<&SessionResult> {
        match &self.state {
            SessionState::Finished(result) => Some(result),
            SessionState::InProgress { .. } => None,
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    /// Informational only; `restart` is never refused because of it.
    pub fn attempts_remaining(&self) -> u32 {
        self.test.attempts.saturating_sub(self.attempts_used)
    }

    fn ensure_in_progress(&self, operation: &str) -> Result<(), EngineError> {
        if self.is_finished() {
            return Err(already_finished(operation));
        }
        Ok(())
    }

    /// Insert or replace the answer for a question. Does not move the index.
    pub fn answer(&mut self, question_id: &str, answer: Answer) -> Result<(), EngineError> {
        self.ensure_in_progress("answer")?;
        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?;
        if !answer.fits(question.kind) {
            return Err(EngineError::AnswerKindMismatch {
                expected: question.kind.to_string(),
            });
        }
        self.answers.insert(question_id.to_string(), answer);
        Ok(())
    }

    /// Flip one option of a multiple-choice question on or off.
    pub fn toggle_choice(&mut self, question_id: &str, option: &str) -> Result<(), EngineError> {
        self.ensure_in_progress("answer")?;
        let mut selected = match self.answers.get(question_id) {
            Some(Answer::Choices(set)) => set.clone(),
            _ => BTreeSet::new(),
        };
        if !selected.remove(option) {
            selected.insert(option.to_string());
        }
        self.answer(question_id, Answer::Choices(selected))
    }

    /// Advance one question; a no-op on the last one.
    pub fn next(&mut self) -> Result<usize, EngineError> {
        let last = self.questions.len() - 1;
        match &mut self.state {
            SessionState::InProgress { index, .. } => {
                if *index < last {
                    *index += 1;
                }
                Ok(*index)
            }
            SessionState::Finished(_) => Err(already_finished("move to the next question")),
        }
    }

    /// Go back one question; a no-op on the first one.
    pub fn previous(&mut self) -> Result<usize, EngineError> {
        match &mut self.state {
            SessionState::InProgress { index, .. } => {
                *index = index.saturating_sub(1);
                Ok(*index)
            }
            SessionState::Finished(_) => Err(already_finished("move to the previous question")),
        }
    }

    pub fn jump_to(&mut self, target: usize) -> Result<(), EngineError> {
        let count = self.questions.len();
        match &mut self.state {
            SessionState::InProgress { index, .. } if target < count => {
                *index = target;
                Ok(())
            }
            SessionState::InProgress { .. } => Err(EngineError::IndexOutOfRange {
                index: target,
                count,
            }),
            SessionState::Finished(_) => Err(already_finished("jump to a question")),
        }
    }

    /// One second off the clock. Hitting zero finishes the attempt.
    pub fn tick(&mut self) -> Result<Tick, EngineError> {
        let remaining = match &mut self.state {
            SessionState::InProgress { remaining_secs, .. } => {
                *remaining_secs = remaining_secs.saturating_sub(1);
                *remaining_secs
            }
            SessionState::Finished(_) => return Err(already_finished("tick")),
        };
        if remaining == 0 {
            return Ok(Tick::Expired(self.complete(true)));
        }
        Ok(Tick::Running {
            remaining_secs: remaining,
        })
    }

    /// Grade the frozen answers and close the attempt.
    pub fn finish(&mut self) -> Result<SessionResult, EngineError> {
        self.ensure_in_progress("finish")?;
        Ok(self.complete(false))
    }

    fn complete(&mut self, timed_out: bool) -> SessionResult {
        let graded = scoring::score(&self.questions, &self.answers);
        let result = SessionResult {
            score: graded.percent,
            passed: graded.passed(self.test.pass_score),
            earned: graded.earned,
            max: graded.max,
            correct: graded.correct_count(),
            total: self.questions.len(),
            needs_review: graded
                .needs_review()
                .into_iter()
                .map(str::to_string)
                .collect(),
            outcomes: graded.outcomes,
            timed_out,
        };
        let from = self.state.name();
        self.state = SessionState::Finished(result.clone());
        record_state_transition(&self.test.id, from, self.state.name());
        result
    }

    /// Fresh attempt: empty answers, first question, full time.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        if !self.is_finished() {
            return Err(EngineError::NotFinished);
        }
        self.answers.clear();
        self.attempts_used += 1;
        self.state = SessionState::InProgress {
            index: 0,
            remaining_secs: u64::from(self.test.time_limit) * 60,
        };
        record_state_transition(&self.test.id, "finished", self.state.name());
        self.expire_if_out_of_time();
        Ok(())
    }

    /// A zero time limit leaves no time to answer: grade the empty attempt.
    fn expire_if_out_of_time(&mut self) {
        if self.remaining_secs() == 0 && !self.is_finished() {
            self.complete(true);
        }
    }

    /// Answers in the shape `progress?action=submit` expects.
    pub fn submitted_answers(&self) -> BTreeMap<String, SubmittedAnswer> {
        self.answers
            .iter()
            .map(|(id, a)| (id.clone(), a.to_submitted()))
            .collect()
    }

    /// Which questions have an answer, by position (for the jump picker).
    pub fn answered_flags(&self) -> Vec<bool> {
        self.questions
            .iter()
            .map(|q| self.answers.contains_key(&q.id))
            .collect()
    }

    /// Kind of the question at `index`, if any.
    pub fn kind_at(&self, index: usize) -> Option<QuestionType> {
        self.questions.get(index).map(|q| q.kind)
    }
}

fn already_finished(operation: &str) -> EngineError {
    EngineError::AlreadyFinished {
        operation: operation.to_string(),
    }
}
