//! Per-question correctness and the overall percentage.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::api::types::{CorrectAnswer, Question, QuestionType, SubmittedAnswer, TextCheckType};

/// A student's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Selected option of a single-choice question
    Choice(String),
    /// Selected options of a multiple-choice question
    Choices(BTreeSet<String>),
    /// Free text
    Text(String),
    /// left -> right for matching questions
    Pairs(BTreeMap<String, String>),
}

impl Answer {
    /// Whether this answer has the shape `kind` expects.
    pub fn fits(&self, kind: QuestionType) -> bool {
        matches!(
            (self, kind),
            (Answer::Choice(_), QuestionType::Single)
                | (Answer::Choices(_), QuestionType::Multiple)
                | (Answer::Text(_), QuestionType::Text)
                | (Answer::Pairs(_), QuestionType::Matching)
        )
    }

    /// The shape the progress endpoint stores.
    pub fn to_submitted(&self) -> SubmittedAnswer {
        match self {
            Answer::Choice(s) | Answer::Text(s) => SubmittedAnswer::Text(s.clone()),
            Answer::Choices(set) => SubmittedAnswer::Choices(set.iter().cloned().collect()),
            Answer::Pairs(map) => SubmittedAnswer::Pairs(map.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unanswered,
}

/// How one question was graded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub verdict: Verdict,
    pub points_awarded: u32,
    pub points_possible: u32,
    /// Free-text answer flagged for a human check; still auto-compared.
    pub needs_review: bool,
}

/// Graded totals for a whole test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Score {
    pub earned: u64,
    pub max: u64,
    pub percent: u32,
    pub outcomes: Vec<QuestionOutcome>,
}

impl Score {
    pub fn passed(&self, pass_score: u32) -> bool {
        self.percent >= pass_score
    }

    pub fn correct_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::Correct)
            .count()
    }

    pub fn needs_review(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.needs_review)
            .map(|o| o.question_id.as_str())
            .collect()
    }
}

/// Does `answer` fully match the question's key?
pub fn is_correct(question: &Question, answer: &Answer) -> bool {
    match (question.kind, answer) {
        (QuestionType::Single, Answer::Choice(choice)) => match &question.correct_answer {
            CorrectAnswer::One(expected) => choice == expected,
            CorrectAnswer::Many(list) => list.len() == 1 && list[0] == *choice,
        },
        (QuestionType::Multiple, Answer::Choices(selected)) => {
            let expected: BTreeSet<&str> = question.correct_answer.values().into_iter().collect();
            let selected: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
            selected == expected
        }
        (QuestionType::Text, Answer::Text(text)) => match &question.correct_answer {
            CorrectAnswer::One(expected) => normalize_text(text) == normalize_text(expected),
            // Several accepted spellings
            CorrectAnswer::Many(list) => list
                .iter()
                .any(|expected| normalize_text(text) == normalize_text(expected)),
        },
        (QuestionType::Matching, Answer::Pairs(given)) => {
            let expected: BTreeMap<&str, &str> = question
                .matching_pairs
                .iter()
                .map(|p| (p.left.as_str(), p.right.as_str()))
                .collect();
            let given: BTreeMap<&str, &str> = given
                .iter()
                .map(|(l, r)| (l.as_str(), r.as_str()))
                .collect();
            !expected.is_empty() && given == expected
        }
        _ => false,
    }
}

fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// round(100 * earned / max); 0 when there are no points to earn.
pub fn percent(earned: u64, max: u64) -> u32 {
    if max == 0 {
        return 0;
    }
    ((earned as f64 / max as f64) * 100.0).round() as u32
}

/// Grade every question. Unanswered questions earn nothing.
pub fn score(questions: &[Question], answers: &HashMap<String, Answer>) -> Score {
    let mut earned = 0u64;
    let mut max = 0u64;
    let mut outcomes = Vec::with_capacity(questions.len());

    for q in questions {
        max += u64::from(q.points);
        let needs_review =
            q.kind == QuestionType::Text && q.text_check_type == Some(TextCheckType::Manual);

        let verdict = match answers.get(&q.id) {
            None => Verdict::Unanswered,
            Some(a) if is_correct(q, a) => Verdict::Correct,
            Some(_) => Verdict::Incorrect,
        };
        let points_awarded = if verdict == Verdict::Correct {
            q.points
        } else {
            0
        };
        earned += u64::from(points_awarded);

        outcomes.push(QuestionOutcome {
            question_id: q.id.clone(),
            verdict,
            points_awarded,
            points_possible: q.points,
            needs_review,
        });
    }

    Score {
        earned,
        max,
        percent: percent(earned, max),
        outcomes,
    }
}
