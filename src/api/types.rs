//! Wire types for the LMS REST API.
//!
//! All payloads are JSON with camelCase keys. Responses wrap their payload in
//! a single-key envelope (`{"course": {...}}`, `{"courses": [...]}`), which is
//! what the `*Envelope` structs at the bottom of this file unwrap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Users ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Student,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Student => write!(f, "student"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub registration_date: String,
    #[serde(default)]
    pub last_active: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// ─── Courses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub lessons_count: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default = "default_pass_score")]
    pub pass_score: u32,
    #[serde(default)]
    pub access_type: AccessType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CourseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisite_courses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

// ─── Lessons ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Text,
    Video,
    Pdf,
    Quiz,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    #[default]
    Pdf,
    Doc,
    Link,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonMaterial {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: MaterialType,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: LessonType,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<LessonMaterial>,
    #[serde(default)]
    pub requires_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
}

// ─── Tests & questions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    #[serde(default)]
    pub id: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_pass_score")]
    pub pass_score: u32,
    /// Minutes
    #[serde(default = "default_time_limit")]
    pub time_limit: u32,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub questions_count: u32,
    #[serde(default)]
    pub status: TestStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub requires_all_lessons: bool,
    #[serde(default)]
    pub requires_all_tests: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Single,
    Multiple,
    Text,
    #[serde(alias = "match")]
    Matching,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
            QuestionType::Text => "text",
            QuestionType::Matching => "matching",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextCheckType {
    Manual,
    #[default]
    Automatic,
}

/// `correctAnswer` is a bare string for single/text questions and a list for
/// multiple-choice ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    One(String),
    Many(Vec<String>),
}

impl Default for CorrectAnswer {
    fn default() -> Self {
        CorrectAnswer::One(String::new())
    }
}

impl CorrectAnswer {
    /// All values as a slice-like list, whatever the shape.
    pub fn values(&self) -> Vec<&str> {
        match self {
            CorrectAnswer::One(s) => vec![s.as_str()],
            CorrectAnswer::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CorrectAnswer::One(s) => s.trim().is_empty(),
            CorrectAnswer::Many(v) => v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub test_id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: CorrectAnswer,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_pairs: Vec<MatchingPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_check_type: Option<TextCheckType>,
}

// ─── Rewards ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bonuses: Vec<String>,
}

// ─── Progress & assignments ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub user_id: String,
    #[serde(default)]
    pub completed_lessons: u32,
    #[serde(default)]
    pub total_lessons: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_score: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub earned_rewards: Vec<String>,
    #[serde(default)]
    pub completed_lesson_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_lesson: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

impl CourseProgress {
    /// Whole-number completion percentage; 0 for courses with no lessons.
    pub fn percent(&self) -> u32 {
        if self.total_lessons == 0 {
            return 0;
        }
        ((self.completed_lessons as f64 / self.total_lessons as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAssignment {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    #[serde(default)]
    pub assigned_by: String,
    #[serde(default)]
    pub assigned_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Submitted answer value as the progress endpoint stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    Text(String),
    Choices(Vec<String>),
    Pairs(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub test_id: String,
    pub score: u32,
    #[serde(default)]
    pub answers: BTreeMap<String, SubmittedAnswer>,
    #[serde(default)]
    pub completed_at: String,
    pub passed: bool,
}

// ─── Request bodies ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest<'a> {
    pub course_id: &'a str,
    pub lesson_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestRequest<'a> {
    pub course_id: &'a str,
    pub test_id: &'a str,
    pub answers: &'a BTreeMap<String, SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCourseRequest<'a> {
    pub course_id: &'a str,
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
}

// ─── Response envelopes ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UsersEnvelope {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct CourseEnvelope {
    pub course: Course,
}

#[derive(Debug, Deserialize)]
pub struct CoursesEnvelope {
    #[serde(default)]
    pub courses: Vec<Course>,
}

#[derive(Debug, Deserialize)]
pub struct LessonEnvelope {
    pub lesson: Lesson,
}

#[derive(Debug, Deserialize)]
pub struct LessonsEnvelope {
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialEnvelope {
    pub material: LessonMaterial,
}

#[derive(Debug, Deserialize)]
pub struct TestEnvelope {
    pub test: Test,
}

#[derive(Debug, Deserialize)]
pub struct TestsEnvelope {
    #[serde(default)]
    pub tests: Vec<Test>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionEnvelope {
    pub question: Question,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsEnvelope {
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
pub struct RewardEnvelope {
    pub reward: Reward,
}

#[derive(Debug, Deserialize)]
pub struct RewardsEnvelope {
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentEnvelope {
    pub assignment: CourseAssignment,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentsEnvelope {
    #[serde(default)]
    pub assignments: Vec<CourseAssignment>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressEnvelope {
    pub progress: CourseProgress,
}

#[derive(Debug, Deserialize)]
pub struct ProgressListEnvelope {
    #[serde(default)]
    pub progress: Vec<CourseProgress>,
}

/// Server-side grading returned by `progress?action=submit`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResponse {
    pub score: u32,
    pub passed: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageEnvelope {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

fn default_true() -> bool {
    true
}
fn default_pass_score() -> u32 {
    70
}
fn default_time_limit() -> u32 {
    60
}
fn default_attempts() -> u32 {
    3
}
fn default_points() -> u32 {
    1
}
