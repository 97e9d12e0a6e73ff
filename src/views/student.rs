use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::{mean, ratio_percent};
use crate::api::types::{Course, CourseProgress, Lesson, Reward, Test, TestStatus};

/// Where a student stands in one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseState {
    NotStarted,
    InProgress,
    Completed,
}

impl CourseState {
    pub fn of(progress: Option<&CourseProgress>) -> Self {
        match progress {
            Some(p) if p.completed => CourseState::Completed,
            Some(p) if p.completed_lessons > 0 => CourseState::InProgress,
            _ => CourseState::NotStarted,
        }
    }
}

impl fmt::Display for CourseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseState::NotStarted => write!(f, "not started"),
            CourseState::InProgress => write!(f, "in progress"),
            CourseState::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogFilter {
    #[default]
    All,
    InProgress,
    Completed,
}

impl FromStr for CatalogFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(CatalogFilter::All),
            "in-progress" | "in_progress" | "inprogress" => Ok(CatalogFilter::InProgress),
            "completed" => Ok(CatalogFilter::Completed),
            other => Err(format!(
                "unknown filter '{}' (expected all, in-progress or completed)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub course: Course,
    pub progress: Option<CourseProgress>,
    pub percent: u32,
    pub state: CourseState,
}

/// A student's course list with per-course progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// `visible` should already be gated by [`crate::access::visible_courses`].
    pub fn build(visible: &[&Course], progress: &[CourseProgress], user_id: &str) -> Self {
        let by_course: HashMap<&str, &CourseProgress> = progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| (p.course_id.as_str(), p))
            .collect();

        let entries = visible
            .iter()
            .map(|course| {
                let p = by_course.get(course.id.as_str()).copied();
                CatalogEntry {
                    course: (*course).clone(),
                    progress: p.cloned(),
                    percent: p.map(|p| p.percent()).unwrap_or(0),
                    state: CourseState::of(p),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn filtered(&self, filter: CatalogFilter) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| match filter {
                CatalogFilter::All => true,
                CatalogFilter::InProgress => e.state == CourseState::InProgress,
                CatalogFilter::Completed => e.state == CourseState::Completed,
            })
            .collect()
    }

    pub fn count(&self, filter: CatalogFilter) -> usize {
        self.filtered(filter).len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonRow {
    pub lesson: Lesson,
    pub completed: bool,
    /// Needs the previous lesson done first.
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestRow {
    pub test: Test,
    pub locked: bool,
}

/// One course with its lessons and tests as a student sees them.
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<LessonRow>,
    pub tests: Vec<TestRow>,
    pub percent: u32,
    pub state: CourseState,
    pub total_duration: u32,
}

impl CourseDetail {
    pub fn build(
        course: Course,
        mut lessons: Vec<Lesson>,
        tests: Vec<Test>,
        progress: Option<&CourseProgress>,
    ) -> Self {
        lessons.sort_by_key(|l| l.order);
        let done: BTreeSet<&str> = progress
            .map(|p| p.completed_lesson_ids.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut previous_done = true;
        let mut rows = Vec::with_capacity(lessons.len());
        for lesson in lessons {
            let completed = done.contains(lesson.id.as_str());
            let locked = lesson.requires_previous && !previous_done;
            previous_done = completed;
            rows.push(LessonRow {
                lesson,
                completed,
                locked,
            });
        }
        let all_lessons_done = rows.iter().all(|r| r.completed);

        let tests = tests
            .into_iter()
            .filter(|t| t.status == TestStatus::Published)
            .map(|test| TestRow {
                locked: test.is_final && test.requires_all_lessons && !all_lessons_done,
                test,
            })
            .collect();

        Self {
            total_duration: rows.iter().map(|r| r.lesson.duration).sum(),
            percent: progress.map(|p| p.percent()).unwrap_or(0),
            state: CourseState::of(progress),
            course,
            lessons: rows,
            tests,
        }
    }

    /// First lesson not yet completed and not locked.
    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|r| !r.completed && !r.locked)
            .map(|r| &r.lesson)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressRow {
    pub course_id: String,
    pub title: String,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub percent: u32,
    pub test_score: Option<u32>,
    pub state: CourseState,
}

/// Totals across every course a student has started.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSummary {
    pub courses_started: usize,
    pub courses_completed: usize,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub overall_percent: u32,
    pub average_score: u32,
    /// Minutes of completed courses.
    pub minutes_learned: u32,
    pub rows: Vec<ProgressRow>,
}

impl ProgressSummary {
    pub fn build(progress: &[CourseProgress], courses: &[Course], user_id: &str) -> Self {
        let titles: HashMap<&str, &Course> = courses.iter().map(|c| (c.id.as_str(), c)).collect();
        let mine: Vec<&CourseProgress> = progress.iter().filter(|p| p.user_id == user_id).collect();

        let completed_lessons: u32 = mine.iter().map(|p| p.completed_lessons).sum();
        let total_lessons: u32 = mine.iter().map(|p| p.total_lessons).sum();
        let overall_percent = if total_lessons == 0 {
            0
        } else {
            ((completed_lessons as f64 / total_lessons as f64) * 100.0).round() as u32
        };

        let rows = mine
            .iter()
            .map(|p| ProgressRow {
                course_id: p.course_id.clone(),
                title: titles
                    .get(p.course_id.as_str())
                    .map(|c| c.title.clone())
                    .unwrap_or_else(|| p.course_id.clone()),
                completed_lessons: p.completed_lessons,
                total_lessons: p.total_lessons,
                percent: p.percent(),
                test_score: p.test_score,
                state: CourseState::of(Some(*p)),
            })
            .collect();

        Self {
            courses_started: mine.len(),
            courses_completed: mine.iter().filter(|p| p.completed).count(),
            completed_lessons,
            total_lessons,
            overall_percent,
            // A zero score counts as "no score yet".
            average_score: mean(mine.iter().filter_map(|p| p.test_score).filter(|s| *s > 0)),
            minutes_learned: mine
                .iter()
                .filter(|p| p.completed)
                .filter_map(|p| titles.get(p.course_id.as_str()))
                .map(|c| c.duration)
                .sum(),
            rows,
        }
    }

    pub fn completion_rate(&self) -> u32 {
        ratio_percent(self.courses_completed, self.courses_started)
    }
}

/// Earned versus still-available rewards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RewardShelf {
    pub earned: Vec<Reward>,
    pub available: Vec<Reward>,
    pub completed_courses: usize,
}

impl RewardShelf {
    pub fn build(rewards: &[Reward], progress: &[CourseProgress], user_id: &str) -> Self {
        let mine: Vec<&CourseProgress> = progress.iter().filter(|p| p.user_id == user_id).collect();
        let earned_ids: BTreeSet<&str> = mine
            .iter()
            .flat_map(|p| p.earned_rewards.iter().map(String::as_str))
            .collect();
        let (earned, available) = rewards
            .iter()
            .cloned()
            .partition(|r| earned_ids.contains(r.id.as_str()));
        Self {
            earned,
            available,
            completed_courses: mine.iter().filter(|p| p.completed).count(),
        }
    }
}
