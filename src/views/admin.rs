use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::student::CourseState;
use super::{mean, ratio_percent};
use crate::api::types::{Course, CourseProgress, Reward, User, UserRole};

/// Headline numbers for the admin landing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub total_courses: usize,
    pub published_courses: usize,
    pub total_students: usize,
    pub completed_enrollments: usize,
    pub total_minutes: u32,
}

impl AdminDashboard {
    pub fn build(courses: &[Course], users: &[User], progress: &[CourseProgress]) -> Self {
        Self {
            total_courses: courses.len(),
            published_courses: courses.iter().filter(|c| c.published).count(),
            total_students: users.iter().filter(|u| u.role == UserRole::Student).count(),
            completed_enrollments: progress.iter().filter(|p| p.completed).count(),
            total_minutes: courses.iter().map(|c| c.duration).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseStats {
    pub course_id: String,
    pub title: String,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub average_score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentStats {
    pub user_id: String,
    pub name: String,
    pub completed: usize,
    pub in_progress: usize,
    pub average_score: u32,
}

/// Completion and score breakdowns across the whole platform.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Analytics {
    pub total_students: usize,
    pub enrollments: usize,
    pub completion_rate: u32,
    pub courses: Vec<CourseStats>,
    pub categories: BTreeMap<String, usize>,
    pub students: Vec<StudentStats>,
}

impl Analytics {
    pub fn build(courses: &[Course], users: &[User], progress: &[CourseProgress]) -> Self {
        let completed = progress.iter().filter(|p| p.completed).count();

        let course_stats = courses
            .iter()
            .map(|course| {
                let rows: Vec<&CourseProgress> =
                    progress.iter().filter(|p| p.course_id == course.id).collect();
                let (done, active, idle) = tally(&rows);
                CourseStats {
                    course_id: course.id.clone(),
                    title: course.title.clone(),
                    completed: done,
                    in_progress: active,
                    not_started: idle,
                    average_score: scored_mean(&rows),
                }
            })
            .collect();

        let mut categories = BTreeMap::new();
        for course in courses {
            let key = if course.category.trim().is_empty() {
                "uncategorized".to_string()
            } else {
                course.category.clone()
            };
            *categories.entry(key).or_insert(0) += 1;
        }

        let students: Vec<StudentStats> = users
            .iter()
            .filter(|u| u.role == UserRole::Student)
            .map(|user| {
                let rows: Vec<&CourseProgress> =
                    progress.iter().filter(|p| p.user_id == user.id).collect();
                let (done, active, _) = tally(&rows);
                StudentStats {
                    user_id: user.id.clone(),
                    name: user.name.clone(),
                    completed: done,
                    in_progress: active,
                    average_score: scored_mean(&rows),
                }
            })
            .collect();

        Self {
            total_students: students.len(),
            enrollments: progress.len(),
            completion_rate: ratio_percent(completed, progress.len()),
            courses: course_stats,
            categories,
            students,
        }
    }
}

/// (completed, in progress, not started)
fn tally(rows: &[&CourseProgress]) -> (usize, usize, usize) {
    rows.iter()
        .fold((0, 0, 0), |(c, i, n), p| match CourseState::of(Some(*p)) {
            CourseState::Completed => (c + 1, i, n),
            CourseState::InProgress => (c, i + 1, n),
            CourseState::NotStarted => (c, i, n + 1),
        })
}

fn scored_mean(rows: &[&CourseProgress]) -> u32 {
    mean(rows.iter().filter_map(|p| p.test_score).filter(|s| *s > 0))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardCount {
    pub reward_id: String,
    pub name: String,
    pub earned: usize,
}

/// Reward catalogue figures for the admin rewards page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardStats {
    pub total_rewards: usize,
    pub total_earned: usize,
    pub courses_with_rewards: usize,
    pub per_reward: Vec<RewardCount>,
}

impl RewardStats {
    pub fn build(rewards: &[Reward], progress: &[CourseProgress]) -> Self {
        let per_reward = rewards
            .iter()
            .map(|r| RewardCount {
                reward_id: r.id.clone(),
                name: r.name.clone(),
                earned: progress
                    .iter()
                    .filter(|p| p.earned_rewards.contains(&r.id))
                    .count(),
            })
            .collect();
        Self {
            total_rewards: rewards.len(),
            total_earned: progress.iter().map(|p| p.earned_rewards.len()).sum(),
            courses_with_rewards: rewards
                .iter()
                .map(|r| r.course_id.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            per_reward,
        }
    }
}

/// Search plus role filter for the users table.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: String,
    pub role: Option<UserRole>,
}

impl UserFilter {
    pub fn new(search: impl Into<String>, role: Option<UserRole>) -> Self {
        Self {
            search: search.into(),
            role,
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || user.name.to_lowercase().contains(&needle)
            || user.email.to_lowercase().contains(&needle)
    }

    pub fn apply<'a>(&self, users: &'a [User]) -> Vec<&'a User> {
        users.iter().filter(|u| self.matches(u)).collect()
    }
}
