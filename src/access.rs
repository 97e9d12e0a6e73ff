//! Course visibility and assignment management.
//!
//! A student sees every open course plus every course they hold an
//! assignment record for. The set is recomputed from the two lists on each
//! call. Assignment changes go through [`sync_assignments`], which only
//! reports a student as assigned or unassigned once the server confirmed it.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::types::{AccessType, AssignCourseRequest, Course, CourseAssignment};
use crate::api::LmsApi;
use crate::auth::Session;
use crate::errors::{ApiError, LecternError};

/// Courses the session may open, in catalog order.
pub fn visible_courses<'a>(
    courses: &'a [Course],
    assignments: &[CourseAssignment],
    session: &Session,
) -> Vec<&'a Course> {
    if session.is_admin() {
        return courses.iter().collect();
    }
    let assigned = assigned_course_ids(assignments, &session.user.id);
    courses
        .iter()
        .filter(|c| c.access_type == AccessType::Open || assigned.contains(c.id.as_str()))
        .collect()
}

pub fn can_access(course: &Course, assignments: &[CourseAssignment], session: &Session) -> bool {
    session.is_admin()
        || course.access_type == AccessType::Open
        || assigned_course_ids(assignments, &session.user.id).contains(course.id.as_str())
}

/// Every record counts, whatever its status.
fn assigned_course_ids<'a>(assignments: &'a [CourseAssignment], user_id: &str) -> BTreeSet<&'a str> {
    assignments
        .iter()
        .filter(|a| a.user_id == user_id)
        .map(|a| a.course_id.as_str())
        .collect()
}

/// A student's own assignment records, as far as the server shares them.
///
/// Backends that keep the assignments collection admin-only refuse the
/// lookup with 403. Their course endpoints already filter by assignment, so
/// every course such a server returns is reachable.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnAssignments {
    Records(Vec<CourseAssignment>),
    ServerFiltered,
}

impl OwnAssignments {
    pub async fn fetch(api: &dyn LmsApi, session: &Session) -> Result<Self, ApiError> {
        match api.assignments_for_user(&session.user.id).await {
            Ok(records) => Ok(OwnAssignments::Records(records)),
            Err(ApiError::Forbidden(reason)) if !session.is_admin() => {
                debug!(%reason, "Assignment lookup refused, trusting server-side filtering");
                Ok(OwnAssignments::ServerFiltered)
            }
            Err(e) => Err(e),
        }
    }

    pub fn visible<'a>(&self, courses: &'a [Course], session: &Session) -> Vec<&'a Course> {
        match self {
            OwnAssignments::Records(records) => visible_courses(courses, records, session),
            OwnAssignments::ServerFiltered => courses.iter().collect(),
        }
    }

    pub fn can_access(&self, course: &Course, session: &Session) -> bool {
        match self {
            OwnAssignments::Records(records) => can_access(course, records, session),
            OwnAssignments::ServerFiltered => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Assigned,
    Unassigned,
    Unchanged,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncItem {
    pub user_id: String,
    pub outcome: SyncOutcome,
}

/// Per-student result of one batch sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub course_id: String,
    pub items: Vec<SyncItem>,
    /// Students assigned on the server after the sync, as far as confirmed.
    pub assigned: BTreeSet<String>,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &SyncItem> {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, SyncOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn changed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, SyncOutcome::Assigned | SyncOutcome::Unassigned))
            .count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions<'a> {
    pub due_date: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Bring a course's assignments in line with `desired`.
///
/// Fetches the current records, assigns the missing students and unassigns
/// the extra ones. Each call is reported on its own; one failure does not
/// stop the rest. Fails outright only when the current set cannot be read.
pub async fn sync_assignments(
    api: &dyn LmsApi,
    course_id: &str,
    desired: &[String],
    options: &SyncOptions<'_>,
) -> Result<SyncReport, LecternError> {
    let current: BTreeSet<String> = api
        .assignments_for_course(course_id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();
    let desired: BTreeSet<String> = desired
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    debug!(
        course = course_id,
        current = current.len(),
        desired = desired.len(),
        "Syncing assignments"
    );

    let mut report = SyncReport {
        course_id: course_id.to_string(),
        items: Vec::new(),
        assigned: current.clone(),
    };

    for user_id in desired.difference(&current) {
        let request = AssignCourseRequest {
            course_id,
            user_id,
            due_date: options.due_date,
            notes: options.notes,
        };
        let outcome = match api.assign_course(&request).await {
            Ok(_) => {
                report.assigned.insert(user_id.clone());
                SyncOutcome::Assigned
            }
            // Someone else got there first; the server state already matches.
            Err(ApiError::Conflict(_)) => {
                report.assigned.insert(user_id.clone());
                SyncOutcome::Unchanged
            }
            Err(e) => {
                warn!("Failed to assign {} to {}: {}", user_id, course_id, e);
                SyncOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report.items.push(SyncItem {
            user_id: user_id.clone(),
            outcome,
        });
    }

    for user_id in current.difference(&desired) {
        let outcome = match api.unassign_course(course_id, user_id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => {
                report.assigned.remove(user_id);
                SyncOutcome::Unassigned
            }
            Err(e) => {
                warn!("Failed to unassign {} from {}: {}", user_id, course_id, e);
                SyncOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report.items.push(SyncItem {
            user_id: user_id.clone(),
            outcome,
        });
    }

    info!(
        course = course_id,
        changed = report.changed(),
        failed = report.failures().count(),
        "Assignment sync finished"
    );
    Ok(report)
}
