//! Route table and role gate.
//!
//! Paths follow the web front end (`/login`, `/admin/...`, `/student/...`).
//! Every CLI command resolves to one of these routes and is checked against
//! the current session before it runs.

use crate::api::types::UserRole;
use crate::auth::Session;
use crate::errors::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,

    AdminDashboard,
    AdminCourses,
    /// `None` opens a blank draft.
    AdminCourseEdit(Option<String>),
    AdminCourseView(String),
    AdminUsers,
    AdminTests,
    AdminTestEdit(Option<String>),
    AdminTestView(String),
    AdminRewards,
    AdminAnalytics,
    AdminAssignments,

    StudentDashboard,
    StudentCourses,
    StudentCourse(String),
    StudentTest { course_id: String, test_id: String },
    StudentProfile,
    StudentRewards,
    StudentProgress,

    NotFound(String),
}

/// Outcome of checking a route against the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectToLogin,
}

impl Route {
    /// Map a URL path to a route. Trailing slashes and query strings are ignored.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,

            ["admin"] | ["admin", "dashboard"] => Route::AdminDashboard,
            ["admin", "courses"] => Route::AdminCourses,
            ["admin", "courses", "edit"] => Route::AdminCourseEdit(None),
            ["admin", "courses", "edit", id] => Route::AdminCourseEdit(Some(id.to_string())),
            ["admin", "courses", "view", id] => Route::AdminCourseView(id.to_string()),
            ["admin", "users"] => Route::AdminUsers,
            ["admin", "tests"] => Route::AdminTests,
            ["admin", "tests", "edit"] => Route::AdminTestEdit(None),
            ["admin", "tests", "edit", id] => Route::AdminTestEdit(Some(id.to_string())),
            ["admin", "tests", "view", id] => Route::AdminTestView(id.to_string()),
            ["admin", "rewards"] => Route::AdminRewards,
            ["admin", "analytics"] => Route::AdminAnalytics,
            ["admin", "assignments"] => Route::AdminAssignments,

            ["student"] | ["student", "dashboard"] => Route::StudentDashboard,
            ["student", "courses"] => Route::StudentCourses,
            ["student", "courses", id] => Route::StudentCourse(id.to_string()),
            ["student", "courses", course, "test", test] => Route::StudentTest {
                course_id: course.to_string(),
                test_id: test.to_string(),
            },
            ["student", "profile"] => Route::StudentProfile,
            ["student", "rewards"] => Route::StudentRewards,
            ["student", "progress"] => Route::StudentProgress,

            _ => Route::NotFound(path.to_string()),
        }
    }

    /// Canonical path for this route.
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".into(),
            Route::Login => "/login".into(),
            Route::AdminDashboard => "/admin/dashboard".into(),
            Route::AdminCourses => "/admin/courses".into(),
            Route::AdminCourseEdit(None) => "/admin/courses/edit".into(),
            Route::AdminCourseEdit(Some(id)) => format!("/admin/courses/edit/{}", id),
            Route::AdminCourseView(id) => format!("/admin/courses/view/{}", id),
            Route::AdminUsers => "/admin/users".into(),
            Route::AdminTests => "/admin/tests".into(),
            Route::AdminTestEdit(None) => "/admin/tests/edit".into(),
            Route::AdminTestEdit(Some(id)) => format!("/admin/tests/edit/{}", id),
            Route::AdminTestView(id) => format!("/admin/tests/view/{}", id),
            Route::AdminRewards => "/admin/rewards".into(),
            Route::AdminAnalytics => "/admin/analytics".into(),
            Route::AdminAssignments => "/admin/assignments".into(),
            Route::StudentDashboard => "/student/dashboard".into(),
            Route::StudentCourses => "/student/courses".into(),
            Route::StudentCourse(id) => format!("/student/courses/{}", id),
            Route::StudentTest { course_id, test_id } => {
                format!("/student/courses/{}/test/{}", course_id, test_id)
            }
            Route::StudentProfile => "/student/profile".into(),
            Route::StudentRewards => "/student/rewards".into(),
            Route::StudentProgress => "/student/progress".into(),
            Route::NotFound(path) => path.clone(),
        }
    }

    /// Role a route is reserved for; `None` for public routes.
    pub fn required_role(&self) -> Option<UserRole> {
        match self {
            Route::Home | Route::Login | Route::NotFound(_) => None,
            Route::AdminDashboard
            | Route::AdminCourses
            | Route::AdminCourseEdit(_)
            | Route::AdminCourseView(_)
            | Route::AdminUsers
            | Route::AdminTests
            | Route::AdminTestEdit(_)
            | Route::AdminTestView(_)
            | Route::AdminRewards
            | Route::AdminAnalytics
            | Route::AdminAssignments => Some(UserRole::Admin),
            _ => Some(UserRole::Student),
        }
    }

    /// Unauthenticated or wrong-role access redirects to login.
    pub fn check(&self, session: Option<&Session>) -> Access {
        match (self.required_role(), session) {
            (None, _) => Access::Allow,
            (Some(_), None) => Access::RedirectToLogin,
            (Some(role), Some(s)) if s.role() == role => Access::Allow,
            (Some(_), Some(_)) => Access::RedirectToLogin,
        }
    }

    /// [`check`](Self::check) as a typed error, for command handlers.
    pub fn authorize(&self, session: Option<&Session>) -> Result<(), AuthError> {
        match self.check(session) {
            Access::Allow => Ok(()),
            Access::RedirectToLogin => match (session, self.required_role()) {
                (Some(_), Some(role)) => Err(AuthError::WrongRole {
                    route: self.path(),
                    required: role.to_string(),
                }),
                _ => Err(AuthError::NotLoggedIn),
            },
        }
    }

    /// Where a freshly logged-in user lands.
    pub fn home_for(role: UserRole) -> Route {
        match role {
            UserRole::Admin => Route::AdminDashboard,
            UserRole::Student => Route::StudentDashboard,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}
