//! Unit tests for view models
//!
//! Tests cover:
//! - Stale responses never overwriting a newer load
//! - The catalog built from an API fetch behind the access gate
//! - Lesson and final-test locking in the course detail
//! - Admin analytics tallies

use lectern::access::visible_courses;
use lectern::api::types::{
    Course, CourseProgress, Lesson, Test, TestStatus, User, UserRole,
};
use lectern::api::LmsApi;
use lectern::auth::Session;
use lectern::errors::ApiError;
use lectern::testing::mock_api::MockLmsServer;
use lectern::views::{Analytics, Catalog, CatalogFilter, CourseDetail, CourseState, ViewState};
use lectern::ApiClient;

fn student(id: &str) -> User {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "email": format!("{}@company.com", id),
        "name": id.to_uppercase(),
        "role": "student",
    }))
    .unwrap()
}

fn progress(user: &str, course: &str, done: &[&str], total: u32, score: Option<u32>) -> CourseProgress {
    CourseProgress {
        course_id: course.into(),
        user_id: user.into(),
        completed_lessons: done.len() as u32,
        total_lessons: total,
        test_score: score,
        completed: done.len() as u32 == total && total > 0,
        completed_lesson_ids: done.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

// ============================================================================
// Load guard
// ============================================================================

mod view_state_tests {
    use super::*;

    #[test]
    fn test_late_response_is_discarded() {
        let mut view: ViewState<Vec<u32>> = ViewState::new();
        let first = view.begin();
        let second = view.begin();

        assert!(view.apply(second, Ok(vec![2])));
        assert!(!view.apply(first, Ok(vec![1])));

        assert_eq!(view.data(), Some(&vec![2]));
        assert!(!view.is_loading());
    }

    #[test]
    fn test_error_keeps_previous_data() {
        let mut view: ViewState<&str> = ViewState::new();
        let ticket = view.begin();
        view.apply(ticket, Ok("catalog"));

        let result = tokio_test::block_on(
            view.load(async { Err::<&str, _>(ApiError::Timeout) }),
        );

        assert_eq!(result.unwrap_err(), ApiError::Timeout);
        assert_eq!(view.data(), Some(&"catalog"));
        assert_eq!(view.error(), Some("Request timed out"));
    }

    #[tokio::test]
    async fn test_load_from_api() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/courses",
                &[],
                200,
                r#"{"courses":[{"id":"c1","title":"Intro"}]}"#,
            )
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();
        let mut view = ViewState::new();

        let courses = view.load(api.list_courses()).await.unwrap();

        assert_eq!(courses[0].title, "Intro");
        server.stop().await;
    }
}

// ============================================================================
// Student views
// ============================================================================

mod student_view_tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_behind_access_gate() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/courses",
                &[],
                200,
                r#"{"courses":[
                    {"id":"open","title":"Open","accessType":"open"},
                    {"id":"closed","title":"Closed","accessType":"closed"},
                    {"id":"assigned","title":"Assigned","accessType":"closed"}
                ]}"#,
            )
            .route(
                "GET",
                "/assignments",
                &[("userId", "s1")],
                200,
                r#"{"assignments":[{"id":"a1","courseId":"assigned","userId":"s1","status":"overdue"}]}"#,
            )
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();
        let session = Session {
            token: "t".into(),
            user: student("s1"),
        };

        let courses = api.list_courses().await.unwrap();
        let assignments = api.assignments_for_user("s1").await.unwrap();
        let visible = visible_courses(&courses, &assignments, &session);
        let progress = vec![
            progress("s1", "assigned", &["l1"], 3, None),
            progress("s2", "open", &["l1"], 1, Some(90)),
        ];
        let catalog = Catalog::build(&visible, &progress, "s1");

        assert_eq!(catalog.count(CatalogFilter::All), 2);
        let in_progress = catalog.filtered(CatalogFilter::InProgress);
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].course.id, "assigned");
        assert_eq!(in_progress[0].percent, 33);
        assert_eq!(catalog.count(CatalogFilter::Completed), 0);
        server.stop().await;
    }

    #[test]
    fn test_course_detail_locks() {
        let lesson = |id: &str, order: u32, requires_previous: bool| Lesson {
            id: id.into(),
            course_id: "c1".into(),
            title: id.into(),
            order,
            duration: 10,
            requires_previous,
            ..Default::default()
        };
        let final_test = Test {
            id: "final".into(),
            course_id: "c1".into(),
            title: "Final".into(),
            status: TestStatus::Published,
            is_final: true,
            requires_all_lessons: true,
            ..Default::default()
        };
        let draft_test = Test {
            id: "draft".into(),
            course_id: "c1".into(),
            title: "Draft".into(),
            ..Default::default()
        };
        let course = Course {
            id: "c1".into(),
            title: "Course".into(),
            ..Default::default()
        };
        let p = progress("s1", "c1", &["l1"], 3, None);

        let detail = CourseDetail::build(
            course,
            vec![lesson("l3", 3, true), lesson("l1", 1, false), lesson("l2", 2, true)],
            vec![final_test, draft_test],
            Some(&p),
        );

        let locked: Vec<bool> = detail.lessons.iter().map(|r| r.locked).collect();
        assert_eq!(locked, vec![false, false, true]);
        assert_eq!(detail.next_lesson().unwrap().id, "l2");
        assert_eq!(detail.tests.len(), 1);
        assert!(detail.tests[0].locked);
        assert_eq!(detail.total_duration, 30);
        assert_eq!(detail.state, CourseState::InProgress);
    }
}

// ============================================================================
// Admin views
// ============================================================================

mod admin_view_tests {
    use super::*;

    #[test]
    fn test_analytics_tallies() {
        let courses = vec![
            Course {
                id: "c1".into(),
                title: "One".into(),
                category: "safety".into(),
                ..Default::default()
            },
            Course {
                id: "c2".into(),
                title: "Two".into(),
                ..Default::default()
            },
        ];
        let mut admin = student("boss");
        admin.role = UserRole::Admin;
        let users = vec![student("s1"), student("s2"), admin];
        let progress = vec![
            progress("s1", "c1", &["a", "b"], 2, Some(80)),
            progress("s2", "c1", &["a"], 2, Some(0)),
            progress("s2", "c2", &[], 4, None),
        ];

        let analytics = Analytics::build(&courses, &users, &progress);

        assert_eq!(analytics.total_students, 2);
        assert_eq!(analytics.enrollments, 3);
        assert_eq!(analytics.completion_rate, 33);
        assert_eq!(analytics.courses[0].completed, 1);
        assert_eq!(analytics.courses[0].in_progress, 1);
        assert_eq!(analytics.courses[0].average_score, 80);
        assert_eq!(analytics.courses[1].not_started, 1);
        assert_eq!(analytics.categories.get("uncategorized"), Some(&1));
        assert_eq!(analytics.students[1].in_progress, 1);
    }
}
