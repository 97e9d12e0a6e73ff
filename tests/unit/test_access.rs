//! Unit tests for course visibility and assignment sync
//!
//! Tests cover:
//! - Visibility of open and closed courses per role
//! - Students whose server keeps assignment records admin-only
//! - Sync reporting each student separately
//! - Conflicts and missing records treated as already in place
//! - A failed read of the current assignments aborting the sync

use lectern::access::{
    can_access, sync_assignments, visible_courses, OwnAssignments, SyncOptions, SyncOutcome,
};
use lectern::api::types::{AccessType, Course, CourseAssignment, User, UserRole};
use lectern::auth::Session;
use lectern::errors::{ApiError, LecternError};
use lectern::testing::mock_api::{MockLmsServer, MockReply};
use lectern::ApiClient;

fn session(id: &str, role: UserRole) -> Session {
    Session {
        token: "t".into(),
        user: User {
            id: id.into(),
            email: format!("{}@company.com", id),
            name: id.into(),
            role,
            registration_date: String::new(),
            last_active: String::new(),
            position: None,
            department: None,
            phone: None,
            avatar: None,
            is_active: true,
        },
    }
}

fn course(id: &str, access: AccessType) -> Course {
    Course {
        id: id.into(),
        title: id.into(),
        access_type: access,
        ..Default::default()
    }
}

fn assignment(course_id: &str, user_id: &str) -> CourseAssignment {
    serde_json::from_value(serde_json::json!({
        "id": format!("{}-{}", course_id, user_id),
        "courseId": course_id,
        "userId": user_id,
        "status": "completed",
    }))
    .unwrap()
}

fn reply(status: u16, body: &str) -> MockReply {
    MockReply {
        status,
        body: body.into(),
    }
}

// ============================================================================
// Visibility
// ============================================================================

mod visibility_tests {
    use super::*;

    #[test]
    fn test_student_sees_open_and_assigned() {
        let courses = vec![
            course("open", AccessType::Open),
            course("mine", AccessType::Closed),
            course("theirs", AccessType::Closed),
        ];
        let assignments = vec![assignment("mine", "s1"), assignment("theirs", "s2")];
        let student = session("s1", UserRole::Student);

        let ids: Vec<&str> = visible_courses(&courses, &assignments, &student)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();

        assert_eq!(ids, vec!["open", "mine"]);
        assert!(!can_access(&courses[2], &assignments, &student));
    }

    #[test]
    fn test_admin_sees_everything() {
        let courses = vec![course("a", AccessType::Closed), course("b", AccessType::Closed)];
        let admin = session("root", UserRole::Admin);
        assert_eq!(visible_courses(&courses, &[], &admin).len(), 2);
        assert!(can_access(&courses[0], &[], &admin));
    }
    #[tokio::test]
    async fn test_refused_lookup_trusts_server_filtering() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/assignments",
                &[("userId", "s1")],
                403,
                r#"{"error":"admin only"}"#,
            )
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();
        let student = session("s1", UserRole::Student);

        let own = OwnAssignments::fetch(&api, &student).await.unwrap();

        assert_eq!(own, OwnAssignments::ServerFiltered);
        let courses = vec![course("open", AccessType::Open), course("closed", AccessType::Closed)];
        assert_eq!(own.visible(&courses, &student).len(), 2);
        assert!(own.can_access(&courses[1], &student));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_records_still_gate_when_shared() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/assignments",
                &[("userId", "s1")],
                200,
                r#"{"assignments":[]}"#,
            )
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();
        let student = session("s1", UserRole::Student);

        let own = OwnAssignments::fetch(&api, &student).await.unwrap();

        assert_eq!(own, OwnAssignments::Records(vec![]));
        assert!(!own.can_access(&course("closed", AccessType::Closed), &student));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_admin_refusal_is_an_error() {
        let server = MockLmsServer::builder()
            .route("GET", "/assignments", &[("userId", "root")], 403, r#"{"error":"no"}"#)
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();

        let err = OwnAssignments::fetch(&api, &session("root", UserRole::Admin))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Forbidden(_)));
        server.stop().await;
    }
}

// ============================================================================
// Sync
// ============================================================================

mod sync_tests {
    use super::*;

    #[tokio::test]
    async fn test_mixed_outcomes_reported_per_student() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/assignments",
                &[("courseId", "c1")],
                200,
                r#"{"assignments":[
                    {"id":"a1","courseId":"c1","userId":"u1"},
                    {"id":"a5","courseId":"c1","userId":"u5"},
                    {"id":"a6","courseId":"c1","userId":"u6"}
                ]}"#,
            )
            // new students are assigned in id order: u2, u3, u4
            .route_sequence(
                "POST",
                "/assignments",
                &[],
                vec![
                    reply(201, r#"{"assignment":{"id":"a2","courseId":"c1","userId":"u2"}}"#),
                    reply(409, r#"{"error":"Already assigned"}"#),
                    reply(500, r#"{"error":"db down"}"#),
                ],
            )
            .route(
                "DELETE",
                "/assignments",
                &[("courseId", "c1"), ("userId", "u5")],
                200,
                "{}",
            )
            .route(
                "DELETE",
                "/assignments",
                &[("courseId", "c1"), ("userId", "u6")],
                404,
                r#"{"error":"No such assignment"}"#,
            )
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();
        let desired: Vec<String> = ["u1", "u2", "u3", "u4"].iter().map(|s| s.to_string()).collect();

        let report = sync_assignments(
            &api,
            "c1",
            &desired,
            &SyncOptions {
                due_date: Some("2026-11-30"),
                notes: None,
            },
        )
        .await
        .unwrap();

        let outcome = |user: &str| {
            report
                .items
                .iter()
                .find(|i| i.user_id == user)
                .map(|i| i.outcome.clone())
        };
        assert_eq!(outcome("u1"), None);
        assert_eq!(outcome("u2"), Some(SyncOutcome::Assigned));
        assert_eq!(outcome("u3"), Some(SyncOutcome::Unchanged));
        assert!(matches!(outcome("u4"), Some(SyncOutcome::Failed { .. })));
        assert_eq!(outcome("u5"), Some(SyncOutcome::Unassigned));
        assert_eq!(outcome("u6"), Some(SyncOutcome::Unassigned));

        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
        let assigned: Vec<&str> = report.assigned.iter().map(String::as_str).collect();
        assert_eq!(assigned, vec!["u1", "u2", "u3"]);

        let posted = server.requests_to("POST", "/assignments").await;
        assert_eq!(posted.len(), 3);
        assert_eq!(posted[0].json().unwrap()["dueDate"], "2026-11-30");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/assignments",
                &[("courseId", "c1")],
                200,
                r#"{"assignments":[{"id":"a1","courseId":"c1","userId":"u1"}]}"#,
            )
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();

        let report = sync_assignments(&api, "c1", &[" u1 ".to_string()], &SyncOptions::default())
            .await
            .unwrap();

        assert!(report.items.is_empty());
        assert_eq!(report.changed(), 0);
        assert_eq!(server.requests().await.len(), 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_unreadable_current_set_aborts() {
        let server = MockLmsServer::builder()
            .route("GET", "/assignments", &[], 403, r#"{"error":"Admins only"}"#)
            .build()
            .await
            .unwrap();
        let api = ApiClient::new(&server.config()).unwrap();

        let err = sync_assignments(&api, "c1", &["u1".to_string()], &SyncOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LecternError::Api(_)));
        assert_eq!(server.requests().await.len(), 1);
        server.stop().await;
    }
}
