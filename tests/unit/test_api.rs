//! Unit tests for the HTTP client
//!
//! Tests cover:
//! - Token header on authenticated requests
//! - Envelope unwrapping for lists and single records
//! - Query parameters selecting sub-operations
//! - Status codes mapped to typed errors
//! - Create, update and delete round trips

use lectern::api::types::{AssignCourseRequest, Course, QuestionType, SubmittedAnswer};
use lectern::api::{ApiClient, LmsApi, AUTH_HEADER};
use lectern::config::Collection;
use lectern::errors::ApiError;
use lectern::testing::mock_api::{MockLmsServer, MockReply};
use std::collections::BTreeMap;

fn client(server: &MockLmsServer, token: Option<&str>) -> ApiClient {
    ApiClient::new(&server.config())
        .unwrap()
        .with_token(token.map(str::to_string))
}

// ============================================================================
// Request shape
// ============================================================================

mod request_tests {
    use super::*;

    #[tokio::test]
    async fn test_token_sent_in_header() {
        let server = MockLmsServer::builder()
            .route("GET", "/courses", &[], 200, r#"{"courses":[]}"#)
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("tok-123"));

        api.list_courses().await.unwrap();

        let requests = server.requests_to("GET", "/courses").await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header(AUTH_HEADER), Some("tok-123"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_no_header_without_token() {
        let server = MockLmsServer::builder()
            .route("GET", "/rewards", &[], 200, r#"{"rewards":[]}"#)
            .build()
            .await
            .unwrap();
        let api = client(&server, None);

        api.list_rewards().await.unwrap();

        let requests = server.requests().await;
        assert!(requests[0].header(AUTH_HEADER).is_none());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_url_appends_query_pairs() {
        let server = MockLmsServer::builder().build().await.unwrap();
        let api = client(&server, None);

        let url = api
            .url(Collection::Tests, &[("testId", "t 1"), ("action", "questions")])
            .unwrap();

        assert_eq!(url.path(), "/tests");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("testId".to_string(), "t 1".to_string()),
                ("action".to_string(), "questions".to_string()),
            ]
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_questions_selected_by_action() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/tests",
                &[("testId", "t1"), ("action", "questions")],
                200,
                r#"{"questions":[
                    {"id":"q2","type":"multiple","text":"Pick","options":["a","b"],"correctAnswer":["a"],"order":2},
                    {"id":"q1","type":"match","text":"Pair","order":1}
                ]}"#,
            )
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));

        let questions = api.list_questions("t1").await.unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].kind, QuestionType::Multiple);
        assert_eq!(questions[1].kind, QuestionType::Matching);
        assert_eq!(questions[1].points, 1);
        server.stop().await;
    }
}

// ============================================================================
// Envelopes and payloads
// ============================================================================

mod payload_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_course_unwraps_envelope() {
        let server = MockLmsServer::builder()
            .route(
                "GET",
                "/courses",
                &[("id", "c1")],
                200,
                r#"{"course":{"id":"c1","title":"Safety","accessType":"closed","passScore":80}}"#,
            )
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));

        let course = api.get_course("c1").await.unwrap();

        assert_eq!(course.id, "c1");
        assert_eq!(course.title, "Safety");
        assert_eq!(course.pass_score, 80);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_create_sends_camel_case_body() {
        let server = MockLmsServer::builder()
            .route(
                "POST",
                "/courses",
                &[],
                201,
                r#"{"course":{"id":"c9","title":"New","passScore":70}}"#,
            )
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));
        let draft = Course {
            title: "New".into(),
            pass_score: 70,
            ..Default::default()
        };

        let created = api.create_course(&draft).await.unwrap();

        assert_eq!(created.id, "c9");
        let body = server.requests_to("POST", "/courses").await[0]
            .json()
            .unwrap();
        assert_eq!(body["title"], "New");
        assert_eq!(body["passScore"], 70);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_delete_accepts_message_body() {
        let server = MockLmsServer::builder()
            .route("DELETE", "/lessons", &[("id", "l1")], 200, r#"{"message":"deleted"}"#)
            .route("DELETE", "/rewards", &[("id", "r1")], 200, "{}")
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));

        api.delete_lesson("l1").await.unwrap();
        api.delete_reward("r1").await.unwrap();

        assert_eq!(server.requests().await.len(), 2);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_assign_and_unassign() {
        let server = MockLmsServer::builder()
            .route(
                "POST",
                "/assignments",
                &[],
                201,
                r#"{"assignment":{"id":"a1","courseId":"c1","userId":"u1","dueDate":"2026-12-01"}}"#,
            )
            .route(
                "DELETE",
                "/assignments",
                &[("courseId", "c1"), ("userId", "u1")],
                200,
                "{}",
            )
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));

        let assignment = api
            .assign_course(&AssignCourseRequest {
                course_id: "c1",
                user_id: "u1",
                due_date: Some("2026-12-01"),
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(assignment.due_date.as_deref(), Some("2026-12-01"));

        api.unassign_course("c1", "u1").await.unwrap();

        let posted = server.requests_to("POST", "/assignments").await[0]
            .json()
            .unwrap();
        assert_eq!(posted["courseId"], "c1");
        assert_eq!(posted["userId"], "u1");
        assert!(posted.get("notes").is_none());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_submit_test_posts_answers() {
        let server = MockLmsServer::builder()
            .route(
                "POST",
                "/progress",
                &[("action", "submit")],
                200,
                r#"{"score":80,"passed":true}"#,
            )
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), SubmittedAnswer::Text("Paris".into()));
        answers.insert(
            "q2".to_string(),
            SubmittedAnswer::Choices(vec!["a".into(), "c".into()]),
        );

        let response = api.submit_test("c1", "t1", &answers).await.unwrap();

        assert_eq!(response.score, 80);
        assert!(response.passed);
        let body = server.requests().await[0].json().unwrap();
        assert_eq!(body["testId"], "t1");
        assert_eq!(body["answers"]["q1"], "Paris");
        assert_eq!(body["answers"]["q2"][1], "c");
        server.stop().await;
    }
}

// ============================================================================
// Error mapping
// ============================================================================

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_status_codes_map_to_variants() {
        let server = MockLmsServer::builder()
            .route("GET", "/courses", &[("id", "gone")], 404, r#"{"error":"Course not found"}"#)
            .route("GET", "/users", &[], 403, r#"{"error":"Admins only"}"#)
            .route("GET", "/auth", &[("action", "me")], 401, r#"{"error":"Session expired"}"#)
            .route("POST", "/assignments", &[], 409, r#"{"error":"Already assigned"}"#)
            .build()
            .await
            .unwrap();
        let api = client(&server, Some("t"));

        assert_eq!(
            api.get_course("gone").await.unwrap_err(),
            ApiError::NotFound("Course not found".into())
        );
        assert_eq!(
            api.list_users().await.unwrap_err(),
            ApiError::Forbidden("Admins only".into())
        );
        let err = api.me().await.unwrap_err();
        assert!(err.is_auth_failure());
        let err = api
            .assign_course(&AssignCourseRequest {
                course_id: "c",
                user_id: "u",
                due_date: None,
                notes: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Conflict("Already assigned".into()));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_non_json_error_uses_reason_phrase() {
        let server = MockLmsServer::builder()
            .route("GET", "/rewards", &[], 500, "boom")
            .build()
            .await
            .unwrap();
        let api = client(&server, None);

        match api.list_rewards().await.unwrap_err() {
            ApiError::HttpStatus { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        server.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let server = MockLmsServer::builder().build().await.unwrap();
        let api = client(&server, None);

        let err = api.list_tests("c1").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockLmsServer::builder()
            .route("GET", "/courses", &[], 200, r#"{"courses":"nope"}"#)
            .build()
            .await
            .unwrap();
        let api = client(&server, None);

        let err = api.list_courses().await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_reply_sequence_advances() {
        let server = MockLmsServer::builder()
            .route_sequence(
                "GET",
                "/rewards",
                &[],
                vec![
                    MockReply {
                        status: 500,
                        body: r#"{"error":"warming up"}"#.into(),
                    },
                    MockReply {
                        status: 200,
                        body: r#"{"rewards":[{"id":"r1","name":"Gold","courseId":"c1"}]}"#.into(),
                    },
                ],
            )
            .build()
            .await
            .unwrap();
        let api = client(&server, None);

        assert!(api.list_rewards().await.is_err());
        let rewards = api.list_rewards().await.unwrap();
        assert_eq!(rewards[0].name, "Gold");
        server.stop().await;
    }
}
