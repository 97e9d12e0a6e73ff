//! Tests for the `lectern` binary
//!
//! Tests cover:
//! - Help and argument errors
//! - Exit codes for a missing session and a wrong role
//! - Offline login followed by commands that read the session
//! - The course catalog fetched from a live mock server
//! - The catalog when the server keeps assignment records admin-only

use assert_cmd::Command;
use lectern::testing::mock_api::MockLmsServer;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command isolated from the user's config and session.
fn lectern(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lectern").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("LECTERN_SESSION_FILE", home.path().join("session.json"))
        .env("NO_COLOR", "1")
        .env_remove("LECTERN_TOKEN")
        .env_remove("LECTERN_BASE_URL");
    cmd
}

fn offline_login(home: &TempDir, email: &str) {
    lectern(home)
        .args(["login", "--email", email, "--password", "demo", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in"));
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    lectern(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("take-test"));
}

#[test]
fn test_unknown_filter_rejected() {
    let home = TempDir::new().unwrap();
    lectern(&home)
        .args(["courses", "--filter", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn test_whoami_without_session() {
    let home = TempDir::new().unwrap();
    lectern(&home)
        .arg("whoami")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_offline_login_then_whoami_and_logout() {
    let home = TempDir::new().unwrap();
    offline_login(&home, "student@company.com");

    lectern(&home)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("student@company.com"))
        .stdout(predicate::str::contains("/student/dashboard"));

    // the server is unreachable; the local session still goes
    lectern(&home)
        .env("LECTERN_BASE_URL", "http://127.0.0.1:9")
        .env("LECTERN_TIMEOUT", "1")
        .arg("logout")
        .assert()
        .success();
    lectern(&home).arg("whoami").assert().code(3);
}

#[test]
fn test_wrong_password_offline() {
    let home = TempDir::new().unwrap();
    lectern(&home)
        .args([
            "login",
            "--email",
            "admin@company.com",
            "--password",
            "nope",
            "--offline",
        ])
        .assert()
        .code(3);
}

#[test]
fn test_student_cannot_open_admin_dashboard() {
    let home = TempDir::new().unwrap();
    offline_login(&home, "student@company.com");

    lectern(&home)
        .args(["admin", "dashboard"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("admin"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_courses_against_mock_server() {
    let server = MockLmsServer::builder()
        .route(
            "GET",
            "/courses",
            &[],
            200,
            r#"{"courses":[
                {"id":"c-open","title":"Welcome","accessType":"open"},
                {"id":"c-hidden","title":"Secret","accessType":"closed"}
            ]}"#,
        )
        .route("GET", "/assignments", &[("userId", "2")], 200, r#"{"assignments":[]}"#)
        .route(
            "GET",
            "/progress",
            &[("userId", "2")],
            200,
            r#"{"progress":[{"courseId":"c-open","userId":"2","completedLessons":1,"totalLessons":2}]}"#,
        )
        .build()
        .await
        .unwrap();
    let base_url = server.url().to_string();

    let output = tokio::task::spawn_blocking(move || {
        let home = TempDir::new().unwrap();
        offline_login(&home, "student@company.com");
        lectern(&home)
            .env("LECTERN_BASE_URL", &base_url)
            .arg("courses")
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Welcome"));
    assert!(stdout.contains("50%"));
    assert!(!stdout.contains("Secret"));

    let requests = server.requests_to("GET", "/courses").await;
    assert_eq!(requests[0].header("X-Auth-Token"), Some("static-2"));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_courses_when_assignments_are_admin_only() {
    let server = MockLmsServer::builder()
        .route(
            "GET",
            "/courses",
            &[],
            200,
            r#"{"courses":[
                {"id":"c-open","title":"Welcome","accessType":"open"},
                {"id":"c-mine","title":"Assigned to me","accessType":"closed"}
            ]}"#,
        )
        .route(
            "GET",
            "/assignments",
            &[("userId", "2")],
            403,
            r#"{"error":"admin only"}"#,
        )
        .route("GET", "/progress", &[("userId", "2")], 200, r#"{"progress":[]}"#)
        .build()
        .await
        .unwrap();
    let base_url = server.url().to_string();

    let output = tokio::task::spawn_blocking(move || {
        let home = TempDir::new().unwrap();
        offline_login(&home, "student@company.com");
        lectern(&home)
            .env("LECTERN_BASE_URL", &base_url)
            .arg("courses")
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Welcome"));
    assert!(stdout.contains("Assigned to me"));
    server.stop().await;
}
