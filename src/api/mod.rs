use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Collection, Config};
use crate::errors::ApiError;
use crate::observability::telemetry::{redact_secrets, sanitize_for_log, track_request};

pub mod types;

use types::*;

/// Header carrying the session token on every authenticated request.
pub const AUTH_HEADER: &str = "X-Auth-Token";

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Trait abstraction over the LMS backend, so editors, the access gate and
/// views can be driven by any implementation.
#[async_trait]
pub trait LmsApi: Send + Sync {
    // auth
    async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse>;
    async fn logout(&self) -> ApiResult<()>;
    async fn me(&self) -> ApiResult<User>;

    // users
    async fn list_users(&self) -> ApiResult<Vec<User>>;
    async fn create_user(&self, user: &User) -> ApiResult<User>;
    async fn update_user(&self, id: &str, user: &User) -> ApiResult<User>;
    async fn delete_user(&self, id: &str) -> ApiResult<()>;

    // courses
    async fn list_courses(&self) -> ApiResult<Vec<Course>>;
    async fn get_course(&self, id: &str) -> ApiResult<Course>;
    async fn create_course(&self, course: &Course) -> ApiResult<Course>;
    async fn update_course(&self, id: &str, course: &Course) -> ApiResult<Course>;
    async fn delete_course(&self, id: &str) -> ApiResult<()>;

    // lessons
    async fn list_lessons(&self, course_id: &str) -> ApiResult<Vec<Lesson>>;
    async fn get_lesson(&self, id: &str) -> ApiResult<Lesson>;
    async fn create_lesson(&self, lesson: &Lesson) -> ApiResult<Lesson>;
    async fn update_lesson(&self, id: &str, lesson: &Lesson) -> ApiResult<Lesson>;
    async fn delete_lesson(&self, id: &str) -> ApiResult<()>;
    async fn add_material(
        &self,
        lesson_id: &str,
        material: &LessonMaterial,
    ) -> ApiResult<LessonMaterial>;

    // tests and questions
    async fn list_tests(&self, course_id: &str) -> ApiResult<Vec<Test>>;
    async fn get_test(&self, id: &str) -> ApiResult<Test>;
    async fn create_test(&self, test: &Test) -> ApiResult<Test>;
    async fn update_test(&self, id: &str, test: &Test) -> ApiResult<Test>;
    async fn delete_test(&self, id: &str) -> ApiResult<()>;
    async fn list_questions(&self, test_id: &str) -> ApiResult<Vec<Question>>;
    async fn create_question(&self, question: &Question) -> ApiResult<Question>;
    async fn update_question(&self, id: &str, question: &Question) -> ApiResult<Question>;
    async fn delete_question(&self, id: &str) -> ApiResult<()>;

    // assignments
    async fn assignments_for_user(&self, user_id: &str) -> ApiResult<Vec<CourseAssignment>>;
    async fn assignments_for_course(&self, course_id: &str) -> ApiResult<Vec<CourseAssignment>>;
    async fn assign_course(&self, request: &AssignCourseRequest<'_>)
        -> ApiResult<CourseAssignment>;
    async fn unassign_course(&self, course_id: &str, user_id: &str) -> ApiResult<()>;

    // progress
    async fn list_progress(&self, user_id: &str) -> ApiResult<Vec<CourseProgress>>;
    async fn get_progress(&self, user_id: &str, course_id: &str) -> ApiResult<CourseProgress>;
    async fn complete_lesson(&self, course_id: &str, lesson_id: &str) -> ApiResult<()>;
    async fn submit_test(
        &self,
        course_id: &str,
        test_id: &str,
        answers: &BTreeMap<String, SubmittedAnswer>,
    ) -> ApiResult<SubmitResponse>;

    // rewards
    async fn list_rewards(&self) -> ApiResult<Vec<Reward>>;
    async fn create_reward(&self, reward: &Reward) -> ApiResult<Reward>;
    async fn update_reward(&self, id: &str, reward: &Reward) -> ApiResult<Reward>;
    async fn delete_reward(&self, id: &str) -> ApiResult<()>;
}

/// HTTP client for the LMS backend.
///
/// Every collection has its own endpoint URL; sub-operations are selected with
/// query parameters (`?id=`, `?courseId=`, `?action=`). The token, when
/// present, travels in the `X-Auth-Token` header.
pub struct ApiClient {
    client: Client,
    config: Config,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        use anyhow::Context;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
            token: config.token.clone(),
        })
    }

    /// Attach (or clear) the session token used for subsequent requests.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Endpoint URL for a collection with the given query pairs appended.
    pub fn url(&self, collection: Collection, query: &[(&str, &str)]) -> ApiResult<Url> {
        let raw = self.config.endpoint(collection);
        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::Network(format!("invalid endpoint {}: {}", raw, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        collection: Collection,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let url = self.url(collection, query)?;
        let label = method.to_string();
        let url_text = url.to_string();
        track_request(&label, &url_text, || self.execute(method, url, body)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(AUTH_HEADER, token);
        }
        if let Some(body) = body {
            debug!(
                "Request body: {}",
                redact_secrets(&sanitize_for_log(&body.to_string()))
            );
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            warn!(
                "API error {}: {}",
                status.as_u16(),
                sanitize_for_log(&message)
            );
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        debug!("API response body ({} chars)", text.len());
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        self.request(Method::GET, collection, query, None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        collection: Collection,
        query: &[(&str, &str)],
        body: &B,
    ) -> ApiResult<T> {
        self.request(Method::POST, collection, query, Some(to_body(body)?))
            .await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        collection: Collection,
        query: &[(&str, &str)],
        body: &B,
    ) -> ApiResult<T> {
        self.request(Method::PUT, collection, query, Some(to_body(body)?))
            .await
    }

    async fn delete(&self, collection: Collection, query: &[(&str, &str)]) -> ApiResult<()> {
        let _: MessageEnvelope = self.request(Method::DELETE, collection, query, None).await?;
        Ok(())
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> ApiResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ApiError::Parse(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Parse(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

#[async_trait]
impl LmsApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        self.post(
            Collection::Auth,
            &[("action", "login")],
            &LoginRequest { email, password },
        )
        .await
    }

    async fn logout(&self) -> ApiResult<()> {
        let _: MessageEnvelope = self
            .post(
                Collection::Auth,
                &[("action", "logout")],
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    async fn me(&self) -> ApiResult<User> {
        let env: UserEnvelope = self.get(Collection::Auth, &[("action", "me")]).await?;
        Ok(env.user)
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let env: UsersEnvelope = self.get(Collection::Users, &[]).await?;
        Ok(env.users)
    }

    async fn create_user(&self, user: &User) -> ApiResult<User> {
        let env: UserEnvelope = self.post(Collection::Users, &[], user).await?;
        Ok(env.user)
    }

    async fn update_user(&self, id: &str, user: &User) -> ApiResult<User> {
        let env: UserEnvelope = self.put(Collection::Users, &[("id", id)], user).await?;
        Ok(env.user)
    }

    async fn delete_user(&self, id: &str) -> ApiResult<()> {
        self.delete(Collection::Users, &[("id", id)]).await
    }

    async fn list_courses(&self) -> ApiResult<Vec<Course>> {
        let env: CoursesEnvelope = self.get(Collection::Courses, &[]).await?;
        Ok(env.courses)
    }

    async fn get_course(&self, id: &str) -> ApiResult<Course> {
        let env: CourseEnvelope = self.get(Collection::Courses, &[("id", id)]).await?;
        Ok(env.course)
    }

    async fn create_course(&self, course: &Course) -> ApiResult<Course> {
        let env: CourseEnvelope = self.post(Collection::Courses, &[], course).await?;
        Ok(env.course)
    }

    async fn update_course(&self, id: &str, course: &Course) -> ApiResult<Course> {
        let env: CourseEnvelope = self.put(Collection::Courses, &[("id", id)], course).await?;
        Ok(env.course)
    }

    async fn delete_course(&self, id: &str) -> ApiResult<()> {
        self.delete(Collection::Courses, &[("id", id)]).await
    }

    async fn list_lessons(&self, course_id: &str) -> ApiResult<Vec<Lesson>> {
        let env: LessonsEnvelope = self
            .get(Collection::Lessons, &[("courseId", course_id)])
            .await?;
        Ok(env.lessons)
    }

    async fn get_lesson(&self, id: &str) -> ApiResult<Lesson> {
        let env: LessonEnvelope = self.get(Collection::Lessons, &[("id", id)]).await?;
        Ok(env.lesson)
    }

    async fn create_lesson(&self, lesson: &Lesson) -> ApiResult<Lesson> {
        let env: LessonEnvelope = self.post(Collection::Lessons, &[], lesson).await?;
        Ok(env.lesson)
    }

    async fn update_lesson(&self, id: &str, lesson: &Lesson) -> ApiResult<Lesson> {
        let env: LessonEnvelope = self.put(Collection::Lessons, &[("id", id)], lesson).await?;
        Ok(env.lesson)
    }

    async fn delete_lesson(&self, id: &str) -> ApiResult<()> {
        self.delete(Collection::Lessons, &[("id", id)]).await
    }

    async fn add_material(
        &self,
        lesson_id: &str,
        material: &LessonMaterial,
    ) -> ApiResult<LessonMaterial> {
        let env: MaterialEnvelope = self
            .post(
                Collection::Lessons,
                &[("lessonId", lesson_id), ("action", "material")],
                material,
            )
            .await?;
        Ok(env.material)
    }

    async fn list_tests(&self, course_id: &str) -> ApiResult<Vec<Test>> {
        let env: TestsEnvelope = self
            .get(Collection::Tests, &[("courseId", course_id)])
            .await?;
        Ok(env.tests)
    }

    async fn get_test(&self, id: &str) -> ApiResult<Test> {
        let env: TestEnvelope = self.get(Collection::Tests, &[("id", id)]).await?;
        Ok(env.test)
    }

    async fn create_test(&self, test: &Test) -> ApiResult<Test> {
        let env: TestEnvelope = self.post(Collection::Tests, &[], test).await?;
        Ok(env.test)
    }

    async fn update_test(&self, id: &str, test: &Test) -> ApiResult<Test> {
        let env: TestEnvelope = self.put(Collection::Tests, &[("id", id)], test).await?;
        Ok(env.test)
    }

    async fn delete_test(&self, id: &str) -> ApiResult<()> {
        self.delete(Collection::Tests, &[("id", id)]).await
    }

    async fn list_questions(&self, test_id: &str) -> ApiResult<Vec<Question>> {
        let env: QuestionsEnvelope = self
            .get(
                Collection::Tests,
                &[("testId", test_id), ("action", "questions")],
            )
            .await?;
        Ok(env.questions)
    }

    async fn create_question(&self, question: &Question) -> ApiResult<Question> {
        let env: QuestionEnvelope = self
            .post(Collection::Tests, &[("action", "question")], question)
            .await?;
        Ok(env.question)
    }

    async fn update_question(&self, id: &str, question: &Question) -> ApiResult<Question> {
        let env: QuestionEnvelope = self
            .put(
                Collection::Tests,
                &[("id", id), ("action", "question")],
                question,
            )
            .await?;
        Ok(env.question)
    }

    async fn delete_question(&self, id: &str) -> ApiResult<()> {
        self.delete(Collection::Tests, &[("id", id), ("action", "question")])
            .await
    }

    async fn assignments_for_user(&self, user_id: &str) -> ApiResult<Vec<CourseAssignment>> {
        let env: AssignmentsEnvelope = self
            .get(Collection::Assignments, &[("userId", user_id)])
            .await?;
        Ok(env.assignments)
    }

    async fn assignments_for_course(&self, course_id: &str) -> ApiResult<Vec<CourseAssignment>> {
        let env: AssignmentsEnvelope = self
            .get(Collection::Assignments, &[("courseId", course_id)])
            .await?;
        Ok(env.assignments)
    }

    async fn assign_course(
        &self,
        request: &AssignCourseRequest<'_>,
    ) -> ApiResult<CourseAssignment> {
        let env: AssignmentEnvelope = self.post(Collection::Assignments, &[], request).await?;
        Ok(env.assignment)
    }

    async fn unassign_course(&self, course_id: &str, user_id: &str) -> ApiResult<()> {
        self.delete(
            Collection::Assignments,
            &[("courseId", course_id), ("userId", user_id)],
        )
        .await
    }

    async fn list_progress(&self, user_id: &str) -> ApiResult<Vec<CourseProgress>> {
        let env: ProgressListEnvelope = self
            .get(Collection::Progress, &[("userId", user_id)])
            .await?;
        Ok(env.progress)
    }

    async fn get_progress(&self, user_id: &str, course_id: &str) -> ApiResult<CourseProgress> {
        let env: ProgressEnvelope = self
            .get(
                Collection::Progress,
                &[("userId", user_id), ("courseId", course_id)],
            )
            .await?;
        Ok(env.progress)
    }

    async fn complete_lesson(&self, course_id: &str, lesson_id: &str) -> ApiResult<()> {
        let _: MessageEnvelope = self
            .post(
                Collection::Progress,
                &[("action", "complete")],
                &CompleteLessonRequest {
                    course_id,
                    lesson_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn submit_test(
        &self,
        course_id: &str,
        test_id: &str,
        answers: &BTreeMap<String, SubmittedAnswer>,
    ) -> ApiResult<SubmitResponse> {
        self.post(
            Collection::Progress,
            &[("action", "submit")],
            &SubmitTestRequest {
                course_id,
                test_id,
                answers,
            },
        )
        .await
    }

    async fn list_rewards(&self) -> ApiResult<Vec<Reward>> {
        let env: RewardsEnvelope = self.get(Collection::Rewards, &[]).await?;
        Ok(env.rewards)
    }

    async fn create_reward(&self, reward: &Reward) -> ApiResult<Reward> {
        let env: RewardEnvelope = self.post(Collection::Rewards, &[], reward).await?;
        Ok(env.reward)
    }

    async fn update_reward(&self, id: &str, reward: &Reward) -> ApiResult<Reward> {
        let env: RewardEnvelope = self.put(Collection::Rewards, &[("id", id)], reward).await?;
        Ok(env.reward)
    }

    async fn delete_reward(&self, id: &str) -> ApiResult<()> {
        self.delete(Collection::Rewards, &[("id", id)]).await
    }
}
