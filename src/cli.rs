//! Lectern command line front end.
//!
//! Every command maps to a [`Route`] and is refused unless the persisted
//! session may open it, the same way the web app redirects to `/login`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::access::{sync_assignments, OwnAssignments, SyncOptions, SyncOutcome, SyncReport};
use crate::api::types::{
    AccessType, CourseProgress, CourseStatus, LessonType, MaterialType, Question, QuestionType,
    TestStatus, TextCheckType, User, UserRole,
};
use crate::api::{ApiClient, LmsApi};
use crate::auth::{self, Session, SessionStore, StaticVerifier};
use crate::config::Config;
use crate::editors::{
    CourseEditor, Direction, Editor, LessonEditor, QuestionEditor, RewardEditor, TestEditor,
    UserEditor,
};
use crate::engine::{
    spawn_countdown, Answer, SessionResult, TestSession, TimerEvent, Verdict, TICK_PERIOD,
};
use crate::errors::{ApiError, LecternError};
use crate::observability::telemetry::{init_tracing, init_tracing_verbose};
use crate::routes::Route;
use crate::views::{
    AdminDashboard, Analytics, Catalog, CatalogFilter, CourseDetail, ProgressSummary, RewardShelf,
    RewardStats, UserFilter, ViewState,
};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Learning-management client: courses, tests and progress from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Log requests and state changes to stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify credentials and remember the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
        /// Check against the built-in demo accounts instead of the server
        #[arg(long)]
        offline: bool,
    },

    /// End the session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Course catalog with your progress
    Courses {
        /// all, in-progress or completed
        #[arg(long, default_value = "all")]
        filter: CatalogFilter,
    },

    /// One course with its lessons and tests
    Course { id: String },

    /// Mark a lesson as done
    CompleteLesson { course: String, lesson: String },

    /// Progress across all your courses
    Progress,

    /// Earned and still available rewards
    Rewards,

    /// Take a test interactively
    TakeTest { course: String, test: String },

    /// Administration
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Headline numbers
    Dashboard,
    /// Completion and score breakdowns
    Analytics,
    /// Reward catalogue and how often each was earned
    Rewards,
    /// All courses
    Courses,
    /// Create or update a course
    CourseSave(CourseArgs),
    /// Delete a course
    CourseDelete { id: String },
    /// Create or update a lesson
    LessonSave(LessonArgs),
    /// Move a lesson up or down within its course
    LessonMove {
        course: String,
        lesson: String,
        direction: Direction,
    },
    /// Create or update a test
    TestSave(TestArgs),
    /// Create or update a question
    QuestionSave(QuestionArgs),
    /// Create or update a reward
    RewardSave(RewardArgs),
    /// Make a course's assigned students exactly the given set
    Assign {
        course: String,
        /// Comma-separated user ids; empty unassigns everyone
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        students: Vec<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List users
    Users {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_parser = parse_wire::<UserRole>)]
        role: Option<UserRole>,
    },
    /// Create or update a user
    UserSave(UserArgs),
}

#[derive(Args)]
struct CourseArgs {
    /// Existing course to update; omit to create
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Minutes
    #[arg(long)]
    duration: Option<u32>,
    #[arg(long)]
    pass_score: Option<u32>,
    #[arg(long, value_parser = parse_wire::<AccessType>)]
    access: Option<AccessType>,
    #[arg(long, value_parser = parse_wire::<CourseStatus>)]
    status: Option<CourseStatus>,
    #[arg(long)]
    instructor: Option<String>,
}

#[derive(Args)]
struct LessonArgs {
    #[arg(long)]
    course: String,
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, value_parser = parse_wire::<LessonType>)]
    kind: Option<LessonType>,
    #[arg(long)]
    content: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Minutes
    #[arg(long)]
    duration: Option<u32>,
    #[arg(long)]
    video_url: Option<String>,
    #[arg(long)]
    requires_previous: Option<bool>,
    /// Attach a material after saving
    #[arg(long, requires = "material_url")]
    material_title: Option<String>,
    #[arg(long, requires = "material_title")]
    material_url: Option<String>,
    #[arg(long, value_parser = parse_wire::<MaterialType>, default_value = "link")]
    material_kind: MaterialType,
}

#[derive(Args)]
struct TestArgs {
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    pass_score: Option<u32>,
    /// Minutes
    #[arg(long)]
    time_limit: Option<u32>,
    #[arg(long)]
    attempts: Option<u32>,
    #[arg(long, value_parser = parse_wire::<TestStatus>)]
    status: Option<TestStatus>,
    /// Final test gating course completion
    #[arg(long)]
    r#final: bool,
    #[arg(long, requires = "final")]
    requires_all_lessons: bool,
    #[arg(long, requires = "final")]
    requires_all_tests: bool,
}

#[derive(Args)]
struct QuestionArgs {
    #[arg(long)]
    test: String,
    #[arg(long)]
    id: Option<String>,
    /// single, multiple, text or matching; new questions default to single
    #[arg(long, value_parser = parse_wire::<QuestionType>)]
    kind: Option<QuestionType>,
    #[arg(long)]
    text: Option<String>,
    /// Repeatable; replaces the option list when given
    #[arg(long = "option")]
    options: Vec<String>,
    /// Repeatable; option text, or the expected answer for text questions
    #[arg(long)]
    correct: Vec<String>,
    #[arg(long)]
    points: Option<u32>,
    /// left=right, repeatable
    #[arg(long = "pair")]
    pairs: Vec<String>,
    #[arg(long, value_parser = parse_wire::<TextCheckType>)]
    text_check: Option<TextCheckType>,
}

#[derive(Args)]
struct RewardArgs {
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    icon: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    condition: Option<String>,
    #[arg(long = "bonus")]
    bonuses: Vec<String>,
}

#[derive(Args)]
struct UserArgs {
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_parser = parse_wire::<UserRole>)]
    role: Option<UserRole>,
    #[arg(long)]
    position: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    active: Option<bool>,
}

/// Parse a CLI value the way the API spells it (`closed`, `published`, ...).
fn parse_wire<T: DeserializeOwned>(s: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|_| format!("unsupported value '{}'", s))
}

struct Context {
    config: Config,
    store: SessionStore,
}

impl Context {
    /// The persisted session, if it may open `route`.
    fn session_for(&self, route: &Route) -> Result<Session> {
        let session = self.store.load().map_err(LecternError::from)?;
        route
            .authorize(session.as_ref())
            .map_err(LecternError::from)?;
        debug!(route = %route, "Route authorized");
        session.ok_or_else(|| LecternError::from(crate::errors::AuthError::NotLoggedIn).into())
    }

    fn api(&self, session: Option<&Session>) -> Result<ApiClient> {
        let token = session
            .map(|s| s.token.clone())
            .or_else(|| self.config.token.clone());
        Ok(ApiClient::new(&self.config)?.with_token(token))
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        init_tracing_verbose();
    } else {
        init_tracing();
    }

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    // Expand ~ to the home directory
    let config_path: Option<String> = cli.config.map(|p| match p.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest).to_string_lossy().to_string())
            .unwrap_or_else(|| p.clone()),
        None => p.clone(),
    });
    let mut config = Config::load(config_path.as_deref())?;
    config.verbose = cli.verbose;
    if !config.ui.color {
        colored::control::set_override(false);
    }
    config.validate()?;

    let ctx = Context {
        store: SessionStore::from_config(&config),
        config,
    };

    match cli.command {
        Commands::Login {
            email,
            password,
            offline,
        } => login(&ctx, &email, password, offline).await,
        Commands::Logout => logout(&ctx).await,
        Commands::Whoami => whoami(&ctx),
        Commands::Courses { filter } => courses(&ctx, filter).await,
        Commands::Course { id } => course(&ctx, &id).await,
        Commands::CompleteLesson { course, lesson } => complete_lesson(&ctx, &course, &lesson).await,
        Commands::Progress => progress(&ctx).await,
        Commands::Rewards => rewards(&ctx).await,
        Commands::TakeTest { course, test } => take_test(&ctx, &course, &test).await,
        Commands::Admin(cmd) => admin(&ctx, cmd).await,
    }
}

// ─── Session ───────────────────────────────────────────────────────────────

async fn login(ctx: &Context, email: &str, password: Option<String>, offline: bool) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("Password: ");
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("Failed to read password")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let session = if offline {
        auth::login(&StaticVerifier::demo(), &ctx.store, email, &password).await?
    } else {
        let api = ctx.api(None)?;
        auth::login(&api, &ctx.store, email, &password).await?
    };

    println!(
        "{} Logged in as {} ({})",
        "✓".green(),
        session.user.name.bold(),
        session.role()
    );
    println!("  Start at {}", Route::home_for(session.role()).path().cyan());
    Ok(())
}

async fn logout(ctx: &Context) -> Result<()> {
    let session = ctx.store.load().map_err(LecternError::from)?;
    let api = ctx.api(session.as_ref())?;
    auth::logout(&api, &ctx.store).await?;
    println!("{} Logged out", "✓".green());
    Ok(())
}

fn whoami(ctx: &Context) -> Result<()> {
    let session = auth::require_session(&ctx.store)?;
    let user = &session.user;
    println!("{} <{}>", user.name.bold(), user.email);
    println!("  role:  {}", user.role);
    if let Some(dept) = &user.department {
        println!("  dept:  {}", dept);
    }
    println!("  home:  {}", Route::home_for(user.role).path());
    Ok(())
}

// ─── Student ───────────────────────────────────────────────────────────────

async fn courses(ctx: &Context, filter: CatalogFilter) -> Result<()> {
    let session = ctx.store.load().map_err(LecternError::from)?;
    let route = match &session {
        Some(s) if s.is_admin() => Route::AdminCourses,
        _ => Route::StudentCourses,
    };
    let session = ctx.session_for(&route)?;
    let api = ctx.api(Some(&session))?;

    let mut view = ViewState::new();
    let catalog = view
        .load(async {
            let courses = api.list_courses().await?;
            let assignments = OwnAssignments::fetch(&api, &session).await?;
            let progress = api.list_progress(&session.user.id).await?;
            let visible = assignments.visible(&courses, &session);
            Ok(Catalog::build(&visible, &progress, &session.user.id))
        })
        .await?;

    println!(
        "{}  all {} · in progress {} · completed {}",
        "Courses".bold(),
        catalog.count(CatalogFilter::All),
        catalog.count(CatalogFilter::InProgress),
        catalog.count(CatalogFilter::Completed)
    );
    let entries = catalog.filtered(filter);
    if entries.is_empty() {
        println!("  {}", "nothing here".dimmed());
    }
    for entry in entries {
        let lock = if entry.course.access_type == AccessType::Closed {
            "🔒 "
        } else {
            ""
        };
        println!(
            "  {:<10} {}{}  {} {:>3}%  {}",
            entry.course.id.dimmed(),
            lock,
            entry.course.title.bold(),
            bar(entry.percent),
            entry.percent,
            entry.state.to_string().dimmed()
        );
    }
    Ok(())
}

async fn course(ctx: &Context, id: &str) -> Result<()> {
    let session = ctx.session_for(&Route::StudentCourse(id.to_string()))?;
    let api = ctx.api(Some(&session))?;

    let course = api.get_course(id).await?;
    let assignments = OwnAssignments::fetch(&api, &session).await?;
    if !assignments.can_access(&course, &session) {
        return Err(LecternError::from(ApiError::Forbidden(format!(
            "course {} is not assigned to you",
            id
        )))
        .into());
    }
    let lessons = api.list_lessons(id).await?;
    let tests = api.list_tests(id).await?;
    let progress = optional(api.get_progress(&session.user.id, id).await)?;
    let detail = CourseDetail::build(course, lessons, tests, progress.as_ref());

    println!("{}", detail.course.title.bold());
    if !detail.course.description.is_empty() {
        println!("{}", detail.course.description.dimmed());
    }
    println!(
        "{} {}%  · {} min · pass {}%",
        bar(detail.percent),
        detail.percent,
        detail.total_duration,
        detail.course.pass_score
    );
    println!();
    for (i, row) in detail.lessons.iter().enumerate() {
        let mark = if row.completed {
            "✓".green()
        } else if row.locked {
            "🔒".normal()
        } else {
            "·".normal()
        };
        println!(
            "  {} {:>2}. {}  {}",
            mark,
            i + 1,
            row.lesson.title,
            format!("{} min · {}", row.lesson.duration, row.lesson.id).dimmed()
        );
    }
    if !detail.tests.is_empty() {
        println!();
        for row in &detail.tests {
            let label = if row.test.is_final { "final test" } else { "test" };
            let state = if row.locked {
                "locked until all lessons are done".yellow()
            } else {
                format!("lectern take-test {} {}", detail.course.id, row.test.id).cyan()
            };
            println!("  {} {}  {}", label.dimmed(), row.test.title.bold(), state);
        }
    }
    if let Some(next) = detail.next_lesson() {
        println!();
        println!("Next up: {} ({})", next.title.bold(), next.id);
    }
    Ok(())
}

async fn complete_lesson(ctx: &Context, course_id: &str, lesson_id: &str) -> Result<()> {
    let session = ctx.session_for(&Route::StudentCourse(course_id.to_string()))?;
    let api = ctx.api(Some(&session))?;
    api.complete_lesson(course_id, lesson_id).await?;
    let progress = optional(api.get_progress(&session.user.id, course_id).await)?;
    match progress {
        Some(p) => println!(
            "{} Lesson done · {}/{} lessons ({}%)",
            "✓".green(),
            p.completed_lessons,
            p.total_lessons,
            p.percent()
        ),
        None => println!("{} Lesson done", "✓".green()),
    }
    Ok(())
}

async fn progress(ctx: &Context) -> Result<()> {
    let session = ctx.session_for(&Route::StudentProgress)?;
    let api = ctx.api(Some(&session))?;
    let progress = api.list_progress(&session.user.id).await?;
    let courses = api.list_courses().await?;
    let summary = ProgressSummary::build(&progress, &courses, &session.user.id);

    println!("{}", "Progress".bold());
    println!(
        "  courses {} started · {} completed ({}%)",
        summary.courses_started,
        summary.courses_completed,
        summary.completion_rate()
    );
    println!(
        "  lessons {}/{}  {} {}%",
        summary.completed_lessons,
        summary.total_lessons,
        bar(summary.overall_percent),
        summary.overall_percent
    );
    println!("  average test score {}%", summary.average_score);
    println!("  time learned {} min", summary.minutes_learned);
    println!();
    for row in &summary.rows {
        let score = row
            .test_score
            .map(|s| format!("test {}%", s))
            .unwrap_or_default();
        println!(
            "  {:<30} {} {:>3}%  {}",
            row.title,
            bar(row.percent),
            row.percent,
            score.dimmed()
        );
    }
    Ok(())
}

async fn rewards(ctx: &Context) -> Result<()> {
    let session = ctx.session_for(&Route::StudentRewards)?;
    let api = ctx.api(Some(&session))?;
    let rewards = api.list_rewards().await?;
    let progress = api.list_progress(&session.user.id).await?;
    let shelf = RewardShelf::build(&rewards, &progress, &session.user.id);

    println!(
        "{}  earned {} · available {} · courses completed {}",
        "Rewards".bold(),
        shelf.earned.len(),
        shelf.available.len(),
        shelf.completed_courses
    );
    for reward in &shelf.earned {
        println!("  {} {}", reward.icon, reward.name.green().bold());
    }
    for reward in &shelf.available {
        let hint = reward.condition.as_deref().unwrap_or("");
        println!("  {} {}  {}", "◌".dimmed(), reward.name, hint.dimmed());
    }
    Ok(())
}

// ─── Test taking ───────────────────────────────────────────────────────────

/// What a line of input asked the test loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Render,
    Picker,
    Finish,
    Quit,
}

async fn take_test(ctx: &Context, course_id: &str, test_id: &str) -> Result<()> {
    let route = Route::StudentTest {
        course_id: course_id.to_string(),
        test_id: test_id.to_string(),
    };
    let session = ctx.session_for(&route)?;
    let api = ctx.api(Some(&session))?;

    let course = api.get_course(course_id).await?;
    let assignments = OwnAssignments::fetch(&api, &session).await?;
    if !assignments.can_access(&course, &session) {
        return Err(LecternError::from(ApiError::Forbidden(format!(
            "course {} is not assigned to you",
            course_id
        )))
        .into());
    }
    let test = api.get_test(test_id).await?;
    let questions = api.list_questions(test_id).await?;
    let engine = Arc::new(Mutex::new(TestSession::new(test, questions)?));

    {
        let s = engine.lock().await;
        println!(
            "{}  {} questions · {} min · pass {}%",
            s.test().title.bold(),
            s.question_count(),
            s.test().time_limit,
            s.test().pass_score
        );
        println!(
            "{}",
            "Answer with option numbers or text. :n next · :p previous · :go N · :list · :finish · :quit"
                .dimmed()
        );
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        // a zero time limit finishes the attempt before the first question
        let expired = engine.lock().await.result().cloned();
        let result: SessionResult = if let Some(result) = expired {
            println!("{}", "Time is up.".red().bold());
            result
        } else {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let timer = spawn_countdown(engine.clone(), TICK_PERIOD, tx);
            render_question(&*engine.lock().await);

            let result = loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(TimerEvent::Expired(result)) => {
                            println!("{}", "Time is up.".red().bold());
                            break result;
                        }
                        Some(TimerEvent::Tick { remaining_secs }) if remaining_secs == 60 => {
                            println!("{}", "One minute left.".yellow());
                        }
                        Some(TimerEvent::Tick { .. }) => {}
                        None => {
                            let s = engine.lock().await;
                            match s.result() {
                                Some(r) => break r.clone(),
                                None => return Err(anyhow!("countdown stopped unexpectedly")),
                            }
                        }
                    },
                    line = input.next_line() => {
                        let mut s = engine.lock().await;
                        let Some(line) = line.context("Failed to read input")? else {
                            // stdin closed: grade what we have
                            break s.finish()?;
                        };
                        match handle_input(&mut s, &line) {
                            Ok(Step::Render) => render_question(&s),
                            Ok(Step::Picker) => render_picker(&s),
                            Ok(Step::Finish) => break s.finish()?,
                            Ok(Step::Quit) => {
                                timer.cancel();
                                println!("Attempt abandoned; nothing was submitted.");
                                return Ok(());
                            }
                            Err(msg) => println!("{} {}", "!".yellow(), msg),
                        }
                    }
                }
            };
            drop(timer);
            result
        };

        let submitted = {
            let s = engine.lock().await;
            render_result(&s, &result);
            s.submitted_answers()
        };
        match api.submit_test(course_id, test_id, &submitted).await {
            Ok(resp) => println!(
                "Recorded by the server: {}% ({})",
                resp.score,
                if resp.message.is_empty() {
                    if resp.passed { "passed" } else { "not passed" }
                } else {
                    resp.message.as_str()
                }
            ),
            Err(e) => {
                warn!("Submitting test {} failed: {}", test_id, e);
                println!("{} Could not submit the result: {}", "!".yellow(), e);
            }
        }

        let remaining = engine.lock().await.attempts_remaining();
        println!(
            "{}",
            format!(
                "Type :retry for another attempt ({} of the allowed attempts left) or press Enter to leave.",
                remaining
            )
            .dimmed()
        );
        match input.next_line().await.context("Failed to read input")? {
            Some(line) if line.trim() == ":retry" => {
                engine.lock().await.restart()?;
            }
            _ => return Ok(()),
        }
    }
}

fn handle_input(session: &mut TestSession, line: &str) -> std::result::Result<Step, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Step::Render);
    }
    if let Some(command) = line.strip_prefix(':') {
        let mut parts = command.split_whitespace();
        return match (parts.next().unwrap_or_default(), parts.next()) {
            ("n" | "next", None) => session.next().map(|_| Step::Render).map_err(|e| e.to_string()),
            ("p" | "prev" | "previous", None) => session
                .previous()
                .map(|_| Step::Render)
                .map_err(|e| e.to_string()),
            ("go" | "g", Some(n)) => {
                let n: usize = n.parse().map_err(|_| format!("'{}' is not a number", n))?;
                session
                    .jump_to(n.saturating_sub(1))
                    .map(|_| Step::Render)
                    .map_err(|e| e.to_string())
            }
            ("list" | "l", None) => Ok(Step::Picker),
            ("finish" | "f", None) => Ok(Step::Finish),
            ("quit" | "q", None) => Ok(Step::Quit),
            _ => Err(format!("unknown command ':{}'", command)),
        };
    }

    let question = session
        .current_question()
        .cloned()
        .ok_or_else(|| "the test is already finished".to_string())?;
    let answer = parse_answer(&question, line)?;
    session
        .answer(&question.id, answer)
        .map_err(|e| e.to_string())?;
    Ok(Step::Render)
}

/// Turn a typed line into an answer for `question`.
///
/// Choice questions take 1-based option numbers (comma or space separated for
/// multiple choice) or the option text. Matching takes `left=right; ...`.
fn parse_answer(question: &Question, input: &str) -> std::result::Result<Answer, String> {
    let input = input.trim();
    let pick = |token: &str| -> std::result::Result<String, String> {
        if let Ok(n) = token.parse::<usize>() {
            return question
                .options
                .get(n.wrapping_sub(1))
                .cloned()
                .ok_or_else(|| format!("pick a number between 1 and {}", question.options.len()));
        }
        question
            .options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(token))
            .cloned()
            .ok_or_else(|| format!("'{}' is not one of the options", token))
    };

    match question.kind {
        QuestionType::Single => pick(input).map(Answer::Choice),
        QuestionType::Multiple => {
            let chosen = input
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(pick)
                .collect::<std::result::Result<BTreeSet<_>, _>>()?;
            if chosen.is_empty() {
                return Err("choose at least one option".to_string());
            }
            Ok(Answer::Choices(chosen))
        }
        QuestionType::Text => Ok(Answer::Text(input.to_string())),
        QuestionType::Matching => {
            let mut pairs = BTreeMap::new();
            for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (left, right) = part
                    .split_once('=')
                    .ok_or_else(|| format!("'{}' should look like left=right", part))?;
                let left = left.trim();
                if !question.matching_pairs.iter().any(|p| p.left == left) {
                    return Err(format!("'{}' is not one of the items to match", left));
                }
                pairs.insert(left.to_string(), right.trim().to_string());
            }
            if pairs.is_empty() {
                return Err("match at least one item".to_string());
            }
            Ok(Answer::Pairs(pairs))
        }
    }
}

fn render_question(session: &TestSession) {
    let (Some(index), Some(question)) = (session.current_index(), session.current_question())
    else {
        return;
    };
    let answer = session.answer_for(&question.id);
    println!();
    println!(
        "{}  {}  {}",
        format!("Question {}/{}", index + 1, session.question_count()).bold(),
        format!("⏱ {}", clock(session.remaining_secs())).cyan(),
        format!(
            "answered {}/{}",
            session.answered_count(),
            session.question_count()
        )
        .dimmed()
    );
    println!("{}  {}", question.text, format!("[{}]", question.kind).dimmed());

    match question.kind {
        QuestionType::Single | QuestionType::Multiple => {
            for (i, option) in question.options.iter().enumerate() {
                let selected = match answer {
                    Some(Answer::Choice(c)) => c == option,
                    Some(Answer::Choices(set)) => set.contains(option),
                    _ => false,
                };
                let mark = if selected { "[x]".green() } else { "[ ]".normal() };
                println!("  {} {}. {}", mark, i + 1, option);
            }
        }
        QuestionType::Text => {
            if let Some(Answer::Text(t)) = answer {
                println!("  your answer: {}", t.green());
            }
        }
        QuestionType::Matching => {
            let mut rights: Vec<&str> = question
                .matching_pairs
                .iter()
                .map(|p| p.right.as_str())
                .collect();
            rights.sort_unstable();
            for pair in &question.matching_pairs {
                let chosen = match answer {
                    Some(Answer::Pairs(map)) => map.get(&pair.left).map(String::as_str),
                    _ => None,
                };
                println!("  {} = {}", pair.left, chosen.unwrap_or("?"));
            }
            println!("  {}", format!("choices: {}", rights.join(", ")).dimmed());
        }
    }
}

fn render_picker(session: &TestSession) {
    let current = session.current_index();
    let cells: Vec<String> = session
        .answered_flags()
        .iter()
        .enumerate()
        .map(|(i, answered)| {
            let cell = format!("{}{}", i + 1, if *answered { "✓" } else { "·" });
            if Some(i) == current {
                cell.bold().underline().to_string()
            } else if *answered {
                cell.green().to_string()
            } else {
                cell
            }
        })
        .collect();
    println!("{}", cells.join("  "));
}

fn render_result(session: &TestSession, result: &SessionResult) {
    println!();
    let verdict = if result.passed {
        "PASSED".green().bold()
    } else {
        "NOT PASSED".red().bold()
    };
    println!(
        "{}  {}%  ({} of {} points, {}/{} correct)",
        verdict, result.score, result.earned, result.max, result.correct, result.total
    );
    if result.timed_out {
        println!("{}", "Finished automatically when time ran out.".dimmed());
    }
    for (i, (question, outcome)) in session
        .questions()
        .iter()
        .zip(result.outcomes.iter())
        .enumerate()
    {
        let mark = match outcome.verdict {
            Verdict::Correct => "✓".green(),
            Verdict::Incorrect => "✗".red(),
            Verdict::Unanswered => "–".dimmed(),
        };
        let review = if outcome.needs_review {
            " (awaits manual review)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {:>2}. {}  {}/{}{}",
            mark,
            i + 1,
            question.text,
            outcome.points_awarded,
            outcome.points_possible,
            review
        );
    }
}

// ─── Admin ─────────────────────────────────────────────────────────────────

async fn admin(ctx: &Context, cmd: AdminCommands) -> Result<()> {
    match cmd {
        AdminCommands::Dashboard => {
            let session = ctx.session_for(&Route::AdminDashboard)?;
            let api = ctx.api(Some(&session))?;
            let courses = api.list_courses().await?;
            let users = api.list_users().await?;
            let progress = all_progress(&api, &users).await?;
            let dash = AdminDashboard::build(&courses, &users, &progress);
            println!("{}", "Dashboard".bold());
            println!(
                "  courses   {} ({} published)",
                dash.total_courses, dash.published_courses
            );
            println!("  students  {}", dash.total_students);
            println!("  completed {}", dash.completed_enrollments);
            println!("  content   {} min", dash.total_minutes);
        }
        AdminCommands::Analytics => {
            let session = ctx.session_for(&Route::AdminAnalytics)?;
            let api = ctx.api(Some(&session))?;
            let courses = api.list_courses().await?;
            let users = api.list_users().await?;
            let progress = all_progress(&api, &users).await?;
            render_analytics(&Analytics::build(&courses, &users, &progress));
        }
        AdminCommands::Rewards => {
            let session = ctx.session_for(&Route::AdminRewards)?;
            let api = ctx.api(Some(&session))?;
            let rewards = api.list_rewards().await?;
            let users = api.list_users().await?;
            let progress = all_progress(&api, &users).await?;
            let stats = RewardStats::build(&rewards, &progress);
            println!(
                "{}  {} rewards · earned {} times · {} courses with rewards",
                "Rewards".bold(),
                stats.total_rewards,
                stats.total_earned,
                stats.courses_with_rewards
            );
            for (reward, count) in rewards.iter().zip(stats.per_reward.iter()) {
                println!(
                    "  {} {:<24} {}  {}",
                    reward.icon,
                    reward.name,
                    format!("×{}", count.earned).bold(),
                    reward.id.dimmed()
                );
            }
        }
        AdminCommands::Courses => {
            let session = ctx.session_for(&Route::AdminCourses)?;
            let api = ctx.api(Some(&session))?;
            for c in api.list_courses().await? {
                let status = match c.status {
                    Some(s) => format!("{:?}", s).to_lowercase(),
                    None if c.published => "published".to_string(),
                    None => "draft".to_string(),
                };
                println!(
                    "  {:<10} {:<32} {:<9} {:<6} {} lessons",
                    c.id.dimmed(),
                    c.title.bold(),
                    status,
                    format!("{:?}", c.access_type).to_lowercase(),
                    c.lessons_count
                );
            }
        }
        AdminCommands::CourseSave(args) => {
            let session = ctx.session_for(&Route::AdminCourseEdit(args.id.clone()))?;
            let api = ctx.api(Some(&session))?;
            let mut editor = match &args.id {
                Some(id) => CourseEditor::load(&api, id).await?,
                None => CourseEditor::new(),
            };
            if let Some(v) = args.title {
                editor.set_title(v);
            }
            if let Some(v) = args.description {
                editor.set_description(v);
            }
            if let Some(v) = args.category {
                editor.set_category(v);
            }
            if let Some(v) = args.duration {
                editor.set_duration(v);
            }
            if let Some(v) = args.pass_score {
                editor.set_pass_score(v)?;
            }
            if let Some(v) = args.access {
                editor.set_access_type(v);
            }
            if let Some(v) = args.status {
                editor.set_status(v);
            }
            if args.instructor.is_some() {
                editor.set_instructor(args.instructor);
            }
            let saved = editor.save(&api).await?;
            println!(
                "{} Saved course {} ({}), {} lessons",
                "✓".green(),
                saved.course.title.bold(),
                saved.course.id,
                saved.lessons.len()
            );
            render_failed_deletes("lesson", &saved.failed_deletes);
        }
        AdminCommands::CourseDelete { id } => {
            let session = ctx.session_for(&Route::AdminCourses)?;
            let api = ctx.api(Some(&session))?;
            api.delete_course(&id).await?;
            println!("{} Deleted course {}", "✓".green(), id);
        }
        AdminCommands::LessonSave(args) => {
            let session = ctx.session_for(&Route::AdminCourseEdit(Some(args.course.clone())))?;
            let api = ctx.api(Some(&session))?;
            let mut editor = match &args.id {
                Some(id) => LessonEditor::load(&api, id).await?,
                None => {
                    let existing = api.list_lessons(&args.course).await?;
                    let mut editor = LessonEditor::new(args.course.clone());
                    editor.set_order(existing.len() as u32);
                    editor
                }
            };
            if let Some(v) = args.title {
                editor.set_title(v);
            }
            if let Some(v) = args.kind {
                editor.set_kind(v);
            }
            if let Some(v) = args.content {
                editor.set_content(v);
            }
            if let Some(v) = args.description {
                editor.set_description(v);
            }
            if let Some(v) = args.duration {
                editor.set_duration(v);
            }
            if args.video_url.is_some() {
                editor.set_video_url(args.video_url);
            }
            if let Some(v) = args.requires_previous {
                editor.set_requires_previous(v);
            }
            let lesson = editor.save(&api).await?;
            println!(
                "{} Saved lesson {} ({})",
                "✓".green(),
                lesson.title.bold(),
                lesson.id
            );
            if let (Some(title), Some(url)) = (args.material_title, args.material_url) {
                let material = editor
                    .add_material(&api, &title, args.material_kind, &url)
                    .await?;
                println!("  attached {} ({})", material.title, material.url);
            }
        }
        AdminCommands::LessonMove {
            course,
            lesson,
            direction,
        } => {
            let session = ctx.session_for(&Route::AdminCourseEdit(Some(course.clone())))?;
            let api = ctx.api(Some(&session))?;
            let mut editor = CourseEditor::load(&api, &course).await?;
            editor.move_lesson(&lesson, direction)?;
            let saved = editor.save(&api).await?;
            for l in &saved.lessons {
                println!("  {:>2}. {}", l.order + 1, l.title);
            }
            render_failed_deletes("lesson", &saved.failed_deletes);
        }
        AdminCommands::TestSave(args) => {
            let session = ctx.session_for(&Route::AdminTestEdit(args.id.clone()))?;
            let api = ctx.api(Some(&session))?;
            let mut editor = match (&args.id, &args.course) {
                (Some(id), _) => TestEditor::load(&api, id).await?,
                (None, Some(course)) => TestEditor::new(course.clone()),
                (None, None) => {
                    return Err(anyhow!("--course is required when creating a test"));
                }
            };
            if let Some(v) = args.title {
                editor.set_title(v);
            }
            if let Some(v) = args.description {
                editor.set_description(v);
            }
            if let Some(v) = args.pass_score {
                editor.set_pass_score(v)?;
            }
            if let Some(v) = args.time_limit {
                editor.set_time_limit(v)?;
            }
            if let Some(v) = args.attempts {
                editor.set_attempts(v)?;
            }
            if let Some(v) = args.status {
                editor.set_status(v);
            }
            if args.r#final {
                editor.set_final(true, args.requires_all_lessons, args.requires_all_tests);
            }
            let saved = editor.save(&api).await?;
            println!(
                "{} Saved test {} ({}), {} questions, {} points",
                "✓".green(),
                saved.test.title.bold(),
                saved.test.id,
                saved.questions.len(),
                editor.total_points()
            );
            render_failed_deletes("question", &saved.failed_deletes);
        }
        AdminCommands::QuestionSave(args) => {
            let session = ctx.session_for(&Route::AdminTestEdit(Some(args.test.clone())))?;
            let api = ctx.api(Some(&session))?;
            let existing = api.list_questions(&args.test).await?;
            let mut editor = match &args.id {
                Some(id) => {
                    let question = existing
                        .iter()
                        .find(|q| &q.id == id)
                        .cloned()
                        .ok_or_else(|| {
                            LecternError::from(crate::errors::EditorError::UnknownItem(id.clone()))
                        })?;
                    QuestionEditor::from_question(question)
                }
                None => {
                    let mut editor = QuestionEditor::new(args.test.clone(), args.kind.unwrap_or_default());
                    editor.set_order(existing.len() as u32);
                    editor
                }
            };
            apply_question_args(&mut editor, &args)?;
            let question = editor.save(&api).await?;
            println!(
                "{} Saved question {} ({}, {} points)",
                "✓".green(),
                question.id,
                question.kind,
                question.points
            );
        }
        AdminCommands::RewardSave(args) => {
            let session = ctx.session_for(&Route::AdminRewards)?;
            let api = ctx.api(Some(&session))?;
            let mut editor = match &args.id {
                Some(id) => {
                    let reward = api
                        .list_rewards()
                        .await?
                        .into_iter()
                        .find(|r| &r.id == id)
                        .ok_or_else(|| {
                            LecternError::from(crate::errors::EditorError::UnknownItem(id.clone()))
                        })?;
                    RewardEditor::from_reward(reward)
                }
                None => RewardEditor::new(),
            };
            if let Some(v) = args.name {
                editor.set_name(v);
            }
            if let Some(v) = args.course {
                editor.set_course(v);
            }
            if let Some(v) = args.icon {
                editor.set_icon(v);
            }
            if let Some(v) = args.color {
                editor.set_color(&v)?;
            }
            if args.description.is_some() {
                editor.set_description(args.description);
            }
            if args.condition.is_some() {
                editor.set_condition(args.condition);
            }
            for bonus in args.bonuses {
                editor.add_bonus(bonus);
            }
            let reward = editor.save(&api).await?;
            println!(
                "{} Saved reward {} {} ({})",
                "✓".green(),
                reward.icon,
                reward.name.bold(),
                reward.id
            );
        }
        AdminCommands::Assign {
            course,
            students,
            due,
            notes,
        } => {
            let session = ctx.session_for(&Route::AdminAssignments)?;
            let api = ctx.api(Some(&session))?;
            let options = SyncOptions {
                due_date: due.as_deref(),
                notes: notes.as_deref(),
            };
            let report = sync_assignments(&api, &course, &students, &options).await?;
            render_sync_report(&report);
            if report.has_failures() {
                return Err(anyhow!(
                    "{} assignment change(s) failed",
                    report.failures().count()
                ));
            }
        }
        AdminCommands::Users { search, role } => {
            let session = ctx.session_for(&Route::AdminUsers)?;
            let api = ctx.api(Some(&session))?;
            let users = api.list_users().await?;
            let filter = UserFilter::new(search, role);
            let shown = filter.apply(&users);
            println!("{} {} of {}", "Users".bold(), shown.len(), users.len());
            for user in shown {
                render_user(user);
            }
        }
        AdminCommands::UserSave(args) => {
            let session = ctx.session_for(&Route::AdminUsers)?;
            let api = ctx.api(Some(&session))?;
            let mut editor = match &args.id {
                Some(id) => {
                    let user = api
                        .list_users()
                        .await?
                        .into_iter()
                        .find(|u| &u.id == id)
                        .ok_or_else(|| {
                            LecternError::from(crate::errors::EditorError::UnknownItem(id.clone()))
                        })?;
                    UserEditor::from_user(user)
                }
                None => UserEditor::new(args.role.unwrap_or_default()),
            };
            if let Some(v) = args.email {
                editor.set_email(v);
            }
            if let Some(v) = args.name {
                editor.set_name(v);
            }
            if let Some(v) = args.role {
                editor.set_role(v);
            }
            if let Some(v) = args.active {
                editor.set_active(v);
            }
            if args.position.is_some() || args.department.is_some() {
                let current = editor.draft().clone();
                editor.set_profile(
                    args.position.or(current.position),
                    args.department.or(current.department),
                    current.phone,
                );
            }
            let user = editor.save(&api).await?;
            println!("{} Saved user", "✓".green());
            render_user(&user);
        }
    }
    Ok(())
}

fn apply_question_args(editor: &mut QuestionEditor, args: &QuestionArgs) -> Result<()> {
    if let Some(kind) = args.kind {
        if editor.draft().kind != kind {
            editor.set_kind(kind);
        }
    }
    if let Some(text) = &args.text {
        editor.set_text(text.clone());
    }
    if let Some(points) = args.points {
        editor.set_points(points)?;
    }
    if !args.options.is_empty() {
        for old in editor.draft().options.clone() {
            editor.remove_option(&old);
        }
        for option in &args.options {
            editor.add_option(option.clone());
        }
    }
    if !args.correct.is_empty() {
        editor.clear_key();
        match editor.draft().kind {
            QuestionType::Text => {
                editor.set_accepted_texts(args.correct.clone());
            }
            _ => {
                for correct in &args.correct {
                    editor.mark_correct(correct)?;
                }
            }
        }
    }
    for pair in &args.pairs {
        let (left, right) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("--pair '{}' should look like left=right", pair))?;
        editor.add_pair(left.trim(), right.trim());
    }
    if let Some(check) = args.text_check {
        editor.set_text_check(check);
    }
    Ok(())
}

/// Progress rows of every student; the API only lists them per user.
async fn all_progress(api: &dyn LmsApi, users: &[User]) -> Result<Vec<CourseProgress>> {
    let mut all = Vec::new();
    for user in users.iter().filter(|u| u.role == UserRole::Student) {
        all.extend(api.list_progress(&user.id).await?);
    }
    Ok(all)
}

fn render_analytics(analytics: &Analytics) {
    println!("{}", "Analytics".bold());
    println!(
        "  students {} · enrollments {} · completion {}%",
        analytics.total_students, analytics.enrollments, analytics.completion_rate
    );
    println!();
    println!("  {}", "by course".dimmed());
    for c in &analytics.courses {
        println!(
            "  {:<32} done {:>3} · active {:>3} · idle {:>3} · avg score {:>3}%",
            c.title, c.completed, c.in_progress, c.not_started, c.average_score
        );
    }
    println!();
    println!("  {}", "by category".dimmed());
    for (category, count) in &analytics.categories {
        println!("  {:<32} {}", category, count);
    }
    println!();
    println!("  {}", "by student".dimmed());
    for s in &analytics.students {
        println!(
            "  {:<32} done {:>3} · active {:>3} · avg score {:>3}%",
            s.name, s.completed, s.in_progress, s.average_score
        );
    }
}

fn render_sync_report(report: &SyncReport) {
    println!("{} {}", "Assignments for".bold(), report.course_id.bold());
    if report.items.is_empty() {
        println!("  {}", "already in sync".dimmed());
    }
    for item in &report.items {
        match &item.outcome {
            SyncOutcome::Assigned => println!("  {} {} assigned", "+".green(), item.user_id),
            SyncOutcome::Unassigned => println!("  {} {} unassigned", "-".yellow(), item.user_id),
            SyncOutcome::Unchanged => {
                println!("  {} {} already assigned", "=".dimmed(), item.user_id)
            }
            SyncOutcome::Failed { reason } => {
                println!("  {} {} failed: {}", "✗".red(), item.user_id, reason)
            }
        }
    }
    let assigned: Vec<&str> = report.assigned.iter().map(String::as_str).collect();
    println!("  now assigned: {}", assigned.join(", "));
}

fn render_failed_deletes(kind: &str, failed: &[(String, String)]) {
    for (id, reason) in failed {
        eprintln!("{} could not delete {} {}: {}", "!".yellow(), kind, id, reason);
    }
}

fn render_user(user: &User) {
    let active = if user.is_active {
        String::new()
    } else {
        " (disabled)".red().to_string()
    };
    println!(
        "  {:<8} {:<24} {:<28} {}{}",
        user.id.dimmed(),
        user.name.bold(),
        user.email,
        user.role,
        active
    );
}

// ─── Helpers ───────────────────────────────────────────────────────────────

/// A missing progress record means "not started", not an error.
fn optional<T>(result: std::result::Result<T, ApiError>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(e) => Err(LecternError::from(e).into()),
    }
}

fn bar(percent: u32) -> String {
    const WIDTH: usize = 20;
    let filled = (percent.min(100) as usize * WIDTH) / 100;
    format!(
        "{}{}",
        "█".repeat(filled).green(),
        "░".repeat(WIDTH - filled).dimmed()
    )
}

fn clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
