//! Configuration Management
//!
//! Loads client configuration from TOML files.
//! Configuration includes:
//! - API location (one base URL, or an explicit URL per collection)
//! - HTTP timeouts
//! - Where the login session is persisted
//! - Terminal output preferences

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The REST collections the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Auth,
    Users,
    Courses,
    Lessons,
    Tests,
    Assignments,
    Progress,
    Rewards,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Auth,
        Collection::Users,
        Collection::Courses,
        Collection::Lessons,
        Collection::Tests,
        Collection::Assignments,
        Collection::Progress,
        Collection::Rewards,
    ];

    /// Path segment used when deriving the URL from `base_url`.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Auth => "auth",
            Collection::Users => "users",
            Collection::Courses => "courses",
            Collection::Lessons => "lessons",
            Collection::Tests => "tests",
            Collection::Assignments => "assignments",
            Collection::Progress => "progress",
            Collection::Rewards => "rewards",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token used when no session file exists (CI, scripts)
    pub token: Option<String>,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub ui: UiConfig,

    /// Verbose logging - CLI override
    #[serde(skip)]
    pub verbose: bool,
}

/// Per-collection URL overrides. The original deployment served every
/// collection from its own function URL, so each one can be set separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub auth: Option<String>,
    pub users: Option<String>,
    pub courses: Option<String>,
    pub lessons: Option<String>,
    pub tests: Option<String>,
    pub assignments: Option<String>,
    pub progress: Option<String>,
    pub rewards: Option<String>,
}

impl EndpointsConfig {
    fn get(&self, collection: Collection) -> Option<&String> {
        match collection {
            Collection::Auth => self.auth.as_ref(),
            Collection::Users => self.users.as_ref(),
            Collection::Courses => self.courses.as_ref(),
            Collection::Lessons => self.lessons.as_ref(),
            Collection::Tests => self.tests.as_ref(),
            Collection::Assignments => self.assignments.as_ref(),
            Collection::Progress => self.progress.as_ref(),
            Collection::Rewards => self.rewards.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session file location. Defaults to `<data dir>/lectern/session.json`.
    pub file: Option<PathBuf>,
}

impl SessionConfig {
    pub fn resolved_file(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lectern")
                .join("session.json")
        })
    }
}

/// Terminal output preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub color: bool,
    /// Drop decorative headers
    #[serde(default)]
    pub compact: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: true,
            compact: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            endpoints: EndpointsConfig::default(),
            http: HttpConfig::default(),
            session: SessionConfig::default(),
            ui: UiConfig::default(),
            verbose: false,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config: Config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => {
                let mut default_paths = vec![PathBuf::from("lectern.toml")];
                if let Some(home) = dirs::home_dir() {
                    default_paths.push(home.join(".config/lectern/config.toml"));
                }

                let mut loaded = None;
                for p in &default_paths {
                    if let Ok(content) = std::fs::read_to_string(p) {
                        tracing::debug!("Loading config from {}", p.display());
                        loaded = Some(toml::from_str(&content).context("Failed to parse config")?);
                        break;
                    }
                }
                loaded.unwrap_or_default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("LECTERN_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(token) = std::env::var("LECTERN_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(timeout) = std::env::var("LECTERN_TIMEOUT") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.http.timeout_secs = t;
            }
        }
        if let Ok(file) = std::env::var("LECTERN_SESSION_FILE") {
            self.session.file = Some(PathBuf::from(file));
        }
    }

    /// URL for a collection: the explicit override if set, else `<base_url>/<collection>`.
    pub fn endpoint(&self, collection: Collection) -> String {
        match self.endpoints.get(collection) {
            Some(url) => url.clone(),
            None => format!("{}/{}", self.base_url.trim_end_matches('/'), collection.path()),
        }
    }

    /// Reject URLs that cannot be parsed before any request is built.
    pub fn validate(&self) -> std::result::Result<(), crate::errors::LecternError> {
        for collection in Collection::ALL {
            let url = self.endpoint(collection);
            if let Err(e) = url::Url::parse(&url) {
                return Err(crate::errors::LecternError::Config(format!(
                    "endpoint for {} is not a valid URL ({}): {}",
                    collection, url, e
                )));
            }
        }
        Ok(())
    }
}
