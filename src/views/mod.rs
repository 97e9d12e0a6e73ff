//! Read-and-render view models.
//!
//! Builders here are pure: they take lists already fetched from the API and
//! compute what a screen shows. Fetching goes through [`ViewState`], which
//! tags each load with a generation so a slow response can never overwrite
//! the result of a newer one.

use tracing::debug;

use crate::errors::ApiError;

pub mod admin;
pub mod student;

pub use admin::{AdminDashboard, Analytics, CourseStats, RewardStats, StudentStats, UserFilter};
pub use student::{
    Catalog, CatalogEntry, CatalogFilter, CourseDetail, CourseState, LessonRow, ProgressSummary,
    RewardShelf,
};

/// Proof that a load was started; compare against [`ViewState`] later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Data of one view plus the bookkeeping that keeps it consistent.
#[derive(Debug)]
pub struct ViewState<T> {
    generation: u64,
    data: Option<T>,
    error: Option<String>,
    loading: bool,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            data: None,
            error: None,
            loading: false,
        }
    }
}

impl<T> ViewState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load. Any ticket handed out earlier becomes stale.
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.loading = true;
        Ticket(self.generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }

    /// Apply a finished load. Returns `false` and changes nothing when the
    /// ticket is stale. A failure keeps the previous data.
    pub fn apply(&mut self, ticket: Ticket, result: Result<T, ApiError>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.0,
                current = self.generation,
                "Discarding stale response"
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        true
    }

    /// Begin, await and apply in one step.
    pub async fn load<F>(&mut self, fut: F) -> Result<&T, ApiError>
    where
        F: std::future::Future<Output = Result<T, ApiError>>,
    {
        let ticket = self.begin();
        match fut.await {
            Ok(data) => {
                self.apply(ticket, Ok(data));
                self.data.as_ref().ok_or_else(|| {
                    ApiError::Parse("view was reloaded while applying".to_string())
                })
            }
            Err(e) => {
                self.apply(ticket, Err(e.clone()));
                Err(e)
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Integer mean of the present values; 0 when there are none.
pub(crate) fn mean(values: impl IntoIterator<Item = u32>) -> u32 {
    let (sum, n) = values
        .into_iter()
        .fold((0u64, 0u64), |(s, n), v| (s + v as u64, n + 1));
    if n == 0 {
        return 0;
    }
    ((sum as f64) / (n as f64)).round() as u32
}

/// Share of `part` in `whole` as a whole percent; 0 when `whole` is 0.
pub(crate) fn ratio_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}
