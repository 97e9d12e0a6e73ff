//! Test-taking engine: scoring rules, the session state machine and the
//! countdown that drives it.

pub mod scoring;
pub mod session;
pub mod timer;

pub use scoring::{Answer, QuestionOutcome, Score, Verdict};
pub use session::{SessionResult, SessionState, TestSession, Tick};
pub use timer::{spawn_countdown, TimerEvent, TimerHandle, TICK_PERIOD};
