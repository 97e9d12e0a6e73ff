//! Countdown driver.
//!
//! A tokio task ticks the shared session once per period. It stops on its own
//! when the session finishes (by expiry or by hand) and is aborted when the
//! [`TimerHandle`] is dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use super::session::{SessionResult, Tick, TestSession};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Tick { remaining_secs: u64 },
    Expired(SessionResult),
}

/// Owns the countdown task.
#[derive(Debug)]
pub struct TimerHandle {
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Wait for the task to end on its own.
    pub async fn join(mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start ticking `session` every `period`, reporting each tick on `events`.
pub fn spawn_countdown(
    session: Arc<Mutex<TestSession>>,
    period: Duration,
    events: mpsc::UnboundedSender<TimerEvent>,
) -> TimerHandle {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let outcome = {
                let mut guard = session.lock().await;
                if guard.is_finished() {
                    break;
                }
                guard.tick()
            };
            match outcome {
                Ok(Tick::Running { remaining_secs }) => {
                    let _ = events.send(TimerEvent::Tick { remaining_secs });
                }
                Ok(Tick::Expired(result)) => {
                    debug!("Time is up, test finished automatically");
                    let _ = events.send(TimerEvent::Expired(result));
                    break;
                }
                Err(_) => break,
            }
        }
    });
    TimerHandle { handle }
}
