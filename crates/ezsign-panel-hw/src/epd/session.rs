//! Session settings, cancellation and protocol states.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::protocol::validate_max_fragment;
use crate::{Error, Result, MAX_FRAGMENT};

/// Default delay between refresh status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of refresh status polls before giving up.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 60;

/// Per-session transfer and polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Image payload bytes per APDU (1-250).
    pub max_fragment: usize,
    /// Delay between refresh status polls.
    pub poll_interval: Duration,
    /// Polls before the refresh is considered timed out.
    pub max_poll_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_fragment: MAX_FRAGMENT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        validate_max_fragment(self.max_fragment)?;
        validate_polling(self.poll_interval, self.max_poll_attempts)
    }
}

pub(crate) fn validate_polling(interval: Duration, attempts: u32) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::InvalidPolling("poll interval must be > 0"));
    }
    if attempts == 0 {
        return Err(Error::InvalidPolling("poll attempts must be > 0"));
    }
    Ok(())
}

/// Cooperative cancellation flag.
///
/// Cancellation is observed before authentication, before each image frame
/// and before each status poll. A transmission already in flight, or the
/// sleep between polls, is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of any write observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Protocol state of a device session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, not authenticated.
    #[default]
    Idle,
    /// Credential accepted.
    Authenticated,
    /// Sending image frames; `next` is the index of the next frame.
    Streaming { next: usize },
    /// Refresh command accepted.
    Refreshing,
    /// Waiting for the panel; `attempt` polls have reported busy so far.
    Polling { attempt: u32 },
    /// Refresh finished.
    Done,
    /// The last write aborted with `reason`.
    Failed { reason: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed { .. })
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Streaming { next } => write!(f, "streaming (frame {})", next),
            SessionState::Refreshing => write!(f, "refreshing"),
            SessionState::Polling { attempt } => write!(f, "polling (attempt {})", attempt),
            SessionState::Done => write!(f, "done"),
            SessionState::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
