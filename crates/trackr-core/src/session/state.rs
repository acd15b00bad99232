//! Session record and its state machine.

use crate::fetch::FetchAttempt;
use crate::registry::{Category, Mode, TargetDescriptor};

/// Lifecycle of one session: `Selecting -> Fetching -> Summarizing -> Done`.
/// `Fetching` is skipped when nothing was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Selecting,
    Fetching,
    Summarizing,
    Done,
}

impl SessionState {
    pub fn can_enter(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Selecting, Fetching) | (Selecting, Summarizing) | (Fetching, Summarizing) | (Summarizing, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Selecting => "selecting",
            SessionState::Fetching => "fetching",
            SessionState::Summarizing => "summarizing",
            SessionState::Done => "done",
        }
    }
}

/// One subject's pass through a mode.
#[derive(Debug, Clone)]
pub struct Session {
    pub subject: String,
    pub mode: Mode,
    pub state: SessionState,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    /// Targets chosen in `Selecting`, in fetch order.
    pub selected: Vec<TargetDescriptor>,
    /// Completed fetch attempts, in order.
    pub attempts: Vec<FetchAttempt>,
    /// Cancellation was observed before every selected target ran.
    pub cancelled: bool,
    /// Sticky proxy of the session, if any.
    pub proxy: Option<String>,
    /// Identity the subject used last before this session.
    pub previous_identity: Option<String>,
}

impl Session {
    pub fn new(subject: &str, mode: Mode, started_at: i64) -> Self {
        Self {
            subject: subject.to_string(),
            mode,
            state: SessionState::Selecting,
            started_at,
            finished_at: None,
            selected: Vec::new(),
            attempts: Vec::new(),
            cancelled: false,
            proxy: None,
            previous_identity: None,
        }
    }

    /// Move to `next`. Illegal transitions are programming errors.
    pub fn enter(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_enter(next),
            "illegal session transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        tracing::trace!(
            subject = %self.subject,
            from = self.state.as_str(),
            to = next.as_str(),
            "session state"
        );
        self.state = next;
    }

    /// Every selected critical target succeeded at least once.
    /// Diagnostic targets never count.
    pub fn priority_achieved(&self) -> bool {
        self.selected
            .iter()
            .filter(|t| t.category == Category::Critical && !t.diagnostic)
            .all(|t| {
                self.attempts
                    .iter()
                    .any(|a| a.target == t.id && a.outcome.is_success())
            })
    }
}
