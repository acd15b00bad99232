//! Run control: shared cancellation tokens and the control socket path.
//!
//! Every running session is registered under its subject with a cancel
//! token. A control client (e.g. `trackr cancel alpha#1` via socket) can
//! request cancellation; the session checks the token before each target and
//! stops with a partial result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Cooperative cancellation flag handed to a session.
///
/// A token is cancelled when its own flag is set or when the run-wide flag
/// of the [`RunControl`] that issued it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    own: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::Relaxed)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::Relaxed))
    }
}

/// Shared registry of subject -> cancel token.
///
/// A subject listed twice in one run shares one token; the entry goes away
/// when the last of its sessions unregisters.
#[derive(Debug, Default)]
pub struct RunControl {
    all: Arc<AtomicBool>,
    sessions: RwLock<HashMap<String, (CancelToken, usize)>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session about to start; returns the token it must poll.
    pub fn register(&self, subject: &str) -> CancelToken {
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        let entry = sessions.entry(subject.to_string()).or_insert_with(|| {
            let token = CancelToken {
                own: Arc::new(AtomicBool::new(false)),
                parent: Some(Arc::clone(&self.all)),
            };
            (token, 0)
        });
        entry.1 += 1;
        entry.0.clone()
    }

    /// Unregister a session (call when it finishes, whatever the outcome).
    pub fn unregister(&self, subject: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = sessions.get_mut(subject) {
            entry.1 = entry.1.saturating_sub(1);
            if entry.1 == 0 {
                sessions.remove(subject);
            }
        }
    }

    /// Request cancellation of one running session. Returns false if no
    /// session for `subject` is registered.
    pub fn request_cancel(&self, subject: &str) -> bool {
        match self
            .sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(subject)
        {
            Some((token, _)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every session registered now or later on this control.
    pub fn cancel_all(&self) {
        self.all.store(true, Ordering::Relaxed);
    }

    /// Subjects with a registered session.
    pub fn running(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        subjects.sort();
        subjects
    }
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("trackr")?.get_state_home();
    Ok(dir.join("control.sock"))
}
