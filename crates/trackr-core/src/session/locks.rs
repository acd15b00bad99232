//! Per-subject mutual exclusion: at most one active session per subject.
//!
//! Entries live only while a session holds or waits for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug)]
struct Slot {
    lock: Arc<tokio::sync::Mutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

type SlotMap = Arc<Mutex<HashMap<String, Slot>>>;

#[derive(Debug, Default)]
pub struct SubjectLocks {
    slots: SlotMap,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other session of `subject` is active; the guard holds the slot.
    pub async fn acquire(&self, subject: &str) -> SubjectGuard {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            let slot = slots.entry(subject.to_string()).or_insert_with(|| Slot {
                lock: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        // Built before waiting so a dropped acquire still gives its place back.
        let mut guard = SubjectGuard {
            subject: subject.to_string(),
            slots: Arc::clone(&self.slots),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Exclusive hold on one subject. Releasing the last user drops the entry.
#[derive(Debug)]
pub struct SubjectGuard {
    subject: String,
    slots: SlotMap,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for SubjectGuard {
    fn drop(&mut self) {
        self.held.take();
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = slots.get_mut(&self.subject) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.subject);
            }
        }
    }
}
