use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lectern_epub::Chapter;
use uuid::Uuid;

/// Opaque per-browser session identifier carried in a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Per-session document state.
///
/// `put` replaces the whole collection; readers get a shared snapshot that
/// later writes never mutate.
pub trait SessionStore: Send + Sync {
    fn put(&self, session: SessionId, chapters: Vec<Chapter>, document_id: String);

    fn get_chapters(&self, session: SessionId) -> Option<Arc<Vec<Chapter>>>;

    fn document_id(&self, session: SessionId) -> Option<String>;

    /// Drop expired sessions and return how many were removed.
    fn sweep_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Entry {
    document_id: String,
    chapters: Arc<Vec<Chapter>>,
    last_seen: Instant,
}

/// In-process store with an inactivity timeout.
///
/// Every read refreshes the session's timer; an expired entry reads as absent
/// even before the next sweep removes it.
#[derive(Debug)]
pub struct InMemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put_at(
        &self,
        session: SessionId,
        chapters: Vec<Chapter>,
        document_id: String,
        now: Instant,
    ) {
        let count = chapters.len();
        let replaced = self
            .entries()
            .insert(
                session,
                Entry {
                    document_id,
                    chapters: Arc::new(chapters),
                    last_seen: now,
                },
            )
            .is_some();
        tracing::debug!(%session, chapters = count, replaced, "stored session document");
    }

    fn with_live_entry<T>(
        &self,
        session: SessionId,
        now: Instant,
        f: impl FnOnce(&Entry) -> T,
    ) -> Option<T> {
        let mut entries = self.entries();
        let entry = entries.get_mut(&session)?;
        if now.saturating_duration_since(entry.last_seen) > self.ttl {
            entries.remove(&session);
            tracing::debug!(%session, "session expired on access");
            return None;
        }
        entry.last_seen = now;
        Some(f(entry))
    }

    fn get_chapters_at(&self, session: SessionId, now: Instant) -> Option<Arc<Vec<Chapter>>> {
        self.with_live_entry(session, now, |e| Arc::clone(&e.chapters))
    }

    fn document_id_at(&self, session: SessionId, now: Instant) -> Option<String> {
        self.with_live_entry(session, now, |e| e.document_id.clone())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.last_seen) <= self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(removed, remaining = entries.len(), "swept expired sessions");
        }
        removed
    }
}

impl SessionStore for InMemorySessionStore {
    fn put(&self, session: SessionId, chapters: Vec<Chapter>, document_id: String) {
        self.put_at(session, chapters, document_id, Instant::now());
    }

    fn get_chapters(&self, session: SessionId) -> Option<Arc<Vec<Chapter>>> {
        self.get_chapters_at(session, Instant::now())
    }

    fn document_id(&self, session: SessionId) -> Option<String> {
        self.document_id_at(session, Instant::now())
    }

    fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}
