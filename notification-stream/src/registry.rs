//! Registry of live notification streams
//!
//! The registry is the sole owner of every live [`StreamSession`]. Entries are
//! keyed by [`StreamKey`] and carry an event counter. Alongside the entries it
//! keeps the table of pending reconnects, so that a teardown and a recovery
//! for the same key are decided under one lock.
//!
//! Closing a session never happens under the lock: entries are detached
//! first and closed afterwards, bounded by the close timeout.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::AbortHandle;

use crate::error::SessionError;
use crate::session::StreamSession;
use crate::types::{StreamCategory, StreamKey};

/// Identifier the registry assigns to each session it stores.
///
/// Identifiers increase monotonically, so they also give insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The registry's record of one stream.
pub struct StreamEntry {
    key: StreamKey,
    session_id: SessionId,
    session: Box<dyn StreamSession>,
    counter: u64,
    created_at: SystemTime,
}

impl StreamEntry {
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            key: self.key.clone(),
            session_id: self.session_id,
            url: self.session.url().to_string(),
            counter: self.counter,
            created_at: self.created_at,
        }
    }
}

/// Point-in-time copy of a [`StreamEntry`], safe to keep while the registry
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    pub key: StreamKey,
    pub session_id: SessionId,
    pub url: String,
    pub counter: u64,
    pub created_at: SystemTime,
}

/// A scheduled re-open for a key whose session failed.
struct PendingReconnect {
    /// Identifies the retry chain that owns this slot
    chain: u64,
    /// Cancels the delay timer; `None` until the timer is armed
    abort: Option<AbortHandle>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<StreamKey, Vec<StreamEntry>>,
    pending: HashMap<StreamKey, PendingReconnect>,
    next_session_id: u64,
    next_chain: u64,
}

impl RegistryState {
    fn insert(&mut self, key: StreamKey, session: Box<dyn StreamSession>) -> SessionId {
        self.next_session_id += 1;
        let session_id = SessionId::new(self.next_session_id);

        let slot = self.entries.entry(key.clone()).or_default();
        if !slot.is_empty() {
            tracing::warn!(
                key = %key,
                existing = slot.len(),
                "Registering a second stream for a key that already has one"
            );
        }
        slot.push(StreamEntry {
            key,
            session_id,
            session,
            counter: 0,
            created_at: SystemTime::now(),
        });

        session_id
    }

    /// Drop the reconnect slot of `key` and stop its timer.
    fn cancel_pending(&mut self, key: &StreamKey) -> bool {
        match self.pending.remove(key) {
            Some(pending) => {
                if let Some(abort) = pending.abort {
                    abort.abort();
                }
                true
            }
            None => false,
        }
    }

    fn keys_in_order(&self) -> Vec<String> {
        let mut entries: Vec<&StreamEntry> = self.entries.values().flatten().collect();
        entries.sort_by_key(|e| e.session_id);
        entries.iter().map(|e| e.key.to_string()).collect()
    }
}

/// Thread-safe registry of notification streams.
///
/// Duplicate keys are tolerated: adding a key that is already present logs a
/// warning and appends a second entry. Lookups return the earliest entry.
pub struct StreamRegistry {
    state: Mutex<RegistryState>,
    close_timeout: Duration,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl StreamRegistry {
    /// Create an empty registry that bounds every session close by
    /// `close_timeout`.
    pub fn new(close_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            close_timeout,
        }
    }

    /// Insert a new entry with counter 0 and return the id assigned to
    /// `session`.
    ///
    /// No uniqueness check is made against live entries; callers remove the
    /// old entry first. A reconnect pending for `key` is cancelled: the new
    /// session takes its place.
    pub fn add(&self, key: StreamKey, session: Box<dyn StreamSession>) -> SessionId {
        let mut state = self.state.lock();
        if state.cancel_pending(&key) {
            tracing::info!(key = %key, "New stream replaces pending reconnect");
        }
        let session_id = state.insert(key.clone(), session);

        tracing::debug!(
            key = %key,
            session_id = %session_id,
            "Notification streams after adding: {}",
            state.keys_in_order().join(", ")
        );

        session_id
    }

    /// Snapshot of the earliest entry for `key`.
    pub fn lookup(&self, key: &StreamKey) -> Option<StreamSnapshot> {
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .and_then(|slot| slot.first())
            .map(StreamEntry::snapshot)
    }

    /// True if at least one entry exists for `key`.
    pub fn exists(&self, key: &StreamKey) -> bool {
        let state = self.state.lock();
        state.entries.get(key).is_some_and(|slot| !slot.is_empty())
    }

    /// Increment the counter of the entry for `key` and return the new value.
    ///
    /// Returns -1 when no entry matches; nothing is created in that case.
    pub fn increment_counter(&self, key: &StreamKey) -> i64 {
        let mut state = self.state.lock();
        match state.entries.get_mut(key).and_then(|slot| slot.first_mut()) {
            Some(entry) => {
                entry.counter += 1;
                entry.counter as i64
            }
            None => {
                tracing::warn!(
                    key = %key,
                    controller = %key.controller_name,
                    "No stream found to increase counter for"
                );
                -1
            }
        }
    }

    /// Remove every entry for `key`, closing each session.
    ///
    /// The entries leave the registry before their sessions are closed:
    /// `exists(key)` is already false while the closes run. Each close is
    /// bounded by the close timeout. Removal always succeeds; close failures
    /// are logged.
    ///
    /// This is a deliberate teardown: a reconnect pending for `key` is
    /// cancelled too.
    pub async fn remove(&self, key: &StreamKey) {
        let detached = {
            let mut state = self.state.lock();
            if state.cancel_pending(key) {
                tracing::debug!(key = %key, "Cancelled pending reconnect");
            }
            state.entries.remove(key).unwrap_or_default()
        };

        for entry in detached {
            self.close_detached(&entry.key, Some(entry.session_id), entry.session)
                .await;
            tracing::debug!(key = %key, session_id = %entry.session_id, "Removed stream item");
        }
    }

    /// Remove the CONFIGURATION, OPERATIONAL and DEVICE streams of a
    /// controller, in that order.
    pub async fn remove_all_for_controller(&self, name: &str, release: &str) {
        for category in StreamCategory::ALL {
            self.remove(&StreamKey::new(name, release, category)).await;
        }
    }

    /// Snapshot of every entry, in insertion order.
    pub fn list_all(&self) -> Vec<StreamSnapshot> {
        let state = self.state.lock();
        let mut snapshots: Vec<StreamSnapshot> = state
            .entries
            .values()
            .flatten()
            .map(StreamEntry::snapshot)
            .collect();
        snapshots.sort_by_key(|s| s.session_id);
        snapshots
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys with a reconnect waiting for its delay to elapse.
    pub fn pending_reconnects(&self) -> Vec<StreamKey> {
        let state = self.state.lock();
        state.pending.keys().cloned().collect()
    }

    pub fn is_reconnect_pending(&self, key: &StreamKey) -> bool {
        let state = self.state.lock();
        state.pending.contains_key(key)
    }

    /// Detach the failed session `session_id` and reserve a reconnect slot
    /// for `key`.
    ///
    /// Returns `None` if the session is no longer registered, i.e. it was
    /// torn down deliberately; the retry chain ends there.
    pub(crate) fn begin_recovery(
        &self,
        key: &StreamKey,
        session_id: SessionId,
    ) -> Option<(Box<dyn StreamSession>, u64)> {
        let mut state = self.state.lock();

        let slot = state.entries.get_mut(key)?;
        let position = slot.iter().position(|e| e.session_id == session_id)?;
        let entry = slot.remove(position);
        if slot.is_empty() {
            state.entries.remove(key);
        }

        state.next_chain += 1;
        let chain = state.next_chain;
        let previous = state
            .pending
            .insert(key.clone(), PendingReconnect { chain, abort: None });

        // Only one retry chain per key survives.
        if let Some(abort) = previous.and_then(|p| p.abort) {
            abort.abort();
        }

        Some((entry.session, chain))
    }

    /// Attach the delay timer to the reconnect slot of `chain`.
    ///
    /// Returns false if the slot was cancelled in the meantime; the caller
    /// then aborts the timer itself.
    pub(crate) fn arm_recovery(&self, key: &StreamKey, chain: u64, abort: AbortHandle) -> bool {
        let mut state = self.state.lock();
        match state.pending.get_mut(key) {
            Some(pending) if pending.chain == chain => {
                pending.abort = Some(abort);
                true
            }
            _ => false,
        }
    }

    /// Complete a reconnect: release the slot of `chain` and register the
    /// new session in one step.
    ///
    /// Returns `Err(session)` if the slot was cancelled; the caller must close
    /// the session it created.
    pub(crate) fn commit_recovery(
        &self,
        key: &StreamKey,
        chain: u64,
        session: Box<dyn StreamSession>,
    ) -> Result<SessionId, Box<dyn StreamSession>> {
        let mut state = self.state.lock();
        match state.pending.get(key) {
            Some(pending) if pending.chain == chain => {
                state.pending.remove(key);
            }
            _ => return Err(session),
        }

        let session_id = state.insert(key.clone(), session);
        tracing::debug!(
            key = %key,
            session_id = %session_id,
            "Notification streams after reconnect: {}",
            state.keys_in_order().join(", ")
        );
        Ok(session_id)
    }

    /// True while the reconnect slot of `chain` is still live.
    pub(crate) fn recovery_is_live(&self, key: &StreamKey, chain: u64) -> bool {
        let state = self.state.lock();
        state.pending.get(key).is_some_and(|p| p.chain == chain)
    }

    /// Cancel every pending reconnect and return how many there were.
    pub(crate) fn cancel_all_recoveries(&self) -> usize {
        let mut state = self.state.lock();
        let pending: Vec<PendingReconnect> = state.pending.drain().map(|(_, p)| p).collect();
        for abort in pending.iter().filter_map(|p| p.abort.as_ref()) {
            abort.abort();
        }
        pending.len()
    }

    /// Keys of every registered entry, duplicates collapsed.
    pub(crate) fn keys(&self) -> Vec<StreamKey> {
        let state = self.state.lock();
        state.entries.keys().cloned().collect()
    }

    /// Close a session that is no longer in the registry, bounded by the
    /// close timeout. Failures are logged, never returned.
    pub(crate) async fn close_detached(
        &self,
        key: &StreamKey,
        session_id: Option<SessionId>,
        session: Box<dyn StreamSession>,
    ) {
        let result = match tokio::time::timeout(self.close_timeout, session.close()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::CloseTimedOut(self.close_timeout)),
        };

        if let Err(e) = result {
            tracing::error!(
                key = %key,
                controller = %key.controller_name,
                category = %key.category,
                session_id = ?session_id,
                url = session.url(),
                "Stream session could not be closed: {}",
                e
            );
        }
    }
}
