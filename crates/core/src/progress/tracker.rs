//! Process-wide store of ingestion session snapshots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::config::ProgressConfig;
use crate::metrics::PROGRESS_SESSIONS_EVICTED;

use super::types::{IngestionSession, IngestionStage, ProgressSink, ProgressUpdate};

type SessionSlot = Arc<Mutex<IngestionSession>>;

/// Keyed store of ingestion sessions.
///
/// The outer map lock is only held to find or insert a slot; each session has
/// its own lock, so writers on one session never block readers of another.
/// Terminal sessions are retained for `retention` and the store never holds
/// more than `max_sessions` entries.
pub struct ProgressTracker {
    sessions: RwLock<HashMap<String, SessionSlot>>,
    max_sessions: usize,
    retention: Duration,
}

impl ProgressTracker {
    pub fn new(config: &ProgressConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: config.max_sessions.max(1),
            retention: Duration::seconds(config.retention_secs as i64),
        }
    }

    /// Open a session under a freshly generated id.
    pub fn open(self: &Arc<Self>, stage: IngestionStage) -> SessionHandle {
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if self.create(&id, stage).is_some() {
                return SessionHandle {
                    tracker: Arc::clone(self),
                    id,
                };
            }
        }
    }

    /// Open a session under a caller-chosen id; `None` if the id is taken.
    pub fn open_with_id(
        self: &Arc<Self>,
        id: &str,
        stage: IngestionStage,
    ) -> Option<SessionHandle> {
        self.create(id, stage)?;
        Some(SessionHandle {
            tracker: Arc::clone(self),
            id: id.to_string(),
        })
    }

    /// Create a session at progress 0. Returns `None` if the id is taken.
    pub fn create(&self, id: &str, stage: IngestionStage) -> Option<IngestionSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(id) {
            return None;
        }

        self.purge_locked(&mut sessions);
        while sessions.len() >= self.max_sessions {
            if !Self::evict_oldest(&mut sessions) {
                break;
            }
        }

        let session = IngestionSession::new(id, stage);
        sessions.insert(id.to_string(), Arc::new(Mutex::new(session.clone())));
        debug!(upload_id = %id, stage = stage.as_str(), "Progress session created");
        Some(session)
    }

    /// Apply an update to a session.
    ///
    /// Returns `false` when the update was dropped: unknown id, terminal
    /// session, or a backwards stage transition. Progress never decreases
    /// except on entry into ERROR, which forces it to 0.
    pub fn update(&self, id: &str, update: ProgressUpdate) -> bool {
        let Some(slot) = self.slot(id) else {
            debug!(upload_id = %id, "Dropping update for unknown session");
            return false;
        };
        let mut session = slot.lock().unwrap_or_else(|e| e.into_inner());

        if session.stage.is_terminal() {
            debug!(
                upload_id = %id,
                stage = session.stage.as_str(),
                "Dropping update for terminal session"
            );
            return false;
        }

        match update.stage {
            IngestionStage::Unknown => return false,
            IngestionStage::Error => {
                session.progress = 0;
            }
            next => {
                if let (Some(from), Some(to)) = (session.stage.rank(), next.rank()) {
                    if to < from {
                        warn!(
                            upload_id = %id,
                            from = session.stage.as_str(),
                            to = next.as_str(),
                            "Ignoring backwards stage transition"
                        );
                        return false;
                    }
                }
                session.progress = session.progress.max(update.progress.min(100));
            }
        }

        session.stage = update.stage;
        session.message = update.message;
        // Later stages carry no byte counts; keep the transfer totals.
        if update.loaded > 0 || update.total > 0 {
            session.bytes_loaded = update.loaded;
            session.bytes_total = update.total;
        }
        session.speed = update.speed.max(0.0);
        session.updated_at = Utc::now();
        if let Some(result) = update.result {
            session.result_asset_id = Some(result.asset_id);
            session.result_display_name = Some(result.display_name);
        }
        true
    }

    /// Current snapshot, or the "unknown" sentinel.
    pub fn get(&self, id: &str) -> IngestionSession {
        self.lookup(id).unwrap_or_else(|| IngestionSession::unknown(id))
    }

    /// Current snapshot if the id is tracked.
    pub fn lookup(&self, id: &str) -> Option<IngestionSession> {
        let slot = self.slot(id)?;
        let session = slot.lock().unwrap_or_else(|e| e.into_inner());
        Some(session.clone())
    }

    /// Drop terminal sessions older than the retention window.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        self.purge_locked(&mut sessions)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sessions not yet in a terminal stage.
    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .values()
            .filter(|slot| {
                !slot
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .stage
                    .is_terminal()
            })
            .count()
    }

    fn slot(&self, id: &str) -> Option<SessionSlot> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).cloned()
    }

    fn purge_locked(&self, sessions: &mut HashMap<String, SessionSlot>) -> usize {
        let cutoff = Utc::now() - self.retention;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            let session = slot.lock().unwrap_or_else(|e| e.into_inner());
            !(session.stage.is_terminal() && session.updated_at <= cutoff)
        });
        let purged = before - sessions.len();
        if purged > 0 {
            PROGRESS_SESSIONS_EVICTED
                .with_label_values(&["expired"])
                .inc_by(purged as u64);
            debug!(purged, "Purged expired progress sessions");
        }
        purged
    }

    /// Evict the oldest terminal session, falling back to the oldest session
    /// of any stage. Returns `false` if the map is empty.
    fn evict_oldest(sessions: &mut HashMap<String, SessionSlot>) -> bool {
        let mut oldest_terminal = None;
        let mut oldest_any = None;

        for (id, slot) in sessions.iter() {
            let session = slot.lock().unwrap_or_else(|e| e.into_inner());
            let key = (session.updated_at, id.clone());
            if session.stage.is_terminal()
                && oldest_terminal.as_ref().is_none_or(|old| key < *old)
            {
                oldest_terminal = Some(key.clone());
            }
            if oldest_any.as_ref().is_none_or(|old| key < *old) {
                oldest_any = Some(key);
            }
        }

        let (victim, reason) = match (oldest_terminal, oldest_any) {
            (Some((_, id)), _) => (id, "capacity"),
            (None, Some((_, id))) => {
                warn!(upload_id = %id, "Progress store full, evicting an active session");
                (id, "capacity_active")
            }
            (None, None) => return false,
        };

        sessions.remove(&victim);
        PROGRESS_SESSIONS_EVICTED.with_label_values(&[reason]).inc();
        true
    }
}

/// A tracker entry bound to one session id; the pipeline's progress sink.
#[derive(Clone)]
pub struct SessionHandle {
    tracker: Arc<ProgressTracker>,
    id: String,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn snapshot(&self) -> IngestionSession {
        self.tracker.get(&self.id)
    }
}

impl ProgressSink for SessionHandle {
    fn report(&self, update: ProgressUpdate) {
        self.tracker.update(&self.id, update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::AssetRef;

    fn tracker(max_sessions: usize, retention_secs: u64) -> Arc<ProgressTracker> {
        Arc::new(ProgressTracker::new(&ProgressConfig {
            max_sessions,
            retention_secs,
            sweep_interval_secs: 60,
        }))
    }

    fn downloading(progress: u8) -> ProgressUpdate {
        ProgressUpdate::new(IngestionStage::Downloading, progress, "Downloading")
    }

    #[test]
    fn test_create_and_get() {
        let tracker = tracker(16, 3600);
        let session = tracker.create("a", IngestionStage::Downloading).unwrap();
        assert_eq!(session.progress, 0);
        assert_eq!(session.stage, IngestionStage::Downloading);

        let fetched = tracker.get("a");
        assert_eq!(fetched.id, "a");
        assert_eq!(fetched.stage, IngestionStage::Downloading);
    }

    #[test]
    fn test_create_duplicate_id_rejected() {
        let tracker = tracker(16, 3600);
        assert!(tracker.create("a", IngestionStage::Receiving).is_some());
        assert!(tracker.create("a", IngestionStage::Receiving).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_get_unknown_returns_sentinel() {
        let tracker = tracker(16, 3600);
        let session = tracker.get("missing");
        assert_eq!(session.stage, IngestionStage::Unknown);
        assert_eq!(session.progress, 0);
        assert_eq!(session.message, "Upload ID not found");
        assert!(tracker.lookup("missing").is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let tracker = tracker(16, 3600);
        tracker.create("a", IngestionStage::Downloading);

        assert!(tracker.update("a", downloading(30)));
        assert!(tracker.update("a", downloading(20)));
        assert_eq!(tracker.get("a").progress, 30);
    }

    #[test]
    fn test_error_resets_progress_and_freezes() {
        let tracker = tracker(16, 3600);
        tracker.create("a", IngestionStage::Downloading);
        tracker.update("a", downloading(40));

        assert!(tracker.update("a", ProgressUpdate::error("boom")));
        let session = tracker.get("a");
        assert_eq!(session.stage, IngestionStage::Error);
        assert_eq!(session.progress, 0);

        assert!(!tracker.update("a", downloading(45)));
        assert_eq!(tracker.get("a").stage, IngestionStage::Error);
    }

    #[test]
    fn test_complete_is_terminal() {
        let tracker = tracker(16, 3600);
        tracker.create("a", IngestionStage::Receiving);
        let asset = AssetRef {
            asset_id: "files/1".to_string(),
            display_name: "clip.mp4".to_string(),
        };
        assert!(tracker.update("a", ProgressUpdate::complete("done", asset)));
        assert!(!tracker.update("a", ProgressUpdate::error("late")));

        let session = tracker.get("a");
        assert_eq!(session.stage, IngestionStage::Complete);
        assert_eq!(session.progress, 100);
        assert_eq!(session.result_asset_id.as_deref(), Some("files/1"));
        assert_eq!(session.result_display_name.as_deref(), Some("clip.mp4"));
    }

    #[test]
    fn test_backwards_stage_rejected() {
        let tracker = tracker(16, 3600);
        tracker.create("a", IngestionStage::Downloading);
        tracker.update(
            "a",
            ProgressUpdate::new(IngestionStage::Processing, 60, "Processing"),
        );
        assert!(!tracker.update("a", downloading(70)));
        assert_eq!(tracker.get("a").stage, IngestionStage::Processing);
    }

    #[test]
    fn test_update_unknown_id() {
        let tracker = tracker(16, 3600);
        assert!(!tracker.update("ghost", downloading(10)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_expired_terminal_sessions_purged() {
        let tracker = tracker(16, 0);
        tracker.create("done", IngestionStage::Receiving);
        tracker.update("done", ProgressUpdate::error("failed"));
        tracker.create("live", IngestionStage::Receiving);

        assert_eq!(tracker.purge_expired(), 0);
        assert!(tracker.lookup("done").is_none());
        assert!(tracker.lookup("live").is_some());
    }

    #[test]
    fn test_capacity_evicts_terminal_first() {
        let tracker = tracker(2, 3600);
        tracker.create("live", IngestionStage::Downloading);
        tracker.create("done", IngestionStage::Downloading);
        tracker.update("done", ProgressUpdate::error("failed"));

        tracker.create("new", IngestionStage::Receiving);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.lookup("live").is_some());
        assert!(tracker.lookup("done").is_none());
        assert!(tracker.lookup("new").is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest_active_when_needed() {
        let tracker = tracker(1, 3600);
        tracker.create("first", IngestionStage::Downloading);
        tracker.create("second", IngestionStage::Downloading);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.lookup("second").is_some());
    }

    #[test]
    fn test_open_generates_unique_ids() {
        let tracker = tracker(16, 3600);
        let a = tracker.open(IngestionStage::Receiving);
        let b = tracker.open(IngestionStage::Downloading);
        assert_ne!(a.id(), b.id());
        assert_eq!(tracker.len(), 2);
        assert_eq!(b.snapshot().stage, IngestionStage::Downloading);
    }

    #[test]
    fn test_active_count() {
        let tracker = tracker(16, 3600);
        tracker.create("a", IngestionStage::Downloading);
        tracker.create("b", IngestionStage::Downloading);
        tracker.update("b", ProgressUpdate::error("failed"));
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_sessions_are_isolated_across_threads() {
        let tracker = tracker(64, 3600);
        let a = tracker.open(IngestionStage::Downloading);
        let b = tracker.open(IngestionStage::Receiving);

        let handles: Vec<_> = [
            (a.clone(), IngestionStage::Downloading),
            (b.clone(), IngestionStage::Receiving),
        ]
        .into_iter()
        .map(|(handle, stage)| {
            std::thread::spawn(move || {
                for p in 0..=50u8 {
                    handle.report(ProgressUpdate::new(stage, p, "tick").with_bytes(p as u64, 50));
                }
            })
        })
        .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(a.snapshot().stage, IngestionStage::Downloading);
        assert_eq!(b.snapshot().stage, IngestionStage::Receiving);
        assert_eq!(a.snapshot().progress, 50);
        assert_eq!(b.snapshot().bytes_loaded, 50);
    }
}
