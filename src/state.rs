//! Application state: the live wizard sessions plus the configuration and
//! collaborators every session shares.
//!
//! Sessions are kept in memory only. Each action takes the write lock for
//! one synchronous `apply`, so edits to a session never interleave.
//! Opening a session sweeps out idle ones and enforces the live-session cap.

use std::{collections::HashMap, sync::Arc, time::Instant};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::collab::{DataUriRenderer, InviteCodeRenderer, LogSink, Notifier, SubmissionSink, TracingNotifier};
use crate::config::{load_wizard_config_from_env, WizardConfig};
use crate::wizard::WizardSession;

/// A stored session and the last time a request touched it.
pub struct SessionEntry {
    pub session: WizardSession,
    pub touched: Instant,
}

impl SessionEntry {
    fn new(session: WizardSession) -> Self {
        Self { session, touched: Instant::now() }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    pub config: Arc<WizardConfig>,
    pub notifier: Arc<dyn Notifier>,
    pub sink: Arc<dyn SubmissionSink>,
    pub renderer: Arc<dyn InviteCodeRenderer>,
}

impl AppState {
    /// Build state from env: load config and wire the default collaborators.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_wizard_config_from_env().unwrap_or_default();
        info!(
            target: "challenge_wizard",
            default_outcome_weight = config.default_outcome_weight,
            invite_base_url = %config.invite_base_url,
            companies = config.companies.len(),
            "Wizard configuration ready"
        );
        Self::with_parts(config, Arc::new(TracingNotifier), Arc::new(LogSink), Arc::new(DataUriRenderer))
    }

    pub fn with_parts(
        config: WizardConfig,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn SubmissionSink>,
        renderer: Arc<dyn InviteCodeRenderer>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            notifier,
            sink,
            renderer,
        }
    }

    /// Open a fresh session with a default draft.
    #[instrument(level = "debug", skip(self))]
    pub async fn open_session(&self) -> WizardSession {
        let session = WizardSession::new();
        let mut sessions = self.sessions.write().await;
        evict_stale(&mut sessions, &self.config, Instant::now());
        sessions.insert(session.id, SessionEntry::new(session.clone()));
        info!(target: "wizard", session = %session.id, live = sessions.len(), "Session opened");
        session
    }

    /// Snapshot of a session by id.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_session(&self, id: Uuid) -> Option<WizardSession> {
        self.sessions.read().await.get(&id).map(|e| e.session.clone())
    }

    /// Drop a session. Returns false if it was unknown.
    #[instrument(level = "debug", skip(self))]
    pub async fn discard_session(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(target: "wizard", session = %id, "Session discarded");
        }
        removed
    }

    /// Run `f` against a session under the write lock.
    /// `None` when the session does not exist.
    pub async fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut WizardSession) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(&id).map(|entry| {
            entry.touched = Instant::now();
            f(&mut entry.session)
        })
    }
}

/// Drop sessions idle longer than the configured limit, then the least
/// recently touched ones until there is room for one more.
fn evict_stale(sessions: &mut HashMap<Uuid, SessionEntry>, cfg: &WizardConfig, now: Instant) {
    let idle = cfg.session_idle();
    let before = sessions.len();
    sessions.retain(|_, e| now.saturating_duration_since(e.touched) < idle);

    let room = cfg.max_sessions.saturating_sub(1);
    if sessions.len() > room {
        let mut by_age: Vec<(Instant, Uuid)> = sessions.iter().map(|(id, e)| (e.touched, *id)).collect();
        by_age.sort();
        let excess = sessions.len() - room;
        for (_, id) in by_age.into_iter().take(excess) {
            sessions.remove(&id);
        }
    }

    let evicted = before - sessions.len();
    if evicted > 0 {
        info!(target: "wizard", evicted, live = sessions.len(), "Evicted stale sessions");
    }
}
