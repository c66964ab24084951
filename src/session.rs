//! Session registry
//!
//! Maps session ids to their per-session state. A session is bound to the
//! agent that created it; the state is built exactly once per id, even when
//! two first turns race.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Session<S> {
    pub id: String,
    pub agent: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    last_used: Mutex<DateTime<Utc>>,
    in_flight: AtomicUsize,
    pub state: S,
}

impl<S> Session<S> {
    fn new(id: String, agent: String, user_id: String, state: S) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent,
            user_id,
            created_at: now,
            last_used: Mutex::new(now),
            in_flight: AtomicUsize::new(0),
            state,
        }
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        *self
            .last_used
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn touch(&self) {
        *self
            .last_used
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Utc::now();
    }

    /// Mark a turn as running until the guard drops.
    ///
    /// A session with a running turn is never evicted, and finishing the turn
    /// counts as use whether it succeeded or not.
    pub fn begin_turn(&self) -> TurnGuard<'_, S> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        TurnGuard { session: self }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn idle_longer_than(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        !self.is_busy()
            && (now - self.last_used())
                .to_std()
                .is_ok_and(|idle| idle > ttl)
    }
}

/// Held for the duration of one turn on a session
pub struct TurnGuard<'a, S> {
    session: &'a Session<S>,
}

impl<S> Drop for TurnGuard<'_, S> {
    fn drop(&mut self) {
        self.session.touch();
        self.session.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Idle time after which a session may be evicted
    pub ttl: Duration,
    /// Soft cap on live sessions
    pub capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            capacity: 10_000,
        }
    }
}

pub struct SessionRegistry<S> {
    sessions: DashMap<String, Arc<Session<S>>>,
    config: RegistryConfig,
}

impl<S> SessionRegistry<S> {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Return the session for `session_id`, creating it with `make_state` if
    /// the id is unseen.
    ///
    /// `make_state` runs while the map entry is locked, so it must be cheap
    /// and synchronous. Reusing an id with a different agent is rejected.
    pub fn get_or_create<F>(
        &self,
        session_id: &str,
        agent: &str,
        user_id: &str,
        make_state: F,
    ) -> Result<Arc<Session<S>>, CoreError>
    where
        F: FnOnce() -> Result<S, CoreError>,
    {
        let existing = self.sessions.get(session_id).map(|s| Arc::clone(&s));
        if let Some(session) = existing {
            return Self::check_binding(session, agent);
        }

        if self.sessions.len() >= self.config.capacity {
            self.make_room(Utc::now());
        }

        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => Self::check_binding(Arc::clone(entry.get()), agent),
            Entry::Vacant(entry) => {
                let state = make_state()?;
                let session = Arc::new(Session::new(
                    session_id.to_string(),
                    agent.to_string(),
                    user_id.to_string(),
                    state,
                ));
                entry.insert(Arc::clone(&session));
                tracing::info!(session_id = %session_id, agent = %agent, "Session created");
                Ok(session)
            }
        }
    }

    fn check_binding(session: Arc<Session<S>>, agent: &str) -> Result<Arc<Session<S>>, CoreError> {
        if session.agent != agent {
            return Err(CoreError::SessionAgentMismatch {
                session_id: session.id.clone(),
                bound: session.agent.clone(),
                requested: agent.to_string(),
            });
        }
        session.touch();
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session<S>>> {
        self.sessions.get(session_id).map(|s| Arc::clone(&s))
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<Session<S>>> {
        self.sessions.remove(session_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle for longer than the TTL; returns how many went
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        let ttl = self.config.ttl;
        self.sessions
            .retain(|_, session| !session.idle_longer_than(ttl, now));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "Expired sessions evicted");
        }
        evicted
    }

    /// Drop the least recently used session that has no turn running
    pub fn evict_lru(&self) -> Option<String> {
        let oldest = self
            .sessions
            .iter()
            .filter(|entry| !entry.value().is_busy())
            .min_by_key(|entry| entry.value().last_used())
            .map(|entry| entry.key().clone())?;
        self.sessions.remove(&oldest);
        tracing::info!(session_id = %oldest, "Least recently used session evicted");
        Some(oldest)
    }

    fn make_room(&self, now: DateTime<Utc>) {
        self.evict_expired(now);
        while self.sessions.len() >= self.config.capacity {
            if self.evict_lru().is_none() {
                break;
            }
        }
    }
}

impl<S: Send + Sync + 'static> SessionRegistry<S> {
    /// Periodically evict expired sessions until `cancel` fires
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::debug!("Session sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        self.evict_expired(Utc::now());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> SessionRegistry<usize> {
        SessionRegistry::new(RegistryConfig {
            ttl: Duration::from_secs(60),
            capacity,
        })
    }

    #[test]
    fn test_create_then_reuse() {
        let registry = registry(10);
        let first = registry
            .get_or_create("s1", "AgentA", "user-1", || Ok(1))
            .unwrap();
        let second = registry
            .get_or_create("s1", "AgentA", "user-1", || Ok(2))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.state, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_agent_mismatch_rejected() {
        let registry = registry(10);
        registry
            .get_or_create("s1", "AgentA", "user-1", || Ok(1))
            .unwrap();

        let err = registry
            .get_or_create("s1", "AgentB", "user-1", || Ok(2))
            .err()
            .unwrap();
        assert_eq!(
            err,
            CoreError::SessionAgentMismatch {
                session_id: "s1".to_string(),
                bound: "AgentA".to_string(),
                requested: "AgentB".to_string(),
            }
        );
        // The original binding is untouched
        assert_eq!(registry.get("s1").unwrap().agent, "AgentA");
    }

    #[test]
    fn test_failed_state_not_registered() {
        let registry = registry(10);
        let result = registry.get_or_create("s1", "A", "u", || {
            Err(CoreError::validation("no runtime"))
        });
        assert!(result.is_err());
        assert!(registry.is_empty());

        assert!(registry.get_or_create("s1", "A", "u", || Ok(7)).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_builds_one_state() {
        let registry = Arc::new(registry(100));
        let built = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let built = built.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    registry
                        .get_or_create("shared", "A", "u", || {
                            built.fetch_add(1, Ordering::SeqCst);
                            Ok(i)
                        })
                        .unwrap()
                })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    }

    #[test]
    fn test_evict_expired() {
        let registry = registry(10);
        registry.get_or_create("old", "A", "u", || Ok(1)).unwrap();

        assert_eq!(registry.evict_expired(Utc::now()), 0);

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(registry.evict_expired(later), 1);
        assert!(registry.get("old").is_none());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let registry = registry(2);
        registry.get_or_create("a", "A", "u", || Ok(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        registry.get_or_create("b", "A", "u", || Ok(2)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        // Touch "a" so "b" becomes the oldest
        registry.get_or_create("a", "A", "u", || Ok(0)).unwrap();

        registry.get_or_create("c", "A", "u", || Ok(3)).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("b").is_none());
        assert!(registry.get("c").is_some());
    }

    #[test]
    fn test_running_turn_blocks_eviction() {
        let registry = SessionRegistry::new(RegistryConfig {
            ttl: Duration::from_millis(50),
            capacity: 1,
        });
        let session = registry.get_or_create("busy", "A", "u", || Ok(1)).unwrap();

        let turn = session.begin_turn();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(registry.evict_expired(Utc::now()), 0);
        assert_eq!(registry.evict_lru(), None);

        // At capacity with only a busy session: the insert still succeeds
        registry.get_or_create("other", "A", "u", || Ok(2)).unwrap();
        assert!(registry.get("busy").is_some());
        drop(turn);

        // Finishing the turn counts as use
        assert_eq!(registry.evict_expired(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(registry.evict_expired(later), 2);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let registry = Arc::new(registry(10));
        let cancel = CancellationToken::new();
        let handle = registry
            .clone()
            .spawn_sweeper(Duration::from_millis(10), cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
