//! Solo Session Store
//!
//! Process-local registry of solo runs. All reads and mutations go through
//! one lock over the map, so each operation sees and leaves a consistent
//! session. Sessions expire a fixed time after creation whatever their state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::time::unix_millis;
use crate::persistence::{ScoreStore, StoreError, SPEEDCLICK_GAME};
use crate::solo::session::{
    ClickOutcome, EndOutcome, GameSession, MissOutcome, SessionId, ValidationError,
};

/// Seeds are kept to 31 bits so `seed + index * 12345` stays exact in an f64.
const SEED_MASK: i64 = 0x7FFF_FFFF;

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a session from creation.
    pub ttl: Duration,
    /// How often expired sessions are evicted.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Data a client needs to start rendering a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    /// New session identifier.
    pub session_id: SessionId,
    /// Ball generation seed.
    pub seed: i64,
    /// Unix ms at creation.
    pub start_time: i64,
}

/// Score submission failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitError {
    /// Session missing, expired, or not in the ended state.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// The leaderboard write failed after the session was claimed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry of live solo sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, GameSession>>,
    config: SessionConfig,
    scores: Arc<dyn ScoreStore>,
}

impl SessionStore {
    /// Create a store that submits final scores to `scores`.
    pub fn new(config: SessionConfig, scores: Arc<dyn ScoreStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            scores,
        }
    }

    /// Leaderboard backing this store.
    pub fn scores(&self) -> &Arc<dyn ScoreStore> {
        &self.scores
    }

    fn is_expired(&self, session: &GameSession) -> bool {
        session.created_at().elapsed() >= self.config.ttl
    }

    /// Run `f` against a live session under the write lock.
    async fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut GameSession) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        let mut sessions = self.sessions.write().await;

        let session = sessions
            .get_mut(session_id)
            .filter(|s| s.created_at().elapsed() < self.config.ttl)
            .ok_or(ValidationError::SessionNotFound)?;

        f(session)
    }

    /// Create a new playing session.
    pub async fn start_session(&self) -> SessionStart {
        let start_time = unix_millis();
        let seed = start_time & SEED_MASK;

        let mut sessions = self.sessions.write().await;
        let session_id = loop {
            let candidate = hex::encode(Uuid::new_v4().as_bytes());
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        sessions.insert(
            session_id.clone(),
            GameSession::new(session_id.clone(), seed, start_time),
        );
        drop(sessions);

        info!("Solo session {} started (seed {})", session_id, seed);

        SessionStart {
            session_id,
            seed,
            start_time,
        }
    }

    /// Validate and apply a click.
    pub async fn process_click(
        &self,
        session_id: &str,
        ball_index: i64,
        click_time_ms: i64,
    ) -> Result<ClickOutcome, ValidationError> {
        let result = self
            .with_session(session_id, |s| s.click(ball_index, click_time_ms))
            .await;

        if let Err(e) = &result {
            debug!("Session {} click rejected: {}", session_id, e);
        }
        result
    }

    /// Validate and apply a miss.
    pub async fn process_miss(
        &self,
        session_id: &str,
        ball_index: i64,
    ) -> Result<MissOutcome, ValidationError> {
        let result = self
            .with_session(session_id, |s| s.miss(ball_index))
            .await;

        if let Err(e) = &result {
            debug!("Session {} miss rejected: {}", session_id, e);
        }
        result
    }

    /// End a run.
    pub async fn end_session(&self, session_id: &str) -> Result<EndOutcome, ValidationError> {
        let outcome = self.with_session(session_id, |s| Ok(s.end())).await?;
        info!("Solo session {} ended with score {}", session_id, outcome.final_score);
        Ok(outcome)
    }

    /// Submit the final score under `nickname`, returning the leaderboard id.
    ///
    /// The session is marked submitted before the leaderboard is called, so
    /// concurrent duplicates fail. A failed write leaves it submitted.
    pub async fn submit_score(&self, session_id: &str, nickname: &str) -> Result<i64, SubmitError> {
        let score = self.with_session(session_id, |s| s.begin_submit()).await?;

        match self.scores.save_score(nickname, SPEEDCLICK_GAME, score).await {
            Ok(id) => {
                info!("Solo session {} submitted score {} as {}", session_id, score, nickname);
                Ok(id)
            }
            Err(e) => {
                warn!("Solo session {} score not saved: {}", session_id, e);
                Err(e.into())
            }
        }
    }

    /// Snapshot of a live session.
    pub async fn get(&self, session_id: &str) -> Option<GameSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .filter(|s| !self.is_expired(s))
            .cloned()
    }

    /// Number of sessions held, including expired ones not yet swept.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict expired sessions, returning how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let ttl = self.config.ttl;
        sessions.retain(|_, s| s.created_at().elapsed() < ttl);
        before - sessions.len()
    }

    /// Sweep on a fixed interval until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = self.sweep_expired().await;
                    if removed > 0 {
                        info!("Evicted {} expired solo sessions", removed);
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryScoreStore;
    use crate::solo::ball::generate_ball;
    use crate::solo::session::SessionStatus;
    use async_trait::async_trait;

    fn store_with(scores: Arc<dyn ScoreStore>) -> SessionStore {
        SessionStore::new(SessionConfig::default(), scores)
    }

    fn store() -> (SessionStore, Arc<InMemoryScoreStore>) {
        let scores = Arc::new(InMemoryScoreStore::new());
        (store_with(scores.clone()), scores)
    }

    /// Click the current ball the moment it appears, returning the outcome.
    async fn click_current(store: &SessionStore, id: &str) -> Result<ClickOutcome, ValidationError> {
        let session = store.get(id).await.ok_or(ValidationError::SessionNotFound)?;
        let ball = session.expected_ball();
        store.process_click(id, i64::from(ball.index), ball.spawn_time).await
    }

    /// Click red balls until the score is positive.
    async fn earn_points(store: &SessionStore, id: &str) {
        loop {
            let session = store.get(id).await.unwrap();
            if session.score() > 0 {
                return;
            }
            let ball = session.expected_ball();
            if ball.is_red {
                click_current(store, id).await.unwrap();
            } else {
                store.process_miss(id, i64::from(ball.index)).await.unwrap();
            }
        }
    }

    struct FailingScores;

    #[async_trait]
    impl ScoreStore for FailingScores {
        async fn save_score(&self, _: &str, _: &str, _: i64) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }

        async fn ranking(&self, _: &str, _: usize) -> Result<Vec<crate::persistence::ScoreRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_start_session() {
        let (store, _) = store();
        let start = store.start_session().await;

        assert_eq!(start.session_id.len(), 32);
        assert!(start.session_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(start.seed, start.start_time & SEED_MASK);
        assert!(start.seed >= 0);

        let session = store.get(&start.session_id).await.unwrap();
        assert_eq!(session.status(), SessionStatus::Playing);
        assert_eq!(session.lives(), 3);
    }

    #[tokio::test]
    async fn test_session_ids_unique() {
        let (store, _) = store();
        let a = store.start_session().await;
        let b = store.start_session().await;

        assert_ne!(a.session_id, b.session_id);
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (store, _) = store();

        assert_eq!(
            store.process_click("missing", 0, 0).await,
            Err(ValidationError::SessionNotFound)
        );
        assert_eq!(
            store.process_miss("missing", 0).await,
            Err(ValidationError::SessionNotFound)
        );
        assert_eq!(
            store.end_session("missing").await,
            Err(ValidationError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn test_click_matches_regenerated_ball() {
        let (store, _) = store();
        let start = store.start_session().await;

        let ball = generate_ball(start.seed, 0, 0, 0);
        let outcome = store
            .process_click(&start.session_id, 0, ball.spawn_time + 1)
            .await
            .unwrap();

        if ball.is_red {
            assert_eq!(outcome.points, ball.level + 2);
            assert_eq!(outcome.lives, 3);
        } else {
            assert_eq!(outcome.points, 0);
            assert_eq!(outcome.lives, 2);
        }
        assert_eq!(store.get(&start.session_id).await.unwrap().current_ball_index(), 1);
    }

    #[tokio::test]
    async fn test_submit_flow() {
        let (store, scores) = store();
        let id = store.start_session().await.session_id;

        earn_points(&store, &id).await;
        let end = store.end_session(&id).await.unwrap();
        assert!(end.can_submit);

        let score_id = store.submit_score(&id, "alice").await.unwrap();
        assert!(score_id > 0);

        let rows = scores.ranking(SPEEDCLICK_GAME, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nickname, "alice");
        assert_eq!(rows[0].score, end.final_score);
    }

    #[tokio::test]
    async fn test_submit_requires_ended() {
        let (store, scores) = store();
        let id = store.start_session().await.session_id;

        let result = store.submit_score(&id, "alice").await;
        assert!(matches!(result, Err(SubmitError::Rejected(ValidationError::NotSubmittable))));
        assert!(scores.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_submit_succeeds_once() {
        let (store, scores) = store();
        let store = Arc::new(store);
        let id = store.start_session().await.session_id;

        earn_points(&store, &id).await;
        store.end_session(&id).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move { store.submit_score(&id, "racer").await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(scores.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_session_submitted() {
        let store = store_with(Arc::new(FailingScores));
        let id = store.start_session().await.session_id;
        store.end_session(&id).await.unwrap();

        let result = store.submit_score(&id, "alice").await;
        assert!(matches!(result, Err(SubmitError::Store(_))));

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.status(), SessionStatus::Submitted);
        assert!(store.submit_score(&id, "alice").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_is_absent_before_sweep() {
        let (store, _) = store();
        let id = store.start_session().await.session_id;

        tokio::time::advance(Duration::from_secs(10 * 60)).await;

        assert!(store.get(&id).await.is_none());
        assert_eq!(
            store.process_miss(&id, 0).await,
            Err(ValidationError::SessionNotFound)
        );
        assert_eq!(store.session_count().await, 1);

        assert_eq!(store.sweep_expired().await, 1);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_sessions() {
        let (store, _) = store();
        let old = store.start_session().await.session_id;

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        let fresh = store.start_session().await.session_id;
        tokio::time::advance(Duration::from_secs(5 * 60)).await;

        assert_eq!(store.sweep_expired().await, 1);
        assert!(store.get(&old).await.is_none());
        assert!(store.get(&fresh).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let (store, _) = store();
        let store = Arc::new(store);
        store.start_session().await;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(store.clone().run_sweeper(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(11 * 60)).await;
        assert_eq!(store.session_count().await, 0);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
