//! Leaderboard Persistence
//!
//! Final solo scores leave the engine through [`ScoreStore`]. The trait is the
//! only thing the session store depends on, so a database-backed store can be
//! dropped in without touching validation code.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;

/// Game name under which solo speed-click scores are stored.
pub const SPEEDCLICK_GAME: &str = "speed-click";

/// A stored leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Row identifier, increasing in insertion order.
    pub id: i64,
    /// Player nickname, already validated.
    pub nickname: String,
    /// Game the score belongs to.
    pub game: String,
    /// Final score.
    pub score: i64,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// Persistence errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("Score store unavailable: {0}")]
    Unavailable(String),
}

/// Leaderboard storage.
///
/// Callers only hand over inputs that have already been validated.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Insert a score row and return its id.
    async fn save_score(&self, nickname: &str, game: &str, score: i64) -> Result<i64, StoreError>;

    /// Top `limit` rows for `game`, score descending, earlier rows first on ties.
    async fn ranking(&self, game: &str, limit: usize) -> Result<Vec<ScoreRecord>, StoreError>;
}

/// Process-local leaderboard.
pub struct InMemoryScoreStore {
    rows: RwLock<Vec<ScoreRecord>>,
    next_id: AtomicI64,
}

impl InMemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored rows across all games.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Check whether nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn save_score(&self, nickname: &str, game: &str, score: i64) -> Result<i64, StoreError> {
        let mut rows = self.rows.write().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        rows.push(ScoreRecord {
            id,
            nickname: nickname.to_string(),
            game: game.to_string(),
            score,
            created_at: Utc::now(),
        });

        Ok(id)
    }

    async fn ranking(&self, game: &str, limit: usize) -> Result<Vec<ScoreRecord>, StoreError> {
        let rows = self.rows.read().await;

        let mut matching: Vec<ScoreRecord> = rows
            .iter()
            .filter(|row| row.game == game)
            .cloned()
            .collect();

        // Stable sort keeps insertion order among equal scores.
        matching.sort_by(|a, b| b.score.cmp(&a.score));
        matching.truncate(limit);

        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_increasing_ids() {
        let store = InMemoryScoreStore::new();

        let first = store.save_score("alice", SPEEDCLICK_GAME, 10).await.unwrap();
        let second = store.save_score("bob", SPEEDCLICK_GAME, 5).await.unwrap();

        assert!(second > first);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_ranking_orders_by_score() {
        let store = InMemoryScoreStore::new();
        store.save_score("low", SPEEDCLICK_GAME, 3).await.unwrap();
        store.save_score("high", SPEEDCLICK_GAME, 30).await.unwrap();
        store.save_score("mid", SPEEDCLICK_GAME, 12).await.unwrap();

        let rows = store.ranking(SPEEDCLICK_GAME, 10).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.nickname.as_str()).collect();

        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_ranking_ties_keep_insertion_order() {
        let store = InMemoryScoreStore::new();
        store.save_score("first", SPEEDCLICK_GAME, 7).await.unwrap();
        store.save_score("second", SPEEDCLICK_GAME, 7).await.unwrap();

        let rows = store.ranking(SPEEDCLICK_GAME, 10).await.unwrap();
        assert_eq!(rows[0].nickname, "first");
        assert_eq!(rows[1].nickname, "second");
    }

    #[tokio::test]
    async fn test_ranking_filters_game_and_limits() {
        let store = InMemoryScoreStore::new();
        for score in 0..5 {
            store.save_score("p", SPEEDCLICK_GAME, score).await.unwrap();
        }
        store.save_score("other", "snake", 100).await.unwrap();

        let rows = store.ranking(SPEEDCLICK_GAME, 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.game == SPEEDCLICK_GAME));
        assert_eq!(rows[0].score, 4);
    }
}
