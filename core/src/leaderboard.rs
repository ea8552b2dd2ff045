//! Score leaderboard — bounded, ranked history of finished sessions.
//!
//! Owns the `towerDefenseScores` key.
//!
//! RULES:
//!   - Order is descending by (score, wave); equal pairs keep insertion order.
//!   - The list is cut to max_scores when written, never when read.
//!   - Rank is derived from list position on every read and never stored.
//!   - Unreadable storage reads as an empty board.

use crate::{
    config::SessionConfig,
    error::{SessionError, SessionResult},
    store::{KeyValueStore, SCORES_KEY},
    types::{Millis, ScoreId, WaveIndex},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default board size.
pub const MAX_SCORES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEntry {
    pub id: ScoreId,
    pub score: u64,
    pub wave: WaveIndex,
    pub currency: u64,
    pub enemies_killed: u64,
    pub towers_built: u64,
    pub player_level: u32,
    /// Play time in milliseconds, stored as `gameTime`.
    #[serde(rename = "gameTime")]
    pub game_time_ms: Millis,
    pub date: DateTime<Utc>,
    pub map_biome: String,
    pub map_difficulty: String,
    /// 1-based position. None only for an entry that did not make the board.
    #[serde(skip)]
    pub rank: Option<usize>,
}

/// Summary of a finished session, supplied by the host at game over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub score: u64,
    pub wave: WaveIndex,
    pub currency: u64,
    pub enemies_killed: u64,
    pub towers_built: u64,
    pub player_level: u32,
    pub game_time_ms: Millis,
    pub map_biome: String,
    pub map_difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStats {
    pub total_games: usize,
    pub average_score: f64,
    pub highest_score: u64,
    pub highest_wave: WaveIndex,
    pub total_enemies_killed: u64,
    pub total_play_time_ms: Millis,
}

fn by_rank(a: &ScoreboardEntry, b: &ScoreboardEntry) -> Ordering {
    b.score.cmp(&a.score).then(b.wave.cmp(&a.wave))
}

pub struct ScoreLeaderboard<S: KeyValueStore> {
    store: S,
    max_scores: usize,
}

impl<S: KeyValueStore> ScoreLeaderboard<S> {
    pub fn new(store: S, config: &SessionConfig) -> Self {
        Self::with_capacity(store, config.leaderboard.max_scores)
    }

    pub fn with_capacity(store: S, max_scores: usize) -> Self {
        Self { store, max_scores: max_scores.max(1) }
    }

    /// Record a finished session. The returned entry carries its rank
    /// after sorting and truncation. A storage failure is logged and the
    /// entry is still returned.
    pub fn save_score(&mut self, stats: GameStats) -> ScoreboardEntry {
        let mut entry = ScoreboardEntry {
            id: uuid::Uuid::new_v4().to_string(),
            score: stats.score,
            wave: stats.wave,
            currency: stats.currency,
            enemies_killed: stats.enemies_killed,
            towers_built: stats.towers_built,
            player_level: stats.player_level,
            game_time_ms: stats.game_time_ms,
            date: Utc::now(),
            map_biome: stats.map_biome,
            map_difficulty: stats.map_difficulty,
            rank: None,
        };

        let mut scores = self.read_or_empty();
        scores.push(entry.clone());
        scores.sort_by(by_rank);
        scores.truncate(self.max_scores);

        entry.rank = scores.iter().position(|s| s.id == entry.id).map(|i| i + 1);

        if let Err(e) = self.write(&scores) {
            log::error!("Failed to persist score {} ({}): {e}", entry.score, entry.id);
        }
        match entry.rank {
            Some(rank) => log::info!("Score {} at wave {} ranked #{rank}", entry.score, entry.wave),
            None => log::info!("Score {} at wave {} did not make the board", entry.score, entry.wave),
        }
        entry
    }

    /// All entries, best first, with ranks assigned.
    pub fn get_scores(&self) -> Vec<ScoreboardEntry> {
        let mut scores = self.read_or_empty();
        scores.sort_by(by_rank);
        for (i, entry) in scores.iter_mut().enumerate() {
            entry.rank = Some(i + 1);
        }
        scores
    }

    pub fn get_top_scores(&self, n: usize) -> Vec<ScoreboardEntry> {
        let mut scores = self.get_scores();
        scores.truncate(n);
        scores
    }

    pub fn get_personal_best(&self) -> Option<ScoreboardEntry> {
        self.get_scores().into_iter().next()
    }

    /// Mean score over the board, 0.0 when empty.
    pub fn get_average_score(&self) -> f64 {
        let scores = self.get_scores();
        if scores.is_empty() {
            return 0.0;
        }
        scores.iter().map(|s| s.score as f64).sum::<f64>() / scores.len() as f64
    }

    /// Sessions on the board (bounded by max_scores).
    pub fn get_total_games_played(&self) -> usize {
        self.get_scores().len()
    }

    pub fn get_score_stats(&self) -> ScoreStats {
        let scores = self.get_scores();
        let total_games = scores.len();
        let average_score = if total_games == 0 {
            0.0
        } else {
            scores.iter().map(|s| s.score as f64).sum::<f64>() / total_games as f64
        };
        ScoreStats {
            total_games,
            average_score,
            highest_score: scores.iter().map(|s| s.score).max().unwrap_or(0),
            highest_wave: scores.iter().map(|s| s.wave).max().unwrap_or(0),
            total_enemies_killed: scores.iter().map(|s| s.enemies_killed).sum(),
            total_play_time_ms: scores.iter().map(|s| s.game_time_ms).sum(),
        }
    }

    /// Would `score` earn a place if saved now?
    pub fn is_high_score(&self, score: u64) -> bool {
        let scores = self.get_scores();
        scores.len() < self.max_scores || scores.last().is_some_and(|lowest| score > lowest.score)
    }

    pub fn clear_scores(&mut self) {
        if let Err(e) = self.store.remove(SCORES_KEY) {
            log::error!("Failed to clear scores: {e}");
        }
    }

    pub fn store(&self) -> &S { &self.store }
    pub fn store_mut(&mut self) -> &mut S { &mut self.store }

    fn read(&self) -> SessionResult<Vec<ScoreboardEntry>> {
        match self.store.get(SCORES_KEY)? {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text).map_err(|e| SessionError::CorruptPayload {
                reason: format!("scores: {e}"),
            }),
        }
    }

    fn read_or_empty(&self) -> Vec<ScoreboardEntry> {
        self.read().unwrap_or_else(|e| {
            log::warn!("Leaderboard unreadable, treating as empty: {e}");
            Vec::new()
        })
    }

    fn write(&mut self, scores: &[ScoreboardEntry]) -> SessionResult<()> {
        let json = serde_json::to_string(scores)?;
        self.store.set(SCORES_KEY, &json)
    }
}
