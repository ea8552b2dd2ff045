//! Session orchestrator — one game, its saves, and the score board.
//!
//! TICK ORDER (fixed, documented, never reordered):
//!   1. Game update        (wave scheduler runs first inside it)
//!   2. Wave completion    (bonuses credited, then save_after_wave)
//!   3. Auto-save timer    (fed the scaled simulation delta)
//!   4. Session end        (first finished tick records the score once)
//!
//! RULES:
//!   - save_after_wave always sees the wave already in Complete.
//!   - Bonuses are credited before the milestone save, so the save
//!     includes them.
//!   - A score is recorded at most once per game, including after load.

use crate::{
    config::SessionConfig,
    entities::MapConfig,
    event::SessionEvent,
    game::Game,
    leaderboard::ScoreLeaderboard,
    snapshot_manager::SnapshotManager,
    store::KeyValueStore,
    types::Millis,
};

pub struct Session<S: KeyValueStore> {
    config: SessionConfig,
    game: Game,
    snapshots: SnapshotManager<S>,
    leaderboard: ScoreLeaderboard<S>,
    score_recorded: bool,
    pending: Vec<SessionEvent>,
}

impl<S: KeyValueStore> Session<S> {
    /// `save_store` and `score_store` may be the same backend; the two
    /// owners use disjoint keys.
    pub fn new(config: SessionConfig, map: MapConfig, save_store: S, score_store: S) -> Self {
        Self {
            game: Game::new(config.clone(), map),
            snapshots: SnapshotManager::new(save_store, &config),
            leaderboard: ScoreLeaderboard::new(score_store, &config),
            score_recorded: false,
            pending: Vec::new(),
            config,
        }
    }

    pub fn game(&self) -> &Game { &self.game }
    pub fn game_mut(&mut self) -> &mut Game { &mut self.game }
    pub fn snapshots(&self) -> &SnapshotManager<S> { &self.snapshots }
    pub fn leaderboard(&self) -> &ScoreLeaderboard<S> { &self.leaderboard }

    /// Advance one frame. Returns every event produced since the last tick.
    pub fn tick(&mut self, real_dt: Millis) -> Vec<SessionEvent> {
        let mut events = std::mem::take(&mut self.pending);

        // 1. Game
        let tick = self.game.update(real_dt);

        // 2. Wave completion
        if let Some(done) = tick.completed {
            self.game.apply_wave_rewards(&done);
            events.push(SessionEvent::WaveCompleted {
                wave: done.wave,
                elapsed_ms: done.elapsed_ms,
                completion_bonus: done.completion_bonus,
                speed_bonus: done.speed_bonus,
            });
            self.snapshots.save_after_wave(&self.game);
            events.extend(self.snapshots.drain_events());
            if self.game.waves().all_waves_cleared() {
                events.push(SessionEvent::AllWavesCleared { wave: done.wave });
            }
        }

        // 3. Auto-save
        self.snapshots.update_auto_save_timer(tick.dt, &self.game);
        events.extend(self.snapshots.drain_events());

        // 4. Session end
        if self.game.is_finished() && !self.score_recorded {
            events.extend(self.record_score());
        }

        events
    }

    /// Run `count` ticks of `dt`, collecting their events.
    pub fn run_ticks(&mut self, count: u64, dt: Millis) -> Vec<SessionEvent> {
        (0..count).flat_map(|_| self.tick(dt)).collect()
    }

    pub fn start_next_wave(&mut self) -> bool {
        if !self.game.start_next_wave() {
            return false;
        }
        let waves = self.game.waves();
        self.pending.push(SessionEvent::WaveStarted {
            wave: waves.current_wave(),
            enemy_count: waves.pending_spawns(),
            kind: waves.kind(),
        });
        true
    }

    pub fn save(&mut self) {
        self.snapshots.save(&self.game);
        self.pending.extend(self.snapshots.drain_events());
    }

    /// Restore the saved game. A game that was already finished when it
    /// was saved does not record its score again.
    pub fn load(&mut self) -> bool {
        let loaded = self.snapshots.load(&mut self.game);
        if loaded {
            self.score_recorded = self.game.is_finished();
        }
        self.pending.extend(self.snapshots.drain_events());
        loaded
    }

    pub fn has_saved_game(&self) -> bool {
        self.snapshots.has_saved_game()
    }

    /// Start over on `map`. Any existing save is discarded.
    pub fn new_game(&mut self, map: MapConfig) {
        log::info!("New game: seed={} biome={} difficulty={}", map.seed, map.biome, map.difficulty);
        self.snapshots.clear_save_data();
        self.game = Game::new(self.config.clone(), map);
        self.score_recorded = false;
        self.pending.clear();
    }

    fn record_score(&mut self) -> Vec<SessionEvent> {
        self.score_recorded = true;
        let stats = self.game.stats();
        let mut events = Vec::with_capacity(2);
        if self.game.is_game_over() {
            events.push(SessionEvent::GameOver { score: stats.score, wave: stats.wave });
        }
        let entry = self.leaderboard.save_score(stats);
        events.push(SessionEvent::ScoreRecorded {
            id: entry.id,
            score: entry.score,
            rank: entry.rank,
        });
        events
    }
}
