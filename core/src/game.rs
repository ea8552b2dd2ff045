//! The live game — the concrete SessionHost.
//!
//! UPDATE ORDER (fixed, one pass per frame):
//!   1. Clock       (pause and speed scale the real delta)
//!   2. Waves       (countdown, spawn release, completion check)
//!   3. Enemies     (effects tick, movement, leaks cost lives)
//!   4. Towers      (cooldowns, targeting, damage, on-hit effects)
//!   5. Sweep       (dead enemies pay out and leave the scheduler count)
//!   6. End state   (zero lives → GameOver, last wave cleared → Victory)
//!
//! The map is a single straight lane along the middle row; `width` cells
//! long. Towers may be placed on any other in-bounds cell.

use crate::{
    clock::{GameSpeed, SessionClock},
    codec::{decode_all, SnapshotCodec},
    config::SessionConfig,
    entities::{
        Camera, Cell, Enemy, EnemyStep, GameState, Inventory, MapConfig, Player, StoreState,
        Tower, UpgradePath, Vec2,
    },
    host::SessionHost,
    leaderboard::GameStats,
    snapshot::{GameSnapshot, WaveStateRecord},
    types::{EntityId, Millis},
    wave_scheduler::{self, SpawnDescriptor, WaveCompletion, WaveScheduler},
};

const PLAYER_MAX_HEALTH: f64 = 100.0;

/// What one update() did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameTick {
    /// Simulation time advanced, after pause and speed.
    pub dt: Millis,
    pub spawned: usize,
    pub leaked: u32,
    pub kills: u64,
    pub completed: Option<WaveCompletion>,
}

pub struct Game {
    config: SessionConfig,
    store_state: StoreState,
    towers: Vec<Tower>,
    enemies: Vec<Enemy>,
    player: Player,
    inventory: Inventory,
    waves: WaveScheduler,
    map: MapConfig,
    cell_size: f64,
    camera: Camera,
    clock: SessionClock,
    next_id: EntityId,
}

impl Game {
    pub fn new(config: SessionConfig, map: MapConfig) -> Self {
        let rules = &config.rules;
        let cell_size = rules.cell_size;
        let player = Player::new(
            Vec2::new(
                f64::from(map.width) * cell_size / 2.0,
                f64::from(map.height) * cell_size / 2.0,
            ),
            PLAYER_MAX_HEALTH,
        );
        Self {
            store_state: StoreState::new(rules.starting_currency, rules.starting_lives),
            towers: Vec::new(),
            enemies: Vec::new(),
            player,
            inventory: Inventory::new(rules.inventory_capacity),
            waves: WaveScheduler::new(config.waves.clone(), map.seed),
            cell_size,
            camera: Camera::default(),
            clock: SessionClock::new(),
            next_id: 1,
            map,
            config,
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn waves(&self) -> &WaveScheduler { &self.waves }
    pub fn clock(&self) -> &SessionClock { &self.clock }
    pub fn inventory_mut(&mut self) -> &mut Inventory { &mut self.inventory }
    pub fn camera_mut(&mut self) -> &mut Camera { &mut self.camera }

    /// The lane row index.
    pub fn lane_row(&self) -> i32 {
        (self.map.height / 2) as i32
    }

    fn lane_y(&self) -> f64 {
        (f64::from(self.lane_row()) + 0.5) * self.cell_size
    }

    pub fn is_game_over(&self) -> bool {
        self.store_state.game_state == GameState::GameOver
    }

    /// Game over or campaign won; no further play is possible.
    pub fn is_finished(&self) -> bool {
        matches!(self.store_state.game_state, GameState::GameOver | GameState::Victory)
    }

    // ── Controls ───────────────────────────────────────────────

    pub fn pause(&mut self) {
        self.clock.pause();
        if self.store_state.game_state == GameState::Playing {
            self.store_state.game_state = GameState::Paused;
        }
    }

    pub fn resume(&mut self) {
        self.clock.resume();
        if self.store_state.game_state == GameState::Paused {
            self.store_state.game_state = GameState::Playing;
        }
    }

    pub fn set_speed(&mut self, speed: GameSpeed) {
        self.clock.set_speed(speed);
    }

    pub fn set_infinite_mode(&mut self, enabled: bool) {
        self.waves.set_infinite_mode(enabled);
    }

    pub fn start_next_wave(&mut self) -> bool {
        self.waves.start_next_wave(self.is_finished())
    }

    /// Place a tower. Returns its id, or None if the kind is unknown, the
    /// cell is off-map, on the lane, or taken, or it is unaffordable.
    pub fn build_tower(&mut self, kind: &str, cell: Cell) -> Option<EntityId> {
        if self.is_finished() {
            return None;
        }
        let Some(cost) = self.config.rules.tower_type(kind).map(|t| t.cost) else {
            log::debug!("build_tower: unknown kind '{kind}'");
            return None;
        };
        let in_bounds = cell.col >= 0
            && cell.row >= 0
            && (cell.col as u32) < self.map.width
            && (cell.row as u32) < self.map.height;
        if !in_bounds || cell.row == self.lane_row() {
            log::debug!("build_tower: cell ({}, {}) not buildable", cell.col, cell.row);
            return None;
        }
        if self.towers.iter().any(|t| t.cell == cell) {
            return None;
        }
        if !self.store_state.try_spend(cost) {
            log::debug!("build_tower: '{kind}' costs {cost}, have {}", self.store_state.currency);
            return None;
        }

        let id = self.allocate_id();
        self.towers.push(Tower::new(id, kind, cell));
        self.store_state.towers_built += 1;
        log::debug!("Built {kind} #{id} at ({}, {})", cell.col, cell.row);
        Some(id)
    }

    /// Buy the next level on `path`. Returns false if the tower is missing
    /// or the upgrade is unaffordable.
    pub fn upgrade_tower(&mut self, id: EntityId, path: UpgradePath) -> bool {
        let multiplier = self.config.rules.upgrade_cost_multiplier;
        let Some(tower) = self.towers.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        let Some(base) = self.config.rules.tower_type(&tower.kind) else {
            return false;
        };
        let cost = tower.upgrade_cost(base, path, multiplier);
        if !self.store_state.try_spend(cost) {
            return false;
        }
        tower.apply_upgrade(path);
        log::debug!("Upgraded #{id} {path:?} to {} for {cost}", tower.levels.get(path));
        true
    }

    /// Kill a live enemy outright, paying its reward.
    pub fn kill_enemy(&mut self, id: EntityId) -> bool {
        let Some(index) = self.enemies.iter().position(|e| e.id == id && e.is_alive()) else {
            return false;
        };
        let enemy = self.enemies.remove(index);
        self.reward_kill(&enemy);
        true
    }

    /// Credit a completed wave's bonuses to currency and score.
    pub fn apply_wave_rewards(&mut self, completion: &WaveCompletion) {
        let bonus = completion.completion_bonus + completion.speed_bonus;
        self.store_state.currency += bonus;
        self.store_state.score += bonus;
    }

    pub fn stats(&self) -> GameStats {
        GameStats {
            score: self.store_state.score,
            wave: self.waves.current_wave(),
            currency: self.store_state.currency,
            enemies_killed: self.store_state.enemies_killed,
            towers_built: self.store_state.towers_built,
            player_level: self.player.level,
            game_time_ms: self.clock.elapsed_ms,
            map_biome: self.map.biome.clone(),
            map_difficulty: self.map.difficulty.clone(),
        }
    }

    // ── Simulation ─────────────────────────────────────────────

    pub fn update(&mut self, real_dt: Millis) -> GameTick {
        if self.is_finished() {
            return GameTick::default();
        }
        let dt = self.clock.advance(real_dt);
        let mut tick = GameTick { dt, ..GameTick::default() };
        if dt == 0 {
            return tick;
        }

        let wave_tick = self.waves.update(dt);
        tick.spawned = wave_tick.spawned.len();
        tick.completed = wave_tick.completed;
        for spawn in &wave_tick.spawned {
            self.spawn_enemy(spawn);
        }

        tick.leaked = self.step_enemies(dt);
        self.fire_towers(dt);
        tick.kills = self.sweep_dead();

        if self.store_state.lives == 0 {
            self.store_state.game_state = GameState::GameOver;
            log::info!(
                "Game over at wave={} score={}",
                self.waves.current_wave(),
                self.store_state.score
            );
        } else if self.waves.all_waves_cleared() {
            self.store_state.game_state = GameState::Victory;
            log::info!("All {} waves cleared, score={}", self.waves.current_wave(), self.store_state.score);
        }
        tick
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn spawn_enemy(&mut self, spawn: &SpawnDescriptor) {
        let Some(base) = self.config.waves.enemy_type(&spawn.enemy_type) else {
            log::warn!("Unknown enemy type '{}' released; dropping it", spawn.enemy_type);
            self.waves.enemy_removed();
            return;
        };
        let id = self.next_id;
        self.next_id += 1;
        let mut enemy = Enemy::spawn(
            id,
            base,
            spawn.health_multiplier,
            spawn.speed_multiplier,
            spawn.reward_multiplier,
        );
        enemy.position = Vec2::new(0.0, self.lane_y());
        self.enemies.push(enemy);
    }

    /// Move every enemy; returns how many reached the end of the lane.
    fn step_enemies(&mut self, dt: Millis) -> u32 {
        let path_cells = f64::from(self.map.width);
        let cell_size = self.cell_size;
        let lane_y = self.lane_y();

        let mut leaked = 0;
        self.enemies.retain_mut(|enemy| {
            if enemy.step(dt, path_cells, cell_size, lane_y) == EnemyStep::ReachedEnd {
                leaked += 1;
                false
            } else {
                true
            }
        });
        for _ in 0..leaked {
            self.waves.enemy_removed();
            self.store_state.lives = self.store_state.lives.saturating_sub(1);
        }
        if leaked > 0 {
            log::debug!("{leaked} enemies leaked, lives={}", self.store_state.lives);
        }
        leaked
    }

    fn fire_towers(&mut self, dt: Millis) {
        let rules = &self.config.rules;
        let step = rules.upgrade_step;
        let cell_size = self.cell_size;

        for tower in &mut self.towers {
            tower.cooldown_ms = tower.cooldown_ms.saturating_sub(dt);
            if tower.cooldown_ms > 0 {
                continue;
            }
            let Some(base) = rules.tower_type(&tower.kind) else { continue };
            let center = tower.center(cell_size);
            let range = tower.range(base, step, cell_size);

            // Furthest along the lane first.
            let Some(target) = self
                .enemies
                .iter_mut()
                .filter(|e| e.is_alive() && e.position.distance(center) <= range)
                .max_by(|a, b| a.path_progress.total_cmp(&b.path_progress))
            else {
                continue;
            };

            let damage = tower.damage(base, step);
            tower.stats.shots_fired += 1;
            tower.stats.damage_dealt += damage.min(target.health);
            if let Some(effect) = &base.on_hit {
                target.apply_effect(effect.into());
            }
            if target.take_damage(damage) {
                tower.stats.kills += 1;
            }
            tower.cooldown_ms = tower.fire_interval_ms(base, step);
        }
    }

    /// Remove dead enemies and pay for them. Returns the kill count.
    fn sweep_dead(&mut self) -> u64 {
        let (dead, alive): (Vec<Enemy>, Vec<Enemy>) =
            std::mem::take(&mut self.enemies).into_iter().partition(|e| !e.is_alive());
        self.enemies = alive;
        for enemy in &dead {
            self.reward_kill(enemy);
        }
        dead.len() as u64
    }

    fn reward_kill(&mut self, enemy: &Enemy) {
        let rules = &self.config.rules;
        self.store_state.currency += enemy.reward;
        self.store_state.score += rules.score_per_kill;
        self.store_state.enemies_killed += 1;
        let levels = self.player.add_experience(rules.experience_per_kill);
        if levels > 0 {
            log::debug!("Player reached level {}", self.player.level);
        }
        self.waves.enemy_removed();
    }

    /// Reasons a snapshot cannot be applied to this game. Anything that
    /// would not restore to exactly the stored value is refused here.
    fn check_snapshot(&self, snapshot: &GameSnapshot) -> Result<(), String> {
        let cell_size = snapshot.map_config.cell_size;
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(format!("cell size {cell_size} is not positive"));
        }

        for t in &snapshot.towers {
            if self.config.rules.tower_type(&t.kind).is_none() {
                return Err(format!("tower #{} has unknown kind '{}'", t.id, t.kind));
            }
            if t.damage_level == 0 || t.range_level == 0 || t.rate_level == 0 {
                return Err(format!("tower #{} has an upgrade level of 0", t.id));
            }
        }

        for e in &snapshot.enemies {
            let stats = [e.health, e.max_health, e.speed, e.position.x, e.position.y];
            if stats.iter().any(|v| !v.is_finite()) {
                return Err(format!("enemy #{} has non-finite stats", e.id));
            }
            if !(0.0..=1.0).contains(&e.path_progress) {
                return Err(format!("enemy #{} path progress {} is outside 0..=1", e.id, e.path_progress));
            }
            if e.effects.iter().any(|fx| !fx.magnitude.is_finite()) {
                return Err(format!("enemy #{} has a non-finite status effect", e.id));
            }
        }

        let p = &snapshot.player;
        if !p.max_health.is_finite() || !(0.0..=p.max_health).contains(&p.health) {
            return Err(format!("player health {}/{} is out of range", p.health, p.max_health));
        }
        if p.level == 0 {
            return Err("player level is 0".into());
        }

        let inv = &snapshot.inventory;
        if inv.slots.len() != inv.capacity {
            return Err(format!(
                "inventory holds {} slots but capacity is {}",
                inv.slots.len(),
                inv.capacity
            ));
        }
        if inv.slots.iter().flatten().any(|slot| slot.quantity == 0) {
            return Err("inventory has an empty stack".into());
        }

        wave_scheduler::check_record(&self.config.waves, &snapshot.wave_state, snapshot.enemies.len())?;

        let max_id = snapshot
            .towers
            .iter()
            .map(|t| t.id)
            .chain(snapshot.enemies.iter().map(|e| e.id))
            .max()
            .unwrap_or(0);
        if snapshot.next_entity_id <= max_id {
            return Err(format!(
                "next entity id {} does not follow stored id {max_id}",
                snapshot.next_entity_id
            ));
        }
        Ok(())
    }
}

impl SessionHost for Game {
    fn store_state(&self) -> &StoreState { &self.store_state }
    fn towers(&self) -> &[Tower] { &self.towers }
    fn enemies(&self) -> &[Enemy] { &self.enemies }
    fn player(&self) -> &Player { &self.player }
    fn inventory(&self) -> &Inventory { &self.inventory }
    fn wave_state(&self) -> WaveStateRecord { self.waves.to_record() }
    fn map_config(&self) -> &MapConfig { &self.map }
    fn cell_size(&self) -> f64 { self.cell_size }
    fn camera(&self) -> &Camera { &self.camera }
    fn elapsed_ms(&self) -> Millis { self.clock.elapsed_ms }
    fn next_entity_id(&self) -> EntityId { self.next_id }
    fn speed(&self) -> GameSpeed { self.clock.speed }

    /// Validates first, then replaces every live collection. A rejected
    /// snapshot leaves the game untouched.
    fn restore_from_snapshot(&mut self, snapshot: &GameSnapshot) -> bool {
        if let Err(reason) = self.check_snapshot(snapshot) {
            log::warn!("Snapshot rejected: {reason}");
            return false;
        }

        self.store_state = snapshot.store_state.clone();
        self.towers = decode_all(&snapshot.towers);
        self.enemies = decode_all(&snapshot.enemies);
        self.player = Player::from_record(&snapshot.player);
        self.inventory = Inventory::from_record(&snapshot.inventory);
        self.map = MapConfig::from(&snapshot.map_config);
        self.cell_size = snapshot.map_config.cell_size;
        self.camera = Camera::from_record(&snapshot.camera);
        self.clock = SessionClock::resumed_at(snapshot.metadata.play_time_ms);
        self.clock.set_speed(snapshot.speed);
        if self.store_state.game_state == GameState::Paused {
            self.clock.pause();
        }

        self.waves = WaveScheduler::new(self.config.waves.clone(), self.map.seed);
        self.waves.restore(&snapshot.wave_state, self.enemies.len());

        self.next_id = snapshot.next_entity_id;

        log::debug!(
            "Restored wave={} towers={} enemies={}",
            self.waves.current_wave(),
            self.towers.len(),
            self.enemies.len()
        );
        true
    }
}
