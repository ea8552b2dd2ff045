//! Live session entities — the mutable objects a running game owns.
//!
//! These are never persisted directly; codec.rs converts them to and
//! from the plain records stored in a GameSnapshot.

use crate::{
    config::{EffectKind, EnemyTypeConfig, OnHitEffect, TowerTypeConfig},
    types::{EntityId, Millis},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Vec2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

// ── Global counters ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameState {
    Menu,
    Playing,
    Paused,
    GameOver,
    Victory,
}

/// Global mutable counters. Owned by the host and passed explicitly;
/// snapshots copy it by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub currency: u64,
    pub lives: u32,
    pub score: u64,
    pub game_state: GameState,
    pub enemies_killed: u64,
    pub towers_built: u64,
}

impl StoreState {
    pub fn new(currency: u64, lives: u32) -> Self {
        Self {
            currency,
            lives,
            score: 0,
            game_state: GameState::Playing,
            enemies_killed: 0,
            towers_built: 0,
        }
    }

    /// Spend `amount` if affordable.
    pub fn try_spend(&mut self, amount: u64) -> bool {
        if self.currency < amount {
            return false;
        }
        self.currency -= amount;
        true
    }
}

// ── Towers ─────────────────────────────────────────────────────────

/// Grid cell coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePath {
    Damage,
    Range,
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeLevels {
    pub damage: u32,
    pub range: u32,
    pub rate: u32,
}

impl Default for UpgradeLevels {
    fn default() -> Self {
        Self { damage: 1, range: 1, rate: 1 }
    }
}

impl UpgradeLevels {
    pub fn get(&self, path: UpgradePath) -> u32 {
        match path {
            UpgradePath::Damage => self.damage,
            UpgradePath::Range  => self.range,
            UpgradePath::Rate   => self.rate,
        }
    }

    fn bump(&mut self, path: UpgradePath) {
        match path {
            UpgradePath::Damage => self.damage += 1,
            UpgradePath::Range  => self.range += 1,
            UpgradePath::Rate   => self.rate += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TowerStats {
    pub kills: u64,
    pub damage_dealt: f64,
    pub shots_fired: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tower {
    pub id: EntityId,
    pub kind: String,
    pub cell: Cell,
    pub levels: UpgradeLevels,
    pub stats: TowerStats,
    /// Time until the tower may fire again.
    pub cooldown_ms: Millis,
}

/// Multiplier for an upgrade level. Level 1 is the exact identity.
fn level_factor(level: u32, step: f64) -> f64 {
    (1.0 + step).powi(level.saturating_sub(1) as i32)
}

impl Tower {
    pub fn new(id: EntityId, kind: &str, cell: Cell) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            cell,
            levels: UpgradeLevels::default(),
            stats: TowerStats::default(),
            cooldown_ms: 0,
        }
    }

    pub fn center(&self, cell_size: f64) -> Vec2 {
        Vec2::new(
            (f64::from(self.cell.col) + 0.5) * cell_size,
            (f64::from(self.cell.row) + 0.5) * cell_size,
        )
    }

    pub fn damage(&self, base: &TowerTypeConfig, step: f64) -> f64 {
        base.damage * level_factor(self.levels.damage, step)
    }

    /// Range in world units.
    pub fn range(&self, base: &TowerTypeConfig, step: f64, cell_size: f64) -> f64 {
        base.range * level_factor(self.levels.range, step) * cell_size
    }

    pub fn fire_interval_ms(&self, base: &TowerTypeConfig, step: f64) -> Millis {
        let interval = base.fire_interval_ms as f64 / level_factor(self.levels.rate, step);
        (interval.round() as Millis).max(1)
    }

    /// Cost of the next level on `path`.
    pub fn upgrade_cost(&self, base: &TowerTypeConfig, path: UpgradePath, multiplier: f64) -> u64 {
        (base.cost as f64 * multiplier * f64::from(self.levels.get(path))).round() as u64
    }

    pub fn apply_upgrade(&mut self, path: UpgradePath) {
        self.levels.bump(path);
    }
}

// ── Enemies ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    pub kind: EffectKind,
    pub magnitude: f64,
    pub remaining_ms: Millis,
}

impl From<&OnHitEffect> for StatusEffect {
    fn from(effect: &OnHitEffect) -> Self {
        Self {
            kind: effect.kind,
            magnitude: effect.magnitude,
            remaining_ms: effect.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: EntityId,
    pub kind: String,
    pub position: Vec2,
    /// Fraction of the path covered, in [0.0, 1.0].
    pub path_progress: f64,
    pub health: f64,
    pub max_health: f64,
    /// Grid cells per second before effects.
    pub speed: f64,
    pub reward: u64,
    pub effects: Vec<StatusEffect>,
}

/// Outcome of one enemy movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyStep {
    Moving,
    Died,
    ReachedEnd,
}

impl Enemy {
    pub fn spawn(
        id: EntityId,
        base: &EnemyTypeConfig,
        health_multiplier: f64,
        speed_multiplier: f64,
        reward_multiplier: f64,
    ) -> Self {
        let max_health = base.base_health * health_multiplier;
        Self {
            id,
            kind: base.kind.clone(),
            position: Vec2::default(),
            path_progress: 0.0,
            health: max_health,
            max_health,
            speed: base.base_speed * speed_multiplier,
            reward: (base.reward as f64 * reward_multiplier).round() as u64,
            effects: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Current speed with every active slow applied multiplicatively.
    pub fn effective_speed(&self) -> f64 {
        self.effects
            .iter()
            .filter(|e| e.kind == EffectKind::Slow)
            .fold(self.speed, |speed, e| speed * e.magnitude)
    }

    /// Apply damage. Returns true if this hit killed the enemy.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        !self.is_alive()
    }

    /// Add an effect, refreshing an existing effect of the same kind.
    pub fn apply_effect(&mut self, effect: StatusEffect) {
        match self.effects.iter_mut().find(|e| e.kind == effect.kind) {
            Some(existing) => {
                existing.magnitude = effect.magnitude;
                existing.remaining_ms = existing.remaining_ms.max(effect.remaining_ms);
            }
            None => self.effects.push(effect),
        }
    }

    /// Advance along a straight lane of `path_cells` cells on row `lane_y`.
    pub fn step(&mut self, dt: Millis, path_cells: f64, cell_size: f64, lane_y: f64) -> EnemyStep {
        let seconds = dt as f64 / 1000.0;

        let burn: f64 = self
            .effects
            .iter()
            .filter(|e| e.kind == EffectKind::Burn)
            .map(|e| e.magnitude * seconds.min(e.remaining_ms as f64 / 1000.0))
            .sum();
        let speed = self.effective_speed();

        for effect in &mut self.effects {
            effect.remaining_ms = effect.remaining_ms.saturating_sub(dt);
        }
        self.effects.retain(|e| e.remaining_ms > 0);

        if burn > 0.0 && self.take_damage(burn) {
            return EnemyStep::Died;
        }

        if path_cells > 0.0 {
            self.path_progress = (self.path_progress + speed * seconds / path_cells).min(1.0);
        }
        self.position = Vec2::new(self.path_progress * path_cells * cell_size, lane_y);

        if self.path_progress >= 1.0 {
            EnemyStep::ReachedEnd
        } else {
            EnemyStep::Moving
        }
    }
}

// ── Player ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub position: Vec2,
    pub health: f64,
    pub max_health: f64,
    pub level: u32,
    pub experience: u64,
}

impl Player {
    pub fn new(position: Vec2, max_health: f64) -> Self {
        Self {
            position,
            health: max_health,
            max_health,
            level: 1,
            experience: 0,
        }
    }

    /// Experience required to leave `level`.
    pub fn experience_to_next(level: u32) -> u64 {
        100 * u64::from(level)
    }

    /// Add experience; returns how many levels were gained.
    pub fn add_experience(&mut self, amount: u64) -> u32 {
        self.experience += amount;
        let mut gained = 0;
        while self.experience >= Self::experience_to_next(self.level) {
            self.experience -= Self::experience_to_next(self.level);
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

// ── Inventory ──────────────────────────────────────────────────────

pub const MAX_STACK: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub slots: Vec<Option<ItemStack>>,
    pub items_collected: u64,
    pub items_used: u64,
}

impl Inventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            items_collected: 0,
            items_used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self, item_id: &str) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.item_id == item_id)
            .map(|s| s.quantity)
            .sum()
    }

    /// Add items, topping up existing stacks before opening new slots.
    /// Returns the quantity that did not fit.
    pub fn add_item(&mut self, item_id: &str, mut quantity: u32) -> u32 {
        let requested = quantity;
        for stack in self.slots.iter_mut().flatten() {
            if quantity == 0 {
                break;
            }
            if stack.item_id == item_id && stack.quantity < MAX_STACK {
                let moved = quantity.min(MAX_STACK - stack.quantity);
                stack.quantity += moved;
                quantity -= moved;
            }
        }
        for slot in self.slots.iter_mut() {
            if quantity == 0 {
                break;
            }
            if slot.is_none() {
                let moved = quantity.min(MAX_STACK);
                *slot = Some(ItemStack { item_id: item_id.to_string(), quantity: moved });
                quantity -= moved;
            }
        }
        self.items_collected += u64::from(requested - quantity);
        quantity
    }

    /// Consume one item. Returns false if none is held.
    pub fn use_item(&mut self, item_id: &str) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|s| s.item_id == item_id))
        else {
            return false;
        };
        let emptied = match slot {
            Some(stack) => {
                stack.quantity -= 1;
                stack.quantity == 0
            }
            None => false,
        };
        if emptied {
            *slot = None;
        }
        self.items_used += 1;
        true
    }
}

// ── Camera and map ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec2,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { position: Vec2::default(), zoom: 1.0 }
    }
}

/// Deterministic generation parameters. The generated terrain is derived
/// from these and is never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub biome: String,
    pub difficulty: String,
}
