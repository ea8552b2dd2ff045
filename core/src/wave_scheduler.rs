//! Wave scheduler — spawn timing and wave completion.
//!
//! STATE MACHINE (cycles once per wave, never terminates):
//!   Idle → Starting (start delay) → Spawning (queue drains at the
//!   spawn interval) → Active (until live enemies reach zero) → Complete
//!
//! RULES:
//!   - Complete is entered only from Active, so an empty wave still
//!     passes through Active before it can complete.
//!   - start_next_wave() is accepted only from Idle or Complete.
//!   - Every multiplier composes by multiplication; 1.0 is the identity.
//!
//! Depends on: nothing persistent. The snapshot embeds to_record().

use crate::{
    config::{EnemyTypeConfig, ScalingCurve, WaveConfig},
    event::WaveKind,
    rng::{RngStream, WaveRng},
    snapshot::WaveStateRecord,
    types::{Millis, WaveIndex},
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WavePhase {
    Idle,
    Starting,
    Spawning,
    Active,
    Complete,
}

/// One pending enemy release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpawnDescriptor {
    pub enemy_type: String,
    /// Time left before release, counted from the previous release.
    pub delay_ms: Millis,
    pub health_multiplier: f64,
    pub speed_multiplier: f64,
    pub reward_multiplier: f64,
}

/// The generated contents of one wave.
#[derive(Debug, Clone, PartialEq)]
pub struct WavePlan {
    pub wave: WaveIndex,
    pub kind: WaveKind,
    pub spawns: Vec<SpawnDescriptor>,
}

/// Rewards reported when a wave completes. Kill rewards are paid as
/// kills happen and are not included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveCompletion {
    pub wave: WaveIndex,
    pub elapsed_ms: Millis,
    pub completion_bonus: u64,
    pub speed_bonus: u64,
}

/// What happened during one update() call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveTick {
    pub spawned: Vec<SpawnDescriptor>,
    pub completed: Option<WaveCompletion>,
}

/// Build the spawn queue for `wave`. Deterministic in (config, wave,
/// infinite, map_seed).
pub fn plan_wave(config: &WaveConfig, wave: WaveIndex, infinite: bool, map_seed: u64) -> WavePlan {
    let is_boss = wave > 0 && wave % config.boss_every == 0;

    let (mut count_mult, mut health_mult, mut interval_mult, mut reward_mult, mut kind) = if infinite {
        let inf = &config.infinite;
        let curve = ScalingCurve::Exponential.multiplier(wave, inf.growth);
        if wave % 2 == 1 {
            (
                curve * inf.swarm_count_multiplier,
                curve * inf.swarm_health_multiplier,
                inf.swarm_interval_multiplier,
                inf.swarm_health_multiplier,
                WaveKind::Swarm,
            )
        } else {
            (
                curve * inf.elite_count_multiplier,
                curve * inf.elite_health_multiplier,
                inf.elite_interval_multiplier,
                inf.elite_health_multiplier,
                WaveKind::Elite,
            )
        }
    } else {
        (
            config.count_curve.multiplier(wave, config.count_growth),
            config.health_curve.multiplier(wave, config.health_growth),
            1.0,
            1.0,
            WaveKind::Standard,
        )
    };

    if !count_mult.is_finite() { count_mult = 1.0; }
    if !health_mult.is_finite() { health_mult = 1.0; }
    if !interval_mult.is_finite() { interval_mult = 1.0; }
    if !reward_mult.is_finite() { reward_mult = 1.0; }

    let cap = f64::from(config.max_enemies_per_wave.max(1));
    let count = (f64::from(config.base_enemy_count) * count_mult).round().clamp(1.0, cap) as usize;
    let interval = ((config.spawn_interval_ms as f64 * interval_mult).round() as Millis).max(1);

    let unlocked: Vec<&EnemyTypeConfig> = config
        .roster
        .iter()
        .filter(|e| e.unlock_wave <= wave.max(1))
        .collect();
    let candidates: Vec<&EnemyTypeConfig> = if unlocked.is_empty() {
        config.roster.iter().min_by_key(|e| e.unlock_wave).into_iter().collect()
    } else {
        unlocked
    };
    let weights: Vec<u32> = candidates.iter().map(|e| e.weight).collect();

    let mut rng = WaveRng::new(map_seed, wave, RngStream::Composition);
    let mut spawns = Vec::with_capacity(count + usize::from(is_boss));
    for i in 0..count {
        let pick = rng.weighted_index(&weights).unwrap_or(0);
        let Some(enemy) = candidates.get(pick) else { break };
        spawns.push(SpawnDescriptor {
            enemy_type: enemy.kind.clone(),
            delay_ms: if i == 0 { 0 } else { interval },
            health_multiplier: health_mult,
            speed_multiplier: 1.0,
            reward_multiplier: reward_mult,
        });
    }

    if is_boss {
        kind = WaveKind::Boss;
        spawns.push(SpawnDescriptor {
            enemy_type: config.boss_kind.clone(),
            delay_ms: if spawns.is_empty() { 0 } else { interval },
            health_multiplier: health_mult * config.boss_health_multiplier,
            speed_multiplier: 1.0,
            reward_multiplier: reward_mult * config.boss_health_multiplier,
        });
    }

    WavePlan { wave, kind, spawns }
}

pub struct WaveScheduler {
    config: WaveConfig,
    map_seed: u64,
    current_wave_index: WaveIndex,
    phase: WavePhase,
    kind: WaveKind,
    spawn_queue: VecDeque<SpawnDescriptor>,
    live_enemy_count: usize,
    infinite_mode: bool,
    start_countdown_ms: Millis,
    wave_elapsed_ms: Millis,
}

impl WaveScheduler {
    pub fn new(config: WaveConfig, map_seed: u64) -> Self {
        Self {
            config,
            map_seed,
            current_wave_index: 0,
            phase: WavePhase::Idle,
            kind: WaveKind::Standard,
            spawn_queue: VecDeque::new(),
            live_enemy_count: 0,
            infinite_mode: false,
            start_countdown_ms: 0,
            wave_elapsed_ms: 0,
        }
    }

    pub fn current_wave(&self) -> WaveIndex { self.current_wave_index }
    pub fn phase(&self) -> WavePhase { self.phase }
    pub fn kind(&self) -> WaveKind { self.kind }
    pub fn live_enemy_count(&self) -> usize { self.live_enemy_count }
    pub fn pending_spawns(&self) -> usize { self.spawn_queue.len() }
    pub fn is_infinite_mode(&self) -> bool { self.infinite_mode }
    pub fn wave_elapsed_ms(&self) -> Millis { self.wave_elapsed_ms }

    /// A wave is in flight (counting down, spawning, or being fought).
    pub fn is_active(&self) -> bool {
        matches!(self.phase, WavePhase::Starting | WavePhase::Spawning | WavePhase::Active)
    }

    pub fn is_complete(&self) -> bool {
        self.phase == WavePhase::Complete
    }

    /// The fixed campaign is over. Never true in infinite mode.
    pub fn all_waves_cleared(&self) -> bool {
        !self.infinite_mode
            && self.current_wave_index >= self.config.total_waves
            && self.phase == WavePhase::Complete
    }

    /// Takes effect from the next wave planned.
    pub fn set_infinite_mode(&mut self, enabled: bool) {
        self.infinite_mode = enabled;
    }

    /// Begin the next wave. Returns false, without changing anything,
    /// while a wave is in flight, after game over, past the last campaign
    /// wave, or when the wave index cannot advance.
    pub fn start_next_wave(&mut self, game_over: bool) -> bool {
        if game_over {
            log::debug!("wave={} start rejected: game over", self.current_wave_index);
            return false;
        }
        if !matches!(self.phase, WavePhase::Idle | WavePhase::Complete) {
            log::debug!(
                "wave={} start rejected: phase {:?}",
                self.current_wave_index,
                self.phase
            );
            return false;
        }
        if !self.infinite_mode && self.current_wave_index >= self.config.total_waves {
            log::debug!("wave={} start rejected: campaign finished", self.current_wave_index);
            return false;
        }

        let Some(next) = self.current_wave_index.checked_add(1) else {
            log::warn!("wave={} start rejected: no further wave index", self.current_wave_index);
            return false;
        };
        let plan = plan_wave(&self.config, next, self.infinite_mode, self.map_seed);
        self.current_wave_index = next;
        self.kind = plan.kind;
        self.spawn_queue = plan.spawns.into();
        self.start_countdown_ms = self.config.start_delay_ms;
        self.wave_elapsed_ms = 0;
        self.phase = WavePhase::Starting;

        log::info!(
            "wave={next} starting: {:?}, {} spawns queued",
            self.kind,
            self.spawn_queue.len()
        );
        true
    }

    /// Advance timers by `dt`. Released spawns are returned and counted
    /// as live immediately.
    pub fn update(&mut self, dt: Millis) -> WaveTick {
        let mut out = WaveTick::default();
        if matches!(self.phase, WavePhase::Idle | WavePhase::Complete) {
            return out;
        }

        let mut budget = dt;

        if self.phase == WavePhase::Starting {
            if self.start_countdown_ms > budget {
                self.start_countdown_ms -= budget;
                return out;
            }
            budget -= self.start_countdown_ms;
            self.start_countdown_ms = 0;
            self.phase = WavePhase::Spawning;
        }

        self.wave_elapsed_ms = self.wave_elapsed_ms.saturating_add(budget);

        if self.phase == WavePhase::Spawning {
            while let Some(front) = self.spawn_queue.front_mut() {
                if front.delay_ms > budget {
                    front.delay_ms -= budget;
                    break;
                }
                budget -= front.delay_ms;
                if let Some(mut spawn) = self.spawn_queue.pop_front() {
                    spawn.delay_ms = 0;
                    self.live_enemy_count += 1;
                    out.spawned.push(spawn);
                }
            }
            if self.spawn_queue.is_empty() {
                self.phase = WavePhase::Active;
            }
        }

        if self.phase == WavePhase::Active && self.live_enemy_count == 0 {
            out.completed = Some(self.complete());
        }
        out
    }

    /// An enemy left play (killed or leaked).
    pub fn enemy_removed(&mut self) {
        if self.live_enemy_count == 0 {
            log::warn!("wave={} enemy_removed with no live enemies", self.current_wave_index);
            return;
        }
        self.live_enemy_count -= 1;
    }

    fn complete(&mut self) -> WaveCompletion {
        self.phase = WavePhase::Complete;
        let wave = self.current_wave_index;
        let completion_bonus = self.config.completion_bonus
            + self.config.completion_bonus_per_wave * u64::from(wave);
        let speed_bonus = if self.wave_elapsed_ms < self.config.speed_bonus_threshold_ms {
            self.config.speed_bonus
        } else {
            0
        };
        log::info!(
            "wave={wave} complete in {}ms: bonus={completion_bonus} speed_bonus={speed_bonus}",
            self.wave_elapsed_ms
        );
        WaveCompletion {
            wave,
            elapsed_ms: self.wave_elapsed_ms,
            completion_bonus,
            speed_bonus,
        }
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn to_record(&self) -> WaveStateRecord {
        WaveStateRecord {
            current_wave_index: self.current_wave_index,
            phase: self.phase,
            is_active: self.is_active(),
            is_infinite_mode: self.infinite_mode,
            kind: self.kind,
            spawn_queue: self.spawn_queue.iter().cloned().collect(),
            start_countdown_ms: self.start_countdown_ms,
            wave_elapsed_ms: self.wave_elapsed_ms,
        }
    }

    /// Replace all wave state from a record that passed check_record().
    /// `live_enemy_count` comes from the restored enemy list, never from
    /// the record.
    pub fn restore(&mut self, record: &WaveStateRecord, live_enemy_count: usize) {
        self.current_wave_index = record.current_wave_index;
        self.phase = record.phase;
        self.infinite_mode = record.is_infinite_mode;
        self.kind = record.kind;
        self.spawn_queue = record.spawn_queue.iter().cloned().collect();
        self.start_countdown_ms = record.start_countdown_ms;
        self.wave_elapsed_ms = record.wave_elapsed_ms;
        self.live_enemy_count = live_enemy_count;
    }
}

/// Reasons `record` cannot be restored as-is alongside `live_enemy_count`
/// enemies. A record that passes restores to exactly itself.
pub fn check_record(
    config: &WaveConfig,
    record: &WaveStateRecord,
    live_enemy_count: usize,
) -> Result<(), String> {
    let wave = record.current_wave_index;
    if wave == WaveIndex::MAX {
        return Err(format!("wave={wave} has no successor"));
    }
    if !record.is_infinite_mode && wave > config.total_waves {
        return Err(format!("wave={wave} is past the {}-wave campaign", config.total_waves));
    }

    let in_flight = matches!(record.phase, WavePhase::Starting | WavePhase::Spawning | WavePhase::Active);
    if record.is_active != in_flight {
        return Err(format!("wave={wave} is_active={} contradicts phase {:?}", record.is_active, record.phase));
    }
    let queued = record.spawn_queue.len();
    if queued > 0 && matches!(record.phase, WavePhase::Idle | WavePhase::Active | WavePhase::Complete) {
        return Err(format!("wave={wave} is {:?} with {queued} spawns still queued", record.phase));
    }
    if record.phase == WavePhase::Complete && live_enemy_count > 0 {
        return Err(format!("wave={wave} is Complete with {live_enemy_count} live enemies"));
    }
    let max_queue = config.max_enemies_per_wave as usize + 1;
    if queued > max_queue {
        return Err(format!("wave={wave} queues {queued} spawns, limit is {max_queue}"));
    }
    if let Some(spawn) = record.spawn_queue.iter().find(|s| {
        [s.health_multiplier, s.speed_multiplier, s.reward_multiplier]
            .iter()
            .any(|m| !m.is_finite() || *m <= 0.0)
    }) {
        return Err(format!("wave={wave} queued '{}' has an invalid multiplier", spawn.enemy_type));
    }
    if let Some(spawn) = record.spawn_queue.iter().find(|s| config.enemy_type(&s.enemy_type).is_none()) {
        return Err(format!("wave={wave} queued unknown enemy type '{}'", spawn.enemy_type));
    }
    Ok(())
}
