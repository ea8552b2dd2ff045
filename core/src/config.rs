use crate::{
    error::{SessionError, SessionResult},
    types::{Millis, WaveIndex},
};
use serde::{Deserialize, Serialize};

// ── Auto-save ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Accumulated play time between timer-triggered saves.
    pub interval_ms: Millis,
}

// ── Waves ──────────────────────────────────────────────────────────

/// Curve mapping a wave index onto a multiplier. Wave 1 is always 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingCurve {
    Linear,
    Exponential,
    Logarithmic,
}

impl ScalingCurve {
    /// Multiplier for `wave` (1-based) with the given growth rate.
    pub fn multiplier(&self, wave: WaveIndex, growth: f64) -> f64 {
        let steps = f64::from(wave.saturating_sub(1));
        match self {
            Self::Linear      => 1.0 + growth * steps,
            Self::Exponential => (1.0 + growth).powf(steps),
            Self::Logarithmic => 1.0 + growth * f64::from(wave.max(1)).ln(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyTypeConfig {
    pub kind: String,
    pub base_health: f64,
    /// Movement speed in grid cells per second.
    pub base_speed: f64,
    pub reward: u64,
    /// First wave in which this type may appear.
    pub unlock_wave: WaveIndex,
    /// Relative selection weight among unlocked types.
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfiniteModeConfig {
    /// Growth rate of the perpetual exponential curve.
    pub growth: f64,
    pub swarm_count_multiplier: f64,
    pub swarm_health_multiplier: f64,
    pub swarm_interval_multiplier: f64,
    pub elite_count_multiplier: f64,
    pub elite_health_multiplier: f64,
    pub elite_interval_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveConfig {
    /// Campaign length outside infinite mode.
    pub total_waves: WaveIndex,
    pub start_delay_ms: Millis,
    pub spawn_interval_ms: Millis,
    pub base_enemy_count: u32,
    /// Upper bound on regular spawns in one wave, boss excluded.
    pub max_enemies_per_wave: u32,
    pub count_curve: ScalingCurve,
    pub count_growth: f64,
    pub health_curve: ScalingCurve,
    pub health_growth: f64,
    /// Every Nth wave is a boss wave.
    pub boss_every: WaveIndex,
    pub boss_health_multiplier: f64,
    pub boss_kind: String,
    pub completion_bonus: u64,
    pub completion_bonus_per_wave: u64,
    pub speed_bonus: u64,
    /// Waves cleared faster than this earn `speed_bonus`.
    pub speed_bonus_threshold_ms: Millis,
    pub infinite: InfiniteModeConfig,
    pub roster: Vec<EnemyTypeConfig>,
}

impl WaveConfig {
    pub fn enemy_type(&self, kind: &str) -> Option<&EnemyTypeConfig> {
        self.roster.iter().find(|e| e.kind == kind)
    }
}

// ── Game rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Multiplies movement speed by `magnitude` while active.
    Slow,
    /// Deals `magnitude` damage per second while active.
    Burn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnHitEffect {
    pub kind: EffectKind,
    pub magnitude: f64,
    pub duration_ms: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TowerTypeConfig {
    pub kind: String,
    pub cost: u64,
    pub damage: f64,
    /// Attack range in grid cells.
    pub range: f64,
    pub fire_interval_ms: Millis,
    #[serde(default)]
    pub on_hit: Option<OnHitEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub starting_currency: u64,
    pub starting_lives: u32,
    pub cell_size: f64,
    /// Upgrade cost = base cost × this × (current level).
    pub upgrade_cost_multiplier: f64,
    /// Damage/range gain per upgrade level, applied multiplicatively.
    pub upgrade_step: f64,
    pub score_per_kill: u64,
    pub experience_per_kill: u64,
    pub inventory_capacity: usize,
    pub towers: Vec<TowerTypeConfig>,
}

impl RulesConfig {
    pub fn tower_type(&self, kind: &str) -> Option<&TowerTypeConfig> {
        self.towers.iter().find(|t| t.kind == kind)
    }
}

// ── Leaderboard ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    pub max_scores: usize,
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub game_version: String,
    pub auto_save: AutoSaveConfig,
    pub waves: WaveConfig,
    pub rules: RulesConfig,
    pub leaderboard: LeaderboardConfig,
}

impl SessionConfig {
    /// Load from the data/ directory.
    /// In tests, use SessionConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/session.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SessionConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        log::info!(
            "Loaded session config from {path}: {} waves, {} enemy types, {} tower types",
            config.waves.total_waves,
            config.waves.roster.len(),
            config.rules.towers.len()
        );
        Ok(config)
    }

    /// Reject values that would stall timers or break multiplier identities.
    pub fn validate(&self) -> SessionResult<()> {
        let invalid = |reason: String| Err(SessionError::InvalidConfig { reason });

        if self.auto_save.interval_ms == 0 {
            return invalid("auto_save.interval_ms must be > 0".into());
        }
        if self.waves.boss_every == 0 {
            return invalid("waves.boss_every must be >= 1".into());
        }
        if self.waves.roster.is_empty() {
            return invalid("waves.roster must not be empty".into());
        }
        if self.waves.enemy_type(&self.waves.boss_kind).is_none() {
            return invalid(format!("waves.boss_kind '{}' is not in the roster", self.waves.boss_kind));
        }
        if self.waves.max_enemies_per_wave == 0
            || self.waves.max_enemies_per_wave < self.waves.base_enemy_count
        {
            return invalid(format!(
                "waves.max_enemies_per_wave must be >= 1 and >= base_enemy_count ({}), got {}",
                self.waves.base_enemy_count, self.waves.max_enemies_per_wave
            ));
        }
        if self.leaderboard.max_scores == 0 {
            return invalid("leaderboard.max_scores must be >= 1".into());
        }

        let inf = &self.waves.infinite;
        let multipliers = [
            ("waves.boss_health_multiplier", self.waves.boss_health_multiplier),
            ("waves.infinite.swarm_count_multiplier", inf.swarm_count_multiplier),
            ("waves.infinite.swarm_health_multiplier", inf.swarm_health_multiplier),
            ("waves.infinite.swarm_interval_multiplier", inf.swarm_interval_multiplier),
            ("waves.infinite.elite_count_multiplier", inf.elite_count_multiplier),
            ("waves.infinite.elite_health_multiplier", inf.elite_health_multiplier),
            ("waves.infinite.elite_interval_multiplier", inf.elite_interval_multiplier),
            ("rules.upgrade_cost_multiplier", self.rules.upgrade_cost_multiplier),
            ("rules.cell_size", self.rules.cell_size),
        ];
        for (name, value) in multipliers {
            if !value.is_finite() || value <= 0.0 {
                return invalid(format!("{name} must be finite and > 0, got {value}"));
            }
        }

        let growths = [
            ("waves.count_growth", self.waves.count_growth),
            ("waves.health_growth", self.waves.health_growth),
            ("waves.infinite.growth", inf.growth),
            ("rules.upgrade_step", self.rules.upgrade_step),
        ];
        for (name, value) in growths {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be finite and >= 0, got {value}"));
            }
        }

        for enemy in &self.waves.roster {
            if enemy.base_health <= 0.0 || enemy.base_speed <= 0.0 {
                return invalid(format!("enemy '{}' needs positive health and speed", enemy.kind));
            }
        }
        for tower in &self.rules.towers {
            if tower.fire_interval_ms == 0 {
                return invalid(format!("tower '{}' fire_interval_ms must be > 0", tower.kind));
            }
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            game_version: "0.1.0-test".into(),
            auto_save: AutoSaveConfig {
                enabled: true,
                interval_ms: 30_000,
            },
            waves: WaveConfig {
                total_waves: 20,
                start_delay_ms: 3_000,
                spawn_interval_ms: 800,
                base_enemy_count: 6,
                max_enemies_per_wave: 200,
                count_curve: ScalingCurve::Linear,
                count_growth: 0.25,
                health_curve: ScalingCurve::Exponential,
                health_growth: 0.12,
                boss_every: 5,
                boss_health_multiplier: 8.0,
                boss_kind: "brute".into(),
                completion_bonus: 50,
                completion_bonus_per_wave: 10,
                speed_bonus: 25,
                speed_bonus_threshold_ms: 30_000,
                infinite: InfiniteModeConfig {
                    growth: 0.15,
                    swarm_count_multiplier: 2.0,
                    swarm_health_multiplier: 0.5,
                    swarm_interval_multiplier: 0.5,
                    elite_count_multiplier: 0.5,
                    elite_health_multiplier: 2.5,
                    elite_interval_multiplier: 1.5,
                },
                roster: vec![
                    EnemyTypeConfig {
                        kind: "grunt".into(),
                        base_health: 40.0,
                        base_speed: 1.5,
                        reward: 5,
                        unlock_wave: 1,
                        weight: 6,
                    },
                    EnemyTypeConfig {
                        kind: "runner".into(),
                        base_health: 25.0,
                        base_speed: 3.0,
                        reward: 6,
                        unlock_wave: 3,
                        weight: 3,
                    },
                    EnemyTypeConfig {
                        kind: "brute".into(),
                        base_health: 120.0,
                        base_speed: 0.8,
                        reward: 15,
                        unlock_wave: 6,
                        weight: 1,
                    },
                ],
            },
            rules: RulesConfig {
                starting_currency: 200,
                starting_lives: 20,
                cell_size: 32.0,
                upgrade_cost_multiplier: 0.75,
                upgrade_step: 0.2,
                score_per_kill: 10,
                experience_per_kill: 4,
                inventory_capacity: 8,
                towers: vec![
                    TowerTypeConfig {
                        kind: "arrow".into(),
                        cost: 50,
                        damage: 12.0,
                        range: 3.5,
                        fire_interval_ms: 600,
                        on_hit: None,
                    },
                    TowerTypeConfig {
                        kind: "frost".into(),
                        cost: 80,
                        damage: 4.0,
                        range: 3.0,
                        fire_interval_ms: 900,
                        on_hit: Some(OnHitEffect {
                            kind: EffectKind::Slow,
                            magnitude: 0.5,
                            duration_ms: 2_000,
                        }),
                    },
                    TowerTypeConfig {
                        kind: "flame".into(),
                        cost: 110,
                        damage: 6.0,
                        range: 2.5,
                        fire_interval_ms: 700,
                        on_hit: Some(OnHitEffect {
                            kind: EffectKind::Burn,
                            magnitude: 8.0,
                            duration_ms: 3_000,
                        }),
                    },
                ],
            },
            leaderboard: LeaderboardConfig { max_scores: 50 },
        }
    }
}
