//! Wave scheduler tests — phase machine, start guards, completion predicate.

use siegeline_core::{
    config::{SessionConfig, WaveConfig},
    event::WaveKind,
    wave_scheduler::{check_record, plan_wave, WaveCompletion, WavePhase, WaveScheduler},
};

fn waves() -> WaveConfig {
    SessionConfig::default_test().waves
}

/// Drive the current wave to completion, removing each enemy on the
/// update after it spawns. Checks the completion predicate at every step.
fn run_to_completion(s: &mut WaveScheduler) -> WaveCompletion {
    let mut seen_active = false;
    let mut live_here = 0usize;
    for _ in 0..10_000 {
        for _ in 0..live_here {
            s.enemy_removed();
        }
        let tick = s.update(100);
        live_here = tick.spawned.len();

        if s.phase() == WavePhase::Active {
            seen_active = true;
        }
        if let Some(done) = tick.completed {
            assert!(seen_active, "Complete reached without passing through Active");
            assert_eq!(s.pending_spawns(), 0);
            assert_eq!(s.live_enemy_count(), 0);
            assert!(s.is_complete());
            return done;
        }
        assert!(!s.is_complete(), "Complete without a completion report");
    }
    panic!("wave never completed");
}

#[test]
fn new_scheduler_is_idle_at_wave_zero() {
    let s = WaveScheduler::new(waves(), 1);
    assert_eq!(s.current_wave(), 0);
    assert_eq!(s.phase(), WavePhase::Idle);
    assert!(!s.is_active());
}

/// Two starts in a row start exactly one wave.
#[test]
fn no_double_start() {
    let mut s = WaveScheduler::new(waves(), 1);
    assert!(s.start_next_wave(false));
    let queued = s.pending_spawns();
    assert!(!s.start_next_wave(false));
    assert_eq!(s.current_wave(), 1);
    assert_eq!(s.pending_spawns(), queued);
}

/// Every in-flight phase refuses a new start.
#[test]
fn start_refused_in_every_in_flight_phase() {
    let mut s = WaveScheduler::new(waves(), 1);
    s.start_next_wave(false);
    assert_eq!(s.phase(), WavePhase::Starting);
    assert!(!s.start_next_wave(false));

    s.update(waves().start_delay_ms);
    assert_eq!(s.phase(), WavePhase::Spawning);
    assert!(!s.start_next_wave(false));

    s.update(60_000);
    assert_eq!(s.phase(), WavePhase::Active);
    assert!(!s.start_next_wave(false));
}

#[test]
fn start_refused_after_game_over() {
    let mut s = WaveScheduler::new(waves(), 1);
    assert!(!s.start_next_wave(true));
    assert_eq!(s.phase(), WavePhase::Idle);
    assert_eq!(s.current_wave(), 0);
}

/// Nothing is released during the start delay.
#[test]
fn countdown_holds_spawns() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 1);
    s.start_next_wave(false);

    let tick = s.update(config.start_delay_ms - 1);
    assert!(tick.spawned.is_empty());
    assert_eq!(s.phase(), WavePhase::Starting);

    let tick = s.update(1);
    assert_eq!(tick.spawned.len(), 1, "first spawn has no delay");
    assert_eq!(s.live_enemy_count(), 1);
}

/// Spawns are released one interval apart.
#[test]
fn spawn_interval_paces_the_queue() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 1);
    s.start_next_wave(false);
    s.update(config.start_delay_ms);

    let tick = s.update(config.spawn_interval_ms - 1);
    assert!(tick.spawned.is_empty());
    let tick = s.update(1);
    assert_eq!(tick.spawned.len(), 1);

    let tick = s.update(config.spawn_interval_ms * 2);
    assert_eq!(tick.spawned.len(), 2);
    assert_eq!(s.live_enemy_count(), 4);
}

/// Live enemies keep the wave Active after the queue drains.
#[test]
fn live_enemies_hold_the_wave_open() {
    let mut s = WaveScheduler::new(waves(), 1);
    s.start_next_wave(false);
    s.update(60_000);
    assert_eq!(s.phase(), WavePhase::Active);
    let live = s.live_enemy_count();

    for _ in 0..live - 1 {
        s.enemy_removed();
    }
    assert!(s.update(100).completed.is_none());

    s.enemy_removed();
    let done = s.update(100).completed.expect("completes once the last enemy is gone");
    assert_eq!(done.wave, 1);
    assert_eq!(s.phase(), WavePhase::Complete);
}

#[test]
fn completion_predicate_holds_across_waves() {
    let mut s = WaveScheduler::new(waves(), 9);
    for wave in 1..=6 {
        assert!(s.start_next_wave(false));
        let done = run_to_completion(&mut s);
        assert_eq!(done.wave, wave);
    }
}

/// Bonus = base + per-wave × index, plus the speed bonus under the threshold.
#[test]
fn completion_reports_bonuses() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 1);
    s.start_next_wave(false);
    let done = run_to_completion(&mut s);
    assert_eq!(done.completion_bonus, config.completion_bonus + config.completion_bonus_per_wave);
    assert!(done.elapsed_ms < config.speed_bonus_threshold_ms);
    assert_eq!(done.speed_bonus, config.speed_bonus);
}

#[test]
fn slow_wave_earns_no_speed_bonus() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 1);
    s.start_next_wave(false);
    s.update(config.start_delay_ms + config.speed_bonus_threshold_ms);
    for _ in 0..s.live_enemy_count() {
        s.enemy_removed();
    }
    let done = s.update(100).completed.unwrap();
    assert_eq!(done.speed_bonus, 0);
}

/// The campaign stops at total_waves unless infinite mode is on.
#[test]
fn campaign_ends_at_total_waves() {
    let mut config = waves();
    config.total_waves = 2;
    let mut s = WaveScheduler::new(config, 3);

    for _ in 0..2 {
        assert!(s.start_next_wave(false));
        run_to_completion(&mut s);
    }
    assert!(s.all_waves_cleared());
    assert!(!s.start_next_wave(false));

    s.set_infinite_mode(true);
    assert!(!s.all_waves_cleared());
    assert!(s.start_next_wave(false));
    assert_eq!(s.current_wave(), 3);
    assert!(matches!(s.kind(), WaveKind::Swarm | WaveKind::Elite));
}

#[test]
fn boss_wave_is_flagged() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 5);
    for _ in 1..config.boss_every {
        s.start_next_wave(false);
        run_to_completion(&mut s);
        assert_eq!(s.kind(), WaveKind::Standard);
    }
    s.start_next_wave(false);
    assert_eq!(s.kind(), WaveKind::Boss);
}

/// Later waves never shrink under the configured count curve.
#[test]
fn wave_size_grows_with_index() {
    let config = waves();
    let sizes: Vec<usize> = (1..=4).map(|w| plan_wave(&config, w, false, 2).spawns.len()).collect();
    assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "sizes: {sizes:?}");
    assert!(sizes[3] > sizes[0]);
}

/// Same seed, same wave, same queue; a different seed usually differs.
#[test]
fn composition_depends_on_seed() {
    let config = waves();
    let a = plan_wave(&config, 8, false, 1);
    let b = plan_wave(&config, 8, false, 1);
    assert_eq!(a, b);

    let differs = (2..20).any(|seed| plan_wave(&config, 8, false, seed).spawns != a.spawns);
    assert!(differs, "composition should vary with the map seed");
}

/// A mid-spawn record restores into a scheduler that keeps spawning.
#[test]
fn restore_resumes_spawning() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 4);
    s.start_next_wave(false);
    s.update(config.start_delay_ms + config.spawn_interval_ms);
    let record = s.to_record();
    let live = s.live_enemy_count();
    assert_eq!(record.phase, WavePhase::Spawning);
    assert!(record.is_active);

    let mut restored = WaveScheduler::new(config.clone(), 4);
    restored.restore(&record, live);
    assert_eq!(restored.to_record(), record);

    let a = s.update(config.spawn_interval_ms);
    let b = restored.update(config.spawn_interval_ms);
    assert_eq!(a, b);
}

/// A Complete record that still has queued spawns is refused, not reshaped.
#[test]
fn inconsistent_complete_record_is_refused() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 4);
    s.start_next_wave(false);
    let mut record = s.to_record();
    assert!(check_record(&config, &record, 0).is_ok());

    record.phase = WavePhase::Complete;
    record.is_active = false;
    assert!(check_record(&config, &record, 0).is_err());

    record.spawn_queue.clear();
    assert!(check_record(&config, &record, 0).is_ok());
    assert!(check_record(&config, &record, 2).is_err(), "Complete with live enemies");
}

/// Records that pass the check restore to exactly themselves.
#[test]
fn checked_record_restores_verbatim() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 4);
    s.start_next_wave(false);
    run_to_completion(&mut s);
    let record = s.to_record();
    check_record(&config, &record, 0).unwrap();

    let mut restored = WaveScheduler::new(config, 4);
    restored.restore(&record, 0);
    assert_eq!(restored.to_record(), record);
}

/// Wave indices the scheduler could never advance from are refused.
#[test]
fn out_of_range_wave_index_is_refused() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 4);
    s.start_next_wave(false);
    run_to_completion(&mut s);

    let mut record = s.to_record();
    record.current_wave_index = config.total_waves + 1;
    assert!(check_record(&config, &record, 0).is_err(), "past the campaign");

    record.is_infinite_mode = true;
    assert!(check_record(&config, &record, 0).is_ok(), "infinite mode has no campaign end");

    record.current_wave_index = u32::MAX;
    assert!(check_record(&config, &record, 0).is_err(), "no successor index");
}

/// At the last representable index a start is refused instead of wrapping.
#[test]
fn start_at_last_wave_index_is_refused() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 4);
    s.set_infinite_mode(true);
    s.start_next_wave(false);
    run_to_completion(&mut s);

    let mut record = s.to_record();
    record.current_wave_index = u32::MAX;
    s.restore(&record, 0);

    assert!(!s.start_next_wave(false));
    assert_eq!(s.current_wave(), u32::MAX);
    assert_eq!(s.phase(), WavePhase::Complete);
}

/// Deep infinite waves stay within the configured enemy cap.
#[test]
fn deep_infinite_wave_starts_within_the_cap() {
    let config = waves();
    let mut s = WaveScheduler::new(config.clone(), 4);
    s.set_infinite_mode(true);
    s.start_next_wave(false);
    run_to_completion(&mut s);

    let mut record = s.to_record();
    record.current_wave_index = 400;
    check_record(&config, &record, 0).unwrap();
    s.restore(&record, 0);

    assert!(s.start_next_wave(false));
    assert_eq!(s.current_wave(), 401);
    assert!(s.pending_spawns() <= config.max_enemies_per_wave as usize + 1);
}
