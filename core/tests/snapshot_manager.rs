//! Snapshot manager tests — save, load, auto-save cadence, failure tolerance.

use siegeline_core::{
    clock::GameSpeed,
    config::SessionConfig,
    error::{SessionError, SessionResult},
    entities::{Camera, Cell, Enemy, Inventory, MapConfig, Player, StoreState, Tower},
    event::SessionEvent,
    game::Game,
    host::SessionHost,
    snapshot::{GameSnapshot, WaveStateRecord, SNAPSHOT_VERSION},
    snapshot_manager::SnapshotManager,
    store::{KeyValueStore, MemoryStore, HAS_SAVE_KEY, SAVE_KEY},
    types::{EntityId, Millis, WaveIndex},
    wave_scheduler::{WaveCompletion, WavePhase},
};

fn map() -> MapConfig {
    MapConfig {
        seed: 77,
        width: 20,
        height: 9,
        biome: "desert".into(),
        difficulty: "hard".into(),
    }
}

fn game() -> Game {
    Game::new(SessionConfig::default_test(), map())
}

fn manager(store: MemoryStore) -> SnapshotManager<MemoryStore> {
    SnapshotManager::new(store, &SessionConfig::default_test())
}

/// Start the next wave and kill every enemy as it appears until the wave completes.
fn clear_wave(game: &mut Game) -> WaveCompletion {
    assert!(game.start_next_wave(), "wave should start");
    for _ in 0..10_000 {
        let tick = game.update(100);
        let ids: Vec<EntityId> = game.enemies().iter().map(|e| e.id).collect();
        for id in ids {
            game.kill_enemy(id);
        }
        if let Some(done) = tick.completed {
            return done;
        }
    }
    panic!("wave never completed");
}

/// Wraps a Game and records every snapshot handed to restore_from_snapshot.
struct RecordingHost {
    inner: Game,
    restored_waves: Vec<WaveIndex>,
}

impl SessionHost for RecordingHost {
    fn store_state(&self) -> &StoreState { self.inner.store_state() }
    fn towers(&self) -> &[Tower] { self.inner.towers() }
    fn enemies(&self) -> &[Enemy] { self.inner.enemies() }
    fn player(&self) -> &Player { self.inner.player() }
    fn inventory(&self) -> &Inventory { self.inner.inventory() }
    fn wave_state(&self) -> WaveStateRecord { self.inner.wave_state() }
    fn map_config(&self) -> &MapConfig { self.inner.map_config() }
    fn cell_size(&self) -> f64 { self.inner.cell_size() }
    fn camera(&self) -> &Camera { self.inner.camera() }
    fn elapsed_ms(&self) -> Millis { self.inner.elapsed_ms() }
    fn next_entity_id(&self) -> EntityId { self.inner.next_entity_id() }
    fn speed(&self) -> GameSpeed { self.inner.speed() }

    fn restore_from_snapshot(&mut self, snapshot: &GameSnapshot) -> bool {
        self.restored_waves.push(snapshot.wave_state.current_wave_index);
        self.inner.restore_from_snapshot(snapshot)
    }
}

/// Memory store that can be told to refuse writes to the save flag only.
#[derive(Default)]
struct FlagRefusingStore {
    inner: MemoryStore,
    refuse_flag: bool,
}

impl KeyValueStore for FlagRefusingStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> SessionResult<()> {
        if self.refuse_flag && key == HAS_SAVE_KEY {
            return Err(SessionError::StorageUnavailable { reason: "flag write refused".into() });
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        self.inner.remove(key)
    }
}

/// Save sets both keys; the flag is the literal "true".
#[test]
fn save_writes_payload_and_flag() {
    let mut m = manager(MemoryStore::new());
    assert!(!m.has_saved_game());

    m.save(&game());

    assert!(m.has_saved_game());
    assert_eq!(m.store().get(HAS_SAVE_KEY).unwrap().as_deref(), Some("true"));
    let text = m.store().get(SAVE_KEY).unwrap().expect("payload written");
    let snapshot = GameSnapshot::from_json(&text).unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.metadata.game_version, "0.1.0-test");
    assert_eq!(m.saves_written(), 1);
}

/// Loading with nothing stored returns false and emits nothing.
#[test]
fn load_without_save_returns_false() {
    let mut m = manager(MemoryStore::new());
    let mut g = game();
    assert!(!m.load(&mut g));
    assert!(m.drain_events().is_empty());
}

/// A non-JSON payload is treated exactly like no save.
#[test]
fn corrupt_payload_loads_as_absent() {
    let mut store = MemoryStore::new();
    store.set(SAVE_KEY, "not json").unwrap();
    store.set(HAS_SAVE_KEY, "true").unwrap();
    let mut m = manager(store);

    let mut g = game();
    let before = GameSnapshot::capture(&g, "x");
    assert!(!m.load(&mut g));
    assert!(GameSnapshot::capture(&g, "x").same_state_as(&before));
    assert!(m.drain_events().is_empty());
}

/// Right version, wrong shape: still "no save".
#[test]
fn wrong_shape_loads_as_absent() {
    let mut store = MemoryStore::new();
    store.set(SAVE_KEY, r#"{"version": 1, "storeState": 5}"#).unwrap();
    let mut m = manager(store);
    assert!(!m.load(&mut game()));
}

/// A save from another schema version is refused and reported.
#[test]
fn other_version_is_refused_with_event() {
    let mut m = manager(MemoryStore::new());
    let mut source = game();
    clear_wave(&mut source);
    m.save(&source);

    let text = m.store().get(SAVE_KEY).unwrap().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
    value["version"] = serde_json::json!(SNAPSHOT_VERSION + 1);
    m.store_mut().set(SAVE_KEY, &value.to_string()).unwrap();

    let mut target = game();
    assert!(!m.load(&mut target));
    assert_eq!(target.waves().current_wave(), 0, "target must be untouched");
    assert_eq!(
        m.drain_events(),
        vec![SessionEvent::SaveRejected {
            found: SNAPSHOT_VERSION + 1,
            supported: SNAPSHOT_VERSION,
        }]
    );
}

/// An older schema version is refused just like a newer one.
#[test]
fn older_version_is_refused_with_event() {
    let mut m = manager(MemoryStore::new());
    m.save(&game());

    let text = m.store().get(SAVE_KEY).unwrap().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
    value["version"] = serde_json::json!(0);
    m.store_mut().set(SAVE_KEY, &value.to_string()).unwrap();

    assert!(!m.load(&mut game()));
    assert_eq!(
        m.drain_events(),
        vec![SessionEvent::SaveRejected { found: 0, supported: SNAPSHOT_VERSION }]
    );
}

/// save, then load into a fresh game, yields the same state.
#[test]
fn load_restores_saved_state() {
    let mut m = manager(MemoryStore::new());
    let mut source = game();
    source.build_tower("arrow", Cell { col: 5, row: 3 }).unwrap();
    clear_wave(&mut source);
    m.save(&source);

    let mut target = game();
    assert!(m.load(&mut target));
    let a = GameSnapshot::capture(&source, "v");
    let b = GameSnapshot::capture(&target, "v");
    assert!(a.same_state_as(&b));
    assert_eq!(m.drain_events(), vec![SessionEvent::GameLoaded { wave: 1 }]);
}

/// Scenario: a hand-built save at wave 3, Complete, is handed to the host verbatim.
#[test]
fn restore_receives_the_saved_wave_index() {
    let config = SessionConfig::default_test();
    let mut snapshot = GameSnapshot::capture(&game(), &config.game_version);
    snapshot.store_state.currency = 0;
    snapshot.store_state.lives = 10;
    snapshot.towers.clear();
    snapshot.enemies.clear();
    snapshot.wave_state.current_wave_index = 3;
    snapshot.wave_state.phase = WavePhase::Complete;
    snapshot.wave_state.is_active = false;
    snapshot.wave_state.spawn_queue.clear();

    let mut store = MemoryStore::new();
    store.set(SAVE_KEY, &snapshot.to_json().unwrap()).unwrap();
    store.set(HAS_SAVE_KEY, "true").unwrap();
    let mut m = SnapshotManager::new(store, &config);

    let mut host = RecordingHost { inner: game(), restored_waves: Vec::new() };
    assert!(m.load(&mut host));
    assert_eq!(host.restored_waves, vec![3]);
    assert_eq!(host.inner.waves().current_wave(), 3);
    assert_eq!(host.inner.waves().phase(), WavePhase::Complete);
    assert_eq!(host.store_state().currency, 0);
    assert_eq!(host.store_state().lives, 10);
}

/// Deltas summing to exactly k intervals, none larger than the interval, save k times.
#[test]
fn auto_save_fires_once_per_interval() {
    let config = SessionConfig::default_test();
    let interval = config.auto_save.interval_ms;
    let mut m = manager(MemoryStore::new());
    let g = game();

    let pattern = [interval / 6, interval / 3, interval / 2];
    assert_eq!(pattern.iter().sum::<Millis>(), interval);

    const K: u64 = 4;
    for _ in 0..K {
        for delta in pattern {
            m.update_auto_save_timer(delta, &g);
        }
    }

    assert_eq!(m.saves_written(), K);
    let autos = m
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::GameAutoSaved { .. }))
        .count();
    assert_eq!(autos as u64, K);
    assert_eq!(m.auto_save_elapsed_ms(), 0);
}

/// The accumulator resets to zero, dropping any overshoot.
#[test]
fn auto_save_overshoot_is_discarded() {
    let interval = SessionConfig::default_test().auto_save.interval_ms;
    let mut m = manager(MemoryStore::new());
    let g = game();

    m.update_auto_save_timer(interval - 10, &g);
    m.update_auto_save_timer(500, &g);
    assert_eq!(m.saves_written(), 1);
    assert_eq!(m.auto_save_elapsed_ms(), 0);

    m.update_auto_save_timer(interval - 1, &g);
    assert_eq!(m.saves_written(), 1, "overshoot must not carry into the next cycle");
}

#[test]
fn disabled_auto_save_never_fires() {
    let mut config = SessionConfig::default_test();
    config.auto_save.enabled = false;
    let mut m = SnapshotManager::new(MemoryStore::new(), &config);
    let g = game();
    for _ in 0..10 {
        m.update_auto_save_timer(config.auto_save.interval_ms, &g);
    }
    assert_eq!(m.saves_written(), 0);
    assert!(!m.has_saved_game());
}

/// Wave saves and auto-saves are distinguishable.
#[test]
fn wave_save_emits_its_own_event() {
    let mut m = manager(MemoryStore::new());
    let mut g = game();
    clear_wave(&mut g);
    clear_wave(&mut g);

    m.save_after_wave(&g);
    m.auto_save(&g);

    assert_eq!(
        m.drain_events(),
        vec![
            SessionEvent::GameWaveSaved { wave: 2 },
            SessionEvent::GameAutoSaved { play_time_ms: g.elapsed_ms() },
        ]
    );
}

/// Quota exceeded: save returns normally, nothing is stored, play goes on.
#[test]
fn quota_failure_is_swallowed() {
    let mut m = manager(MemoryStore::with_quota(64));
    let mut g = game();

    m.save(&g);
    m.auto_save(&g);

    assert_eq!(m.saves_written(), 0);
    assert_eq!(m.saves_failed(), 2);
    assert!(!m.has_saved_game());
    assert!(m.drain_events().is_empty(), "failed saves emit no events");

    assert!(g.start_next_wave());
    g.update(100);
}

/// A failing write leaves the previous save readable.
#[test]
fn failed_write_keeps_previous_save() {
    let mut m = manager(MemoryStore::new());
    let mut g = game();
    m.save(&g);

    g.build_tower("arrow", Cell { col: 1, row: 1 }).unwrap();
    m.store_mut().set_fail_writes(true);
    m.save(&g);

    let stored = m.read_snapshot().unwrap().expect("old save intact");
    assert!(stored.towers.is_empty());
    assert_eq!(m.saves_failed(), 1);
}

/// An unreadable backend means no save, not an error.
#[test]
fn unreadable_backend_reads_as_no_save() {
    let mut m = manager(MemoryStore::new());
    m.save(&game());
    m.store_mut().set_fail_reads(true);
    assert!(!m.has_saved_game());
    assert!(!m.load(&mut game()));
}

/// A stored snapshot does not follow later changes to the live game.
#[test]
fn stored_snapshot_is_independent_of_live_state() {
    let mut m = manager(MemoryStore::new());
    let mut g = game();
    m.save(&g);

    g.build_tower("frost", Cell { col: 2, row: 2 }).unwrap();
    g.inventory_mut().add_item("gem", 5);

    let stored = m.read_snapshot().unwrap().unwrap();
    assert!(stored.towers.is_empty());
    assert_eq!(stored.inventory.items_collected, 0);
}

#[test]
fn clear_is_idempotent() {
    let mut m = manager(MemoryStore::new());
    m.clear_save_data();
    m.save(&game());
    m.clear_save_data();
    m.clear_save_data();
    assert!(!m.has_saved_game());
    assert!(m.store().is_empty());
}

/// If the flag cannot be written the payload is withdrawn, so the two keys agree.
#[test]
fn failed_flag_write_withdraws_payload() {
    let config = SessionConfig::default_test();
    let store = FlagRefusingStore { refuse_flag: true, ..FlagRefusingStore::default() };
    let mut m = SnapshotManager::new(store, &config);

    m.save(&game());

    assert_eq!(m.store().get(SAVE_KEY).unwrap(), None);
    assert_eq!(m.store().get(HAS_SAVE_KEY).unwrap(), None);
    assert!(!m.has_saved_game());
    assert!(!m.load(&mut game()));
    assert_eq!(m.saves_written(), 0);
    assert_eq!(m.saves_failed(), 1);
}

/// With an earlier save present, a failed flag write puts the earlier payload back.
#[test]
fn failed_flag_write_restores_previous_payload() {
    let config = SessionConfig::default_test();
    let mut m = SnapshotManager::new(FlagRefusingStore::default(), &config);
    let mut g = game();
    m.save(&g);

    g.build_tower("arrow", Cell { col: 1, row: 1 }).unwrap();
    m.store_mut().refuse_flag = true;
    m.save(&g);

    assert!(m.has_saved_game());
    let stored = m.read_snapshot().unwrap().expect("earlier save intact");
    assert!(stored.towers.is_empty());
    assert_eq!(m.saves_failed(), 1);
}
