//! Snapshot manager — building, writing, reading, and restoring saves.
//!
//! Owns the `gameSave` and `hasSavedGame` keys and nothing else.
//!
//! FAILURE POLICY:
//!   - Write failures (quota, backend down) are logged and swallowed; the
//!     running game never sees them.
//!   - Absent, unparseable, or wrongly-shaped payloads read as "no save".
//!   - A version other than SNAPSHOT_VERSION is refused, never migrated.
//!
//! Every save method takes `&mut self` and a shared borrow of the host,
//! so a save cannot re-enter itself or observe live state changing while
//! the snapshot is built.

use crate::{
    config::{AutoSaveConfig, SessionConfig},
    error::{SessionError, SessionResult},
    event::SessionEvent,
    host::SessionHost,
    snapshot::GameSnapshot,
    store::{KeyValueStore, HAS_SAVE_KEY, SAVE_KEY},
    types::Millis,
    wave_scheduler::WavePhase,
};

pub struct SnapshotManager<S: KeyValueStore> {
    store: S,
    auto_save: AutoSaveConfig,
    game_version: String,
    auto_save_elapsed_ms: Millis,
    events: Vec<SessionEvent>,
    saves_written: u64,
    saves_failed: u64,
}

impl<S: KeyValueStore> SnapshotManager<S> {
    pub fn new(store: S, config: &SessionConfig) -> Self {
        Self {
            store,
            auto_save: config.auto_save.clone(),
            game_version: config.game_version.clone(),
            auto_save_elapsed_ms: 0,
            events: Vec::new(),
            saves_written: 0,
            saves_failed: 0,
        }
    }

    /// Snapshot the host and persist it. Never fails outward.
    pub fn save<H: SessionHost + ?Sized>(&mut self, host: &H) {
        let _ = self.save_logged(host);
    }

    /// Snapshot the host and persist it, reporting the storage outcome.
    ///
    /// Payload and flag land together or not at all: if the flag cannot be
    /// written, the previous payload is put back (or removed if there was
    /// none) before the error is returned.
    pub fn try_save<H: SessionHost + ?Sized>(&mut self, host: &H) -> SessionResult<()> {
        let snapshot = GameSnapshot::capture(host, &self.game_version);
        let json = snapshot.to_json()?;
        let previous = self.store.get(SAVE_KEY).unwrap_or(None);
        self.store.set(SAVE_KEY, &json)?;
        if let Err(e) = self.store.set(HAS_SAVE_KEY, "true") {
            self.roll_back_payload(previous.as_deref());
            return Err(e);
        }
        log::debug!(
            "Saved wave={} towers={} enemies={} ({} bytes)",
            snapshot.wave_state.current_wave_index,
            snapshot.towers.len(),
            snapshot.enemies.len(),
            json.len()
        );
        Ok(())
    }

    fn roll_back_payload(&mut self, previous: Option<&str>) {
        let outcome = match previous {
            Some(text) => self.store.set(SAVE_KEY, text),
            None => self.store.remove(SAVE_KEY),
        };
        if let Err(e) = outcome {
            log::error!("Could not roll back '{SAVE_KEY}' after a failed flag write: {e}");
        }
    }

    fn save_logged<H: SessionHost + ?Sized>(&mut self, host: &H) -> bool {
        match self.try_save(host) {
            Ok(()) => {
                self.saves_written += 1;
                true
            }
            Err(e) => {
                self.saves_failed += 1;
                if e.is_write_failure() {
                    log::error!("Save not written, game continues unsaved: {e}");
                } else {
                    log::error!("Save could not be built: {e}");
                }
                false
            }
        }
    }

    /// Read the stored snapshot. Ok(None) when nothing is saved.
    pub fn read_snapshot(&self) -> SessionResult<Option<GameSnapshot>> {
        match self.store.get(SAVE_KEY)? {
            None => Ok(None),
            Some(text) => GameSnapshot::from_json(&text).map(Some),
        }
    }

    /// Restore the saved game into `host`. Returns false when there is no
    /// usable save or the host refuses it.
    pub fn load<H: SessionHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let snapshot = match self.read_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::debug!("Load: no saved game");
                return false;
            }
            Err(SessionError::VersionMismatch { found, supported }) => {
                log::warn!("Load refused: save is v{found}, this build reads v{supported}");
                self.events.push(SessionEvent::SaveRejected { found, supported });
                return false;
            }
            Err(e) => {
                log::warn!("Load: treating unreadable save as absent: {e}");
                return false;
            }
        };

        let wave = snapshot.wave_state.current_wave_index;
        if !host.restore_from_snapshot(&snapshot) {
            log::warn!("Load: host rejected snapshot at wave={wave}");
            return false;
        }
        log::info!("Loaded save at wave={wave}");
        self.events.push(SessionEvent::GameLoaded { wave });
        true
    }

    /// Timer-triggered save. Resets the auto-save accumulator.
    ///
    /// GameAutoSaved is emitted only when the write succeeded, so the
    /// event always means a save now exists. A failed write is logged and
    /// counted in saves_failed() instead.
    pub fn auto_save<H: SessionHost + ?Sized>(&mut self, host: &H) {
        self.auto_save_elapsed_ms = 0;
        if self.save_logged(host) {
            self.events.push(SessionEvent::GameAutoSaved {
                play_time_ms: host.elapsed_ms(),
            });
        }
    }

    /// Milestone save after a wave completes.
    ///
    /// As with auto_save(), GameWaveSaved is emitted only for a save that
    /// was written; a failed write emits nothing.
    pub fn save_after_wave<H: SessionHost + ?Sized>(&mut self, host: &H) {
        let wave_state = host.wave_state();
        if wave_state.phase != WavePhase::Complete {
            log::warn!(
                "save_after_wave at wave={} in phase {:?}, expected Complete",
                wave_state.current_wave_index,
                wave_state.phase
            );
        }
        if self.save_logged(host) {
            self.events.push(SessionEvent::GameWaveSaved {
                wave: wave_state.current_wave_index,
            });
        }
    }

    /// Accumulate play time and auto-save once the interval is reached.
    ///
    /// On trigger the accumulator resets to zero, not to the overflow
    /// remainder: up to one frame of time per cycle is dropped.
    pub fn update_auto_save_timer<H: SessionHost + ?Sized>(&mut self, delta_ms: Millis, host: &H) {
        if !self.auto_save.enabled {
            return;
        }
        self.auto_save_elapsed_ms = self.auto_save_elapsed_ms.saturating_add(delta_ms);
        if self.auto_save_elapsed_ms >= self.auto_save.interval_ms {
            self.auto_save(host);
        }
    }

    /// Remove both save keys. Safe to call when nothing is saved.
    pub fn clear_save_data(&mut self) {
        for key in [SAVE_KEY, HAS_SAVE_KEY] {
            if let Err(e) = self.store.remove(key) {
                log::error!("Failed to clear '{key}': {e}");
            }
        }
    }

    /// Existence check on the flag key; the payload is not read.
    pub fn has_saved_game(&self) -> bool {
        match self.store.get(HAS_SAVE_KEY) {
            Ok(flag) => flag.as_deref() == Some("true"),
            Err(e) => {
                log::warn!("has_saved_game: storage unreadable: {e}");
                false
            }
        }
    }

    /// Take the notifications emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn auto_save_elapsed_ms(&self) -> Millis { self.auto_save_elapsed_ms }
    pub fn saves_written(&self) -> u64 { self.saves_written }
    pub fn saves_failed(&self) -> u64 { self.saves_failed }

    pub fn store(&self) -> &S { &self.store }
    pub fn store_mut(&mut self) -> &mut S { &mut self.store }
}
