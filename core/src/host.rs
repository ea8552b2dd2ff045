//! The collaborator contract between the snapshot manager and the game.
//!
//! RULE: The snapshot manager reads through the accessors only and never
//! mutates live state. The single write path is restore_from_snapshot().

use crate::{
    clock::GameSpeed,
    entities::{Camera, Enemy, Inventory, MapConfig, Player, StoreState, Tower},
    snapshot::{GameSnapshot, WaveStateRecord},
    types::{EntityId, Millis},
};

pub trait SessionHost {
    /// Global counters (currency, lives, score, game state).
    fn store_state(&self) -> &StoreState;

    fn towers(&self) -> &[Tower];

    fn enemies(&self) -> &[Enemy];

    fn player(&self) -> &Player;

    fn inventory(&self) -> &Inventory;

    /// Current wave index, active and infinite-mode flags, remaining queue.
    fn wave_state(&self) -> WaveStateRecord;

    fn map_config(&self) -> &MapConfig;

    /// Grid cell size in world units.
    fn cell_size(&self) -> f64;

    fn camera(&self) -> &Camera;

    /// Play time accumulated in this session.
    fn elapsed_ms(&self) -> Millis;

    /// Id the next spawned or built entity will receive.
    fn next_entity_id(&self) -> EntityId;

    fn speed(&self) -> GameSpeed;

    /// Rehydrate every live collection from `snapshot`. Returns false if
    /// the snapshot cannot be applied; the host must then be left as it
    /// was before the call.
    fn restore_from_snapshot(&mut self, snapshot: &GameSnapshot) -> bool;
}
