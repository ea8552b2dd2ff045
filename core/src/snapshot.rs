//! Snapshot serialization — full session state to/from JSON.
//!
//! A snapshot is built fresh on every save and never mutated afterwards.
//! It captures everything needed to rebuild an equivalent live game given
//! only the static config: the map is stored as generation parameters,
//! never as generated terrain.

use crate::{
    clock::GameSpeed,
    codec::{encode_all, SnapshotCodec},
    config::EffectKind,
    entities::{StoreState, Vec2},
    error::{SessionError, SessionResult},
    event::WaveKind,
    host::SessionHost,
    types::{EntityId, Millis, WaveIndex},
    wave_scheduler::{SpawnDescriptor, WavePhase},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot schema version.
/// v1 = store state, towers, enemies, player, inventory, wave state,
///      map parameters, camera, next entity id, game speed, metadata
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub version: u32,
    pub store_state: StoreState,
    pub towers: Vec<TowerRecord>,
    pub enemies: Vec<EnemyRecord>,
    pub player: PlayerRecord,
    pub inventory: InventoryRecord,
    pub wave_state: WaveStateRecord,
    pub map_config: MapConfigRecord,
    pub camera: CameraRecord,
    /// Id the next new entity receives; above every stored id.
    pub next_entity_id: EntityId,
    pub speed: GameSpeed,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerRecord {
    pub id: EntityId,
    pub kind: String,
    pub col: i32,
    pub row: i32,
    pub damage_level: u32,
    pub range_level: u32,
    pub rate_level: u32,
    pub kills: u64,
    pub damage_dealt: f64,
    pub shots_fired: u64,
    pub cooldown_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEffectRecord {
    pub kind: EffectKind,
    pub magnitude: f64,
    pub remaining_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyRecord {
    pub id: EntityId,
    pub kind: String,
    pub position: Vec2,
    pub path_progress: f64,
    pub health: f64,
    pub max_health: f64,
    pub speed: f64,
    pub reward: u64,
    pub effects: Vec<StatusEffectRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub position: Vec2,
    pub health: f64,
    pub max_health: f64,
    pub level: u32,
    pub experience: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSlotRecord {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub slots: Vec<Option<ItemSlotRecord>>,
    pub capacity: usize,
    pub items_collected: u64,
    pub items_used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveStateRecord {
    pub current_wave_index: WaveIndex,
    pub phase: WavePhase,
    pub is_active: bool,
    pub is_infinite_mode: bool,
    pub kind: WaveKind,
    pub spawn_queue: Vec<SpawnDescriptor>,
    pub start_countdown_ms: Millis,
    pub wave_elapsed_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfigRecord {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub biome: String,
    pub difficulty: String,
    pub cell_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    pub position: Vec2,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub saved_at: DateTime<Utc>,
    pub play_time_ms: Millis,
    pub game_version: String,
}

impl GameSnapshot {
    /// Copy the host's live state into a new, independent snapshot.
    pub fn capture<H: SessionHost + ?Sized>(host: &H, game_version: &str) -> Self {
        let map = host.map_config();
        let camera = host.camera();
        Self {
            version: SNAPSHOT_VERSION,
            store_state: host.store_state().clone(),
            towers: encode_all(host.towers()),
            enemies: encode_all(host.enemies()),
            player: host.player().serialize(),
            inventory: host.inventory().get_state(),
            wave_state: host.wave_state(),
            map_config: MapConfigRecord {
                seed: map.seed,
                width: map.width,
                height: map.height,
                biome: map.biome.clone(),
                difficulty: map.difficulty.clone(),
                cell_size: host.cell_size(),
            },
            camera: camera.to_record(),
            next_entity_id: host.next_entity_id(),
            speed: host.speed(),
            metadata: SnapshotMetadata {
                saved_at: Utc::now(),
                play_time_ms: host.elapsed_ms(),
                game_version: game_version.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> SessionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate stored text.
    ///
    /// The version field is checked before any other field is read, so an
    /// outdated or future payload is refused with VersionMismatch rather
    /// than partially decoded.
    pub fn from_json(text: &str) -> SessionResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SessionError::CorruptPayload {
                reason: format!("not JSON: {e}"),
            })?;

        if !value.is_object() {
            return Err(SessionError::CorruptPayload {
                reason: "snapshot is not a JSON object".into(),
            });
        }

        let found = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| SessionError::CorruptPayload {
                reason: "missing or non-integer version".into(),
            })?;
        let found = u32::try_from(found).map_err(|_| SessionError::CorruptPayload {
            reason: format!("version {found} out of range"),
        })?;
        if found != SNAPSHOT_VERSION {
            return Err(SessionError::VersionMismatch {
                found,
                supported: SNAPSHOT_VERSION,
            });
        }

        serde_json::from_value(value).map_err(|e| SessionError::CorruptPayload {
            reason: format!("wrong shape: {e}"),
        })
    }

    /// Equality that ignores the wall-clock save time.
    pub fn same_state_as(&self, other: &GameSnapshot) -> bool {
        let mut a = self.clone();
        a.metadata.saved_at = other.metadata.saved_at;
        a == *other
    }
}
