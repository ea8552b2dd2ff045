//! Entity snapshot codec — live entities to and from plain records.
//!
//! RULE: Records own all their data. Encoding copies; nothing in a
//! record aliases a live entity, so later mutation cannot reach a
//! snapshot that was already built.

use crate::{
    entities::{
        Camera, Cell, Enemy, Inventory, ItemStack, MapConfig, Player, StatusEffect, Tower,
        TowerStats, UpgradeLevels,
    },
    snapshot::{
        CameraRecord, EnemyRecord, InventoryRecord, ItemSlotRecord, MapConfigRecord,
        PlayerRecord, StatusEffectRecord, TowerRecord,
    },
};

/// Conversion between a live entity and its persisted record.
pub trait SnapshotCodec: Sized {
    type Record;

    fn to_record(&self) -> Self::Record;

    fn from_record(record: &Self::Record) -> Self;
}

pub fn encode_all<T: SnapshotCodec>(items: &[T]) -> Vec<T::Record> {
    items.iter().map(SnapshotCodec::to_record).collect()
}

pub fn decode_all<T: SnapshotCodec>(records: &[T::Record]) -> Vec<T> {
    records.iter().map(T::from_record).collect()
}

impl SnapshotCodec for Tower {
    type Record = TowerRecord;

    fn to_record(&self) -> TowerRecord {
        TowerRecord {
            id: self.id,
            kind: self.kind.clone(),
            col: self.cell.col,
            row: self.cell.row,
            damage_level: self.levels.damage,
            range_level: self.levels.range,
            rate_level: self.levels.rate,
            kills: self.stats.kills,
            damage_dealt: self.stats.damage_dealt,
            shots_fired: self.stats.shots_fired,
            cooldown_ms: self.cooldown_ms,
        }
    }

    fn from_record(r: &TowerRecord) -> Self {
        Self {
            id: r.id,
            kind: r.kind.clone(),
            cell: Cell { col: r.col, row: r.row },
            levels: UpgradeLevels {
                damage: r.damage_level,
                range: r.range_level,
                rate: r.rate_level,
            },
            stats: TowerStats {
                kills: r.kills,
                damage_dealt: r.damage_dealt,
                shots_fired: r.shots_fired,
            },
            cooldown_ms: r.cooldown_ms,
        }
    }
}

impl SnapshotCodec for StatusEffect {
    type Record = StatusEffectRecord;

    fn to_record(&self) -> StatusEffectRecord {
        StatusEffectRecord {
            kind: self.kind,
            magnitude: self.magnitude,
            remaining_ms: self.remaining_ms,
        }
    }

    fn from_record(r: &StatusEffectRecord) -> Self {
        Self {
            kind: r.kind,
            magnitude: r.magnitude,
            remaining_ms: r.remaining_ms,
        }
    }
}

impl SnapshotCodec for Enemy {
    type Record = EnemyRecord;

    fn to_record(&self) -> EnemyRecord {
        EnemyRecord {
            id: self.id,
            kind: self.kind.clone(),
            position: self.position,
            path_progress: self.path_progress,
            health: self.health,
            max_health: self.max_health,
            speed: self.speed,
            reward: self.reward,
            effects: encode_all(&self.effects),
        }
    }

    fn from_record(r: &EnemyRecord) -> Self {
        Self {
            id: r.id,
            kind: r.kind.clone(),
            position: r.position,
            path_progress: r.path_progress,
            health: r.health,
            max_health: r.max_health,
            speed: r.speed,
            reward: r.reward,
            effects: decode_all(&r.effects),
        }
    }
}

impl SnapshotCodec for Player {
    type Record = PlayerRecord;

    fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            position: self.position,
            health: self.health,
            max_health: self.max_health,
            level: self.level,
            experience: self.experience,
        }
    }

    fn from_record(r: &PlayerRecord) -> Self {
        Self {
            position: r.position,
            health: r.health,
            max_health: r.max_health,
            level: r.level,
            experience: r.experience,
        }
    }
}

impl Player {
    pub fn serialize(&self) -> PlayerRecord {
        self.to_record()
    }
}

impl SnapshotCodec for Inventory {
    type Record = InventoryRecord;

    fn to_record(&self) -> InventoryRecord {
        InventoryRecord {
            slots: self
                .slots
                .iter()
                .map(|slot| {
                    slot.as_ref().map(|s| ItemSlotRecord {
                        item_id: s.item_id.clone(),
                        quantity: s.quantity,
                    })
                })
                .collect(),
            capacity: self.capacity(),
            items_collected: self.items_collected,
            items_used: self.items_used,
        }
    }

    fn from_record(r: &InventoryRecord) -> Self {
        let slots = r
            .slots
            .iter()
            .map(|slot| {
                slot.as_ref()
                    .map(|s| ItemStack { item_id: s.item_id.clone(), quantity: s.quantity })
            })
            .collect();
        Self {
            slots,
            items_collected: r.items_collected,
            items_used: r.items_used,
        }
    }
}

impl Inventory {
    pub fn get_state(&self) -> InventoryRecord {
        self.to_record()
    }
}

impl SnapshotCodec for Camera {
    type Record = CameraRecord;

    fn to_record(&self) -> CameraRecord {
        CameraRecord { position: self.position, zoom: self.zoom }
    }

    fn from_record(r: &CameraRecord) -> Self {
        Self { position: r.position, zoom: r.zoom }
    }
}

impl From<&MapConfigRecord> for MapConfig {
    fn from(r: &MapConfigRecord) -> Self {
        Self {
            seed: r.seed,
            width: r.width,
            height: r.height,
            biome: r.biome.clone(),
            difficulty: r.difficulty.clone(),
        }
    }
}
