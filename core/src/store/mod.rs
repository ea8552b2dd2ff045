//! Persistence layer.
//!
//! RULE: Only store/ talks to a backing store.
//! The snapshot manager and leaderboard call KeyValueStore methods
//! with disjoint keys — neither touches the other's keys.

use crate::error::SessionResult;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Serialized GameSnapshot.
pub const SAVE_KEY: &str = "gameSave";
/// Literal "true" while a save exists; absent otherwise.
pub const HAS_SAVE_KEY: &str = "hasSavedGame";
/// Serialized leaderboard entries.
pub const SCORES_KEY: &str = "towerDefenseScores";

/// Synchronous string key/value storage. Every value is JSON text.
///
/// A slower backend (remote or async) belongs behind this trait so
/// callers never change; it must keep writes for one key serialized.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> SessionResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> SessionResult<()>;

    fn contains(&self, key: &str) -> SessionResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
