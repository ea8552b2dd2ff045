//! Shared primitive types used across the session core.

/// Elapsed time in whole milliseconds. Every timer and delta uses this unit.
pub type Millis = u64;

/// Wave number. Zero means no wave has been started yet.
pub type WaveIndex = u32;

/// A stable, unique identifier for a live entity within one session.
pub type EntityId = u64;

/// Identifier of a leaderboard entry (UUID v4 text).
pub type ScoreId = String;
