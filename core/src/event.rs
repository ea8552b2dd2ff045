//! Notification events — fire-and-forget signals for UI and telemetry.
//!
//! RULE: Consumers may rely only on the variant discriminator.
//! Payload fields are informational and may grow; variants are
//! appended, never removed or reordered.

use crate::types::{Millis, ScoreId, WaveIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    // ── Persistence ────────────────────────────────
    GameAutoSaved {
        play_time_ms: Millis,
    },
    GameWaveSaved {
        wave: WaveIndex,
    },
    GameLoaded {
        wave: WaveIndex,
    },
    SaveRejected {
        found: u32,
        supported: u32,
    },

    // ── Waves ──────────────────────────────────────
    WaveStarted {
        wave: WaveIndex,
        enemy_count: usize,
        kind: WaveKind,
    },
    WaveCompleted {
        wave: WaveIndex,
        elapsed_ms: Millis,
        completion_bonus: u64,
        speed_bonus: u64,
    },
    AllWavesCleared {
        wave: WaveIndex,
    },

    // ── Session end ────────────────────────────────
    GameOver {
        score: u64,
        wave: WaveIndex,
    },
    ScoreRecorded {
        id: ScoreId,
        score: u64,
        rank: Option<usize>,
    },
}

/// Flavour of a wave, decided when it is planned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WaveKind {
    Standard,
    Boss,
    /// Infinite mode: more, weaker enemies.
    Swarm,
    /// Infinite mode: fewer, stronger enemies.
    Elite,
}

/// Stable discriminator for a SessionEvent, matching its serialized `type` tag.
pub fn event_type_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::GameAutoSaved { .. }   => "gameAutoSaved",
        SessionEvent::GameWaveSaved { .. }   => "gameWaveSaved",
        SessionEvent::GameLoaded { .. }      => "gameLoaded",
        SessionEvent::SaveRejected { .. }    => "saveRejected",
        SessionEvent::WaveStarted { .. }     => "waveStarted",
        SessionEvent::WaveCompleted { .. }   => "waveCompleted",
        SessionEvent::AllWavesCleared { .. } => "allWavesCleared",
        SessionEvent::GameOver { .. }        => "gameOver",
        SessionEvent::ScoreRecorded { .. }   => "scoreRecorded",
    }
}
