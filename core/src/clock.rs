//! Session clock — owns elapsed play time, speed control, and pause.

use crate::types::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClock {
    pub elapsed_ms: Millis,
    pub speed:      GameSpeed,
    pub paused:     bool,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            elapsed_ms: 0,
            speed: GameSpeed::Normal,
            paused: false,
        }
    }

    /// Resume a clock from a saved play time.
    pub fn resumed_at(elapsed_ms: Millis) -> Self {
        Self { elapsed_ms, ..Self::new() }
    }

    /// Advance by a real frame delta. Returns the scaled simulation delta,
    /// which is zero while paused.
    pub fn advance(&mut self, real_dt: Millis) -> Millis {
        if self.paused {
            return 0;
        }
        let dt = real_dt.saturating_mul(self.speed.factor());
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt);
        dt
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn set_speed(&mut self, speed: GameSpeed) {
        self.speed = speed;
    }
}

impl Default for SessionClock {
    fn default() -> Self { Self::new() }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameSpeed {
    Normal, // ×1
    Fast,   // ×2
    Turbo,  // ×3
}

impl GameSpeed {
    pub fn factor(&self) -> Millis {
        match self {
            Self::Normal => 1,
            Self::Fast   => 2,
            Self::Turbo  => 3,
        }
    }
}
