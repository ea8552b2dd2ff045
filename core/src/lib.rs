//! Siegeline session core: snapshots, waves, and the score board for a
//! tower-defense session.

pub mod clock;
pub mod codec;
pub mod config;
pub mod entities;
pub mod error;
pub mod event;
pub mod game;
pub mod host;
pub mod leaderboard;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod snapshot_manager;
pub mod store;
pub mod types;
pub mod wave_scheduler;
