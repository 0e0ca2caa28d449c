//! Plinko - deterministic board, payout and ball physics core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (board geometry, multipliers, physics, drops)
//! - `session`: Balance, streak and bet bookkeeping
//! - `leaderboard`: Top payouts, persisted with the session
//! - `settings`: Tuning, payout policy and RNG seed
//! - `persistence`: Save/load of the resumable session
//! - `platform`: Browser bindings (wasm32) and host seeding

pub mod leaderboard;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod settings;
pub mod sim;

pub use leaderboard::Leaderboard;
pub use session::{Session, StreakPolicy};
pub use settings::{PhysicsTuning, Settings};

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation step (one 60 Hz frame), in milliseconds
    pub const STEP_MS: f64 = 1000.0 / 60.0;
    /// Frame deltas are clamped to this before substep division
    pub const MAX_FRAME_MS: f64 = 100.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Supported row range
    pub const MIN_ROWS: u32 = 1;
    pub const MAX_ROWS: u32 = 20;

    /// Frame padding around the first and last peg rows
    pub const TOP_PADDING: f32 = 12.0;
    pub const BASE_PADDING: f32 = 16.0;
    /// Distance from the last peg row down to the base edge
    pub const BASE_MARGIN: f32 = 36.0;
    /// Floor line sits this far below the base edge
    pub const FLOOR_MARGIN: f32 = 2.0;

    /// Balls spawn this far above the top edge
    pub const SPAWN_HEIGHT: f32 = 60.0;
    /// Minimum ball radius (balls are never smaller than pegs)
    pub const MIN_BALL_RADIUS: f32 = 4.0;
    /// Trail points kept per ball (render-only)
    pub const TRAIL_LENGTH: usize = 10;
    /// Steps a settled ball lingers before removal (~120 ms)
    pub const SETTLE_LINGER_STEPS: u32 = 7;

    /// Smallest accepted bet
    pub const MIN_BET: f64 = 0.1;
    /// Default return-to-player target
    pub const TARGET_RTP: f64 = 0.98;
}

/// Round `value` to the nearest multiple of `step`
#[inline]
pub fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Round a currency amount to cents
#[inline]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
