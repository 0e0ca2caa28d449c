//! Simulation tuning and payout policy
//!
//! Persisted separately from the session so a host can retune physics or
//! the streak rule without touching the player's balance.

use serde::{Deserialize, Serialize};

use crate::consts::TARGET_RTP;
use crate::persistence::{PersistenceError, Store};
use crate::session::StreakPolicy;

/// Physics coefficients, in pixels per 60 Hz frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Downward acceleration per step
    pub gravity: f32,
    /// Fraction of inward normal speed returned by a peg
    pub restitution: f32,
    /// Tangential speed kept after a peg or wall contact
    pub tangential: f32,
    /// Fraction of normal speed returned by a wall
    pub wall_restitution: f32,
    /// Horizontal drag per step (vertical drag is half of this)
    pub air_drag: f32,
    /// Peak-to-peak horizontal noise added on each peg contact
    pub jitter: f32,
    /// Horizontal speed cap after a peg contact
    pub max_vx: f32,
    /// Downward speed of a freshly spawned ball
    pub initial_vy: f32,
    /// Downward speed floor after any contact
    pub min_vy_after_hit: f32,
    /// Peak-to-peak horizontal speed of a freshly spawned ball
    pub spawn_vx_spread: f32,
    /// Spawn x spread as a fraction of the peg gap
    pub spawn_spread: f32,

    /// Gravity factor under the slow power-up
    pub slow_gravity: f32,
    /// Horizontal nudge per step toward the best slot under magnet
    pub magnet_pull: f32,
    /// One-shot horizontal impulse under wind
    pub wind_impulse: f32,
    pub bumper_restitution_bonus: f32,
    pub bumper_restitution_cap: f32,
    pub bumper_tangential_bonus: f32,
    pub bumper_tangential_cap: f32,
    /// Side ball offset as a fraction of the peg gap under multiball
    pub multiball_offset: f32,
    /// Outward horizontal speed of the side balls under multiball
    pub multiball_vx_bias: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: 0.31,
            restitution: 0.50,
            tangential: 0.88,
            wall_restitution: 0.40,
            air_drag: 0.010,
            jitter: 0.10,
            max_vx: 1.6,
            initial_vy: 0.65,
            min_vy_after_hit: 0.12,
            spawn_vx_spread: 0.8,
            spawn_spread: 0.30,

            slow_gravity: 0.45,
            magnet_pull: 0.02,
            wind_impulse: 0.8,
            bumper_restitution_bonus: 0.25,
            bumper_restitution_cap: 0.85,
            bumper_tangential_bonus: 0.08,
            bumper_tangential_cap: 1.0,
            multiball_offset: 0.25,
            multiball_vx_bias: 0.15,
        }
    }
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Return-to-player the multiplier tables are calibrated to
    pub target_rtp: f64,
    /// Balance of a fresh session
    pub starting_balance: f64,
    /// Bet of a fresh session
    pub default_bet: f64,
    /// How landings grow or reset the streak
    pub streak: StreakPolicy,
    pub physics: PhysicsTuning,
    /// Auto-play drop cadence (simulated time)
    pub auto_drop_interval_ms: f64,
    /// RNG seed; `None` lets the host pick one (e.g. from the clock)
    pub seed: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_rtp: TARGET_RTP,
            starting_balance: 1000.0,
            default_bet: 1.0,
            streak: StreakPolicy::default(),
            physics: PhysicsTuning::default(),
            auto_drop_interval_ms: 260.0,
            seed: None,
        }
    }
}

impl Settings {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "plinko.settings.v1";

    /// Clamp out-of-range values to something playable
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();
        if !self.target_rtp.is_finite() || self.target_rtp <= 0.0 {
            self.target_rtp = defaults.target_rtp;
        }
        if !self.starting_balance.is_finite() || self.starting_balance < 0.0 {
            self.starting_balance = defaults.starting_balance;
        }
        if !self.default_bet.is_finite() || self.default_bet <= 0.0 {
            self.default_bet = defaults.default_bet;
        }
        if !self.auto_drop_interval_ms.is_finite() || self.auto_drop_interval_ms <= 0.0 {
            self.auto_drop_interval_ms = defaults.auto_drop_interval_ms;
        }
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Settings>(json).map(Settings::sanitized)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load settings from a store, falling back to defaults
    pub fn load(store: &dyn Store) -> Self {
        match store.read(Self::STORAGE_KEY) {
            Ok(Some(json)) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings");
                    return settings;
                }
                Err(e) => log::warn!("Ignoring unreadable settings: {e}"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Settings store unavailable: {e}"),
        }
        log::info!("Using default settings");
        Self::default()
    }

    pub fn save(&self, store: &dyn Store) -> Result<(), PersistenceError> {
        let json = self.to_json()?;
        store.write(Self::STORAGE_KEY, &json)?;
        log::info!("Settings saved");
        Ok(())
    }
}
