//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod board;
pub mod collision;
pub mod payout;
pub mod rng;
pub mod state;
pub mod tick;

pub use board::{Board, BoardError, Frame, Pattern, Peg, Slot, Spacing};
pub use collision::{CollisionResult, ball_peg_collision, ball_wall_collision};
pub use payout::{MultiplierTable, RiskProfile, binomial_distribution, expected_return};
pub use rng::SimRng;
pub use state::{Ball, BallState, DEFAULT_SEED, GameState, PowerUp, PowerUps};
pub use tick::{SettlementEvent, drop_armed, step, tick, try_drop};
