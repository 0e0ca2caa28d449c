//! Game state and core simulation types
//!
//! Everything a drop needs lives in `GameState`; there is no module-level
//! state. Balls own their physics state and their power-up snapshot.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::board::{Board, BoardError, Pattern, Spacing};
use super::payout::{MultiplierTable, RiskProfile};
use super::rng::SimRng;
use crate::consts::*;
use crate::session::Session;
use crate::settings::Settings;

/// Seed used when settings don't carry one
pub const DEFAULT_SEED: u32 = 0x5EED_1234;

/// One-drop modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerUp {
    /// Gentle pull toward the best-paying slot
    Magnet,
    /// One random sideways gust halfway down
    Wind,
    /// Reduced gravity
    Slow,
    /// Bouncier pegs
    Bumper,
    /// Three balls per drop
    Multiball,
    /// First peg touched is destroyed
    Explode,
}

impl PowerUp {
    pub const ALL: [PowerUp; 6] = [
        PowerUp::Magnet,
        PowerUp::Wind,
        PowerUp::Slow,
        PowerUp::Bumper,
        PowerUp::Multiball,
        PowerUp::Explode,
    ];

    #[inline]
    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUp::Magnet => "magnet",
            PowerUp::Wind => "wind",
            PowerUp::Slow => "slow",
            PowerUp::Bumper => "bumper",
            PowerUp::Multiball => "multiball",
            PowerUp::Explode => "explode",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        PowerUp::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }
}

/// Immutable set of power-ups, serialized as a list of names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<PowerUp>", from = "Vec<PowerUp>")]
pub struct PowerUps(u8);

impl PowerUps {
    pub const NONE: PowerUps = PowerUps(0);

    pub fn with(self, power: PowerUp) -> Self {
        Self(self.0 | power.bit())
    }

    pub fn without(self, power: PowerUp) -> Self {
        Self(self.0 & !power.bit())
    }

    pub fn toggled(self, power: PowerUp) -> Self {
        Self(self.0 ^ power.bit())
    }

    #[inline]
    pub fn contains(&self, power: PowerUp) -> bool {
        self.0 & power.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = PowerUp> + '_ {
        PowerUp::ALL.into_iter().filter(|p| self.contains(*p))
    }
}

impl FromIterator<PowerUp> for PowerUps {
    fn from_iter<I: IntoIterator<Item = PowerUp>>(iter: I) -> Self {
        iter.into_iter().fold(PowerUps::NONE, PowerUps::with)
    }
}

impl From<Vec<PowerUp>> for PowerUps {
    fn from(list: Vec<PowerUp>) -> Self {
        list.into_iter().collect()
    }
}

impl From<PowerUps> for Vec<PowerUp> {
    fn from(set: PowerUps) -> Self {
        set.iter().collect()
    }
}

/// Ball lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallState {
    Falling,
    /// Landed in `slot`; removed once `linger` steps have passed
    Settled { slot: usize, linger: u32 },
}

/// Per-ball one-shot effect markers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallMarkers {
    pub wind_applied: bool,
    pub explode_used: bool,
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub color: String,
    /// Bet this ball pays out against
    pub stake: f64,
    /// Power-ups snapshotted at drop time
    pub powerups: PowerUps,
    pub markers: BallMarkers,
    pub state: BallState,
    /// Trail history for rendering (newest first)
    #[serde(default)]
    pub trail: Vec<Vec2>,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2, vel: Vec2, radius: f32) -> Self {
        Self {
            id,
            pos,
            vel,
            radius,
            color: crate::session::DEFAULT_BALL_COLOR.to_string(),
            stake: 0.0,
            powerups: PowerUps::NONE,
            markers: BallMarkers::default(),
            state: BallState::Falling,
            trail: Vec::with_capacity(TRAIL_LENGTH),
        }
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        matches!(self.state, BallState::Falling)
    }

    #[inline]
    pub fn has(&self, power: PowerUp) -> bool {
        self.powerups.contains(power)
    }

    /// Record current position to trail (call each step while falling)
    pub fn record_trail(&mut self) {
        self.trail.insert(0, self.pos);
        if self.trail.len() > TRAIL_LENGTH {
            self.trail.pop();
        }
    }

    /// Count down the settle animation. Returns true once the ball can go.
    pub fn linger(&mut self) -> bool {
        match &mut self.state {
            BallState::Settled { linger, .. } => {
                *linger = linger.saturating_sub(1);
                *linger == 0
            }
            BallState::Falling => false,
        }
    }
}

/// Complete game state
#[derive(Debug, Clone)]
pub struct GameState {
    pub settings: Settings,
    pub session: Session,
    pub board: Board,
    /// Table currently applied to `board.slots`
    pub table: MultiplierTable,
    /// Live balls (sorted by id)
    pub balls: Vec<Ball>,
    /// Power-ups armed for the next drop
    pub armed: PowerUps,
    pub auto_play: bool,
    pub(crate) auto_elapsed_ms: f64,
    pub(crate) accumulator_ms: f64,
    /// Host clock in ms, advanced by simulated time
    pub clock_ms: f64,
    /// Fixed steps simulated so far
    pub time_steps: u64,
    pub(crate) rng: SimRng,
    next_id: u32,
}

impl GameState {
    /// Build a game from settings and a (possibly restored) session
    pub fn new(settings: Settings, session: Session, spacing: Spacing) -> Result<Self, BoardError> {
        let mut rng = SimRng::seed(settings.seed.unwrap_or(DEFAULT_SEED));
        let mut board = Board::build(session.rows, session.pattern, spacing, &mut rng)?;
        let table = MultiplierTable::build(board.effective_rows(), session.risk, settings.target_rtp);
        board.apply_multipliers(&table.multipliers);

        Ok(Self {
            settings,
            session,
            board,
            table,
            balls: Vec::new(),
            armed: PowerUps::NONE,
            auto_play: false,
            auto_elapsed_ms: 0.0,
            accumulator_ms: 0.0,
            clock_ms: 0.0,
            time_steps: 0,
            rng,
            next_id: 1,
        })
    }

    /// Default game with a fixed seed
    pub fn with_seed(seed: u32) -> Result<Self, BoardError> {
        let settings = Settings {
            seed: Some(seed),
            ..Settings::default()
        };
        let session = Session::new(&settings);
        Self::new(settings, session, Spacing::default())
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Rebuild the board. On error the current board stays in place.
    pub fn configure_board(
        &mut self,
        rows: u32,
        pattern: Pattern,
        spacing: Spacing,
    ) -> Result<&Board, BoardError> {
        let mut board = match Board::build(rows, pattern, spacing, &mut self.rng) {
            Ok(board) => board,
            Err(e) => {
                log::warn!("Board rebuild rejected: {e}");
                return Err(e);
            }
        };
        let table = MultiplierTable::build(
            board.effective_rows(),
            self.session.risk,
            self.settings.target_rtp,
        );
        board.apply_multipliers(&table.multipliers);

        // Swap in one go so no half-built geometry is ever visible
        self.board = board;
        self.table = table;
        self.session.rows = rows;
        self.session.pattern = pattern;
        Ok(&self.board)
    }

    /// Change the risk profile and return the applied multipliers
    pub fn configure_risk(&mut self, risk: RiskProfile) -> &[f64] {
        self.session.risk = risk;
        self.table = MultiplierTable::build(
            self.board.effective_rows(),
            risk,
            self.settings.target_rtp,
        );
        self.board.apply_multipliers(&self.table.multipliers);
        log::info!(
            "Risk {} -> expected return {:.4}",
            risk.as_str(),
            self.table.expected_return()
        );
        &self.table.multipliers
    }

    /// Arm or disarm a power-up for the next drop
    pub fn toggle_powerup(&mut self, power: PowerUp) -> bool {
        self.armed = self.armed.toggled(power);
        self.armed.contains(power)
    }

    pub fn set_auto_play(&mut self, enabled: bool) {
        self.auto_play = enabled;
        self.auto_elapsed_ms = 0.0;
    }

    pub fn set_ball_color(&mut self, color: &str) {
        self.session.ball_color = color.to_string();
    }

    /// Start over with a fresh session, keeping spacing and settings
    pub fn reset_session(&mut self) -> Result<(), BoardError> {
        let session = Session::new(&self.settings);
        let spacing = self.board.spacing;
        self.balls.clear();
        self.armed = PowerUps::NONE;
        self.auto_play = false;
        self.session = session;
        self.configure_board(self.session.rows, self.session.pattern, spacing)?;
        log::info!("Session reset");
        Ok(())
    }

    pub fn falling_count(&self) -> usize {
        self.balls.iter().filter(|b| b.is_falling()).count()
    }

    /// Ensure balls are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.balls.sort_by_key(|b| b.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powerup_set() {
        let set: PowerUps = [PowerUp::Slow, PowerUp::Explode].into_iter().collect();
        assert!(set.contains(PowerUp::Slow));
        assert!(set.contains(PowerUp::Explode));
        assert!(!set.contains(PowerUp::Wind));
        assert_eq!(set.iter().count(), 2);
        assert!(set.without(PowerUp::Slow).without(PowerUp::Explode).is_empty());
        assert_eq!(PowerUp::from_name("MultiBall"), Some(PowerUp::Multiball));
    }

    #[test]
    fn test_powerups_serialize_as_names() {
        let set = PowerUps::NONE.with(PowerUp::Explode).with(PowerUp::Magnet);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["magnet","explode"]"#);
        let back: PowerUps = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert_eq!(serde_json::to_string(&PowerUps::NONE).unwrap(), "[]");
    }

    #[test]
    fn test_serialized_ball_carries_trail() {
        let mut ball = Ball::new(1, Vec2::ZERO, Vec2::new(0.0, 1.0), 5.0);
        ball.powerups = PowerUps::NONE.with(PowerUp::Wind);
        for _ in 0..5 {
            ball.pos += ball.vel;
            ball.record_trail();
        }
        let json = serde_json::to_value(&ball).unwrap();
        let trail = json["trail"].as_array().unwrap();
        assert_eq!(trail.len(), 5);
        assert_eq!(trail[0], serde_json::json!([0.0, 5.0]));
        assert_eq!(json["powerups"], serde_json::json!(["wind"]));
    }

    #[test]
    fn test_trail_is_bounded() {
        let mut ball = Ball::new(1, Vec2::ZERO, Vec2::ZERO, 5.0);
        for i in 0..30 {
            ball.pos = Vec2::new(i as f32, 0.0);
            ball.record_trail();
        }
        assert_eq!(ball.trail.len(), TRAIL_LENGTH);
        assert_eq!(ball.trail[0].x, 29.0);
    }

    #[test]
    fn test_new_state_applies_multipliers() {
        let state = GameState::with_seed(1).unwrap();
        assert_eq!(state.board.slots.len(), state.table.len());
        assert_eq!(state.board.multipliers(), state.table.multipliers);
    }

    #[test]
    fn test_configure_board_keeps_alignment() {
        let mut state = GameState::with_seed(1).unwrap();
        for pattern in Pattern::ALL {
            state.configure_board(9, pattern, Spacing::default()).unwrap();
            assert_eq!(state.board.slots.len(), state.table.len());
            assert_eq!(state.session.pattern, pattern);
        }
    }

    #[test]
    fn test_configure_board_rejects_and_keeps_previous() {
        let mut state = GameState::with_seed(1).unwrap();
        let before = state.board.pegs.len();
        assert!(state.configure_board(0, Pattern::Point, Spacing::default()).is_err());
        assert_eq!(state.board.pegs.len(), before);
        assert_eq!(state.session.rows, crate::session::DEFAULT_ROWS);
    }

    #[test]
    fn test_configure_risk_updates_slots() {
        let mut state = GameState::with_seed(1).unwrap();
        let low = state.configure_risk(RiskProfile::Low).to_vec();
        let extreme = state.configure_risk(RiskProfile::Extreme).to_vec();
        assert_ne!(low, extreme);
        assert_eq!(state.board.multipliers(), extreme);
        assert_eq!(state.session.risk, RiskProfile::Extreme);
    }

    #[test]
    fn test_reset_session() {
        let mut state = GameState::with_seed(1).unwrap();
        state.configure_board(8, Pattern::Circle, Spacing::default()).unwrap();
        state.session.balance = 3.0;
        state.session.streak = 4;
        state.toggle_powerup(PowerUp::Wind);
        state.set_auto_play(true);
        state.balls.push(Ball::new(1, Vec2::ZERO, Vec2::ZERO, 5.0));

        state.reset_session().unwrap();
        assert_eq!(state.session, Session::new(&state.settings));
        assert!(state.balls.is_empty());
        assert!(state.armed.is_empty());
        assert!(!state.auto_play);
        assert_eq!(state.board.rows, crate::session::DEFAULT_ROWS);
        assert_eq!(state.board.slots.len(), state.table.len());
    }

    #[test]
    fn test_toggle_powerup() {
        let mut state = GameState::with_seed(1).unwrap();
        assert!(state.toggle_powerup(PowerUp::Magnet));
        assert!(!state.toggle_powerup(PowerUp::Magnet));
        assert!(state.armed.is_empty());
    }
}
