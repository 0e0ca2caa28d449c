//! Player session: balance, streak, bet and board preferences
//!
//! The session is only mutated by the drop/settlement controller and by
//! explicit configuration calls; persistence serializes it as a whole.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::MIN_BET;
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::settings::Settings;
use crate::sim::{Pattern, RiskProfile};

/// Default ball tint
pub const DEFAULT_BALL_COLOR: &str = "#8cb6ff";
/// Default board rows
pub const DEFAULT_ROWS: u32 = 12;

/// A drop that was refused; the session is unchanged
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropError {
    #[error("insufficient balance: {balance:.2} available, {bet:.2} required")]
    InsufficientBalance { balance: f64, bet: f64 },
    #[error("invalid bet {0} (minimum {MIN_BET})")]
    InvalidBet(f64),
}

/// How a landing moves the streak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreakPolicy {
    /// Landings at or above this multiplier extend the streak
    pub threshold: f64,
    /// Streak value after a landing below the threshold (0 or 1)
    pub reset_to: u32,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            reset_to: 1,
        }
    }
}

impl StreakPolicy {
    /// Streak after landing on `multiplier`
    pub fn advance(&self, streak: u32, multiplier: f64) -> u32 {
        if multiplier >= self.threshold {
            streak.saturating_add(1)
        } else {
            self.reset_to
        }
    }
}

/// Result of crediting one settled ball
#[derive(Debug, Clone, PartialEq)]
pub struct Credit {
    pub payout: f64,
    /// Streak factor the payout was multiplied by
    pub streak_factor: u32,
    /// Streak after this landing
    pub streak: u32,
    /// Leaderboard rank achieved, if any
    pub rank: Option<usize>,
}

/// Long-lived player state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub balance: f64,
    pub streak: u32,
    pub leaderboard: Leaderboard,
    pub bet: f64,
    pub risk: RiskProfile,
    pub pattern: Pattern,
    pub rows: u32,
    pub ball_color: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl Session {
    /// Fresh session for the given settings
    pub fn new(settings: &Settings) -> Self {
        Self {
            balance: settings.starting_balance,
            streak: 1,
            leaderboard: Leaderboard::new(),
            bet: settings.default_bet.max(MIN_BET),
            risk: RiskProfile::default(),
            pattern: Pattern::default(),
            rows: DEFAULT_ROWS,
            ball_color: DEFAULT_BALL_COLOR.to_string(),
        }
    }

    /// Multiplier applied to payouts (a zero streak still pays 1x)
    pub fn streak_factor(&self) -> u32 {
        self.streak.max(1)
    }

    /// Take a stake out of the balance. Bets below `MIN_BET` are refused.
    pub fn debit(&mut self, bet: f64) -> Result<(), DropError> {
        if !bet.is_finite() || bet < MIN_BET {
            return Err(DropError::InvalidBet(bet));
        }
        if self.balance < bet {
            return Err(DropError::InsufficientBalance {
                balance: self.balance,
                bet,
            });
        }
        self.balance -= bet;
        Ok(())
    }

    /// Pay out a settled ball and record it
    pub fn credit(
        &mut self,
        stake: f64,
        multiplier: f64,
        policy: &StreakPolicy,
        timestamp: f64,
    ) -> Credit {
        let streak_factor = self.streak_factor();
        let payout = stake * multiplier * f64::from(streak_factor);
        self.balance += payout;
        self.streak = policy.advance(self.streak, multiplier);

        let rank = self.leaderboard.add(LeaderboardEntry {
            payout,
            multiplier,
            rows: self.rows,
            risk: self.risk,
            timestamp,
        });

        Credit {
            payout,
            streak_factor,
            streak: self.streak,
            rank,
        }
    }

    /// Set the bet, never below the minimum
    pub fn set_bet(&mut self, bet: f64) {
        self.bet = if bet.is_finite() { bet.max(MIN_BET) } else { MIN_BET };
    }

    pub fn halve_bet(&mut self) {
        self.set_bet(crate::round_cents(self.bet / 2.0));
    }

    pub fn double_bet(&mut self) {
        self.set_bet(crate::round_cents(self.bet * 2.0));
    }
}
