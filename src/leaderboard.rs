//! Payout leaderboard
//!
//! Keeps the top 10 landings by payout, persisted with the session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::round_cents;
use crate::sim::RiskProfile;

/// Maximum number of entries to keep
pub const MAX_ENTRIES: usize = 10;

/// A single landing worth remembering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Amount paid out, rounded to cents
    pub payout: f64,
    /// Slot multiplier the ball landed on
    #[serde(rename = "mult")]
    pub multiplier: f64,
    /// Board rows at the time of the drop
    pub rows: u32,
    pub risk: RiskProfile,
    /// Host clock (ms) when the ball settled
    #[serde(rename = "date")]
    pub timestamp: f64,
}

impl fmt::Display for LeaderboardEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:.2} {}x {} rows {}",
            self.payout,
            self.multiplier,
            self.rows,
            self.risk.as_str()
        )
    }
}

/// Top payouts, sorted descending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild from arbitrary entries (e.g. loaded from disk)
    pub fn from_entries(entries: impl IntoIterator<Item = LeaderboardEntry>) -> Self {
        let mut board = Self::new();
        for entry in entries {
            board.add(entry);
        }
        board
    }

    /// Check if a payout qualifies for the leaderboard. Zero payouts fill
    /// empty places but never push out an entry.
    pub fn qualifies(&self, payout: f64) -> bool {
        if payout.is_nan() || payout < 0.0 {
            return false;
        }
        if self.entries.len() < MAX_ENTRIES {
            return true;
        }
        self.entries.last().map(|e| payout > e.payout).unwrap_or(true)
    }

    /// Insert an entry if it qualifies. Returns the rank achieved (1-indexed).
    pub fn add(&mut self, mut entry: LeaderboardEntry) -> Option<usize> {
        entry.payout = round_cents(entry.payout);
        if !self.qualifies(entry.payout) {
            return None;
        }

        // Ties keep insertion order
        let pos = self.entries.iter().position(|e| entry.payout > e.payout);
        let rank = match pos {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };

        self.entries.truncate(MAX_ENTRIES);

        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn top_payout(&self) -> Option<f64> {
        self.entries.first().map(|e| e.payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(payout: f64) -> LeaderboardEntry {
        LeaderboardEntry {
            payout,
            multiplier: 2.0,
            rows: 12,
            risk: RiskProfile::Medium,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_sorted_descending_and_trimmed() {
        let mut board = Leaderboard::new();
        for i in 0..25 {
            board.add(entry((i * 7 % 13) as f64 + 1.0));
        }
        assert_eq!(board.len(), MAX_ENTRIES);
        assert!(board.entries.windows(2).all(|w| w[0].payout >= w[1].payout));
        assert_eq!(board.top_payout(), Some(13.0));
    }

    #[test]
    fn test_rank_and_qualification() {
        let mut board = Leaderboard::new();
        assert_eq!(board.add(entry(5.0)), Some(1));
        assert_eq!(board.add(entry(10.0)), Some(1));
        assert_eq!(board.add(entry(7.0)), Some(2));
        assert_eq!(board.add(entry(1.0)), Some(4));
        assert!(!board.qualifies(-1.0));
        assert!(!board.qualifies(f64::NAN));

        for _ in 0..10 {
            board.add(entry(20.0));
        }
        assert!(!board.qualifies(19.0));
        assert_eq!(board.add(entry(3.0)), None);
    }

    #[test]
    fn test_zero_cent_payout_recorded_until_full() {
        let mut board = Leaderboard::new();
        assert_eq!(board.add(entry(0.004)), Some(1));
        assert_eq!(board.entries[0].payout, 0.0);
        assert_eq!(board.add(entry(2.0)), Some(1));
        assert_eq!(board.add(entry(0.0)), Some(3));

        for _ in 0..MAX_ENTRIES {
            board.add(entry(1.0));
        }
        assert_eq!(board.len(), MAX_ENTRIES);
        assert!(board.entries.iter().all(|e| e.payout > 0.0));
        assert_eq!(board.add(entry(0.0)), None);
    }

    #[test]
    fn test_payout_rounded_to_cents() {
        let mut board = Leaderboard::new();
        board.add(entry(1.23456));
        assert_eq!(board.entries[0].payout, 1.23);
    }

    #[test]
    fn test_serializes_as_list() {
        let board = Leaderboard::from_entries([entry(2.0), entry(4.0)]);
        let json = serde_json::to_string(&board).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"mult\""));
        let back: Leaderboard = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
        assert_eq!(back.entries[0].payout, 4.0);
    }
}
