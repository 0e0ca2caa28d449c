//! Slot multipliers from a binomial landing model
//!
//! A ball that goes left or right with equal odds at each of `N` rows lands
//! in slot `k` with probability `C(N,k) / 2^N`. Each risk profile shapes a
//! raw payout curve (edges up, center down), which is then scaled so the
//! probability-weighted payout equals the target return-to-player.

use serde::{Deserialize, Serialize};

use crate::round_to;

/// Smallest multiplier a slot may carry
pub const MIN_MULTIPLIER: f64 = 0.1;

/// Risk profiles, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RiskProfile {
    #[serde(rename = "verylow")]
    VeryLow,
    #[serde(rename = "low")]
    Low,
    #[default]
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "extreme")]
    Extreme,
}

/// Curve parameters of a risk profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskShape {
    /// Edge multiplier relative to the unscaled center (> 1)
    pub edge_boost: f64,
    /// Fraction of value kept at the center (< 1)
    pub center_penalty: f64,
}

const RISK_TABLE: [(RiskProfile, RiskShape); 5] = [
    (RiskProfile::VeryLow, RiskShape { edge_boost: 1.6, center_penalty: 0.95 }),
    (RiskProfile::Low, RiskShape { edge_boost: 2.1, center_penalty: 0.86 }),
    (RiskProfile::Medium, RiskShape { edge_boost: 3.0, center_penalty: 0.70 }),
    (RiskProfile::High, RiskShape { edge_boost: 4.2, center_penalty: 0.52 }),
    (RiskProfile::Extreme, RiskShape { edge_boost: 6.0, center_penalty: 0.40 }),
];

impl RiskProfile {
    pub const ALL: [RiskProfile; 5] = [
        RiskProfile::VeryLow,
        RiskProfile::Low,
        RiskProfile::Medium,
        RiskProfile::High,
        RiskProfile::Extreme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::VeryLow => "verylow",
            RiskProfile::Low => "low",
            RiskProfile::Medium => "medium",
            RiskProfile::High => "high",
            RiskProfile::Extreme => "extreme",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "verylow" => Some(RiskProfile::VeryLow),
            "low" => Some(RiskProfile::Low),
            "medium" | "med" => Some(RiskProfile::Medium),
            "high" => Some(RiskProfile::High),
            "extreme" => Some(RiskProfile::Extreme),
            _ => None,
        }
    }

    /// Parse a profile name; unknown names fall back to medium
    pub fn parse(s: &str) -> Self {
        Self::from_name(s).unwrap_or_else(|| {
            log::debug!("Unknown risk profile {s:?}, using medium");
            RiskProfile::Medium
        })
    }

    pub fn shape(&self) -> RiskShape {
        RISK_TABLE
            .iter()
            .find(|(profile, _)| profile == self)
            .map(|(_, shape)| *shape)
            .unwrap_or(RISK_TABLE[2].1)
    }
}

/// Landing probabilities for a fair board of `n` rows (length `n + 1`)
pub fn binomial_distribution(n: u32) -> Vec<f64> {
    let n_usize = n as usize;
    let mut probs = Vec::with_capacity(n_usize + 1);
    // C(n, k) built multiplicatively, 0.5^n applied once
    let mut coeff = 1.0f64;
    let half_pow = 0.5f64.powi(n as i32);
    for k in 0..=n_usize {
        probs.push(coeff * half_pow);
        coeff = coeff * (n_usize - k) as f64 / (k + 1) as f64;
    }

    let sum: f64 = probs.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for p in &mut probs {
            *p /= sum;
        }
    } else {
        log::warn!("Binomial distribution for n={n} did not normalize, using uniform");
        let uniform = 1.0 / probs.len() as f64;
        probs.iter_mut().for_each(|p| *p = uniform);
    }
    probs
}

/// Unscaled payout curve for a profile (length `n + 1`)
pub fn raw_shape(n: u32, shape: RiskShape) -> Vec<f64> {
    let mid = n as f64 / 2.0;
    (0..=n)
        .map(|k| {
            let d = if mid > 0.0 {
                (k as f64 - mid).abs() / mid
            } else {
                0.0
            };
            let edge = 1.0 + d * (shape.edge_boost - 1.0);
            let center = 1.0 - (1.0 - shape.center_penalty) * (1.0 - d);
            edge * center
        })
        .collect()
}

/// Tiered display/play rounding: integers from 10, halves from 5, tenths below
pub fn round_multiplier(m: f64) -> f64 {
    let rounded = if m >= 10.0 {
        m.round()
    } else if m >= 5.0 {
        round_to(m, 0.5)
    } else {
        round_to(m, 0.1)
    };
    rounded.max(MIN_MULTIPLIER)
}

/// Probability-weighted payout of a multiplier table
pub fn expected_return(probs: &[f64], multipliers: &[f64]) -> f64 {
    probs.iter().zip(multipliers).map(|(p, m)| p * m).sum()
}

/// Multipliers together with the probabilities they were calibrated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierTable {
    pub rows: u32,
    pub risk: RiskProfile,
    pub target_rtp: f64,
    pub probabilities: Vec<f64>,
    pub multipliers: Vec<f64>,
}

impl MultiplierTable {
    /// Build the table for `n` effective rows
    pub fn build(n: u32, risk: RiskProfile, target_rtp: f64) -> Self {
        let probabilities = binomial_distribution(n);
        let multipliers = if n == 0 {
            vec![1.0]
        } else {
            let raw = raw_shape(n, risk.shape());
            let expected = expected_return(&probabilities, &raw);
            let scale = if expected > 0.0 { target_rtp / expected } else { 1.0 };
            raw.iter().map(|v| round_multiplier(v * scale)).collect()
        };
        Self {
            rows: n,
            risk,
            target_rtp,
            probabilities,
            multipliers,
        }
    }

    /// Actual return of the rounded table
    pub fn expected_return(&self) -> f64 {
        expected_return(&self.probabilities, &self.multipliers)
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }
}

/// Multiplier array for `n` effective rows
pub fn build_multipliers(n: u32, risk: RiskProfile, target_rtp: f64) -> Vec<f64> {
    MultiplierTable::build(n, risk, target_rtp).multipliers
}
