//! Board geometry: pegs, trapezoid frame and payout slots
//!
//! The board is rebuilt as a whole whenever rows, pattern or spacing change.
//! Row population per pattern comes from one table (`Pattern::row_count`),
//! which is also what the multiplier engine reads through
//! `Pattern::effective_rows`, so slot count and multiplier count always agree.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rng::SimRng;
use crate::consts::*;

/// Probability that a sparse-pattern peg (row 2 and below) is left out
pub const SPARSE_SKIP_CHANCE: f64 = 0.12;
/// Horizontal drift per row for lean patterns, as a fraction of the gap
pub const LEAN_BIAS: f32 = 0.18;
/// Extra room beyond a ball's diameter between outer pegs and the walls
pub const WALL_SLACK: f32 = 1.0;

/// Peg layout selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Pattern {
    /// Three pegs on top, one more per row
    #[default]
    #[serde(rename = "flat3")]
    FlatTop,
    /// Single apex peg, one more per row
    #[serde(rename = "point")]
    Point,
    #[serde(rename = "leanL")]
    LeanLeft,
    #[serde(rename = "leanR")]
    LeanRight,
    /// Flat top with random pegs missing below the second row
    #[serde(rename = "sparse")]
    Sparse,
    /// Constant-width staggered grid
    #[serde(rename = "square")]
    Square,
    /// Staggered grid trimmed to a disc
    #[serde(rename = "circle")]
    Circle,
}

impl Pattern {
    pub const ALL: [Pattern; 7] = [
        Pattern::FlatTop,
        Pattern::Point,
        Pattern::LeanLeft,
        Pattern::LeanRight,
        Pattern::Sparse,
        Pattern::Square,
        Pattern::Circle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::FlatTop => "flat3",
            Pattern::Point => "point",
            Pattern::LeanLeft => "leanL",
            Pattern::LeanRight => "leanR",
            Pattern::Sparse => "sparse",
            Pattern::Square => "square",
            Pattern::Circle => "circle",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flat3" | "flat" | "flattop" => Some(Pattern::FlatTop),
            "point" | "apex" => Some(Pattern::Point),
            "leanl" | "leanleft" => Some(Pattern::LeanLeft),
            "leanr" | "leanright" => Some(Pattern::LeanRight),
            "sparse" => Some(Pattern::Sparse),
            "square" | "grid" => Some(Pattern::Square),
            "circle" => Some(Pattern::Circle),
            _ => None,
        }
    }

    /// Parse a pattern name, falling back to the default layout
    pub fn parse(s: &str) -> Self {
        Self::from_name(s).unwrap_or_else(|| {
            log::debug!("Unknown pattern {s:?}, using {}", Pattern::default().as_str());
            Pattern::default()
        })
    }

    /// Number of peg rows laid out for a board of `rows`
    pub fn layout_rows(&self, rows: u32) -> u32 {
        match self {
            Pattern::Square => rows + 1,
            Pattern::Circle => rows + 2,
            _ => rows,
        }
    }

    /// Nominal peg count of row `row` (0-indexed) before any removal
    pub fn row_count(&self, rows: u32, row: u32) -> u32 {
        match self {
            Pattern::Point => 1 + row,
            Pattern::Square | Pattern::Circle => rows + 2,
            _ => 3 + row,
        }
    }

    /// Nominal peg count of the bottom row
    pub fn bottom_count(&self, rows: u32) -> u32 {
        let last = self.layout_rows(rows).saturating_sub(1);
        self.row_count(rows, last)
    }

    /// Binomial row parameter; the board has `effective_rows + 1` slots
    pub fn effective_rows(&self, rows: u32) -> u32 {
        self.bottom_count(rows).saturating_sub(1)
    }

    /// Horizontal offset applied to a whole row
    fn row_offset(&self, row: u32, gap_x: f32) -> f32 {
        match self {
            Pattern::LeanLeft => -(row as f32) * LEAN_BIAS * gap_x,
            Pattern::LeanRight => row as f32 * LEAN_BIAS * gap_x,
            Pattern::Square | Pattern::Circle if row % 2 == 1 => gap_x * 0.5,
            _ => 0.0,
        }
    }
}

/// Spacing parameters, independent of any viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    /// Horizontal distance between neighbouring pegs
    pub gap_x: f32,
    /// Vertical distance between peg rows
    pub gap_y: f32,
    pub peg_radius: f32,
    /// Y of the first peg row (and the top edge of the frame)
    pub top_offset: f32,
    /// X of the board's vertical axis
    pub center_x: f32,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            gap_x: 30.0,
            gap_y: 34.0,
            peg_radius: 5.0,
            top_offset: 68.0,
            center_x: 0.0,
        }
    }
}

impl Spacing {
    /// Derive spacing that fits a `width` x `height` drawing area
    pub fn fit(width: f32, height: f32, rows: u32) -> Self {
        let rows = rows.max(1) as f32;
        let avail_w = width.max(220.0);
        let gap_y = ((height - 220.0) / rows).floor().clamp(24.0, 44.0);
        let gap_x = (avail_w / (3.0 + rows)).floor().clamp(22.0, 48.0);
        let peg_radius = (gap_x.min(gap_y) * 0.22).floor().clamp(4.0, 6.0);
        let top_offset = (height * 0.10).floor().clamp(54.0, 110.0);
        Self {
            gap_x,
            gap_y,
            peg_radius,
            top_offset,
            center_x: avail_w / 2.0,
        }
    }

    /// Radius of balls dropped on this board
    pub fn ball_radius(&self) -> f32 {
        self.peg_radius.max(MIN_BALL_RADIUS)
    }

    fn validate(&self) -> Result<(), BoardError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.gap_x) || !positive(self.gap_y) {
            return Err(BoardError::InvalidSpacing("gaps must be positive"));
        }
        if !self.peg_radius.is_finite() || self.peg_radius < 0.0 {
            return Err(BoardError::InvalidSpacing("peg radius must be non-negative"));
        }
        if !self.top_offset.is_finite() || !self.center_x.is_finite() {
            return Err(BoardError::InvalidSpacing("offsets must be finite"));
        }
        Ok(())
    }
}

/// Board construction failures (no geometry is produced)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoardError {
    #[error("row count {0} outside supported range {MIN_ROWS}..={MAX_ROWS}")]
    RowsOutOfRange(u32),
    #[error("invalid spacing: {0}")]
    InvalidSpacing(&'static str),
}

/// A peg; radius 0 means destroyed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peg {
    pub pos: Vec2,
    pub radius: f32,
}

impl Peg {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.radius > 0.0
    }

    /// Remove the peg from play
    pub fn destroy(&mut self) {
        self.radius = 0.0;
    }
}

/// A payout slot along the base edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub index: usize,
    /// Center x
    pub x: f32,
    pub width: f32,
    pub multiplier: f64,
}

/// Trapezoid frame (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub top_left: Vec2,
    pub top_right: Vec2,
    pub base_left: Vec2,
    pub base_right: Vec2,
    /// Unit normal of the left wall, pointing into the board
    pub left_normal: Vec2,
    /// Unit normal of the right wall, pointing into the board
    pub right_normal: Vec2,
}

impl Frame {
    pub fn top_width(&self) -> f32 {
        self.top_right.x - self.top_left.x
    }

    pub fn base_width(&self) -> f32 {
        self.base_right.x - self.base_left.x
    }

    /// Balls settle once their center passes this line
    pub fn floor_y(&self) -> f32 {
        self.base_left.y + FLOOR_MARGIN
    }

    /// Center of the top edge (drop point)
    pub fn top_center(&self) -> Vec2 {
        (self.top_left + self.top_right) * 0.5
    }

    /// The two slanted walls as (anchor, inward normal)
    pub fn walls(&self) -> [(Vec2, Vec2); 2] {
        [
            (self.top_left, self.left_normal),
            (self.top_right, self.right_normal),
        ]
    }
}

/// Perpendicular of edge `a`→`b`, flipped to face `center`
pub fn inward_normal(a: Vec2, b: Vec2, center: Vec2) -> Vec2 {
    let edge = b - a;
    let mut n = Vec2::new(-edge.y, edge.x).normalize_or_zero();
    if n == Vec2::ZERO {
        // Degenerate edge: face the center horizontally
        n = Vec2::new((center.x - a.x).signum(), 0.0);
    }
    let mid = (a + b) * 0.5;
    if (center - mid).dot(n) < 0.0 {
        n = -n;
    }
    n
}

/// Complete board geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub rows: u32,
    pub pattern: Pattern,
    pub spacing: Spacing,
    pub pegs: Vec<Peg>,
    pub slots: Vec<Slot>,
    pub frame: Frame,
}

impl Board {
    /// Build pegs, frame and slots. Only the sparse pattern consumes `rng`.
    pub fn build(
        rows: u32,
        pattern: Pattern,
        spacing: Spacing,
        rng: &mut SimRng,
    ) -> Result<Self, BoardError> {
        if !(MIN_ROWS..=MAX_ROWS).contains(&rows) {
            return Err(BoardError::RowsOutOfRange(rows));
        }
        spacing.validate()?;

        let layout_rows = pattern.layout_rows(rows);
        let cx = spacing.center_x;

        // Nominal positions row by row
        let mut grid: Vec<Vec<Vec2>> = Vec::with_capacity(layout_rows as usize);
        for r in 0..layout_rows {
            let count = pattern.row_count(rows, r);
            let y = spacing.top_offset + r as f32 * spacing.gap_y;
            let row_width = (count - 1) as f32 * spacing.gap_x;
            let start_x = cx - row_width / 2.0 + pattern.row_offset(r, spacing.gap_x);
            grid.push(
                (0..count)
                    .map(|c| Vec2::new(start_x + c as f32 * spacing.gap_x, y))
                    .collect(),
            );
        }

        let frame = Self::build_frame(&grid, &spacing);

        let mut pegs = Vec::new();
        match pattern {
            Pattern::Sparse => {
                for (r, row) in grid.iter().enumerate() {
                    for &pos in row {
                        if r > 1 && rng.chance(SPARSE_SKIP_CHANCE) {
                            continue;
                        }
                        pegs.push(Peg { pos, radius: spacing.peg_radius });
                    }
                }
            }
            Pattern::Circle => {
                let points: Vec<Vec2> = grid.iter().flatten().copied().collect();
                let centroid = points.iter().copied().sum::<Vec2>() / points.len().max(1) as f32;
                let (max_dx, max_dy) = points.iter().fold((0.0f32, 0.0f32), |(mx, my), p| {
                    (mx.max((p.x - centroid.x).abs()), my.max((p.y - centroid.y).abs()))
                });
                let radius = max_dx.min(max_dy) + spacing.gap_x.min(spacing.gap_y) * 0.05;
                pegs.extend(
                    points
                        .into_iter()
                        .filter(|p| p.distance(centroid) <= radius)
                        .map(|pos| Peg { pos, radius: spacing.peg_radius }),
                );
            }
            _ => {
                pegs.extend(
                    grid.iter()
                        .flatten()
                        .map(|&pos| Peg { pos, radius: spacing.peg_radius }),
                );
            }
        }

        let slot_count = pattern.effective_rows(rows) as usize + 1;
        let slot_width = frame.base_width() / slot_count as f32;
        let slots = (0..slot_count)
            .map(|index| Slot {
                index,
                x: frame.base_left.x + (index as f32 + 0.5) * slot_width,
                width: slot_width,
                multiplier: 1.0,
            })
            .collect();

        log::info!(
            "Board built: {} rows, pattern {}, {} pegs, {} slots",
            rows,
            pattern.as_str(),
            pegs.len(),
            slot_count
        );

        Ok(Self {
            rows,
            pattern,
            spacing,
            pegs,
            slots,
            frame,
        })
    }

    fn build_frame(grid: &[Vec<Vec2>], spacing: &Spacing) -> Frame {
        let cx = spacing.center_x;
        let half_span = |row: Option<&Vec<Vec2>>| {
            row.map(|r| r.iter().fold(0.0f32, |m, p| m.max((p.x - cx).abs())))
                .unwrap_or(0.0)
        };
        let row_y = |row: &Vec<Vec2>| row.first().map_or(spacing.top_offset, |p| p.y);

        // A ball must fit between any outer peg and the wall. The clearance is
        // perpendicular, so widen it by the steepest slope a row can produce.
        let max_slope = (0.5 + LEAN_BIAS) * spacing.gap_x / spacing.gap_y;
        let clearance = (spacing.peg_radius + 2.0 * spacing.ball_radius() + WALL_SLACK)
            * (1.0 + max_slope * max_slope).sqrt();

        let top_y = spacing.top_offset;
        let last_row_y = grid.last().map_or(top_y, row_y);
        let base_y = last_row_y + BASE_MARGIN;
        let height = base_y - top_y;

        let top_half = half_span(grid.first()) + TOP_PADDING.max(clearance);
        let mut base_half = (half_span(grid.last()) + BASE_PADDING).max(top_half);
        for row in grid.iter().skip(1) {
            let dy = row_y(row) - top_y;
            if dy > 0.0 {
                let needed = half_span(Some(row)) + clearance;
                base_half = base_half.max(top_half + (needed - top_half) * height / dy);
            }
        }

        let top_left = Vec2::new(cx - top_half, top_y);
        let top_right = Vec2::new(cx + top_half, top_y);
        let base_left = Vec2::new(cx - base_half, base_y);
        let base_right = Vec2::new(cx + base_half, base_y);

        let center = Vec2::new(cx, (top_y + base_y) * 0.5);
        Frame {
            top_left,
            top_right,
            base_left,
            base_right,
            left_normal: inward_normal(top_left, base_left, center),
            right_normal: inward_normal(top_right, base_right, center),
        }
    }

    /// Number of laid-out peg rows
    pub fn layout_rows(&self) -> u32 {
        self.pattern.layout_rows(self.rows)
    }

    /// Binomial row parameter shared with the multiplier engine
    pub fn effective_rows(&self) -> u32 {
        self.pattern.effective_rows(self.rows)
    }

    /// Y past which a wind power-up fires (55 % down the peg field)
    pub fn wind_line(&self) -> f32 {
        self.spacing.top_offset + self.layout_rows() as f32 * self.spacing.gap_y * 0.55
    }

    pub fn active_pegs(&self) -> impl Iterator<Item = &Peg> {
        self.pegs.iter().filter(|p| p.is_active())
    }

    /// Index of the slot whose center is nearest `x`
    pub fn nearest_slot(&self, x: f32) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for slot in &self.slots {
            let d = (x - slot.x).abs();
            if d < best_dist {
                best_dist = d;
                best = slot.index;
            }
        }
        best
    }

    /// Slot with the highest multiplier (leftmost on ties)
    pub fn best_slot(&self) -> Option<&Slot> {
        self.slots.iter().fold(None, |best: Option<&Slot>, s| match best {
            Some(b) if s.multiplier <= b.multiplier => Some(b),
            _ => Some(s),
        })
    }

    /// Copy a multiplier table onto the slots. Returns false (and leaves
    /// the slots untouched) when lengths disagree.
    pub fn apply_multipliers(&mut self, table: &[f64]) -> bool {
        if table.len() != self.slots.len() {
            log::error!(
                "Multiplier table has {} entries for {} slots",
                table.len(),
                self.slots.len()
            );
            return false;
        }
        for (slot, &m) in self.slots.iter_mut().zip(table) {
            slot.multiplier = m;
        }
        true
    }

    pub fn multipliers(&self) -> Vec<f64> {
        self.slots.iter().map(|s| s.multiplier).collect()
    }
}
