//! Fixed timestep simulation tick
//!
//! `tick` turns host frame time into fixed 60 Hz steps. Each step advances
//! every falling ball, settles the ones that crossed the floor line (paying
//! out immediately, in id order) and retires balls whose settle animation
//! has finished.

use glam::Vec2;
use serde::Serialize;

use super::board::Board;
use super::collision::{Response, ball_peg_collision, ball_wall_collision, resolve_peg, resolve_wall};
use super::rng::SimRng;
use super::state::{Ball, BallState, GameState, PowerUp, PowerUps};
use crate::consts::*;
use crate::session::DropError;
use crate::settings::PhysicsTuning;

/// A ball that landed and was paid out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementEvent {
    pub ball_id: u32,
    pub slot: usize,
    pub multiplier: f64,
    pub stake: f64,
    pub payout: f64,
    /// Streak factor the payout was multiplied by
    pub streak_factor: u32,
    /// Streak after this landing
    pub streak: u32,
    /// Balance after the payout
    pub balance: f64,
    /// Leaderboard rank achieved, if any
    pub rank: Option<usize>,
}

/// What a single integration step did to a ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Still falling (or already settled and left untouched)
    Moving,
    /// Crossed the floor line this step and landed in `slot`
    Landed { slot: usize },
}

/// Advance the game by `delta_ms` of host time.
///
/// The delta is clamped to `MAX_FRAME_MS` and at most `MAX_SUBSTEPS` fixed
/// steps run per call.
pub fn tick(state: &mut GameState, delta_ms: f64) -> Vec<SettlementEvent> {
    let delta = if delta_ms.is_finite() {
        delta_ms.clamp(0.0, MAX_FRAME_MS)
    } else {
        0.0
    };
    state.accumulator_ms += delta;

    let mut events = Vec::new();
    let mut substeps = 0;
    while state.accumulator_ms >= STEP_MS && substeps < MAX_SUBSTEPS {
        events.extend(step(state));
        state.accumulator_ms -= STEP_MS;
        substeps += 1;
    }
    events
}

/// Run exactly one fixed step
pub fn step(state: &mut GameState) -> Vec<SettlementEvent> {
    state.time_steps += 1;
    state.clock_ms += STEP_MS;

    if state.auto_play {
        state.auto_elapsed_ms += STEP_MS;
        if state.auto_elapsed_ms >= state.settings.auto_drop_interval_ms {
            state.auto_elapsed_ms = 0.0;
            if let Err(e) = drop_armed(state) {
                log::debug!("Auto drop skipped: {e}");
            }
        }
    }

    state.normalize_order();
    let mut landed = Vec::new();
    {
        let GameState {
            balls,
            board,
            rng,
            settings,
            ..
        } = state;
        for ball in balls.iter_mut() {
            if let StepOutcome::Landed { slot } = step_ball(ball, board, &settings.physics, rng) {
                landed.push((ball.id, slot));
            }
        }
    }

    let events = landed
        .into_iter()
        .filter_map(|(id, slot)| settle(state, id, slot))
        .collect();

    state.balls.retain_mut(|b| !b.linger());
    events
}

/// Advance one ball by one step. Settled balls are left untouched.
pub fn step_ball(
    ball: &mut Ball,
    board: &mut Board,
    tuning: &PhysicsTuning,
    rng: &mut SimRng,
) -> StepOutcome {
    if !ball.is_falling() {
        return StepOutcome::Moving;
    }

    // Gravity and drag
    let gravity = if ball.has(PowerUp::Slow) {
        tuning.gravity * tuning.slow_gravity
    } else {
        tuning.gravity
    };
    ball.vel.y += gravity;
    ball.vel.x *= 1.0 - tuning.air_drag;
    ball.vel.y *= 1.0 - tuning.air_drag * 0.5;

    // Magnet: nudge toward the best-paying slot
    if ball.has(PowerUp::Magnet) {
        if let Some(best) = board.best_slot() {
            let dx = best.x - ball.pos.x;
            if dx.abs() > f32::EPSILON {
                ball.vel.x += dx.signum() * tuning.magnet_pull;
            }
        }
    }

    // Wind: one gust once past the middle of the peg field
    if ball.has(PowerUp::Wind) && !ball.markers.wind_applied && ball.pos.y > board.wind_line() {
        ball.vel.x += rng.sign() * tuning.wind_impulse;
        ball.markers.wind_applied = true;
    }

    // Semi-implicit Euler: velocity already updated
    ball.pos += ball.vel;

    let wall_response = Response {
        restitution: tuning.wall_restitution,
        tangential: tuning.tangential,
        min_vy: tuning.min_vy_after_hit,
    };
    for (anchor, normal) in board.frame.walls() {
        let hit = ball_wall_collision(ball.pos, ball.radius, anchor, normal);
        if hit.hit {
            resolve_wall(&mut ball.pos, &mut ball.vel, &hit, wall_response);
        }
    }

    let peg_response = if ball.has(PowerUp::Bumper) {
        Response {
            restitution: (tuning.restitution + tuning.bumper_restitution_bonus)
                .min(tuning.bumper_restitution_cap),
            tangential: (tuning.tangential + tuning.bumper_tangential_bonus)
                .min(tuning.bumper_tangential_cap),
            min_vy: tuning.min_vy_after_hit,
        }
    } else {
        Response {
            restitution: tuning.restitution,
            tangential: tuning.tangential,
            min_vy: tuning.min_vy_after_hit,
        }
    };
    for peg in board.pegs.iter_mut() {
        let hit = ball_peg_collision(ball.pos, ball.radius, peg);
        if !hit.hit {
            continue;
        }

        // Explode: the first peg touched is destroyed instead of bounced off
        if ball.has(PowerUp::Explode) && !ball.markers.explode_used {
            peg.destroy();
            ball.markers.explode_used = true;
            log::debug!("Ball {} destroyed peg at {:?}", ball.id, peg.pos);
            continue;
        }

        resolve_peg(&mut ball.pos, &mut ball.vel, &hit, peg_response);
        ball.vel.x += rng.centered() * tuning.jitter;
        ball.vel.x = ball.vel.x.clamp(-tuning.max_vx, tuning.max_vx);
        if ball.vel.y < peg_response.min_vy {
            ball.vel.y = peg_response.min_vy;
        }
    }

    ball.record_trail();

    if ball.pos.y > board.frame.floor_y() {
        let slot = board.nearest_slot(ball.pos.x);
        ball.state = BallState::Settled {
            slot,
            linger: SETTLE_LINGER_STEPS,
        };
        return StepOutcome::Landed { slot };
    }
    StepOutcome::Moving
}

/// Pay out a ball that landed in `slot`
pub fn settle(state: &mut GameState, ball_id: u32, slot: usize) -> Option<SettlementEvent> {
    let stake = state.balls.iter().find(|b| b.id == ball_id)?.stake;
    let multiplier = state.board.slots.get(slot)?.multiplier;

    let credit = state.session.credit(
        stake,
        multiplier,
        &state.settings.streak,
        state.clock_ms,
    );
    log::debug!(
        "Ball {ball_id} landed in slot {slot} ({multiplier}x), paid {:.2}",
        credit.payout
    );
    if let Some(rank) = credit.rank {
        log::info!("Leaderboard #{rank}: {:.2}", credit.payout);
    }

    Some(SettlementEvent {
        ball_id,
        slot,
        multiplier,
        stake,
        payout: credit.payout,
        streak_factor: credit.streak_factor,
        streak: credit.streak,
        balance: state.session.balance,
        rank: credit.rank,
    })
}

/// Spend `bet` and drop a ball (three under multiball) carrying `powerups`.
///
/// Rejected drops leave the state untouched.
pub fn try_drop(state: &mut GameState, bet: f64, powerups: PowerUps) -> Result<Vec<u32>, DropError> {
    if let Err(e) = state.session.debit(bet) {
        log::warn!("Drop rejected: {e}");
        return Err(e);
    }

    let tuning = state.settings.physics;
    let gap = state.board.spacing.gap_x;
    let top = state.board.frame.top_center();
    let spawn = Vec2::new(
        top.x + state.rng.centered() * gap * tuning.spawn_spread,
        top.y - SPAWN_HEIGHT,
    );
    let radius = state.board.spacing.ball_radius();

    let lanes: &[(f32, f32)] = if powerups.contains(PowerUp::Multiball) {
        &[(-1.0, -1.0), (0.0, 0.0), (1.0, 1.0)]
    } else {
        &[(0.0, 0.0)]
    };

    let mut ids = Vec::with_capacity(lanes.len());
    for &(offset, bias) in lanes {
        let id = state.next_entity_id();
        let vx = state.rng.centered() * tuning.spawn_vx_spread + bias * tuning.multiball_vx_bias;
        let mut ball = Ball::new(
            id,
            spawn + Vec2::new(offset * gap * tuning.multiball_offset, 0.0),
            Vec2::new(vx, tuning.initial_vy),
            radius,
        );
        ball.color = state.session.ball_color.clone();
        ball.stake = bet;
        ball.powerups = powerups;
        state.balls.push(ball);
        ids.push(id);
    }

    log::debug!("Dropped {} ball(s), bet {bet:.2}, power-ups {powerups:?}", ids.len());
    Ok(ids)
}

/// Drop with the session bet and the armed power-ups, consuming them
pub fn drop_armed(state: &mut GameState) -> Result<Vec<u32>, DropError> {
    let bet = state.session.bet;
    let armed = state.armed;
    let ids = try_drop(state, bet, armed)?;
    state.armed = PowerUps::NONE;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::board::{Pattern, Peg, Spacing};

    fn run_until_settled(state: &mut GameState, max_steps: usize) -> Vec<SettlementEvent> {
        let mut events = Vec::new();
        for _ in 0..max_steps {
            events.extend(step(state));
            if state.falling_count() == 0 {
                break;
            }
        }
        events
    }

    #[test]
    fn test_drop_debits_and_spawns() {
        let mut state = GameState::with_seed(7).unwrap();
        let before = state.session.balance;
        let ids = try_drop(&mut state, 2.0, PowerUps::NONE).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(state.balls.len(), 1);
        assert_eq!(state.session.balance, before - 2.0);
        assert!(state.balls[0].pos.y < state.board.frame.top_left.y);
    }

    #[test]
    fn test_drop_rejected_without_funds() {
        let mut state = GameState::with_seed(7).unwrap();
        state.session.balance = 0.5;
        let err = try_drop(&mut state, 1.0, PowerUps::NONE).unwrap_err();
        assert!(matches!(err, DropError::InsufficientBalance { .. }));
        assert_eq!(state.session.balance, 0.5);
        assert!(state.balls.is_empty());
    }

    #[test]
    fn test_drop_below_minimum_bet_rejected() {
        let mut state = GameState::with_seed(7).unwrap();
        let before = state.session.balance;
        let err = try_drop(&mut state, 0.01, PowerUps::NONE).unwrap_err();
        assert!(matches!(err, DropError::InvalidBet(_)));
        assert_eq!(state.session.balance, before);
        assert!(state.balls.is_empty());
    }

    #[test]
    fn test_multiball_spawns_three() {
        let mut state = GameState::with_seed(7).unwrap();
        let power = PowerUps::NONE.with(PowerUp::Multiball).with(PowerUp::Slow);
        let ids = try_drop(&mut state, 1.0, power).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(state.session.balance, 999.0);
        let xs: Vec<f32> = state.balls.iter().map(|b| b.pos.x).collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        assert!(((xs[1] - xs[0]) - (xs[2] - xs[1])).abs() < 1e-4);
        assert!(state.balls.iter().all(|b| b.powerups == power));
    }

    #[test]
    fn test_drop_armed_consumes_powerups() {
        let mut state = GameState::with_seed(7).unwrap();
        state.toggle_powerup(PowerUp::Wind);
        drop_armed(&mut state).unwrap();
        assert!(state.armed.is_empty());
        assert!(state.balls[0].has(PowerUp::Wind));

        // A failed drop keeps them armed
        state.toggle_powerup(PowerUp::Bumper);
        state.session.balance = 0.0;
        assert!(drop_armed(&mut state).is_err());
        assert!(state.armed.contains(PowerUp::Bumper));
    }

    #[test]
    fn test_ball_settles_and_pays() {
        let mut state = GameState::with_seed(3).unwrap();
        try_drop(&mut state, 1.0, PowerUps::NONE).unwrap();
        let events = run_until_settled(&mut state, 5000);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.multiplier, state.board.slots[event.slot].multiplier);
        assert!((event.payout - event.multiplier).abs() < 1e-9);
        assert!((state.session.balance - (999.0 + event.payout)).abs() < 1e-9);
        assert_eq!(state.session.leaderboard.len(), 1);
    }

    #[test]
    fn test_settled_ball_removed_after_linger() {
        let mut state = GameState::with_seed(3).unwrap();
        try_drop(&mut state, 1.0, PowerUps::NONE).unwrap();
        run_until_settled(&mut state, 5000);
        assert_eq!(state.balls.len(), 1);
        for _ in 0..SETTLE_LINGER_STEPS {
            step(&mut state);
        }
        assert!(state.balls.is_empty());
    }

    #[test]
    fn test_settled_ball_does_not_move() {
        let mut state = GameState::with_seed(3).unwrap();
        let mut ball = Ball::new(1, Vec2::new(0.0, 500.0), Vec2::new(0.0, 3.0), 5.0);
        ball.state = BallState::Settled { slot: 0, linger: 5 };
        let outcome = step_ball(
            &mut ball,
            &mut state.board,
            &PhysicsTuning::default(),
            &mut state.rng,
        );
        assert_eq!(outcome, StepOutcome::Moving);
        assert_eq!(ball.pos, Vec2::new(0.0, 500.0));
    }

    #[test]
    fn test_explode_destroys_first_peg_only() {
        let mut state = GameState::with_seed(3).unwrap();
        state.board.pegs = vec![
            Peg { pos: Vec2::new(0.0, 100.0), radius: 5.0 },
            Peg { pos: Vec2::new(0.0, 140.0), radius: 5.0 },
        ];
        let tuning = PhysicsTuning::default();
        let mut ball = Ball::new(1, Vec2::new(0.0, 91.0), Vec2::new(0.0, 1.0), 5.0);
        ball.powerups = PowerUps::NONE.with(PowerUp::Explode);

        step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
        assert_eq!(state.board.pegs[0].radius, 0.0);
        assert!(ball.markers.explode_used);
        // Passed straight through: still moving down
        assert!(ball.vel.y > 0.0);

        for _ in 0..200 {
            step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
            if !ball.is_falling() {
                break;
            }
        }
        assert_eq!(state.board.pegs[1].radius, 5.0);
        assert_eq!(state.board.active_pegs().count(), 1);
    }

    #[test]
    fn test_destroyed_peg_ignored_by_other_balls() {
        let mut state = GameState::with_seed(3).unwrap();
        state.board.pegs = vec![Peg { pos: Vec2::new(0.0, 100.0), radius: 0.0 }];
        let tuning = PhysicsTuning::default();
        let mut ball = Ball::new(1, Vec2::new(0.0, 91.0), Vec2::new(0.0, 1.0), 5.0);
        let vx_before = ball.vel.x;
        step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
        assert_eq!(ball.vel.x, vx_before);
        assert!(ball.vel.y > 1.0);
    }

    #[test]
    fn test_wind_applies_once() {
        let mut state = GameState::with_seed(3).unwrap();
        state.board.pegs.clear();
        let tuning = PhysicsTuning::default();
        let mid = state.board.wind_line();
        let mut ball = Ball::new(1, Vec2::new(0.0, mid + 1.0), Vec2::new(0.0, 1.0), 5.0);
        ball.powerups = PowerUps::NONE.with(PowerUp::Wind);
        step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
        assert!(ball.markers.wind_applied);
        let vx = ball.vel.x;
        assert!(vx.abs() > 0.7);
        step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
        assert!(ball.vel.x.abs() <= vx.abs());
    }

    #[test]
    fn test_magnet_pulls_toward_best_slot() {
        let mut state = GameState::with_seed(3).unwrap();
        state.board.pegs.clear();
        let n = state.board.slots.len();
        let mut table = vec![0.5; n];
        table[n - 1] = 20.0;
        state.board.apply_multipliers(&table);
        let tuning = PhysicsTuning::default();
        let mut ball = Ball::new(1, Vec2::new(0.0, 70.0), Vec2::ZERO, 5.0);
        ball.powerups = PowerUps::NONE.with(PowerUp::Magnet);
        step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
        assert!(ball.vel.x > 0.0);
    }

    #[test]
    fn test_slow_reduces_gravity() {
        let mut state = GameState::with_seed(3).unwrap();
        state.board.pegs.clear();
        let tuning = PhysicsTuning::default();
        let mut normal = Ball::new(1, Vec2::new(0.0, 70.0), Vec2::ZERO, 5.0);
        let mut slow = normal.clone();
        slow.powerups = PowerUps::NONE.with(PowerUp::Slow);
        step_ball(&mut normal, &mut state.board, &tuning, &mut state.rng);
        step_ball(&mut slow, &mut state.board, &tuning, &mut state.rng);
        assert!(slow.vel.y < normal.vel.y);
    }

    #[test]
    fn test_ball_stays_inside_walls() {
        let mut state = GameState::with_seed(11).unwrap();
        state.board.pegs.clear();
        let tuning = PhysicsTuning::default();
        let frame = state.board.frame;
        let mut ball = Ball::new(1, Vec2::new(0.0, 80.0), Vec2::new(-6.0, 0.0), 5.0);
        for _ in 0..400 {
            step_ball(&mut ball, &mut state.board, &tuning, &mut state.rng);
            let d = (ball.pos - frame.top_left).dot(frame.left_normal);
            assert!(d >= ball.radius - 1e-3);
            if !ball.is_falling() {
                break;
            }
        }
        assert!(!ball.is_falling());
    }

    #[test]
    fn test_tick_clamps_frame_time() {
        let mut state = GameState::with_seed(3).unwrap();
        tick(&mut state, 10_000.0);
        assert!(state.time_steps <= MAX_SUBSTEPS as u64);
        assert!(state.time_steps >= 5);
        tick(&mut state, f64::NAN);
        tick(&mut state, -50.0);
        assert!(state.time_steps <= 2 * MAX_SUBSTEPS as u64);
    }

    #[test]
    fn test_auto_play_drops_on_interval() {
        let mut state = GameState::with_seed(3).unwrap();
        state.set_auto_play(true);
        for _ in 0..60 {
            step(&mut state);
        }
        // 1 second of play at a 260 ms cadence
        let dropped = state.next_entity_id() - 1;
        assert_eq!(dropped, 3);
    }

    #[test]
    fn test_streak_grows_on_high_multiplier() {
        let mut state = GameState::with_seed(3).unwrap();
        let n = state.board.slots.len();
        state.board.apply_multipliers(&vec![6.0; n]);
        try_drop(&mut state, 1.0, PowerUps::NONE).unwrap();
        try_drop(&mut state, 1.0, PowerUps::NONE).unwrap();
        let events = run_until_settled(&mut state, 5000);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].streak, 2);
        assert_eq!(events[1].streak_factor, 2);
        assert_eq!(events[1].payout, 12.0);
    }

    #[test]
    fn test_determinism() {
        let run = |seed| {
            let mut state = GameState::with_seed(seed).unwrap();
            state
                .configure_board(10, Pattern::Sparse, Spacing::default())
                .unwrap();
            for _ in 0..5 {
                try_drop(&mut state, 1.0, PowerUps::NONE.with(PowerUp::Wind)).unwrap();
            }
            let events = run_until_settled(&mut state, 5000);
            (
                state.board.pegs.clone(),
                events.iter().map(|e| e.slot).collect::<Vec<_>>(),
                state.session.balance,
            )
        };
        assert_eq!(run(42), run(42));
    }
}
