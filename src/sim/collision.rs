//! Collision detection and response
//!
//! Two kinds of contact: a ball against one of the slanted frame walls (an
//! infinite line given by an anchor point and an inward normal) and a ball
//! against a circular peg.

use glam::Vec2;

use super::board::Peg;

/// Extra separation added when pushing a ball off a peg
pub const PEG_SEPARATION: f32 = 0.004;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Surface normal at contact (pointing toward ball center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Coefficients for one contact response
#[derive(Debug, Clone, Copy)]
pub struct Response {
    /// Fraction of inward normal speed returned
    pub restitution: f32,
    /// Fraction of tangential speed kept
    pub tangential: f32,
    /// Downward speed floor after the contact
    pub min_vy: f32,
}

/// Check a ball against a wall line through `anchor` with inward `normal`
pub fn ball_wall_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    anchor: Vec2,
    normal: Vec2,
) -> CollisionResult {
    let dist = (ball_pos - anchor).dot(normal);
    let penetration = ball_radius - dist;
    if penetration > 0.0 {
        return CollisionResult {
            hit: true,
            normal,
            penetration,
        };
    }
    CollisionResult::miss()
}

/// Check a ball against a peg. Destroyed pegs never collide.
pub fn ball_peg_collision(ball_pos: Vec2, ball_radius: f32, peg: &Peg) -> CollisionResult {
    if !peg.is_active() {
        return CollisionResult::miss();
    }
    let delta = ball_pos - peg.pos;
    let dist = delta.length();
    let min_dist = ball_radius + peg.radius;
    if dist >= min_dist {
        return CollisionResult::miss();
    }

    // Coincident centers: push straight up
    let normal = if dist > f32::EPSILON {
        delta / dist
    } else {
        Vec2::NEG_Y
    };
    CollisionResult {
        hit: true,
        normal,
        penetration: min_dist - dist,
    }
}

/// Split velocity into (normal, tangential) speeds
#[inline]
fn decompose(velocity: Vec2, normal: Vec2) -> (f32, f32, Vec2) {
    let tangent = normal.perp();
    (velocity.dot(normal), velocity.dot(tangent), tangent)
}

/// Respond to a wall contact: push out, bounce the inward normal component,
/// damp the tangential one, keep the ball moving down.
pub fn resolve_wall(pos: &mut Vec2, vel: &mut Vec2, hit: &CollisionResult, response: Response) {
    *pos += hit.normal * hit.penetration;

    let (vn, vt, tangent) = decompose(*vel, hit.normal);
    let vn = if vn < 0.0 { -vn * response.restitution } else { vn };
    *vel = hit.normal * vn + tangent * (vt * response.tangential);

    if vel.y < response.min_vy {
        vel.y = response.min_vy;
    }
}

/// Respond to a peg contact: push out past the overlap, bounce the inward
/// normal component and damp the tangential one.
///
/// Jitter, speed clamping and the vertical floor are applied by the caller
/// so the RNG stays out of this module.
pub fn resolve_peg(pos: &mut Vec2, vel: &mut Vec2, hit: &CollisionResult, response: Response) {
    *pos += hit.normal * (hit.penetration + PEG_SEPARATION);

    let vn = vel.dot(hit.normal);
    if vn < 0.0 {
        *vel -= (1.0 + response.restitution) * vn * hit.normal;
    }

    let (vn, vt, tangent) = decompose(*vel, hit.normal);
    *vel = tangent * (vt * response.tangential) + hit.normal * vn;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: Response = Response {
        restitution: 0.5,
        tangential: 0.88,
        min_vy: 0.12,
    };

    #[test]
    fn test_wall_collision_hit_and_miss() {
        let anchor = Vec2::new(0.0, 0.0);
        let normal = Vec2::X;
        assert!(!ball_wall_collision(Vec2::new(10.0, 5.0), 5.0, anchor, normal).hit);
        let hit = ball_wall_collision(Vec2::new(3.0, 5.0), 5.0, anchor, normal);
        assert!(hit.hit);
        assert!((hit.penetration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_wall_response_pushes_out_and_bounces() {
        let anchor = Vec2::ZERO;
        let normal = Vec2::X;
        let mut pos = Vec2::new(3.0, 5.0);
        let mut vel = Vec2::new(-2.0, 1.0);
        let hit = ball_wall_collision(pos, 5.0, anchor, normal);
        resolve_wall(&mut pos, &mut vel, &hit, RESPONSE);
        assert!((pos.x - 5.0).abs() < 1e-5);
        assert!((vel.x - 1.0).abs() < 1e-5);
        assert!(vel.y >= RESPONSE.min_vy);
    }

    #[test]
    fn test_wall_response_floors_vertical_speed() {
        let mut pos = Vec2::new(3.0, 5.0);
        let mut vel = Vec2::new(-1.0, -3.0);
        let hit = ball_wall_collision(pos, 5.0, Vec2::ZERO, Vec2::X);
        resolve_wall(&mut pos, &mut vel, &hit, RESPONSE);
        assert_eq!(vel.y, RESPONSE.min_vy);
    }

    #[test]
    fn test_destroyed_peg_never_collides() {
        let mut peg = Peg {
            pos: Vec2::ZERO,
            radius: 5.0,
        };
        assert!(ball_peg_collision(Vec2::new(1.0, 1.0), 5.0, &peg).hit);
        peg.destroy();
        assert!(!ball_peg_collision(Vec2::new(1.0, 1.0), 5.0, &peg).hit);
    }

    #[test]
    fn test_peg_response_leaves_no_penetration() {
        let peg = Peg {
            pos: Vec2::new(10.0, 10.0),
            radius: 5.0,
        };
        for (dx, dy) in [(3.0, -4.0), (-1.0, -0.5), (0.0, 0.0), (6.0, 2.0), (-7.0, 1.0)] {
            let mut pos = peg.pos + Vec2::new(dx, dy);
            let mut vel = Vec2::new(0.3, 2.0);
            let hit = ball_peg_collision(pos, 5.0, &peg);
            assert!(hit.hit);
            resolve_peg(&mut pos, &mut vel, &hit, RESPONSE);
            assert!(pos.distance(peg.pos) >= 10.0);
        }
    }

    #[test]
    fn test_peg_response_reflects_only_inward_motion() {
        let peg = Peg {
            pos: Vec2::ZERO,
            radius: 5.0,
        };
        // Ball above the peg moving away (upward): normal component kept
        let mut pos = Vec2::new(0.0, -9.0);
        let mut vel = Vec2::new(0.0, -1.0);
        let hit = ball_peg_collision(pos, 5.0, &peg);
        resolve_peg(&mut pos, &mut vel, &hit, RESPONSE);
        assert!((vel.y + 1.0).abs() < 1e-5);

        // Ball above the peg falling onto it: bounces up at half speed
        let mut pos = Vec2::new(0.0, -9.0);
        let mut vel = Vec2::new(0.0, 2.0);
        resolve_peg(&mut pos, &mut vel, &hit, RESPONSE);
        assert!((vel.y + 1.0).abs() < 1e-5);
    }
}
