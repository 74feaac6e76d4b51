//! Rate-limited shortest-arc turning toward a world-space direction.

use glam::{DQuat, DVec3};

use crate::quat::{QuatExt, from_axis_angle};
use crate::vec3::{Vec3Ext, clamp_unit};

/// Below this, a sine or projected length counts as zero.
const SIN_EPS: f64 = 1e-9;
/// Steps smaller than this are skipped.
const STEP_EPS: f64 = 1e-6;

/// Turn `current` so that `forward_local` swings toward `desired_world_dir`
/// by at most `max_step` radians, then optionally roll toward `world_up` by
/// at most `roll_rate` radians.
///
/// Both turns are world-axis rotations (pre-multiplied). When the current
/// and desired forwards are aligned or exactly opposed no turn is applied
/// this call. The result is canonical.
pub fn shortest_arc_step(
    current: DQuat,
    forward_local: DVec3,
    desired_world_dir: DVec3,
    max_step: f64,
    world_up: DVec3,
    roll_rate: f64,
) -> DQuat {
    let f_cur = current.rotate(forward_local);
    let f_des = desired_world_dir.normalized_or_self();

    let axis = f_cur.cross(f_des);
    let sin_a = axis.length();
    let cos_a = clamp_unit(f_cur.dot(f_des));
    let angle = sin_a.atan2(cos_a);

    let mut q = current;
    let step = angle.min(max_step);
    if step > STEP_EPS && sin_a > SIN_EPS {
        q = (from_axis_angle(axis / sin_a, step) * q).canonicalized();
    }

    if roll_rate > 0.0 {
        q = roll_toward_up(q, forward_local, world_up, roll_rate);
    }

    q.canonicalized()
}

/// Roll about the current forward so the local up approaches `world_up`
/// projected onto the plane perpendicular to forward.
fn roll_toward_up(q: DQuat, forward_local: DVec3, world_up: DVec3, roll_rate: f64) -> DQuat {
    let f_now = q.rotate(forward_local).normalized_or_self();
    let up_proj = world_up - f_now * world_up.dot(f_now);
    let up_proj_len = up_proj.length();
    if up_proj_len <= SIN_EPS {
        // Forward is parallel to world up; roll is undefined.
        return q;
    }
    let up_proj = up_proj / up_proj_len;

    let u_now = q.rotate(DVec3::Y);
    let u_now = u_now - f_now * u_now.dot(f_now);
    let u_now_len = u_now.length();
    if u_now_len <= SIN_EPS {
        return q;
    }
    let u_now = u_now / u_now_len;

    let cross = u_now.cross(up_proj);
    let sin_r = cross.length();
    if sin_r <= SIN_EPS {
        // Already level, or exactly upside down: nothing to pick a side from.
        return q;
    }
    let mut roll_err = sin_r.atan2(clamp_unit(u_now.dot(up_proj)));
    if cross.dot(f_now) < 0.0 {
        roll_err = -roll_err;
    }

    let roll_step = roll_err.signum() * roll_err.abs().min(roll_rate);
    if roll_step.abs() <= STEP_EPS {
        return q;
    }
    (from_axis_angle(f_now, roll_step) * q).canonicalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quat::{QI, angle_between};
    use std::f64::consts::{FRAC_PI_2, PI};

    fn same_rotation(a: DQuat, b: DQuat) -> bool {
        (a - b).length() < 1e-9 || (a + b).length() < 1e-9
    }

    fn forward_angle(a: DQuat, b: DQuat) -> f64 {
        let fa = a.rotate(DVec3::Z);
        let fb = b.rotate(DVec3::Z);
        fa.cross(fb).length().atan2(clamp_unit(fa.dot(fb)))
    }

    #[test]
    fn aligned_target_leaves_rotation_unchanged() {
        let q = from_axis_angle(DVec3::new(0.3, 1.0, 0.2), 0.8).canonicalized();
        let fwd = q.rotate(DVec3::Z);
        let out = shortest_arc_step(q, DVec3::Z, fwd * 4.0, 0.1, DVec3::Y, 0.0);
        assert!(same_rotation(q, out));
    }

    #[test]
    fn step_never_exceeds_limit() {
        let targets = [
            DVec3::X,
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(-0.2, 0.4, -1.0),
            DVec3::new(0.0, -1.0, 0.01),
        ];
        for max_step in [0.01, 0.1, 0.5] {
            for target in targets {
                let out = shortest_arc_step(QI, DVec3::Z, target, max_step, DVec3::Y, 0.0);
                assert!(forward_angle(QI, out) <= max_step + 1e-9);
            }
        }
    }

    #[test]
    fn small_error_is_closed_in_one_step() {
        let target = from_axis_angle(DVec3::Y, 0.05).rotate(DVec3::Z);
        let out = shortest_arc_step(QI, DVec3::Z, target, 0.1, DVec3::Y, 0.0);
        assert!((out.rotate(DVec3::Z) - target).length() < 1e-9);
    }

    #[test]
    fn opposed_target_is_a_noop() {
        let out = shortest_arc_step(QI, DVec3::Z, -DVec3::Z, 0.3, DVec3::Y, 0.0);
        assert_eq!(out, QI);
    }

    #[test]
    fn zero_direction_is_a_noop() {
        let out = shortest_arc_step(QI, DVec3::Z, DVec3::ZERO, 0.3, DVec3::Y, 0.0);
        assert_eq!(out, QI);
    }

    #[test]
    fn repeated_steps_converge() {
        let target = DVec3::new(1.0, 0.5, -0.3);
        let mut q = QI;
        for _ in 0..200 {
            q = shortest_arc_step(q, DVec3::Z, target, 0.05, DVec3::Y, 0.0);
            assert!((q.length() - 1.0).abs() < 1e-9);
            assert!(q.w >= 0.0);
        }
        let fwd = q.rotate(DVec3::Z);
        assert!((fwd - target.normalize()).length() < 1e-6);
    }

    #[test]
    fn roll_is_limited_and_levels_over_time() {
        // Rolled 90 degrees about forward: local up points along world -X.
        let mut q = from_axis_angle(DVec3::Z, FRAC_PI_2);
        let before = q;
        q = shortest_arc_step(q, DVec3::Z, DVec3::Z, 0.0, DVec3::Y, 0.1);
        assert!((angle_between(before, q) - 0.1).abs() < 1e-9);

        for _ in 0..100 {
            q = shortest_arc_step(q, DVec3::Z, DVec3::Z, 0.0, DVec3::Y, 0.1);
        }
        assert!((q.rotate(DVec3::Y) - DVec3::Y).length() < 1e-6);
        assert!((q.rotate(DVec3::Z) - DVec3::Z).length() < 1e-9);
    }

    #[test]
    fn roll_skipped_when_forward_is_vertical() {
        let q = from_axis_angle(DVec3::X, -FRAC_PI_2);
        assert!((q.rotate(DVec3::Z) - DVec3::Y).length() < 1e-12);
        let out = shortest_arc_step(q, DVec3::Z, DVec3::Y, 0.1, DVec3::Y, 0.5);
        assert!(same_rotation(q, out));
    }

    #[test]
    fn half_turn_away_needs_many_steps() {
        let target = DVec3::new(0.001, 0.0, -1.0);
        let out = shortest_arc_step(QI, DVec3::Z, target, 0.2, DVec3::Y, 0.0);
        assert!((forward_angle(QI, out) - 0.2).abs() < 1e-9);
        assert!(forward_angle(out, from_axis_angle(DVec3::Y, PI)) > 0.2);
    }
}
