//! Pointer movement synthesis.
//!
//! A target is drawn around the current position and clamped to the screen.
//! With smooth motion the pointer glides there along an eased S-curve with a
//! slight random bow, the way a hand drifts rather than teleports.

use rand::Rng;
use std::f64::consts::PI;
use std::time::Duration;

/// Fewest intermediate positions on a smooth path.
pub const MIN_PATH_STEPS: usize = 15;
/// Most intermediate positions on a smooth path.
pub const MAX_PATH_STEPS: usize = 80;
/// Longest pause between two path positions.
const MAX_STEP_PAUSE_MS: u64 = 5;
/// Upper bound on the time a smooth path takes.
pub const MAX_PATH_DURATION: Duration =
    Duration::from_millis(MAX_PATH_STEPS as u64 * MAX_STEP_PAUSE_MS);

/// One absolute pointer position plus the pause to take after reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waypoint {
    pub x: i32,
    pub y: i32,
    pub pause: Duration,
}

/// Clamp a position into `[0, width) x [0, height)`.
///
/// `bounds` must be non-empty on both axes.
pub fn clamp_to_screen(x: i64, y: i64, bounds: (u32, u32)) -> (i32, i32) {
    let max_x = i64::from(bounds.0).saturating_sub(1).max(0);
    let max_y = i64::from(bounds.1).saturating_sub(1).max(0);
    (x.clamp(0, max_x) as i32, y.clamp(0, max_y) as i32)
}

/// Draw `dx, dy` independently from `[-range, range]` and return the clamped
/// destination.
pub fn pick_target<R: Rng + ?Sized>(
    rng: &mut R,
    from: (i32, i32),
    range: u32,
    bounds: (u32, u32),
) -> (i32, i32) {
    let r = i64::from(range);
    let dx = rng.random_range(-r..=r);
    let dy = rng.random_range(-r..=r);
    clamp_to_screen(i64::from(from.0) + dx, i64::from(from.1) + dy, bounds)
}

/// Path from `from` to `to`. The last waypoint is exactly `to` and has no pause.
///
/// Without `smooth`, the path is the target alone.
pub fn plan_path<R: Rng + ?Sized>(
    rng: &mut R,
    from: (i32, i32),
    to: (i32, i32),
    bounds: (u32, u32),
    smooth: bool,
) -> Vec<Waypoint> {
    let last = Waypoint {
        x: to.0,
        y: to.1,
        pause: Duration::ZERO,
    };
    let dx = f64::from(to.0) - f64::from(from.0);
    let dy = f64::from(to.1) - f64::from(from.1);
    let distance = dx.hypot(dy);
    if !smooth || distance < 1.0 {
        return vec![last];
    }

    let steps = ((distance / 1.5) as usize).clamp(MIN_PATH_STEPS, MAX_PATH_STEPS);
    let bow = rng.random_range(-0.3..0.3);
    // Unit normal to the straight line.
    let (nx, ny) = (-dy / distance, dx / distance);

    let mut path = Vec::with_capacity(steps);
    for i in 1..steps {
        let progress = i as f64 / steps as f64;
        let eased = ease_in_out(progress);
        let offset = (progress * PI).sin() * bow * distance;
        let x = f64::from(from.0) + dx * eased + nx * offset;
        let y = f64::from(from.1) + dy * eased + ny * offset;
        let (x, y) = clamp_to_screen(x.round() as i64, y.round() as i64, bounds);

        // Slower at both ends of the stroke.
        let edge = i < steps / 4 || i > steps * 3 / 4;
        let pause_ms = rng.random_range(1..=3) + if edge { 2 } else { 0 };
        path.push(Waypoint {
            x,
            y,
            pause: Duration::from_millis(pause_ms),
        });
    }
    path.push(last);
    path
}

/// Quadratic ease-in-out: slow, fast, slow.
fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - 2.0 * (1.0 - t) * (1.0 - t)
    }
}
