//! Collision Detection
//!
//! Axis-aligned bounding-box tests shared by the arcade games, plus the
//! angular arc test used by the helix tower.

use crate::core::vec2::Rect;

/// Strict overlap: touching edges do not count.
///
/// Used where sprites must actually interpenetrate (flappy pipes, dino
/// obstacles, breakout blocks).
#[inline]
pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.x < b.right() && a.right() > b.x && a.y < b.bottom() && a.bottom() > b.y
}

/// Inclusive overlap: touching edges count as contact.
///
/// Used for paddles so a ball resting on the paddle edge still bounces.
#[inline]
pub fn rects_touch(a: &Rect, b: &Rect) -> bool {
    a.x <= b.right() && a.right() >= b.x && a.y <= b.bottom() && a.bottom() >= b.y
}

/// Deflection for a ball hitting a paddle.
///
/// `hit` is the ball centre projected onto the paddle axis, `start` the
/// paddle's leading edge and `len` its length. Returns a value in
/// `[-4, 4]`: zero at the paddle centre, steeper toward the ends.
#[inline]
pub fn paddle_spin(hit: f32, start: f32, len: f32) -> f32 {
    let relative = ((hit - start) / len).clamp(0.0, 1.0);
    (relative - 0.5) * 8.0
}

/// Wrap an angle in degrees into `[0, 360)`.
#[inline]
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negatives
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Whether `angle` lies within the arc `[start, start + len)`, all in degrees.
#[inline]
pub fn angle_in_arc(angle: f32, start: f32, len: f32) -> bool {
    let offset = normalize_degrees(angle - start);
    offset < len
}
