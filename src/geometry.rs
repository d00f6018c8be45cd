const MIN_NORM: f32 = 1e-6;

/// Angle in degrees at vertex `b` between the rays `b -> a` and `b -> c`,
/// folded into `[0, 180]`. Non-finite results collapse to `0.0`.
pub fn angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let radians = (c.1 - b.1).atan2(c.0 - b.0) - (a.1 - b.1).atan2(a.0 - b.0);
    let mut degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }
    finite_or_zero(degrees)
}

/// Maps a normalized point into pixel space. Coordinates are clamped to the
/// frame and non-finite values become `0.0`.
pub fn normalized_to_pixel(point: (f32, f32), width: u32, height: u32) -> (f32, f32) {
    let x = finite_or_zero(point.0.clamp(0.0, 1.0));
    let y = finite_or_zero(point.1.clamp(0.0, 1.0));
    (x * width as f32, y * height as f32)
}

pub fn lerp(from: (f32, f32), to: (f32, f32), t: f32) -> (f32, f32) {
    (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
}

/// Angle in degrees between straight up (image `(0, -1)`) and the vector
/// `origin -> target`. Returns `0.0` when the points coincide.
pub fn angle_from_vertical(origin: (f32, f32), target: (f32, f32)) -> f32 {
    let v = sub(target, origin);
    let len = norm(v);
    if len <= MIN_NORM {
        return 0.0;
    }
    let up = (0.0, -1.0);
    finite_or_zero(cross(up, v).abs().atan2(dot(up, v)).to_degrees())
}

fn sub(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    (a.0 - b.0, a.1 - b.1)
}

fn dot(a: (f32, f32), b: (f32, f32)) -> f32 {
    a.0 * b.0 + a.1 * b.1
}

fn cross(a: (f32, f32), b: (f32, f32)) -> f32 {
    a.0 * b.1 - a.1 * b.0
}

fn norm(v: (f32, f32)) -> f32 {
    (v.0 * v.0 + v.1 * v.1).sqrt()
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}
