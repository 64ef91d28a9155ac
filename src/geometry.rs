//! Pure collision-prediction math over entity kinematics.
//!
//! Everything here works on IEEE doubles and never returns NaN: a
//! prediction that cannot be made is reported as positive infinity
//! ("no event") or `None`.

use cgmath::{InnerSpace, Point2};

use crate::entity::Entity;

/// Time until the discs of `a` and `b` first touch.
///
/// Solves |Δp + Δv·t| = r_a + r_b for the smaller root:
///
/// ```text
/// d = (Δv·Δp)² − (Δv·Δv)·(Δp·Δp − σ²)
/// t = −(Δv·Δp + √d) / (Δv·Δv)
/// ```
///
/// Returns positive infinity when the entities are separating
/// (Δv·Δp ≥ 0) or their paths never close the gap (d ≤ 0). A pair
/// already in apparent contact and still approaching yields a small
/// negative time; callers clamp it to zero.
pub fn time_to_collision(a: &Entity, b: &Entity) -> f64 {
    let dp = b.position() - a.position();
    let dv = b.velocity() - a.velocity();
    let sigma = a.radius() + b.radius();

    let vr = dv.dot(dp);
    if vr >= 0.0 {
        return f64::INFINITY;
    }
    let vv = dv.dot(dv);
    let d = vr * vr - vv * (dp.dot(dp) - sigma * sigma);
    if d <= 0.0 {
        return f64::INFINITY;
    }
    let t = -((vr + d.sqrt()) / vv);
    if t.is_nan() {
        f64::INFINITY
    } else {
        t
    }
}

/// Times until the entity reaches the nearest vertical and horizontal
/// wall, each independently derived from the sign of the velocity
/// component on that axis.
fn wall_times(entity: &Entity, width: f64, height: f64) -> (f64, f64) {
    let p = entity.position();
    let v = entity.velocity();
    let r = entity.radius();

    let tx = if v.x > 0.0 {
        (width - p.x - r) / v.x
    } else if v.x < 0.0 {
        (p.x - r) / -v.x
    } else {
        f64::INFINITY
    };
    let ty = if v.y > 0.0 {
        (height - p.y - r) / v.y
    } else if v.y < 0.0 {
        (p.y - r) / -v.y
    } else {
        f64::INFINITY
    };
    (tx.max(0.0), ty.max(0.0))
}

/// Time until the entity's disc touches a boundary of a `width` × `height`
/// world. Positive infinity when the entity sits outside the boundaries or
/// is at rest.
pub fn time_to_boundary(entity: &Entity, width: f64, height: f64) -> f64 {
    if !entity.within_boundaries(width, height) {
        return f64::INFINITY;
    }
    let (tx, ty) = wall_times(entity, width, height);
    let t = tx.min(ty);
    if t.is_nan() {
        f64::INFINITY
    } else {
        t
    }
}

/// Contact point of the predicted collision between two discs: both
/// centres extrapolated to the time of impact, then offset from `a`'s
/// centre by its radius along the connecting line.
pub fn collision_point(a: &Entity, b: &Entity) -> Option<Point2<f64>> {
    let t = time_to_collision(a, b);
    if !t.is_finite() {
        return None;
    }
    let t = t.max(0.0);
    let pa = a.position() + a.velocity() * t;
    let pb = b.position() + b.velocity() * t;
    let line = pb - pa;
    let length = line.magnitude();
    if length == 0.0 {
        return Some(pa);
    }
    Some(pa + line * (a.radius() / length))
}

/// Point where the entity's disc will touch a world boundary: the centre
/// extrapolated to the time of impact, pushed onto the struck wall by the
/// radius.
pub fn boundary_collision_point(entity: &Entity, width: f64, height: f64) -> Option<Point2<f64>> {
    let t = time_to_boundary(entity, width, height);
    if !t.is_finite() {
        return None;
    }
    let v = entity.velocity();
    let r = entity.radius();
    let mut p = entity.position() + v * t;
    let (tx, ty) = wall_times(entity, width, height);
    if tx < ty {
        p.x += if v.x > 0.0 { r } else { -r };
    } else {
        p.y += if v.y > 0.0 { r } else { -r };
    }
    Some(p)
}
