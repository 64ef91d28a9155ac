//! Collision resolution: what actually happens when a predicted contact
//! is reached.
//!
//! Resolution only ever flips `destroyed` flags and adjusts kinematics;
//! removal from the world happens in the sweep that follows, so the
//! membership set is never mutated while an event is being resolved.

use cgmath::InnerSpace;

use crate::entity::{Entity, EntityClass};
use crate::world::{Collider, EntityKey, World};
use crate::EPSILON;

/// Entity classes without their payloads, for pair dispatch
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    Ship,
    Bullet,
    Asteroid,
    Planetoid,
}

fn kind(entity: &Entity) -> Kind {
    match entity.class() {
        EntityClass::Ship(_) => Kind::Ship,
        EntityClass::Bullet(_) => Kind::Bullet,
        EntityClass::Asteroid => Kind::Asteroid,
        EntityClass::Planetoid(_) => Kind::Planetoid,
    }
}

/// Apply the per-pair collision rules to an entity and whatever it hit
pub(crate) fn resolve(world: &mut World, entity: EntityKey, with: Collider) {
    match with {
        Collider::Boundary => boundary(world, entity),
        Collider::Entity(other) => pair(world, entity, other),
    }
}

fn pair(world: &mut World, a: EntityKey, b: EntityKey) {
    let kinds = match (world.entity(a), world.entity(b)) {
        (Some(ea), Some(eb)) => (kind(ea), kind(eb)),
        _ => {
            warn!("collision between missing entities {:?} and {:?}", a, b);
            return;
        }
    };
    match kinds {
        (Kind::Ship, Kind::Ship) => elastic_bounce(world, a, b),
        (Kind::Asteroid, Kind::Asteroid)
        | (Kind::Asteroid, Kind::Planetoid)
        | (Kind::Planetoid, Kind::Asteroid)
        | (Kind::Planetoid, Kind::Planetoid) => elastic_bounce(world, a, b),
        (Kind::Ship, Kind::Bullet) => ship_and_bullet(world, a, b),
        (Kind::Bullet, Kind::Ship) => ship_and_bullet(world, b, a),
        (Kind::Bullet, Kind::Bullet) => destroy_both(world, a, b),
        (Kind::Bullet, Kind::Asteroid | Kind::Planetoid)
        | (Kind::Asteroid | Kind::Planetoid, Kind::Bullet) => destroy_both(world, a, b),
        (Kind::Ship, Kind::Asteroid) => destroy(world, a),
        (Kind::Asteroid, Kind::Ship) => destroy(world, b),
        (Kind::Ship, Kind::Planetoid) => teleport_ship(world, a),
        (Kind::Planetoid, Kind::Ship) => teleport_ship(world, b),
    }
}

fn destroy(world: &mut World, key: EntityKey) {
    if let Some(entity) = world.entity_mut(key) {
        entity.destroy();
    }
}

fn destroy_both(world: &mut World, a: EntityKey, b: EntityKey) {
    destroy(world, a);
    destroy(world, b);
}

/// Elastic momentum exchange between two discs of equal mass sum.
///
/// With Δp the centre line and σ the radius sum at contact:
///
/// ```text
/// J = 2·m₁·m₂·(Δv·Δp) / ((m₁+m₂)·σ)
/// ```
///
/// and each body receives J·Δp/σ scaled by its inverse mass, with
/// opposite signs.
fn elastic_bounce(world: &mut World, a: EntityKey, b: EntityKey) {
    let (pa, va, ma) = match world.entity(a) {
        Some(e) => (e.position(), e.velocity(), e.mass()),
        None => return,
    };
    let (pb, vb, mb) = match world.entity(b) {
        Some(e) => (e.position(), e.velocity(), e.mass()),
        None => return,
    };
    let dp = pb - pa;
    let dv = vb - va;
    let sigma = dp.magnitude();
    if sigma < EPSILON {
        return;
    }
    let j = 2.0 * ma * mb * dv.dot(dp) / ((ma + mb) * sigma);
    let impulse = dp * (j / sigma);

    let new_va = va + impulse / ma;
    let new_vb = vb - impulse / mb;
    if let Some(e) = world.entity_mut(a) {
        e.set_velocity(new_va.x, new_va.y);
    }
    if let Some(e) = world.entity_mut(b) {
        e.set_velocity(new_vb.x, new_vb.y);
    }
}

/// A ship meeting its own bullet swallows it back into the magazine;
/// any other bullet kills both.
fn ship_and_bullet(world: &mut World, ship: EntityKey, bullet: EntityKey) {
    let own = world
        .entity(bullet)
        .and_then(Entity::bullet)
        .map_or(false, |b| b.source == Some(ship));
    if !own {
        destroy_both(world, ship, bullet);
        return;
    }
    let mut caught = match world.take_entity(bullet) {
        Some(b) => b,
        None => return,
    };
    let centre = match world.entity(ship) {
        Some(e) => e.position(),
        None => {
            // the ship vanished between prediction and resolution; the
            // bullet stays destroyed rather than leaked
            caught.destroy();
            return;
        }
    };
    if caught.set_position(centre.x, centre.y).is_err() {
        warn!("caught bullet could not be repositioned");
    }
    if let Some(b) = caught.bullet_mut() {
        b.bounce_count = 0;
        b.loaded_into = Some(ship);
    }
    if let Some(s) = world.entity_mut(ship).and_then(Entity::ship_mut) {
        s.magazine.push(caught);
    }
}

/// A planetoid throws the ship to a uniformly random spot in the world;
/// a spot already claimed by another entity destroys the ship instead.
fn teleport_ship(world: &mut World, ship: EntityKey) {
    let radius = match world.entity(ship) {
        Some(e) => e.radius(),
        None => return,
    };
    let target = match world.random_position(radius) {
        Some(p) => p,
        None => {
            destroy(world, ship);
            return;
        }
    };
    if let Some(e) = world.entity_mut(ship) {
        if e.set_position(target.x, target.y).is_err() {
            warn!("teleport produced an invalid position for {:?}", ship);
            return;
        }
    }
    debug!("teleported {:?} to ({}, {})", ship, target.x, target.y);
    let overlapping = {
        let e = match world.entity(ship) {
            Some(e) => e,
            None => return,
        };
        world
            .entities()
            .any(|(key, other)| key != ship && other.significant_overlap(e))
    };
    if overlapping {
        destroy(world, ship);
    }
}

/// Reflect the entity off the nearest wall; corner ties reflect both
/// axes. Bullets count their bounces and die on the third.
fn boundary(world: &mut World, key: EntityKey) {
    let (position, velocity, radius) = match world.entity(key) {
        Some(e) => (e.position(), e.velocity(), e.radius()),
        None => return,
    };
    let left = position.x - radius;
    let right = world.width() - position.x - radius;
    let bottom = position.y - radius;
    let top = world.height() - position.y - radius;
    let nearest = left.min(right).min(bottom).min(top);

    let vertical = (left - nearest).abs() < EPSILON || (right - nearest).abs() < EPSILON;
    let horizontal = (bottom - nearest).abs() < EPSILON || (top - nearest).abs() < EPSILON;
    let mut v = velocity;
    if vertical {
        v.x = -v.x;
    }
    if horizontal {
        v.y = -v.y;
    }

    let mut spent = false;
    if let Some(b) = world.entity_mut(key).and_then(Entity::bullet_mut) {
        b.bounce_count += 1;
        spent = b.bounce_count >= 3;
    }
    if let Some(e) = world.entity_mut(key) {
        if spent {
            e.destroy();
        } else {
            e.set_velocity(v.x, v.y);
        }
    }
}
