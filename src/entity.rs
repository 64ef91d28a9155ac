use cgmath::*;

use crate::error::{Error, Result};
use crate::ship::Ship;
use crate::world::EntityKey;

/// Speed cap shared by every entity class
pub const MAX_SPEED: f64 = 300_000.0;

pub const SHIP_MIN_RADIUS: f64 = 10.0;
pub const BULLET_MIN_RADIUS: f64 = 1.0;
pub const MINOR_PLANET_MIN_RADIUS: f64 = 5.0;

pub const SHIP_MIN_DENSITY: f64 = 1.42e12;
pub const BULLET_DENSITY: f64 = 7.8e12;
pub const ASTEROID_DENSITY: f64 = 2.65e12;
pub const PLANETOID_DENSITY: f64 = 0.917e12;

/// Fraction of the distance a planetoid travels that its radius loses
const PLANETOID_SHRINK_RATE: f64 = 1.0e-6;

/// Bullet state beyond the shared kinematics.
#[derive(Debug, Default)]
pub struct Bullet {
    /// World-boundary hits so far; the third one destroys the bullet
    pub bounce_count: u32,
    /// The ship that fired this bullet, if it was ever fired
    pub source: Option<EntityKey>,
    /// The ship whose magazine currently holds this bullet
    pub loaded_into: Option<EntityKey>,
}

/// Planetoid state: the radius erodes as the body travels.
#[derive(Debug)]
pub struct Planetoid {
    pub initial_radius: f64,
    pub distance_travelled: f64,
}

/// The type of entity, with per-class state attached
#[derive(Debug)]
pub enum EntityClass {
    Ship(Ship),
    Bullet(Bullet),
    Asteroid,
    Planetoid(Planetoid),
}

/// Any mobile circular body in a world.
///
/// Entities are constructed free-standing and become world members by
/// being moved into a [`World`](crate::World); the key handed back by
/// `add_entity` is the only handle to a member. Bullets stored in a
/// ship's magazine live inside the ship entity instead, so a bullet can
/// never be in a world and a magazine at once.
#[derive(Debug)]
pub struct Entity {
    class: EntityClass,
    position: Point2<f64>,
    velocity: Vector2<f64>,
    radius: f64,
    /// Radians, kept within [0, 2π]
    orientation: f64,
    mass: f64,
    /// True while `mass` was set by the caller rather than derived from
    /// the radius and class density
    explicit_mass: bool,
    terminated: bool,
    destroyed: bool,
}

impl Entity {
    fn of_class(class: EntityClass, radius: f64) -> Self {
        let mut entity = Self {
            class,
            position: Point2::origin(),
            velocity: Vector2::zero(),
            radius,
            orientation: 0.0,
            mass: 0.0,
            explicit_mass: false,
            terminated: false,
            destroyed: false,
        };
        entity.mass = entity.derived_mass();
        entity
    }

    /// A ship at the origin with the minimum radius and a derived mass
    pub fn new_ship() -> Self {
        Self::of_class(EntityClass::Ship(Ship::new()), SHIP_MIN_RADIUS)
    }

    /// A bullet at the origin, never fired and not loaded anywhere
    pub fn new_bullet() -> Self {
        Self::of_class(EntityClass::Bullet(Bullet::default()), BULLET_MIN_RADIUS)
    }

    pub fn new_asteroid() -> Self {
        Self::of_class(EntityClass::Asteroid, MINOR_PLANET_MIN_RADIUS)
    }

    pub fn new_planetoid() -> Self {
        Self::of_class(
            EntityClass::Planetoid(Planetoid {
                initial_radius: MINOR_PLANET_MIN_RADIUS,
                distance_travelled: 0.0,
            }),
            MINOR_PLANET_MIN_RADIUS,
        )
    }

    pub fn with_position(mut self, position: Point2<f64>) -> Self {
        assert!(Self::is_valid_position(position.x, position.y));
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector2<f64>) -> Self {
        self.set_velocity(velocity.x, velocity.y);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        assert!(self.is_valid_radius(radius));
        self.radius = radius;
        if let EntityClass::Planetoid(p) = &mut self.class {
            p.initial_radius = radius;
        }
        if !self.explicit_mass {
            self.mass = self.derived_mass();
        }
        self
    }

    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.set_orientation(orientation);
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.set_mass(mass);
        self
    }

    /// Pre-load a ship's magazine. The bullets' ownership markers are
    /// filled in when the ship joins a world and gains a key.
    pub fn with_magazine(mut self, bullets: Vec<Entity>) -> Self {
        assert!(bullets.iter().all(Entity::is_bullet));
        match &mut self.class {
            EntityClass::Ship(ship) => ship.magazine = bullets,
            _ => panic!("only ships carry a magazine"),
        }
        self
    }

    pub fn class(&self) -> &EntityClass {
        &self.class
    }

    pub fn is_ship(&self) -> bool {
        matches!(self.class, EntityClass::Ship(_))
    }

    pub fn is_bullet(&self) -> bool {
        matches!(self.class, EntityClass::Bullet(_))
    }

    pub fn is_asteroid(&self) -> bool {
        matches!(self.class, EntityClass::Asteroid)
    }

    pub fn is_planetoid(&self) -> bool {
        matches!(self.class, EntityClass::Planetoid(_))
    }

    pub fn is_minor_planet(&self) -> bool {
        self.is_asteroid() || self.is_planetoid()
    }

    pub fn ship(&self) -> Option<&Ship> {
        match &self.class {
            EntityClass::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn ship_mut(&mut self) -> Option<&mut Ship> {
        match &mut self.class {
            EntityClass::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn bullet(&self) -> Option<&Bullet> {
        match &self.class {
            EntityClass::Bullet(bullet) => Some(bullet),
            _ => None,
        }
    }

    pub fn bullet_mut(&mut self) -> Option<&mut Bullet> {
        match &mut self.class {
            EntityClass::Bullet(bullet) => Some(bullet),
            _ => None,
        }
    }

    pub fn position(&self) -> Point2<f64> {
        self.position
    }

    pub fn velocity(&self) -> Vector2<f64> {
        self.velocity
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Unit vector along the orientation
    pub fn heading(&self) -> Vector2<f64> {
        Vector2::new(self.orientation.cos(), self.orientation.sin())
    }

    pub fn max_speed(&self) -> f64 {
        MAX_SPEED
    }

    pub fn min_radius(&self) -> f64 {
        match self.class {
            EntityClass::Ship(_) => SHIP_MIN_RADIUS,
            EntityClass::Bullet(_) => BULLET_MIN_RADIUS,
            EntityClass::Asteroid | EntityClass::Planetoid(_) => MINOR_PLANET_MIN_RADIUS,
        }
    }

    pub fn min_density(&self) -> f64 {
        match self.class {
            EntityClass::Ship(_) => SHIP_MIN_DENSITY,
            EntityClass::Bullet(_) => BULLET_DENSITY,
            EntityClass::Asteroid => ASTEROID_DENSITY,
            EntityClass::Planetoid(_) => PLANETOID_DENSITY,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Mark the entity for removal; the owning world sweeps destroyed
    /// members at the end of the current event.
    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    pub(crate) fn terminate(&mut self) {
        self.terminated = true;
    }

    fn is_valid_position(x: f64, y: f64) -> bool {
        !(x.is_nan() || y.is_nan())
    }

    fn is_valid_radius(&self, radius: f64) -> bool {
        !radius.is_nan() && radius >= self.min_radius()
    }

    /// Mass of a disc of this class at the current radius:
    /// (4/3)·π·r³·density
    fn derived_mass(&self) -> f64 {
        (4.0 / 3.0) * std::f64::consts::PI * self.radius.powi(3) * self.min_density()
    }

    /// Defensive: fails on NaN coordinates, leaving the position unchanged.
    pub fn set_position(&mut self, x: f64, y: f64) -> Result<()> {
        if Self::is_valid_position(x, y) {
            self.position = Point2::new(x, y);
            Ok(())
        } else {
            Err(Error::InvalidArgument("position must not be NaN".into()))
        }
    }

    /// Total: a velocity above the speed cap is scaled back onto the cap
    /// preserving its direction, and NaN components collapse to rest.
    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        if vx.is_nan() || vy.is_nan() {
            self.velocity = Vector2::zero();
            return;
        }
        let v = Vector2::new(vx, vy);
        let speed = v.magnitude();
        self.velocity = if speed <= self.max_speed() {
            v
        } else {
            v * (self.max_speed() / speed)
        };
    }

    /// Defensive: the radius must stay at or above the class minimum.
    pub fn set_radius(&mut self, radius: f64) -> Result<()> {
        if !self.is_valid_radius(radius) {
            return Err(Error::InvalidArgument(format!(
                "radius {} is below the class minimum {}",
                radius,
                self.min_radius()
            )));
        }
        self.radius = radius;
        if let EntityClass::Planetoid(p) = &mut self.class {
            p.initial_radius = radius;
            p.distance_travelled = 0.0;
        }
        if !self.explicit_mass {
            self.mass = self.derived_mass();
        }
        Ok(())
    }

    /// Nominal: the angle must already lie within [0, 2π].
    pub fn set_orientation(&mut self, angle: f64) {
        assert!((0.0..=2.0 * std::f64::consts::PI).contains(&angle));
        self.orientation = angle;
    }

    /// Total: a non-finite or non-positive mass falls back to the mass
    /// derived from the radius and class density.
    pub fn set_mass(&mut self, mass: f64) {
        if mass.is_finite() && mass > 0.0 {
            self.mass = mass;
            self.explicit_mass = true;
        } else {
            self.mass = self.derived_mass();
            self.explicit_mass = false;
        }
    }

    /// Nominal: the turned orientation must stay within [0, 2π].
    pub fn turn(&mut self, delta: f64) {
        self.set_orientation(self.orientation + delta);
    }

    /// Advance the entity linearly for `dt` seconds.
    ///
    /// Ships with the thruster engaged pick up velocity along their
    /// orientation after moving, so motion stays linear within a step and
    /// the collision predictor and the mover agree. Planetoids erode as
    /// they travel and self-destruct below the minimum radius.
    pub fn move_for(&mut self, dt: f64) -> Result<()> {
        if dt.is_nan() || dt < 0.0 {
            return Err(Error::InvalidDuration(dt));
        }
        let delta = self.velocity * dt;
        self.position += delta;

        if let EntityClass::Ship(ship) = &self.class {
            if ship.thruster_on() {
                let acceleration = ship.thrust_force() / self.mass;
                let v = self.velocity + self.heading() * (acceleration * dt);
                self.set_velocity(v.x, v.y);
            }
        }
        if let EntityClass::Planetoid(p) = &mut self.class {
            p.distance_travelled += delta.magnitude();
            let radius = p.initial_radius - PLANETOID_SHRINK_RATE * p.distance_travelled;
            self.radius = radius;
            if radius < MINOR_PLANET_MIN_RADIUS {
                self.destroyed = true;
            }
        }
        Ok(())
    }

    /// Centre-to-centre distance
    pub fn distance_to(&self, other: &Entity) -> f64 {
        self.position.distance(other.position)
    }

    /// The discs touch or intersect
    pub fn overlap(&self, other: &Entity) -> bool {
        self.distance_to(other) <= self.radius + other.radius
    }

    /// Centre distance at most 99% of the summed radii
    pub fn significant_overlap(&self, other: &Entity) -> bool {
        self.distance_to(other) <= 0.99 * (self.radius + other.radius)
    }

    /// Centre distance within [99%, 101%] of the summed radii
    pub fn apparently_collide(&self, other: &Entity) -> bool {
        let sigma = self.radius + other.radius;
        let distance = self.distance_to(other);
        0.99 * sigma <= distance && distance <= 1.01 * sigma
    }

    /// Every wall of a `width` × `height` box is at least 99% of the
    /// radius away from the centre.
    pub fn within_boundaries(&self, width: f64, height: f64) -> bool {
        let margin = 0.99 * self.radius;
        self.position.x >= margin
            && self.position.y >= margin
            && self.position.x + margin <= width
            && self.position.y + margin <= height
    }
}
