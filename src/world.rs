use cgmath::{Point2, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::DenseSlotMap;

use crate::collision;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::geometry;
use crate::program;

new_key_type! {
    /// Handle to an entity owned by a world
    pub struct EntityKey;
}

const MAX_DIM: f64 = f64::MAX;
const DEFAULT_WIDTH: f64 = 1000.0;
const DEFAULT_HEIGHT: f64 = 1000.0;

/// What an entity is predicted to collide with
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Collider {
    Entity(EntityKey),
    Boundary,
}

/// Receives collision notifications from [`World::evolve`], typically to
/// drive rendering.
pub trait CollisionListener {
    /// Both entities were destroyed by a collision at (x, y)
    fn object_collision(&mut self, a: EntityKey, b: EntityKey, x: f64, y: f64);
    /// An entity struck a world boundary at (x, y)
    fn boundary_collision(&mut self, entity: EntityKey, x: f64, y: f64);
}

/// Hosts that don't care about collision events pass `&mut ()`
impl CollisionListener for () {
    fn object_collision(&mut self, _a: EntityKey, _b: EntityKey, _x: f64, _y: f64) {}
    fn boundary_collision(&mut self, _entity: EntityKey, _x: f64, _y: f64) {}
}

struct NextCollision {
    time: f64,
    entity: EntityKey,
    with: Collider,
}

/// An axis-aligned rectangular universe that exclusively owns a set of
/// entities and advances them through collision events.
pub struct World {
    width: f64,
    height: f64,
    /// Seconds of simulated time since creation
    time: f64,
    entities: DenseSlotMap<EntityKey, Entity>,
    rng: StdRng,
}

impl World {
    /// Dimensions outside [0, max] (or NaN) fall back to 1000 × 1000,
    /// per axis.
    pub fn new(width: f64, height: f64) -> Self {
        let width = if (0.0..=MAX_DIM).contains(&width) {
            width
        } else {
            DEFAULT_WIDTH
        };
        let height = if (0.0..=MAX_DIM).contains(&height) {
            height
        } else {
            DEFAULT_HEIGHT
        };
        Self {
            width,
            height,
            time: 0.0,
            entities: DenseSlotMap::with_key(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the teleport RNG, making every run reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Mutable access to a member. Callers changing the position are
    /// responsible for keeping it within the boundaries.
    pub fn entity_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    /// Members in insertion order
    pub fn entities(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities.iter()
    }

    /// Take ownership of the entity. Fails when it is terminated, pokes
    /// out of the boundaries or significantly overlaps a member.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityKey> {
        if entity.is_terminated() {
            return Err(Error::Ownership(
                "a terminated entity cannot join a world".into(),
            ));
        }
        if !entity.within_boundaries(self.width, self.height) {
            return Err(Error::Ownership(
                "entity does not lie within the world boundaries".into(),
            ));
        }
        if self.entities.values().any(|m| m.significant_overlap(&entity)) {
            return Err(Error::Ownership(
                "entity significantly overlaps an existing member".into(),
            ));
        }
        let key = self.entities.insert(entity);
        // a pre-loaded magazine gets its ownership markers once the ship
        // has a key
        if let Some(ship) = self.entities[key].ship_mut() {
            for bullet in &mut ship.magazine {
                if let Some(b) = bullet.bullet_mut() {
                    b.source = Some(key);
                    b.loaded_into = Some(key);
                }
            }
        }
        trace!("added {:?} to the world", key);
        Ok(key)
    }

    /// Detach and return a member. Removing a key that is not a member
    /// is an ownership error.
    pub fn remove_entity(&mut self, key: EntityKey) -> Result<Entity> {
        self.entities
            .remove(key)
            .ok_or_else(|| Error::Ownership("entity is not a member of this world".into()))
    }

    /// Detach every member and leave the world empty and inert
    pub fn terminate(&mut self) {
        for (_, entity) in self.entities.iter_mut() {
            entity.terminate();
        }
        self.entities.clear();
    }

    /// First member whose centre is exactly at (x, y)
    pub fn entity_at(&self, x: f64, y: f64) -> Option<EntityKey> {
        self.entities
            .iter()
            .find(|(_, e)| e.position().x == x && e.position().y == y)
            .map(|(key, _)| key)
    }

    fn find_next_collision(&self) -> Option<NextCollision> {
        let keys: Vec<EntityKey> = self.entities.keys().collect();
        let mut best: Option<NextCollision> = None;
        for (i, &a) in keys.iter().enumerate() {
            let ea = &self.entities[a];
            for &b in &keys[i + 1..] {
                let t = geometry::time_to_collision(ea, &self.entities[b]);
                if t.is_finite() && best.as_ref().map_or(true, |c| t < c.time) {
                    best = Some(NextCollision {
                        time: t,
                        entity: a,
                        with: Collider::Entity(b),
                    });
                }
            }
            let t = geometry::time_to_boundary(ea, self.width, self.height);
            if t.is_finite() && best.as_ref().map_or(true, |c| t < c.time) {
                best = Some(NextCollision {
                    time: t,
                    entity: a,
                    with: Collider::Boundary,
                });
            }
        }
        best
    }

    /// Seconds until the next collision anywhere in the world
    pub fn next_collision_time(&self) -> Option<f64> {
        self.find_next_collision().map(|c| c.time)
    }

    /// Contact point of the next collision
    pub fn next_collision_position(&self) -> Option<Point2<f64>> {
        self.find_next_collision().and_then(|c| self.contact_point(&c))
    }

    /// The entity that collides next and what it collides with
    pub fn next_collision_objects(&self) -> Option<(EntityKey, Collider)> {
        self.find_next_collision().map(|c| (c.entity, c.with))
    }

    fn contact_point(&self, c: &NextCollision) -> Option<Point2<f64>> {
        let ea = self.entities.get(c.entity)?;
        match c.with {
            Collider::Entity(b) => geometry::collision_point(ea, self.entities.get(b)?),
            Collider::Boundary => {
                geometry::boundary_collision_point(ea, self.width, self.height)
            }
        }
    }

    /// Advance the simulation by `duration` seconds, event by event.
    ///
    /// Repeatedly finds the earliest predicted collision; if it falls
    /// within the remaining budget the world advances to it (ship
    /// programs run for the same slice), the pair is resolved, the
    /// listener notified and destroyed entities are swept. Otherwise the
    /// remaining budget is consumed in one quiet advance.
    pub fn evolve(&mut self, duration: f64, listener: &mut dyn CollisionListener) -> Result<()> {
        if duration.is_nan() || duration < 0.0 {
            return Err(Error::InvalidDuration(duration));
        }
        let mut remaining = duration;
        while remaining > 0.0 && !self.entities.is_empty() {
            let next = match self.find_next_collision() {
                Some(c) if c.time <= remaining => c,
                _ => {
                    self.advance(remaining)?;
                    self.sweep_destroyed();
                    return Ok(());
                }
            };
            let point = self.contact_point(&next);
            // a glancing pair already in contact reports a slightly
            // negative time; the advance clamps to now, the budget below
            // is still charged the raw time
            self.advance(next.time.max(0.0))?;
            trace!(
                "resolving {:?} against {:?} at t={}",
                next.entity,
                next.with,
                self.time
            );
            collision::resolve(self, next.entity, next.with);
            self.notify(listener, &next, point);
            self.sweep_destroyed();
            remaining -= next.time;
        }
        Ok(())
    }

    /// Run every ship's program for `dt`, then move every entity by `dt`
    fn advance(&mut self, dt: f64) -> Result<()> {
        program::run_ship_programs(self, dt)?;
        for (_, entity) in self.entities.iter_mut() {
            entity.move_for(dt)?;
        }
        self.time += dt;
        Ok(())
    }

    fn notify(
        &self,
        listener: &mut dyn CollisionListener,
        c: &NextCollision,
        point: Option<Point2<f64>>,
    ) {
        let point = match point {
            Some(p) => p,
            None => return,
        };
        match c.with {
            Collider::Boundary => listener.boundary_collision(c.entity, point.x, point.y),
            Collider::Entity(b) => {
                let both_destroyed = self
                    .entities
                    .get(c.entity)
                    .map_or(false, Entity::is_destroyed)
                    && self.entities.get(b).map_or(false, Entity::is_destroyed);
                if both_destroyed {
                    listener.object_collision(c.entity, b, point.x, point.y);
                }
            }
        }
    }

    /// Remove and terminate every member marked destroyed
    fn sweep_destroyed(&mut self) {
        self.entities.retain(|key, entity| {
            if entity.is_destroyed() {
                entity.terminate();
                trace!("swept {:?}", key);
                false
            } else {
                true
            }
        });
    }

    /// Pull a member out of the arena; used by collision resolution to
    /// move a caught bullet back into a magazine.
    pub(crate) fn take_entity(&mut self, key: EntityKey) -> Option<Entity> {
        self.entities.remove(key)
    }

    /// Uniform random position at which a disc of the given radius fits
    /// fully inside the boundaries; `None` when no such position exists.
    pub(crate) fn random_position(&mut self, radius: f64) -> Option<Point2<f64>> {
        if 2.0 * radius >= self.width || 2.0 * radius >= self.height {
            return None;
        }
        let x = self.rng.gen_range(radius..self.width - radius);
        let y = self.rng.gen_range(radius..self.height - radius);
        Some(Point2::new(x, y))
    }

    /// Fire a bullet from the ship's magazine: the bullet appears on the
    /// ship's rim along its orientation at muzzle speed. Returns the new
    /// bullet's key, or `None` when the magazine is empty or the bullet
    /// had no room to appear and was destroyed instead.
    pub fn fire_bullet(&mut self, ship_key: EntityKey) -> Result<Option<EntityKey>> {
        let (position, orientation, ship_radius) = match self.entities.get(ship_key) {
            Some(e) if e.is_ship() => (e.position(), e.orientation(), e.radius()),
            Some(_) => return Err(Error::InvalidArgument("entity is not a ship".into())),
            None => return Err(Error::InvalidArgument("no such entity in this world".into())),
        };
        let mut bullet = match self
            .entities
            .get_mut(ship_key)
            .and_then(Entity::ship_mut)
            .and_then(|ship| ship.magazine.pop())
        {
            Some(b) => b,
            None => return Ok(None),
        };

        let heading = Vector2::new(orientation.cos(), orientation.sin());
        let muzzle = position + heading * (ship_radius + bullet.radius());
        bullet.set_position(muzzle.x, muzzle.y)?;
        bullet.set_velocity(
            heading.x * crate::ship::MUZZLE_SPEED,
            heading.y * crate::ship::MUZZLE_SPEED,
        );
        bullet.set_orientation(orientation);
        if let Some(b) = bullet.bullet_mut() {
            b.loaded_into = None;
            b.source = Some(ship_key);
        }

        let fits = bullet.within_boundaries(self.width, self.height)
            && !self.entities.values().any(|m| m.significant_overlap(&bullet));
        if !fits {
            debug!("bullet fired by {:?} had no room and was destroyed", ship_key);
            return Ok(None);
        }
        Ok(Some(self.entities.insert(bullet)))
    }

    /// Put a bullet into a ship's magazine. The bullet is repositioned at
    /// the ship's centre and its bounce count reset.
    pub fn load_bullet(&mut self, ship_key: EntityKey, mut bullet: Entity) -> Result<()> {
        if !bullet.is_bullet() {
            return Err(Error::InvalidArgument("only bullets can be loaded".into()));
        }
        if bullet.is_terminated() {
            return Err(Error::Ownership(
                "a terminated bullet cannot be loaded".into(),
            ));
        }
        let centre = match self.entities.get(ship_key) {
            Some(e) if e.is_ship() => e.position(),
            Some(_) => return Err(Error::InvalidArgument("entity is not a ship".into())),
            None => return Err(Error::InvalidArgument("no such entity in this world".into())),
        };
        bullet.set_position(centre.x, centre.y)?;
        if let Some(b) = bullet.bullet_mut() {
            b.bounce_count = 0;
            b.source = Some(ship_key);
            b.loaded_into = Some(ship_key);
        }
        // the ship exists and is a ship, checked above
        if let Some(ship) = self.entities.get_mut(ship_key).and_then(Entity::ship_mut) {
            ship.magazine.push(bullet);
        }
        Ok(())
    }

    /// Take the most recently loaded bullet back out of a ship's
    /// magazine, or `None` when the magazine is empty.
    pub fn unload_bullet(&mut self, ship_key: EntityKey) -> Result<Option<Entity>> {
        let ship = match self.entities.get_mut(ship_key) {
            Some(e) => match e.ship_mut() {
                Some(s) => s,
                None => return Err(Error::InvalidArgument("entity is not a ship".into())),
            },
            None => return Err(Error::InvalidArgument("no such entity in this world".into())),
        };
        let mut bullet = match ship.magazine.pop() {
            Some(b) => b,
            None => return Ok(None),
        };
        if let Some(b) = bullet.bullet_mut() {
            b.loaded_into = None;
        }
        Ok(Some(bullet))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}
