//! Deterministic, time-stepped simulation of a 2-D asteroids-style
//! universe.
//!
//! A [`World`] owns a set of circular entities (ships, bullets,
//! asteroids, planetoids) that move ballistically, bounce off one
//! another and the world boundaries, and die or change hands according
//! to per-class rules. Ships can carry a small imperative [`Program`]
//! that the engine interprets in lock-step with simulated time: every
//! side-effecting statement costs a fixed quantum, and a program that
//! runs out of budget suspends and resumes at the exact next slice.
//!
//! The host drives everything through [`World::evolve`], which advances
//! from collision event to collision event, resolving each one and
//! reporting it to a [`CollisionListener`].

#[macro_use(new_key_type)]
extern crate slotmap;
#[macro_use]
extern crate log;

mod collision;
mod entity;
mod error;
pub mod geometry;
mod program;
mod ship;
mod world;

pub use entity::{
    Bullet, Entity, EntityClass, Planetoid, ASTEROID_DENSITY, BULLET_DENSITY, BULLET_MIN_RADIUS,
    MAX_SPEED, MINOR_PLANET_MIN_RADIUS, PLANETOID_DENSITY, SHIP_MIN_DENSITY, SHIP_MIN_RADIUS,
};
pub use error::{Error, Result};
pub use program::{
    execute, Attribute, BinaryOp, EntityQuery, Expression, ExpressionKind, Flow, Program,
    SourceLocation, Statement, StatementKind, UnaryOp, Value, QUANTUM,
};
pub use ship::{Ship, DEFAULT_THRUST_FORCE, MUZZLE_SPEED};
pub use world::{Collider, CollisionListener, EntityKey, World};

/// Tolerance for floating-point comparisons throughout the crate
pub const EPSILON: f64 = 0.000_001;
