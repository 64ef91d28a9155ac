//! Time-budgeted execution of ship programs.
//!
//! Each side-effecting primitive costs a fixed quantum of simulated
//! time. When the budget of an `evolve` slice runs out the walk records
//! the statement it stopped at and unwinds as a [`Flow::Suspend`] value;
//! the next slice fast-forwards back to that checkpoint with all side
//! effects suppressed and picks up where it left off.

use std::cmp::Ordering;
use std::collections::HashMap;

use cgmath::MetricSpace;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::world::{EntityKey, World};
use crate::EPSILON;

use super::ast::{
    Attribute, BinaryOp, EntityQuery, Expression, ExpressionKind, SourceLocation, Statement,
    StatementKind, UnaryOp,
};
use super::env::{Program, Value};

/// Simulated seconds consumed by each side-effecting primitive
pub const QUANTUM: f64 = 0.2;

/// How a statement finished executing. Control flow is ordinary data
/// here: loops absorb `Break`, the world's advance observes `Suspend`,
/// and nothing unwinds through the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Break,
    Suspend,
    Return,
}

/// Run the program of every ship in the world for a `dt`-second slice,
/// in membership iteration order.
pub(crate) fn run_ship_programs(world: &mut World, dt: f64) -> Result<()> {
    let ships: Vec<EntityKey> = world
        .entities()
        .filter(|(_, e)| e.is_ship())
        .map(|(key, _)| key)
        .collect();
    for key in ships {
        let mut program = match world
            .entity_mut(key)
            .and_then(Entity::ship_mut)
            .and_then(|ship| ship.program.take())
        {
            Some(p) => p,
            None => continue,
        };
        let result = execute(world, key, &mut program, dt);
        if let Some(ship) = world.entity_mut(key).and_then(Entity::ship_mut) {
            ship.program = Some(program);
        }
        result?;
    }
    Ok(())
}

/// Execute one `dt`-second slice of a ship's program.
///
/// A program error marks the program done so a later `evolve` is not
/// stuck re-raising it forever; the world is left physically consistent
/// either way.
pub fn execute(world: &mut World, ship: EntityKey, program: &mut Program, dt: f64) -> Result<()> {
    if program.done {
        return Ok(());
    }
    let total = dt + program.extra_time;
    program.extra_time = 0.0;

    let flow = {
        let Program {
            root,
            variables,
            consumed_time,
            extra_time,
            ending_location,
            in_function,
            printed,
            ..
        } = program;
        let mut exec = Exec {
            world,
            ship,
            total,
            variables,
            consumed: consumed_time,
            extra: extra_time,
            ending: ending_location,
            printed,
            in_function: *in_function,
        };
        exec.stmt(root)
    };

    match flow {
        Err(e) => {
            program.done = true;
            Err(e)
        }
        Ok(Flow::Suspend) => Ok(()),
        Ok(Flow::Break) => {
            program.done = true;
            Err(Error::FalseProgram("break outside of any loop".into()))
        }
        Ok(Flow::Continue) | Ok(Flow::Return) => {
            // ran to completion; a checkpoint that was never reached
            // again (a condition changed under it) dies here too
            program.done = true;
            program.ending_location = None;
            program.consumed_time = 0.0;
            program.extra_time = 0.0;
            Ok(())
        }
    }
}

struct Exec<'a> {
    world: &'a mut World,
    ship: EntityKey,
    /// Slice budget: dt plus the carry-over from earlier slices
    total: f64,
    variables: &'a mut HashMap<String, Value>,
    consumed: &'a mut f64,
    extra: &'a mut f64,
    ending: &'a mut Option<SourceLocation>,
    printed: &'a mut Vec<Value>,
    in_function: bool,
}

impl<'a> Exec<'a> {
    fn stmt(&mut self, s: &Statement) -> Result<Flow> {
        if *self.ending == Some(s.location) {
            // checkpoint reached; resume for real from here
            *self.ending = None;
        }
        let fast_forward = self.ending.is_some();
        if !fast_forward {
            let remaining = self.total - *self.consumed;
            if remaining < QUANTUM - EPSILON {
                *self.ending = Some(s.location);
                *self.extra = remaining;
                *self.consumed = 0.0;
                return Ok(Flow::Suspend);
            }
        }

        match &s.kind {
            StatementKind::Sequence(children) => self.sequence(children),
            StatementKind::Assignment { variable, value } => {
                if fast_forward {
                    return Ok(Flow::Continue);
                }
                let value = self.eval(value)?;
                match self.variables.get(variable) {
                    Some(existing) if !existing.same_type(&value) => {
                        Err(Error::FalseProgram(format!(
                            "variable '{}' is bound as {} and cannot be rebound as {}",
                            variable,
                            existing.type_name(),
                            value.type_name()
                        )))
                    }
                    _ => {
                        self.variables.insert(variable.clone(), value);
                        Ok(Flow::Continue)
                    }
                }
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(condition)? {
                    self.stmt(then_branch)
                } else if let Some(els) = else_branch {
                    self.stmt(els)
                } else {
                    Ok(Flow::Continue)
                }
            }
            StatementKind::While { condition, body } => loop {
                if !self.eval_bool(condition)? {
                    return Ok(Flow::Continue);
                }
                match self.stmt(body)? {
                    Flow::Continue => {}
                    Flow::Break => return Ok(Flow::Continue),
                    flow => return Ok(flow),
                }
            },
            StatementKind::Break => Ok(if fast_forward {
                Flow::Continue
            } else {
                Flow::Break
            }),
            StatementKind::Skip => {
                if !fast_forward {
                    self.consume();
                }
                Ok(Flow::Continue)
            }
            StatementKind::ThrustOn => {
                if !fast_forward {
                    self.consume();
                    self.set_thruster(true)?;
                }
                Ok(Flow::Continue)
            }
            StatementKind::ThrustOff => {
                if !fast_forward {
                    self.consume();
                    self.set_thruster(false)?;
                }
                Ok(Flow::Continue)
            }
            StatementKind::Fire => {
                if !fast_forward {
                    self.consume();
                    self.world.fire_bullet(self.ship)?;
                }
                Ok(Flow::Continue)
            }
            StatementKind::Turn(angle) => {
                if fast_forward {
                    return Ok(Flow::Continue);
                }
                self.consume();
                let delta = self.eval_double(angle)?;
                self.turn_ship(delta)
            }
            StatementKind::Print(expr) => {
                if fast_forward {
                    return Ok(Flow::Continue);
                }
                let value = self.eval(expr)?;
                info!("program output: {}", value);
                self.printed.push(value);
                Ok(Flow::Continue)
            }
            StatementKind::Return => {
                if fast_forward {
                    return Ok(Flow::Continue);
                }
                if self.in_function {
                    Ok(Flow::Return)
                } else {
                    Err(Error::FalseReturn("return outside a function body".into()))
                }
            }
        }
    }

    /// Children run in order; while fast-forwarding, execution restarts
    /// at the last child located at or before the checkpoint (comparing
    /// line, then column) since the checkpoint lies in or after it.
    fn sequence(&mut self, children: &[Statement]) -> Result<Flow> {
        let start = match *self.ending {
            Some(end) => {
                let mut index = 0;
                for (i, child) in children.iter().enumerate() {
                    if child.location <= end {
                        index = i;
                    }
                }
                index
            }
            None => 0,
        };
        for child in &children[start..] {
            match self.stmt(child)? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Continue)
    }

    fn consume(&mut self) {
        *self.consumed += QUANTUM;
    }

    fn set_thruster(&mut self, on: bool) -> Result<()> {
        match self.world.entity_mut(self.ship).and_then(Entity::ship_mut) {
            Some(ship) => {
                ship.set_thruster(on);
                Ok(())
            }
            None => Err(Error::FalseProgram(
                "executing ship no longer exists".into(),
            )),
        }
    }

    /// Turn by the evaluated angle, normalized so hostile programs
    /// cannot trip the nominal orientation contract
    fn turn_ship(&mut self, delta: f64) -> Result<Flow> {
        if !delta.is_finite() {
            return Err(Error::FalseProgram(format!(
                "turn angle must be finite, got {}",
                delta
            )));
        }
        match self.world.entity_mut(self.ship) {
            Some(e) => {
                let target = (e.orientation() + delta).rem_euclid(std::f64::consts::TAU);
                e.set_orientation(target);
                Ok(Flow::Continue)
            }
            None => Err(Error::FalseProgram(
                "executing ship no longer exists".into(),
            )),
        }
    }

    fn eval(&self, e: &Expression) -> Result<Value> {
        match &e.kind {
            ExpressionKind::Double(v) => Ok(Value::Double(*v)),
            ExpressionKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExpressionKind::Null => Ok(Value::Entity(None)),
            ExpressionKind::Variable(name) => {
                self.variables.get(name).copied().ok_or_else(|| {
                    Error::FalseProgram(format!("variable '{}' is not bound", name))
                })
            }
            ExpressionKind::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, l, r)
            }
            ExpressionKind::Unary(op, operand) => unary(*op, self.eval(operand)?),
            ExpressionKind::Query(q) => Ok(Value::Entity(self.query(*q)?)),
            ExpressionKind::Attribute(attr, target) => {
                let key = self.eval_entity(target)?;
                let e = self.lookup(key)?;
                Ok(Value::Double(match attr {
                    Attribute::X => e.position().x,
                    Attribute::Y => e.position().y,
                    Attribute::VelocityX => e.velocity().x,
                    Attribute::VelocityY => e.velocity().y,
                    Attribute::Radius => e.radius(),
                    Attribute::Direction => e.orientation(),
                }))
            }
            ExpressionKind::DistanceTo(target) => {
                let key = self.eval_entity(target)?;
                let other = self.lookup(key)?;
                let me = self.lookup(Some(self.ship))?;
                Ok(Value::Double(me.distance_to(other)))
            }
        }
    }

    fn eval_bool(&self, e: &Expression) -> Result<bool> {
        match self.eval(e)? {
            Value::Boolean(b) => Ok(b),
            v => Err(Error::FalseProgram(format!(
                "expected a boolean, got {}",
                v.type_name()
            ))),
        }
    }

    fn eval_double(&self, e: &Expression) -> Result<f64> {
        match self.eval(e)? {
            Value::Double(d) => Ok(d),
            v => Err(Error::FalseProgram(format!(
                "expected a double, got {}",
                v.type_name()
            ))),
        }
    }

    fn eval_entity(&self, e: &Expression) -> Result<Option<EntityKey>> {
        match self.eval(e)? {
            Value::Entity(key) => Ok(key),
            v => Err(Error::FalseProgram(format!(
                "expected an entity, got {}",
                v.type_name()
            ))),
        }
    }

    fn lookup(&self, key: Option<EntityKey>) -> Result<&Entity> {
        let key = key
            .ok_or_else(|| Error::FalseProgram("attribute of a null entity".into()))?;
        self.world
            .entity(key)
            .ok_or_else(|| Error::FalseProgram("referenced entity no longer exists".into()))
    }

    fn query(&self, q: EntityQuery) -> Result<Option<EntityKey>> {
        let me = self.world.entity(self.ship).ok_or_else(|| {
            Error::FalseProgram("executing ship no longer exists".into())
        })?;
        Ok(match q {
            EntityQuery::SelfShip => Some(self.ship),
            EntityQuery::Ship => self.closest(me, Entity::is_ship),
            EntityQuery::Asteroid => self.closest(me, Entity::is_asteroid),
            EntityQuery::Planetoid => self.closest(me, Entity::is_planetoid),
            EntityQuery::Planet => self.closest(me, Entity::is_minor_planet),
            EntityQuery::Bullet => self
                .world
                .entities()
                .find(|(_, e)| {
                    e.bullet().map_or(false, |b| b.source == Some(self.ship))
                })
                .map(|(key, _)| key),
            EntityQuery::Any => self.world.entities().next().map(|(key, _)| key),
        })
    }

    fn closest(&self, me: &Entity, pred: impl Fn(&Entity) -> bool) -> Option<EntityKey> {
        let origin = me.position();
        self.world
            .entities()
            .filter(|(key, e)| *key != self.ship && pred(e))
            .min_by(|(_, a), (_, b)| {
                origin
                    .distance2(a.position())
                    .partial_cmp(&origin.distance2(b.position()))
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(key, _)| key)
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match (op, l, r) {
        (BinaryOp::Add, Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
        (BinaryOp::Mul, Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
        (BinaryOp::Less, Value::Double(a), Value::Double(b)) => Ok(Value::Boolean(a < b)),
        (BinaryOp::Equal, a, b) => Ok(Value::Boolean(a.same_type(&b) && a == b)),
        (BinaryOp::And, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a && b)),
        (op, l, r) => Err(Error::FalseProgram(format!(
            "operator {:?} cannot combine {} and {}",
            op,
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, v: Value) -> Result<Value> {
    match (op, v) {
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Negate, Value::Double(d)) => Ok(Value::Double(-d)),
        (UnaryOp::Sqrt, Value::Double(d)) => Ok(Value::Double(d.sqrt())),
        (UnaryOp::Sin, Value::Double(d)) => Ok(Value::Double(d.sin())),
        (UnaryOp::Cos, Value::Double(d)) => Ok(Value::Double(d.cos())),
        (op, v) => Err(Error::FalseProgram(format!(
            "operator {:?} cannot apply to {}",
            op,
            v.type_name()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use cgmath::{Point2, Vector2};

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new(line, 1)
    }

    fn stmt(kind: StatementKind, line: u32) -> Statement {
        Statement::new(kind, loc(line))
    }

    fn expr(kind: ExpressionKind, line: u32) -> Expression {
        Expression::new(kind, loc(line))
    }

    fn double(v: f64, line: u32) -> Expression {
        expr(ExpressionKind::Double(v), line)
    }

    fn sequence(children: Vec<Statement>) -> Statement {
        stmt(StatementKind::Sequence(children), 1)
    }

    /// World with a single armed ship at the centre
    fn world_with_ship() -> (World, EntityKey) {
        let mut w = World::default();
        let ship = w
            .add_entity(
                Entity::new_ship()
                    .with_position(Point2::new(500.0, 500.0))
                    .with_magazine(vec![Entity::new_bullet(), Entity::new_bullet(), Entity::new_bullet()]),
            )
            .unwrap();
        (w, ship)
    }

    #[test]
    fn assignment_binds_and_prints_read_back() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(
                StatementKind::Assignment {
                    variable: "x".into(),
                    value: double(3.0, 2),
                },
                2,
            ),
            stmt(
                StatementKind::Print(expr(ExpressionKind::Variable("x".into()), 3)),
                3,
            ),
        ]));
        execute(&mut w, ship, &mut program, 1.0).unwrap();
        assert_eq!(program.variable("x"), Some(&Value::Double(3.0)));
        assert_eq!(program.printed(), &[Value::Double(3.0)]);
        assert!(program.is_done());
    }

    #[test]
    fn rebinding_at_a_different_type_is_a_program_error() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(
                StatementKind::Assignment {
                    variable: "x".into(),
                    value: double(3.0, 2),
                },
                2,
            ),
            stmt(
                StatementKind::Assignment {
                    variable: "x".into(),
                    value: expr(ExpressionKind::Boolean(true), 3),
                },
                3,
            ),
        ]));
        let result = execute(&mut w, ship, &mut program, 1.0);
        assert!(matches!(result, Err(Error::FalseProgram(_))));
        // the prior binding survives
        assert_eq!(program.variable("x"), Some(&Value::Double(3.0)));
    }

    #[test]
    fn rebinding_at_the_same_type_is_fine() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(
                StatementKind::Assignment {
                    variable: "x".into(),
                    value: double(3.0, 2),
                },
                2,
            ),
            stmt(
                StatementKind::Assignment {
                    variable: "x".into(),
                    value: double(4.0, 3),
                },
                3,
            ),
        ]));
        execute(&mut w, ship, &mut program, 1.0).unwrap();
        assert_eq!(program.variable("x"), Some(&Value::Double(4.0)));
    }

    #[test]
    fn arithmetic_and_comparison_operators() {
        assert_eq!(
            binary(BinaryOp::Add, Value::Double(2.0), Value::Double(3.0)).unwrap(),
            Value::Double(5.0)
        );
        assert_eq!(
            binary(BinaryOp::Mul, Value::Double(2.0), Value::Double(3.0)).unwrap(),
            Value::Double(6.0)
        );
        assert_eq!(
            binary(BinaryOp::Less, Value::Double(2.0), Value::Double(3.0)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            binary(BinaryOp::Equal, Value::Double(2.0), Value::Double(2.0)).unwrap(),
            Value::Boolean(true)
        );
        // values of different types are unequal, not an error
        assert_eq!(
            binary(BinaryOp::Equal, Value::Double(1.0), Value::Boolean(true)).unwrap(),
            Value::Boolean(false)
        );
        assert!(binary(BinaryOp::And, Value::Double(1.0), Value::Boolean(true)).is_err());
        assert_eq!(
            unary(UnaryOp::Sqrt, Value::Double(9.0)).unwrap(),
            Value::Double(3.0)
        );
        assert_eq!(
            unary(UnaryOp::Not, Value::Boolean(false)).unwrap(),
            Value::Boolean(true)
        );
        assert!(unary(UnaryOp::Negate, Value::Boolean(true)).is_err());
    }

    #[test]
    fn unbound_variable_is_a_program_error() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(
            StatementKind::Print(expr(ExpressionKind::Variable("nope".into()), 2)),
            2,
        )]));
        assert!(matches!(
            execute(&mut w, ship, &mut program, 1.0),
            Err(Error::FalseProgram(_))
        ));
    }

    #[test]
    fn while_loop_runs_until_break() {
        let (mut w, ship) = world_with_ship();
        // while true { skip; break } — one skip's worth of time consumed
        let mut program = Program::new(sequence(vec![stmt(
            StatementKind::While {
                condition: expr(ExpressionKind::Boolean(true), 2),
                body: Box::new(Statement::new(
                    StatementKind::Sequence(vec![
                        stmt(StatementKind::Skip, 3),
                        stmt(StatementKind::Break, 4),
                    ]),
                    SourceLocation::new(2, 12),
                )),
            },
            2,
        )]));
        execute(&mut w, ship, &mut program, 1.0).unwrap();
        assert!(program.is_done());
    }

    #[test]
    fn break_outside_a_loop_is_a_program_error() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(StatementKind::Break, 2)]));
        assert!(matches!(
            execute(&mut w, ship, &mut program, 1.0),
            Err(Error::FalseProgram(_))
        ));
    }

    #[test]
    fn return_outside_a_function_is_a_return_error() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(StatementKind::Return, 2)]));
        assert!(matches!(
            execute(&mut w, ship, &mut program, 1.0),
            Err(Error::FalseReturn(_))
        ));
    }

    #[test]
    fn return_inside_a_function_completes_the_program() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(StatementKind::Return, 2),
            stmt(StatementKind::Skip, 3),
        ]));
        program.set_in_function(true);
        execute(&mut w, ship, &mut program, 1.0).unwrap();
        assert!(program.is_done());
    }

    #[test]
    fn if_chooses_the_right_branch() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(
            StatementKind::If {
                condition: expr(
                    ExpressionKind::Binary(
                        BinaryOp::Less,
                        Box::new(double(1.0, 2)),
                        Box::new(double(2.0, 2)),
                    ),
                    2,
                ),
                then_branch: Box::new(stmt(
                    StatementKind::Print(double(1.0, 3)),
                    3,
                )),
                else_branch: Some(Box::new(stmt(
                    StatementKind::Print(double(2.0, 4)),
                    4,
                ))),
            },
            2,
        )]));
        execute(&mut w, ship, &mut program, 1.0).unwrap();
        assert_eq!(program.printed(), &[Value::Double(1.0)]);
    }

    #[test]
    fn thrust_statements_drive_the_ship_thruster() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(StatementKind::ThrustOn, 2),
            stmt(StatementKind::ThrustOff, 3),
        ]));
        execute(&mut w, ship, &mut program, 0.2).unwrap();
        // only thrust_on fit in the budget
        assert!(w.entity(ship).unwrap().ship().unwrap().thruster_on());
        assert!(!program.is_done());
        execute(&mut w, ship, &mut program, 0.2).unwrap();
        assert!(!w.entity(ship).unwrap().ship().unwrap().thruster_on());
        assert!(program.is_done());
    }

    #[test]
    fn fire_statement_spawns_a_bullet() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(StatementKind::Fire, 2)]));
        execute(&mut w, ship, &mut program, 0.2).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(program.consumed_time(), 0.0); // reset on completion
        assert!(program.is_done());
    }

    #[test]
    fn turn_normalizes_the_resulting_orientation() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(
            StatementKind::Turn(double(7.0, 2)),
            2,
        )]));
        execute(&mut w, ship, &mut program, 0.2).unwrap();
        let orientation = w.entity(ship).unwrap().orientation();
        assert!((orientation - (7.0 - std::f64::consts::TAU)).abs() < EPSILON);
    }

    #[test]
    fn quantum_exhaustion_suspends_and_resumes_exactly() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(StatementKind::Skip, 2),
            stmt(StatementKind::Skip, 3),
            stmt(StatementKind::Skip, 4),
        ]));
        execute(&mut w, ship, &mut program, 0.5).unwrap();
        // two skips fit; suspended at the third with 0.1 carried over
        assert_eq!(program.ending_location(), Some(loc(4)));
        assert!((program.extra_time() - 0.1).abs() < EPSILON);
        assert_eq!(program.consumed_time(), 0.0);
        assert!(!program.is_done());

        execute(&mut w, ship, &mut program, 0.3).unwrap();
        assert!(program.is_done());
        assert_eq!(program.ending_location(), None);
    }

    #[test]
    fn tiny_slices_accumulate_until_a_quantum_fits() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![stmt(StatementKind::Fire, 2)]));
        for _ in 0..3 {
            execute(&mut w, ship, &mut program, 0.05).unwrap();
            assert_eq!(w.len(), 1);
            assert!(!program.is_done());
        }
        // 4 × 0.05 finally covers the quantum
        execute(&mut w, ship, &mut program, 0.05).unwrap();
        assert_eq!(w.len(), 2);
        assert!(program.is_done());
    }

    #[test]
    fn fast_forward_suppresses_side_effects_before_the_checkpoint() {
        let (mut w, ship) = world_with_ship();
        let mut program = Program::new(sequence(vec![
            stmt(StatementKind::Fire, 2),
            stmt(StatementKind::Skip, 3),
            stmt(StatementKind::Fire, 4),
        ]));
        // budget for fire + skip only
        execute(&mut w, ship, &mut program, 0.4).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(program.ending_location(), Some(loc(4)));
        // clear the muzzle so the next bullet has room to appear
        let first = w
            .entities()
            .find(|(_, e)| e.is_bullet())
            .map(|(key, _)| key)
            .unwrap();
        w.entity_mut(first).unwrap().set_position(700.0, 500.0).unwrap();
        // resuming must not re-run the first fire
        execute(&mut w, ship, &mut program, 0.2).unwrap();
        assert_eq!(w.len(), 3);
        assert!(program.is_done());
    }

    #[test]
    fn queries_find_the_closest_matching_entity() {
        let (mut w, ship) = world_with_ship();
        let near = w
            .add_entity(Entity::new_ship().with_position(Point2::new(600.0, 500.0)))
            .unwrap();
        let _far = w
            .add_entity(Entity::new_ship().with_position(Point2::new(900.0, 500.0)))
            .unwrap();
        let asteroid = w
            .add_entity(Entity::new_asteroid().with_position(Point2::new(500.0, 800.0)))
            .unwrap();
        let mut program = Program::new(sequence(vec![]));
        let Program {
            variables,
            consumed_time,
            extra_time,
            ending_location,
            printed,
            ..
        } = &mut program;
        let exec = Exec {
            world: &mut w,
            ship,
            total: 1.0,
            variables,
            consumed: consumed_time,
            extra: extra_time,
            ending: ending_location,
            printed,
            in_function: false,
        };
        assert_eq!(exec.query(EntityQuery::SelfShip).unwrap(), Some(ship));
        assert_eq!(exec.query(EntityQuery::Ship).unwrap(), Some(near));
        assert_eq!(exec.query(EntityQuery::Asteroid).unwrap(), Some(asteroid));
        assert_eq!(exec.query(EntityQuery::Planet).unwrap(), Some(asteroid));
        assert_eq!(exec.query(EntityQuery::Planetoid).unwrap(), None);
        assert_eq!(exec.query(EntityQuery::Bullet).unwrap(), None);
        assert!(exec.query(EntityQuery::Any).unwrap().is_some());
    }

    #[test]
    fn distance_and_attribute_expressions_read_the_world() {
        let (mut w, ship) = world_with_ship();
        let other = w
            .add_entity(
                Entity::new_ship()
                    .with_position(Point2::new(600.0, 500.0))
                    .with_velocity(Vector2::new(-3.0, 0.0)),
            )
            .unwrap();
        let target = expr(ExpressionKind::Query(EntityQuery::Ship), 2);
        let mut program = Program::new(sequence(vec![
            stmt(
                StatementKind::Print(expr(
                    ExpressionKind::DistanceTo(Box::new(target.clone())),
                    2,
                )),
                2,
            ),
            stmt(
                StatementKind::Print(expr(
                    ExpressionKind::Attribute(Attribute::VelocityX, Box::new(target)),
                    3,
                )),
                3,
            ),
        ]));
        execute(&mut w, ship, &mut program, 1.0).unwrap();
        assert_eq!(
            program.printed(),
            &[Value::Double(100.0), Value::Double(-3.0)]
        );
        let _ = other;
    }
}
