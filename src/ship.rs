use crate::entity::Entity;
use crate::program::Program;

/// Force of an engaged thruster, in mass-units times distance per second squared
pub const DEFAULT_THRUST_FORCE: f64 = 1.1e18;

/// Speed given to a bullet leaving the muzzle
pub const MUZZLE_SPEED: f64 = 250.0;

/// Ship state: thruster, bullet magazine and the optional program that
/// steers the ship from inside `evolve`.
///
/// Magazine bullets are owned by the ship until fired; firing moves them
/// into the world and a ship catching its own bullet moves it back.
#[derive(Debug)]
pub struct Ship {
    thruster_on: bool,
    thrust_force: f64,
    pub(crate) magazine: Vec<Entity>,
    pub(crate) program: Option<Program>,
}

impl Ship {
    pub fn new() -> Self {
        Self {
            thruster_on: false,
            thrust_force: DEFAULT_THRUST_FORCE,
            magazine: Vec::new(),
            program: None,
        }
    }

    pub fn thruster_on(&self) -> bool {
        self.thruster_on
    }

    pub fn set_thruster(&mut self, on: bool) {
        self.thruster_on = on;
    }

    pub fn thrust_force(&self) -> f64 {
        self.thrust_force
    }

    /// Nominal: the force must be finite and non-negative.
    pub fn set_thrust_force(&mut self, force: f64) {
        assert!(force.is_finite() && force >= 0.0);
        self.thrust_force = force;
    }

    /// Bullets currently loaded, most recently loaded last
    pub fn magazine(&self) -> &[Entity] {
        &self.magazine
    }

    pub fn attach_program(&mut self, program: Program) {
        self.program = Some(program);
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }
}

impl Default for Ship {
    fn default() -> Self {
        Self::new()
    }
}
