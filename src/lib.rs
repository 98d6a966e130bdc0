pub mod cli;
pub mod constants;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod initial;
pub mod io;
pub mod parameters;
mod prelude_crate;
pub mod refinement;
pub mod scheduler;
pub mod simulation;

pub use error::{ImpactError, ImpactResult};
pub use simulation::{load, run};

pub type Float = f64;

/// A point (or vector) in nondimensional domain coordinates: `x` spans the
/// symmetry direction, `y` is vertical and `z` is the horizontal impact axis.
pub type Point = [Float; 3];

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

pub const AXES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

impl Axis {
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn unit(&self) -> Point {
        let mut unit = [0.0; 3];
        unit[self.index()] = 1.0;
        unit
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BoundaryFace {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Back = 4,
    Front = 5,
}

pub const FACES: [BoundaryFace; 6] = [
    BoundaryFace::Left,
    BoundaryFace::Right,
    BoundaryFace::Bottom,
    BoundaryFace::Top,
    BoundaryFace::Back,
    BoundaryFace::Front,
];

impl BoundaryFace {
    pub fn axis(&self) -> Axis {
        match self {
            BoundaryFace::Left | BoundaryFace::Right => Axis::X,
            BoundaryFace::Bottom | BoundaryFace::Top => Axis::Y,
            BoundaryFace::Back | BoundaryFace::Front => Axis::Z,
        }
    }

    /// `-1` for the lower face along the axis, `+1` for the upper one.
    pub fn direction(&self) -> i32 {
        match self {
            BoundaryFace::Left | BoundaryFace::Bottom | BoundaryFace::Back => -1,
            BoundaryFace::Right | BoundaryFace::Top | BoundaryFace::Front => 1,
        }
    }
}

pub mod prelude {
    pub use crate::cli::Config;
    pub use crate::engine::cartesian::CartesianEngine;
    pub use crate::engine::{
        BoundaryConditions, Engine, Field, RefinementCriterion, SolverControls,
    };
    pub use crate::error::{ImpactError, ImpactResult};
    pub use crate::parameters::settings::Settings;
    pub use crate::parameters::{PhysicalProperties, RunInputs, SimulationParameters};
    pub use crate::scheduler::{Scheduler, Trigger};
    pub use crate::simulation::Simulation;
    pub use crate::BoundaryFace::{self, *};
    pub use crate::{Axis, Float, Point};
}
