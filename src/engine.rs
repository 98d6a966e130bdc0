//! The narrow seam between the controller and the two-phase flow engine.
//!
//! The controller never touches mesh storage directly: it refines through
//! predicates, writes fields through per-cell closures and reads back
//! reductions. Anything behind [`Engine`] (time integration, transport,
//! mesh bookkeeping) belongs to the engine.

// ------------------------------------------------------------------------------- MODULES

pub mod cartesian;
#[cfg(test)]
pub(crate) mod scripted;

// ------------------------------------------------------------------------------- IMPORTS

use crate::parameters::EngineCoefficients;
use crate::prelude_crate::*;
use crate::BoundaryFace;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

// --------------------------------------------------------------------------- ENUM: Field

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Field {
    Interface = 0,
    DropTracer = 1,
    PoolTracer = 2,
    VelocityX = 3,
    VelocityY = 4,
    VelocityZ = 5,
    Pressure = 6,
    Vorticity = 7,
    VelocityNorm = 8,
    Liquids = 9,
    LiquidRaw = 10,
    DropRaw = 11,
    PoolRaw = 12,
}

pub const FIELD_COUNT: usize = 13;

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Interface,
        Field::DropTracer,
        Field::PoolTracer,
        Field::VelocityX,
        Field::VelocityY,
        Field::VelocityZ,
        Field::Pressure,
        Field::Vorticity,
        Field::VelocityNorm,
        Field::Liquids,
        Field::LiquidRaw,
        Field::DropRaw,
        Field::PoolRaw,
    ];

    pub const VELOCITY: [Field; 3] = [Field::VelocityX, Field::VelocityY, Field::VelocityZ];

    /// Fields carried along with the flow by the engine's transport step.
    pub const TRANSPORTED: [Field; 3] = [Field::Interface, Field::DropTracer, Field::PoolTracer];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Field::Interface => "f",
            Field::DropTracer => "drop_tracer",
            Field::PoolTracer => "pool_tracer",
            Field::VelocityX => "u.x",
            Field::VelocityY => "u.y",
            Field::VelocityZ => "u.z",
            Field::Pressure => "p",
            Field::Vorticity => "omega",
            Field::VelocityNorm => "velnorm",
            Field::Liquids => "liquids",
            Field::LiquidRaw => "ffLiquid",
            Field::DropRaw => "ffDrop",
            Field::PoolRaw => "ffPool",
        }
    }

    pub fn velocity(axis: Axis) -> Field {
        Field::VELOCITY[axis.index()]
    }
}

// ----------------------------------------------------------------------- STRUCT: CellView

/// Read-only view of one leaf cell handed to controller closures.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    pub center: Point,
    pub size: Float,
    pub level: u8,
    pub values: &'a [Float; FIELD_COUNT],
}

impl CellView<'_> {
    pub fn value(&self, field: Field) -> Float {
        self.values[field.index()]
    }

    pub fn velocity(&self) -> Point {
        [
            self.value(Field::VelocityX),
            self.value(Field::VelocityY),
            self.value(Field::VelocityZ),
        ]
    }
}

// ----------------------------------------------------------- STRUCT: RefinementCriterion

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementCriterion {
    pub field: Field,
    pub threshold: Float,
    pub active: bool,
}

impl RefinementCriterion {
    pub fn new(field: Field, threshold: Float) -> Self {
        RefinementCriterion {
            field,
            threshold,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptSummary {
    pub refined: usize,
    pub coarsened: usize,
}

// ---------------------------------------------------------------- STRUCT: SolverControls

/// Tolerances of the implicit solve and the largest admissible time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverControls {
    pub dt: Float,
    pub min_iterations: usize,
    pub max_iterations: usize,
    pub tolerance: Float,
}

impl Default for SolverControls {
    fn default() -> Self {
        SolverControls {
            dt: INITIAL_DT,
            min_iterations: MIN_INNER_ITERATIONS,
            max_iterations: MAX_INNER_ITERATIONS,
            tolerance: SOLVER_TOLERANCE,
        }
    }
}

// --------------------------------------------------------------------- BOUNDARY CONDITIONS

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityCondition {
    ZeroGradient,
    /// Normal velocity equal to the local interface fraction times `ratio`.
    InterfaceScaled { ratio: Float },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressureCondition {
    ZeroGradient,
    Fixed(Float),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCondition {
    pub face: BoundaryFace,
    pub normal_velocity: VelocityCondition,
    pub pressure: PressureCondition,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryConditions {
    pub faces: Vec<FaceCondition>,
}

impl BoundaryConditions {
    /// Outflow at the top, pool inflow at the front and outflow at the back.
    /// The remaining faces keep the engine's symmetry default.
    pub fn impact(speed_ratio: Float) -> Self {
        BoundaryConditions {
            faces: vec![
                FaceCondition {
                    face: BoundaryFace::Top,
                    normal_velocity: VelocityCondition::ZeroGradient,
                    pressure: PressureCondition::Fixed(0.0),
                },
                FaceCondition {
                    face: BoundaryFace::Front,
                    normal_velocity: VelocityCondition::InterfaceScaled { ratio: speed_ratio },
                    pressure: PressureCondition::ZeroGradient,
                },
                FaceCondition {
                    face: BoundaryFace::Back,
                    normal_velocity: VelocityCondition::ZeroGradient,
                    pressure: PressureCondition::ZeroGradient,
                },
            ],
        }
    }

    pub fn get(&self, face: BoundaryFace) -> Option<&FaceCondition> {
        self.faces.iter().find(|condition| condition.face == face)
    }
}

// ------------------------------------------------------------------------------ RENDERING

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Camera {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorRange {
    Auto,
    Fixed(Float, Float),
}

/// One fixed-camera projection written to its own animation.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: &'static str,
    pub camera: Camera,
    pub field: Field,
    pub range: ColorRange,
    pub cells: bool,
    pub isoline: Option<(Field, Float)>,
    pub width: usize,
    pub height: usize,
}

// ---------------------------------------------------------------------------- STATISTICS

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStatistics {
    /// Volume-weighted sum.
    pub sum: Float,
    pub min: Float,
    pub max: Float,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Performance {
    pub wall: Float,
    pub cpu: Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoredState {
    pub iteration: usize,
    pub time: Float,
}

// --------------------------------------------------------------------------- TRAIT: Engine

pub trait Engine {
    fn get_time(&self) -> Float;

    fn get_iteration(&self) -> usize;

    /// Size of the last step taken, or the configured step before the first one.
    fn get_dt(&self) -> Float;

    fn cell_count(&self) -> usize;

    fn performance(&self) -> Performance;

    fn set_coefficients(&mut self, coefficients: &EngineCoefficients);

    fn set_boundary_conditions(&mut self, conditions: &BoundaryConditions);

    fn set_solver_controls(&mut self, controls: SolverControls);

    fn get_solver_controls(&self) -> SolverControls;

    /// Splits leaf cells for as long as `predicate` holds for them.
    fn refine(&mut self, predicate: &(dyn Fn(&CellView) -> bool + Sync));

    /// Collapses every subtree whose root cell satisfies `predicate`. Only the
    /// root's geometry is meaningful to the predicate; its values read as zero.
    fn unrefine(&mut self, predicate: &(dyn Fn(&CellView) -> bool + Sync));

    fn adapt_wavelet(
        &mut self,
        criteria: &[RefinementCriterion],
        max_level: u8,
        min_level: u8,
    ) -> AdaptSummary;

    /// Sets `field` to the volume fraction of `{phi > 0}` in each cell.
    fn set_fraction(&mut self, field: Field, phi: &(dyn Fn(Point) -> Float + Sync));

    /// Overwrites `field` cell by cell; the closure sees the other fields as
    /// they were before the call.
    fn fill(&mut self, field: Field, value: &(dyn Fn(&CellView) -> Float + Sync));

    /// Adds a uniform acceleration to the next momentum update only.
    fn add_acceleration(&mut self, acceleration: Point);

    fn compute_vorticity(&mut self, target: Field);

    /// Removes connected structures of `field` smaller than `min_diameter`
    /// cells across. With `bubbles`, gas pockets are filled instead.
    /// Returns the number of structures removed.
    fn remove_small_structures(&mut self, field: Field, min_diameter: usize, bubbles: bool)
        -> usize;

    fn statistics(&self, field: Field) -> FieldStatistics;

    /// Extent of the interface of `field` along `axis`, or `None` when no cell
    /// holds an interface.
    fn interface_extent(&self, field: Field, axis: Axis) -> Option<(Float, Float)>;

    fn write_facets(&self, field: Field, out: &mut dyn Write) -> ImpactResult<()>;

    fn write_snapshot(&self, out: &mut dyn Write) -> ImpactResult<()>;

    /// Restores a prior state from `path`. Returns `None` when there is nothing
    /// to restore.
    fn restore(&mut self, path: &Path) -> ImpactResult<Option<RestoredState>>;

    fn render(&mut self, view: &View, path: &Path) -> ImpactResult<()>;

    /// Advances one step no longer than `dt_max`; returns the step taken.
    fn advance(&mut self, dt_max: Float) -> ImpactResult<Float>;
}
