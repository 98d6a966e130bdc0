use crate::Float;

// ------------------------------------------------------------------ PHYSICAL PROPERTIES

/// Liquid density (kg m^-3).
pub const LIQUID_DENSITY: Float = 1089.0;

/// Gas density (kg m^-3).
pub const GAS_DENSITY: Float = 1.2;

/// Liquid dynamic viscosity (kg m^-1 s^-1).
pub const LIQUID_VISCOSITY: Float = 3.0e-3;

/// Gas dynamic viscosity (kg m^-1 s^-1).
pub const GAS_VISCOSITY: Float = 1.8e-5;

/// Surface tension (N m^-1).
pub const SURFACE_TENSION: Float = 70.3e-3;

/// Gravitational acceleration (m s^-2).
pub const GRAVITY: Float = 9.81;

// ------------------------------------------------------------------------ SOLVER START

pub const INITIAL_DT: Float = 1.0e-3;

pub const MIN_INNER_ITERATIONS: usize = 1;

pub const MAX_INNER_ITERATIONS: usize = 200;

pub const SOLVER_TOLERANCE: Float = 1.0e-4;

/// Uniform level of the mesh before any pre-refinement (128 cells per side).
pub const INITIAL_LEVEL: u8 = 7;

/// Tolerance used to decide whether a time-triggered event has been reached.
pub const TIME_EPSILON: Float = 1.0e-9;

// ------------------------------------------------------------------------- FILE NAMES

pub const SLICES_PATH: &str = "Slices";
pub const ANIMATIONS_PATH: &str = "Animations";
pub const INTERFACES_PATH: &str = "Interfaces";
pub const INTERFACE_LOG_FILE: &str = "loginterface.dat";
pub const STATS_LOG_FILE: &str = "logstats.dat";
pub const RESTART_FILE: &str = "restart";
pub const SETTINGS_FILE: &str = "dropimpact.yaml";
pub const CASE_NAME: &str = "DropImpact";
