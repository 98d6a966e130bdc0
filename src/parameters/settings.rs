//! Controller policy that is configuration rather than physics: event
//! intervals, refinement thresholds, geometric margins and cleanup rules.
//!
//! Every section defaults to the values the impact study was run with, so a
//! settings file only needs to name what it changes.

use super::PhysicalProperties;
use crate::engine::SolverControls;
use crate::geometry::ImpactOffset;
use crate::prelude_crate::*;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicalProperties,
    pub geometry: GeometrySettings,
    pub refinement: RefinementSettings,
    pub cleanup: CleanupSettings,
    pub solver: SolverControls,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    /// Gap between the drop's lowest point and the pool surface, in radii.
    pub south_pole_clearance: Float,
    pub offset: ImpactOffset,
    /// Half-width of the pre-refined shell around the drop, relative to its radius.
    pub drop_band: Float,
    /// Half-width of the pre-refined band around the pool surface.
    pub pool_band: Float,
    /// Cells whose squared distance to the drop centre is below this factor
    /// times the squared radius receive the drop velocity.
    pub velocity_margin: Float,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        GeometrySettings {
            south_pole_clearance: 0.1,
            offset: ImpactOffset::default(),
            drop_band: 0.025,
            pool_band: 0.025,
            velocity_margin: 1.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefinementSettings {
    pub interface_tolerance: Float,
    pub tracer_tolerance: Float,
    pub velocity_tolerance: Float,
    /// Minimum level is the maximum level minus this span.
    pub level_span: u8,
    pub far_field_radius: Float,
    /// Far-field cells are capped at the maximum level minus this drop.
    pub far_field_level_drop: u8,
    pub initial_level: u8,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        RefinementSettings {
            interface_tolerance: 1e-4,
            tracer_tolerance: 1e-2,
            velocity_tolerance: 1e-2,
            level_span: 4,
            far_field_radius: 2.0,
            far_field_level_drop: 2,
            initial_level: INITIAL_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Droplets (and bubbles) made of fewer than this many cells cubed are removed.
    pub min_diameter_cells: usize,
    pub remove_bubbles: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        CleanupSettings {
            min_diameter_cells: 8,
            remove_bubbles: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub case_name: String,
    pub interface_log_interval: Float,
    pub stats_interval: Float,
    pub snapshot_interval: Float,
    pub raw_facets_interval: Float,
    pub facets_interval: Float,
    pub render_interval: Float,
    /// Raw facets are only extracted for `x` below this cutoff.
    pub raw_half_space: Float,
    pub liquid_clip: Float,
    pub tracer_clip: [Float; 2],
    pub render: bool,
    pub render_size: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            case_name: CASE_NAME.to_string(),
            interface_log_interval: 0.01,
            stats_interval: 0.001,
            snapshot_interval: 0.1,
            raw_facets_interval: 0.01,
            facets_interval: 0.01,
            render_interval: 0.001,
            raw_half_space: 1e-2,
            liquid_clip: 1e-6,
            tracer_clip: [0.4, 0.6],
            render: true,
            render_size: 900,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> ImpactResult<Settings> {
        let settings = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| ImpactError::path(path, e))?;
                Settings::from_yaml(&contents)?
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml(contents: &str) -> ImpactResult<Settings> {
        if contents.trim().is_empty() {
            return Ok(Settings::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn validate(&self) -> ImpactResult<()> {
        self.physics.validate()?;
        let output = &self.output;
        let geometry = &self.geometry;
        let refinement = &self.refinement;
        for (name, value) in [
            ("interface log interval", output.interface_log_interval),
            ("stats interval", output.stats_interval),
            ("snapshot interval", output.snapshot_interval),
            ("raw facets interval", output.raw_facets_interval),
            ("facets interval", output.facets_interval),
            ("render interval", output.render_interval),
            ("solver time step", self.solver.dt),
            ("interface tolerance", refinement.interface_tolerance),
            ("tracer tolerance", refinement.tracer_tolerance),
            ("velocity tolerance", refinement.velocity_tolerance),
            ("far-field radius", refinement.far_field_radius),
            ("drop band", geometry.drop_band),
            ("pool band", geometry.pool_band),
            ("velocity margin", geometry.velocity_margin),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ImpactError::config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if output.tracer_clip[0] > output.tracer_clip[1] {
            return Err(ImpactError::config("tracer clip window is reversed"));
        }
        if self.cleanup.min_diameter_cells == 0 {
            return Err(ImpactError::config("small-structure diameter must be at least one cell"));
        }
        if self.solver.min_iterations > self.solver.max_iterations {
            return Err(ImpactError::config(
                "minimum inner iterations exceed the maximum",
            ));
        }
        Ok(())
    }
}
