pub mod settings;

// ------------------------------------------------------------------------------- IMPORTS

use crate::prelude_crate::*;
use colored::*;
use serde::Deserialize;

// ----------------------------------------------------------- STRUCT: PhysicalProperties

/// Dimensional material properties in SI units.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicalProperties {
    pub liquid_density: Float,
    pub gas_density: Float,
    pub liquid_viscosity: Float,
    pub gas_viscosity: Float,
    pub surface_tension: Float,
    pub gravity: Float,
}

impl Default for PhysicalProperties {
    fn default() -> Self {
        PhysicalProperties {
            liquid_density: LIQUID_DENSITY,
            gas_density: GAS_DENSITY,
            liquid_viscosity: LIQUID_VISCOSITY,
            gas_viscosity: GAS_VISCOSITY,
            surface_tension: SURFACE_TENSION,
            gravity: GRAVITY,
        }
    }
}

impl PhysicalProperties {
    pub fn validate(&self) -> ImpactResult<()> {
        positive("liquid density", self.liquid_density)?;
        positive("gas density", self.gas_density)?;
        positive("liquid viscosity", self.liquid_viscosity)?;
        positive("gas viscosity", self.gas_viscosity)?;
        positive("surface tension", self.surface_tension)?;
        positive("gravity", self.gravity)
    }
}

// -------------------------------------------------------------------- STRUCT: RunInputs

/// Per-run inputs, as given on the command line.
///
/// Velocities and lengths are dimensional (m s^-1, m); the domain size and
/// end time are already expressed in drop radii and drop-crossing times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunInputs {
    pub max_level: u8,
    pub impact_angle: Float,
    pub drop_velocity: Float,
    pub pool_velocity: Float,
    pub drop_radius: Float,
    pub pool_depth: Float,
    pub domain_size: Float,
    pub end_time: Float,
}

impl RunInputs {
    pub fn validate(&self) -> ImpactResult<()> {
        if self.max_level == 0 {
            return Err(ImpactError::config("maximum level must be at least 1"));
        }
        if !self.impact_angle.is_finite() || !(0.0..=180.0).contains(&self.impact_angle) {
            return Err(ImpactError::config(format!(
                "impact angle must lie in [0, 180] degrees, got {}",
                self.impact_angle
            )));
        }
        positive("drop velocity", self.drop_velocity)?;
        if !self.pool_velocity.is_finite() || self.pool_velocity < 0.0 {
            return Err(ImpactError::config(format!(
                "pool velocity must be non-negative, got {}",
                self.pool_velocity
            )));
        }
        positive("drop radius", self.drop_radius)?;
        positive("pool depth", self.pool_depth)?;
        positive("domain size", self.domain_size)?;
        positive("end time", self.end_time)
    }
}

// ----------------------------------------------------------- STRUCT: EngineCoefficients

/// Nondimensional material coefficients handed to the two-phase engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineCoefficients {
    pub liquid_viscosity: Float,
    pub gas_viscosity: Float,
    pub liquid_density: Float,
    pub gas_density: Float,
    pub surface_tension: Float,
}

// --------------------------------------------------------- STRUCT: SimulationParameters

#[derive(Debug, Clone)]
pub struct SimulationParameters {
    physics: PhysicalProperties,
    inputs: RunInputs,
    reynolds: Float,
    froude: Float,
    weber: Float,
    density_ratio: Float,
    viscosity_ratio: Float,
    coefficients: EngineCoefficients,
}

impl SimulationParameters {
    /// Derives the dimensionless groups and engine coefficients.
    ///
    /// # Examples
    /// ```
    /// # use dropimpact::parameters::{PhysicalProperties, RunInputs, SimulationParameters};
    /// let inputs = RunInputs {
    ///     max_level: 9,
    ///     impact_angle: 90.0,
    ///     drop_velocity: 1.0,
    ///     pool_velocity: 0.0,
    ///     drop_radius: 1.0,
    ///     pool_depth: 2.0,
    ///     domain_size: 8.0,
    ///     end_time: 0.01,
    /// };
    /// let params = SimulationParameters::derive(PhysicalProperties::default(), inputs).unwrap();
    ///
    /// assert!((params.get_reynolds() - 1089.0 / 3.0e-3).abs() < 1e-6);
    /// assert_eq!(params.get_coefficients().liquid_density, 1.0);
    /// ```
    pub fn derive(physics: PhysicalProperties, inputs: RunInputs) -> ImpactResult<Self> {
        physics.validate()?;
        inputs.validate()?;
        let reynolds = physics.liquid_density * inputs.drop_velocity * inputs.drop_radius
            / physics.liquid_viscosity;
        let froude = inputs.drop_velocity / (physics.gravity * inputs.drop_radius).sqrt();
        let weber = physics.liquid_density * inputs.drop_velocity * inputs.drop_velocity
            * inputs.drop_radius
            / physics.surface_tension;
        let density_ratio = physics.liquid_density / physics.gas_density;
        let viscosity_ratio = physics.liquid_viscosity / physics.gas_viscosity;
        for (name, value) in [
            ("Reynolds number", reynolds),
            ("Froude number", froude),
            ("Weber number", weber),
            ("density ratio", density_ratio),
            ("viscosity ratio", viscosity_ratio),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ImpactError::config(format!(
                    "{name} is not a finite positive number ({value})"
                )));
            }
        }
        let liquid_viscosity = 1.0 / reynolds;
        let coefficients = EngineCoefficients {
            liquid_viscosity,
            gas_viscosity: liquid_viscosity / viscosity_ratio,
            liquid_density: 1.0,
            gas_density: 1.0 / density_ratio,
            surface_tension: 1.0 / weber,
        };
        Ok(SimulationParameters {
            physics,
            inputs,
            reynolds,
            froude,
            weber,
            density_ratio,
            viscosity_ratio,
            coefficients,
        })
    }
}

impl SimulationParameters {
    pub fn get_physics(&self) -> &PhysicalProperties {
        &self.physics
    }

    pub fn get_inputs(&self) -> &RunInputs {
        &self.inputs
    }

    pub fn get_reynolds(&self) -> Float {
        self.reynolds
    }

    pub fn get_froude(&self) -> Float {
        self.froude
    }

    pub fn get_weber(&self) -> Float {
        self.weber
    }

    pub fn get_density_ratio(&self) -> Float {
        self.density_ratio
    }

    pub fn get_viscosity_ratio(&self) -> Float {
        self.viscosity_ratio
    }

    pub fn get_coefficients(&self) -> &EngineCoefficients {
        &self.coefficients
    }

    pub fn get_max_level(&self) -> u8 {
        self.inputs.max_level
    }

    pub fn get_impact_angle(&self) -> Float {
        self.inputs.impact_angle
    }

    pub fn get_domain_size(&self) -> Float {
        self.inputs.domain_size
    }

    pub fn get_end_time(&self) -> Float {
        self.inputs.end_time
    }

    /// Height of the undisturbed pool surface, in drop radii.
    pub fn pool_surface_height(&self) -> Float {
        self.inputs.pool_depth / self.inputs.drop_radius
    }

    /// Pool velocity in units of the drop velocity.
    pub fn speed_ratio(&self) -> Float {
        self.inputs.pool_velocity / self.inputs.drop_velocity
    }

    /// Gravity as a nondimensional body force.
    pub fn body_acceleration(&self) -> Point {
        [0.0, -1.0 / (self.froude * self.froude), 0.0]
    }

    pub fn print_summary(&self) {
        let rows = [
            ("Reynolds number Re", self.reynolds),
            ("Weber number We", self.weber),
            ("Froude number Fr", self.froude),
            ("Density ratio", self.density_ratio),
            ("Viscosity ratio", self.viscosity_ratio),
        ];
        println!();
        for (label, value) in rows {
            println!("{} = {}", label.cyan().bold(), format!("{value:.6}").yellow());
        }
        println!();
    }
}

fn positive(name: &str, value: Float) -> ImpactResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ImpactError::config(format!(
            "{name} must be a finite positive number, got {value}"
        )))
    }
}

#[cfg(test)]
pub(crate) fn test_inputs() -> RunInputs {
    RunInputs {
        max_level: 9,
        impact_angle: 90.0,
        drop_velocity: 1.0,
        pool_velocity: 0.0,
        drop_radius: 1.0,
        pool_depth: 2.0,
        domain_size: 8.0,
        end_time: 0.01,
    }
}
