//! Initial interface, tracers and velocity of a fresh run.

use crate::engine::CellView;
use crate::geometry::{impact_velocity, DropPlacement, Implicit};
use crate::parameters::settings::Settings;
use crate::parameters::SimulationParameters;
use crate::prelude_crate::*;
use colored::*;

const HALF_DIAGONAL: Float = 0.866_025_403_784_438_6;

// ------------------------------------------------------------- STRUCT: InitialStateBuilder

#[derive(Debug, Clone)]
pub struct InitialStateBuilder<'a> {
    params: &'a SimulationParameters,
    settings: &'a Settings,
    placement: DropPlacement,
}

impl<'a> InitialStateBuilder<'a> {
    pub fn new(params: &'a SimulationParameters, settings: &'a Settings) -> Self {
        let geometry = &settings.geometry;
        let placement = DropPlacement::new(
            params.pool_surface_height(),
            geometry.south_pole_clearance,
            params.get_impact_angle(),
            &geometry.offset,
        );
        InitialStateBuilder {
            params,
            settings,
            placement,
        }
    }

    pub fn get_placement(&self) -> &DropPlacement {
        &self.placement
    }

    /// Whether a cell touches the thin shell around the drop surface or the
    /// band around the pool surface and is still coarser than the maximum level.
    pub fn needs_refinement(&self, cell: &CellView) -> bool {
        if cell.level >= self.params.get_max_level() {
            return false;
        }
        let geometry = &self.settings.geometry;
        let reach = HALF_DIAGONAL * cell.size;
        let sphere = &self.placement.sphere;
        let distance = sphere.squared_distance(cell.center).sqrt();
        let near_drop = (distance - sphere.radius).abs() < geometry.drop_band * sphere.radius + reach;
        let near_pool =
            (cell.center[Axis::Y.index()] - self.placement.pool.height).abs() < geometry.pool_band + reach;
        near_drop || near_pool
    }

    /// Velocity at a cell: the unit impact velocity in and just around the
    /// drop, the pool drift scaled by the liquid fraction elsewhere.
    pub fn velocity(&self, cell: &CellView) -> Point {
        let sphere = &self.placement.sphere;
        let margin = self.settings.geometry.velocity_margin * sphere.radius * sphere.radius;
        if sphere.squared_distance(cell.center) < margin {
            impact_velocity(self.params.get_impact_angle())
        } else {
            [
                0.0,
                0.0,
                self.params.speed_ratio() * cell.value(Field::Interface),
            ]
        }
    }

    /// Builds the initial state on `engine` and returns the drop placement used.
    pub fn build<E: Engine + ?Sized>(&self, engine: &mut E) -> DropPlacement {
        engine.refine(&|cell| self.needs_refinement(cell));
        log::debug!("pre-refined the initial interfaces: {} cells", engine.cell_count());

        let liquid = self.placement.liquid();
        let sphere = self.placement.sphere;
        let pool = self.placement.pool;
        engine.set_fraction(Field::Interface, &|p| liquid.eval(p));
        engine.set_fraction(Field::DropTracer, &|p| sphere.eval(p));
        engine.set_fraction(Field::PoolTracer, &|p| pool.eval(p));

        engine.set_solver_controls(self.settings.solver);

        for axis in AXES {
            engine.fill(Field::velocity(axis), &|cell| self.velocity(cell)[axis.index()]);
        }

        let c = sphere.center;
        println!(
            "Drop centre at ({}, {}, {}), impact angle {}°.\n",
            format!("{:.4}", c[0]).yellow().bold(),
            format!("{:.4}", c[1]).yellow().bold(),
            format!("{:.4}", c[2]).yellow().bold(),
            self.params.get_impact_angle()
        );
        self.placement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cartesian::CartesianEngine;
    use crate::engine::scripted::{Call, ScriptedEngine};
    use crate::parameters::{test_inputs, PhysicalProperties, RunInputs};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn low_resolution() -> RunInputs {
        RunInputs {
            max_level: 5,
            ..test_inputs()
        }
    }

    fn params(inputs: RunInputs) -> SimulationParameters {
        SimulationParameters::derive(PhysicalProperties::default(), inputs).unwrap()
    }

    fn built_engine(inputs: RunInputs) -> CartesianEngine {
        let params = params(inputs);
        let settings = Settings::default();
        let mut engine = CartesianEngine::impact_domain(params.get_domain_size(), 3);
        InitialStateBuilder::new(&params, &settings).build(&mut engine);
        engine
    }

    #[test]
    fn test_drop_sits_above_the_pool() {
        let params = params(test_inputs());
        let settings = Settings::default();

        let builder = InitialStateBuilder::new(&params, &settings);

        let placement = builder.get_placement();
        assert_abs_diff_eq!(placement.sphere.center[1], 3.1, epsilon = 1e-12);
        assert_eq!(placement.sphere.center[2], 0.0);
        assert_abs_diff_eq!(placement.south_pole()[1], 2.1, epsilon = 1e-12);
    }

    #[test]
    fn test_oblique_drop_offset_and_velocity() {
        let params = params(RunInputs {
            impact_angle: 15.0,
            ..test_inputs()
        });
        let settings = Settings::default();
        let builder = InitialStateBuilder::new(&params, &settings);
        let center = builder.get_placement().sphere.center;
        let values = [0.0; crate::engine::FIELD_COUNT];
        let cell = CellView {
            center,
            size: 0.1,
            level: 5,
            values: &values,
        };

        let velocity = builder.velocity(&cell);

        assert_abs_diff_eq!(center[2], 1.25, epsilon = 1e-3);
        assert_abs_diff_eq!(velocity[1], -0.2588, epsilon = 1e-4);
        assert_abs_diff_eq!(velocity[2], -0.9659, epsilon = 1e-4);
    }

    #[test]
    fn test_pool_velocity_scales_with_liquid_fraction() {
        let params = params(RunInputs {
            pool_velocity: 0.5,
            ..test_inputs()
        });
        let settings = Settings::default();
        let builder = InitialStateBuilder::new(&params, &settings);
        let mut values = [0.0; crate::engine::FIELD_COUNT];
        values[Field::Interface.index()] = 0.5;
        let cell = CellView {
            center: [2.0, 1.9, 2.0],
            size: 0.1,
            level: 5,
            values: &values,
        };

        assert_eq!(builder.velocity(&cell), [0.0, 0.0, 0.25]);
    }

    #[test]
    fn test_refinement_stops_at_the_maximum_level() {
        let params = params(low_resolution());
        let settings = Settings::default();
        let builder = InitialStateBuilder::new(&params, &settings);
        let values = [0.0; crate::engine::FIELD_COUNT];
        let on_pool = |level| CellView {
            center: [0.5, 2.0, 0.0],
            size: 8.0 / (1u32 << level) as Float,
            level,
            values: &values,
        };

        assert!(builder.needs_refinement(&on_pool(4)));
        assert!(!builder.needs_refinement(&on_pool(5)));
        assert!(!builder.needs_refinement(&CellView {
            center: [3.5, 6.5, 3.5],
            ..on_pool(3)
        }));
    }

    #[test]
    fn test_initial_liquid_volume() {
        let engine = built_engine(low_resolution());

        // pool slab plus the half of the drop inside x >= 0
        let expected = 2.0 * 8.0 * 8.0 + 2.0 / 3.0 * PI;
        assert_abs_diff_eq!(engine.statistics(Field::Interface).sum, expected, epsilon = 0.01);
        assert_abs_diff_eq!(
            engine.statistics(Field::DropTracer).sum,
            2.0 / 3.0 * PI,
            epsilon = 0.01
        );
        assert_abs_diff_eq!(engine.statistics(Field::PoolTracer).sum, 128.0, epsilon = 1e-9);
        assert_eq!(engine.get_mesh().get_finest(), 5);
    }

    #[test]
    fn test_tracers_stay_in_range_and_do_not_overlap() {
        let engine = built_engine(low_resolution());
        let mesh = engine.get_mesh();

        for i in 0..mesh.len() {
            let drop = mesh.value(i, Field::DropTracer);
            let pool = mesh.value(i, Field::PoolTracer);
            assert!((0.0..=1.0).contains(&drop));
            assert!((0.0..=1.0).contains(&pool));
            assert!(drop + pool <= 1.0);
        }
    }

    #[test]
    fn test_initial_velocity_field() {
        let engine = built_engine(low_resolution());
        let mesh = engine.get_mesh();

        let inside = mesh.locate([0.1, 3.1, 0.1]).unwrap();
        assert_abs_diff_eq!(mesh.value(inside, Field::VelocityY), -1.0);
        assert_abs_diff_eq!(mesh.value(inside, Field::VelocityZ), 0.0, epsilon = 1e-12);
        let pool = mesh.locate([3.0, 1.0, 3.0]).unwrap();
        assert_eq!(mesh.value(pool, Field::VelocityY), 0.0);
        assert_eq!(mesh.value(pool, Field::VelocityZ), 0.0);
    }

    #[test]
    fn test_build_sequence_on_engine() {
        let params = params(test_inputs());
        let mut settings = Settings::default();
        settings.solver.max_iterations = 50;
        let mut engine = ScriptedEngine::new(1e-3);

        InitialStateBuilder::new(&params, &settings).build(&mut engine);

        assert_eq!(
            engine.calls,
            vec![
                Call::Refine,
                Call::Fraction(Field::Interface),
                Call::Fraction(Field::DropTracer),
                Call::Fraction(Field::PoolTracer),
                Call::SolverControls(settings.solver),
                Call::Fill(Field::VelocityX),
                Call::Fill(Field::VelocityY),
                Call::Fill(Field::VelocityZ),
            ]
        );
        assert_eq!(engine.get_solver_controls().max_iterations, 50);
    }
}
