//! The actions the impact run schedules.

use crate::engine::{Camera, ColorRange, View};
use crate::io::{write_file, InterfaceRecord, StatsRecord};
use crate::prelude_crate::*;
use crate::refinement::RefinementPolicy;
use crate::simulation::Simulation;

/// Facet outputs: file label, interface field, thresholded field.
const PHASES: [(&str, Field, Field); 3] = [
    ("Liquid", Field::Interface, Field::LiquidRaw),
    ("Drop", Field::DropTracer, Field::DropRaw),
    ("Pool", Field::PoolTracer, Field::PoolRaw),
];

// ------------------------------------------------------------------------ EVERY ITERATION

pub fn body_force<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let acceleration = simulation.get_params().body_acceleration();
    simulation.get_engine_mut().add_acceleration(acceleration);
    Ok(())
}

pub fn refinement<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    simulation.adapt_mesh();
    Ok(())
}

pub fn remove_small_structures<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let cleanup = simulation.get_settings().cleanup.clone();
    let engine = simulation.get_engine_mut();
    let droplets = engine.remove_small_structures(Field::Interface, cleanup.min_diameter_cells, false);
    let bubbles = if cleanup.remove_bubbles {
        engine.remove_small_structures(Field::Interface, cleanup.min_diameter_cells, true)
    } else {
        0
    };
    if droplets + bubbles > 0 {
        log::debug!("removed {droplets} droplets and {bubbles} bubbles");
    }
    Ok(())
}

// ------------------------------------------------------------------------------- LOGS

pub fn log_interface<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let engine = simulation.get_engine();
    let record = InterfaceRecord {
        iteration: engine.get_iteration(),
        time: engine.get_time(),
        volume: engine.statistics(Field::Interface).sum,
        extents: AXES.map(|axis| engine.interface_extent(Field::Interface, axis)),
    };
    if record.extents.iter().any(Option::is_none) {
        log::warn!("no interface cells at t = {}", record.time);
    }
    simulation.get_diagnostics_mut().write_interface(&record)
}

pub fn log_stats<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let engine = simulation.get_engine();
    let performance = engine.performance();
    let record = StatsRecord {
        iteration: engine.get_iteration(),
        time: engine.get_time(),
        dt: engine.get_dt(),
        cells: engine.cell_count(),
        wall: performance.wall,
        cpu: performance.cpu,
    };
    simulation.get_diagnostics_mut().write_stats(&record)
}

// ---------------------------------------------------------------------------- OUTPUTS

pub fn snapshot<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let engine = simulation.get_engine();
    let path = simulation.get_layout().slice(engine.get_time());
    write_file(&path, |out| engine.write_snapshot(out))?;
    log::info!("snapshot written to {}", path.display());
    Ok(())
}

/// Facets of the interface and both tracers, hard-thresholded and restricted
/// to a thin slab next to the symmetry plane.
pub fn raw_facets<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let output = simulation.get_settings().output.clone();
    let engine = simulation.get_engine_mut();
    for (_, source, target) in PHASES {
        let (low, high) = match source {
            Field::Interface => (output.liquid_clip, 1.0 - output.liquid_clip),
            _ => (output.tracer_clip[0], output.tracer_clip[1]),
        };
        engine.fill(target, &|cell| {
            if cell.center[Axis::X.index()] < output.raw_half_space {
                clip(cell.value(source), low, high)
            } else {
                1.0
            }
        });
    }

    let time = simulation.get_engine().get_time();
    for (phase, _, field) in PHASES {
        let path = simulation.get_layout().raw_facets(phase, time);
        let engine = simulation.get_engine();
        write_file(&path, |out| engine.write_facets(field, out))?;
    }
    Ok(())
}

pub fn clean_facets<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let engine = simulation.get_engine();
    let time = engine.get_time();
    for (phase, field, _) in PHASES {
        let path = simulation.get_layout().clean_facets(phase, time);
        write_file(&path, |out| engine.write_facets(field, out))?;
    }
    Ok(())
}

pub fn render<E: Engine>(simulation: &mut Simulation<E>) -> ImpactResult<()> {
    let size = simulation.get_settings().output.render_size;
    let engine = simulation.get_engine_mut();
    RefinementPolicy::update_diagnostics(engine);
    engine.fill(Field::Liquids, &|cell| {
        1.0 - cell.value(Field::Interface) + cell.value(Field::DropTracer) / 2.0
    });
    for view in views(size) {
        let path = simulation.get_layout().animation(view.name);
        simulation.get_engine_mut().render(&view, &path)?;
    }
    Ok(())
}

/// Values below `low` snap to 0, above `high` to 1.
pub fn clip(value: Float, low: Float, high: Float) -> Float {
    if value < low {
        0.0
    } else if value > high {
        1.0
    } else {
        value
    }
}

/// The animations written by the render event, all slicing the symmetry plane.
pub fn views(size: usize) -> Vec<View> {
    let left = |name, field, range, cells| View {
        name,
        camera: Camera::Left,
        field,
        range,
        cells,
        isoline: None,
        width: size,
        height: size,
    };
    vec![
        left("Vel_Ux", Field::VelocityX, ColorRange::Auto, false),
        left("Vel_Uy", Field::VelocityY, ColorRange::Auto, false),
        left("Vel_Uz", Field::VelocityZ, ColorRange::Auto, false),
        left("LiquidsGrid", Field::Liquids, ColorRange::Fixed(0.0, 2.0), true),
        left("Liquids", Field::Liquids, ColorRange::Fixed(0.0, 2.0), false),
        left("Velocity", Field::VelocityNorm, ColorRange::Auto, false),
        left("Vorticity", Field::Vorticity, ColorRange::Fixed(-2.5, 2.5), false),
        left("Pressure", Field::Pressure, ColorRange::Fixed(-0.3, 0.6), false),
        View {
            camera: Camera::Right,
            isoline: Some((Field::Interface, 0.5)),
            ..left("Velocity_Front_All", Field::VelocityNorm, ColorRange::Auto, true)
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cartesian::{frame_path, CartesianEngine};
    use crate::engine::scripted::{Call, ScriptedEngine};
    use crate::parameters::settings::Settings;
    use crate::parameters::{test_inputs, RunInputs};
    use crate::simulation::tests::{scripted_simulation, simulation_with};
    use std::fs;

    fn low_resolution() -> RunInputs {
        RunInputs {
            max_level: 5,
            ..test_inputs()
        }
    }

    fn small_render_settings() -> Settings {
        let mut settings = Settings::default();
        settings.output.render_size = 16;
        settings
    }

    #[test]
    fn test_clip_thresholds() {
        assert_eq!(clip(5e-7, 1e-6, 1.0 - 1e-6), 0.0);
        assert_eq!(clip(0.3, 0.4, 0.6), 0.0);
        assert_eq!(clip(0.5, 0.4, 0.6), 0.5);
        assert_eq!(clip(0.7, 0.4, 0.6), 1.0);
    }

    #[test]
    fn test_nine_views() {
        let views = views(900);

        assert_eq!(views.len(), 9);
        let front = views.last().unwrap();
        assert_eq!(front.camera, Camera::Right);
        assert_eq!(front.isoline, Some((Field::Interface, 0.5)));
        assert!(views.iter().all(|view| view.width == 900 && view.height == 900));
        assert_eq!(
            views.iter().filter(|view| view.cells).count(),
            2,
            "cells drawn on LiquidsGrid and Velocity_Front_All"
        );
    }

    #[test]
    fn test_body_force_uses_froude_number() {
        let dir = tempfile::tempdir().unwrap();
        let mut simulation = scripted_simulation(dir.path(), test_inputs(), ScriptedEngine::new(1e-3));
        let froude = simulation.get_params().get_froude();

        body_force(&mut simulation).unwrap();

        let expected = Call::Acceleration([0.0, -1.0 / (froude * froude), 0.0]);
        assert_eq!(simulation.get_engine().calls.last(), Some(&expected));
    }

    #[test]
    fn test_removal_of_droplets_then_bubbles() {
        let dir = tempfile::tempdir().unwrap();
        let mut simulation = scripted_simulation(dir.path(), test_inputs(), ScriptedEngine::new(1e-3));

        remove_small_structures(&mut simulation).unwrap();

        let calls = &simulation.get_engine().calls;
        assert_eq!(
            calls[calls.len() - 2..],
            [
                Call::RemoveStructures {
                    field: Field::Interface,
                    min_diameter: 8,
                    bubbles: false
                },
                Call::RemoveStructures {
                    field: Field::Interface,
                    min_diameter: 8,
                    bubbles: true
                },
            ]
        );
    }

    #[test]
    fn test_facet_files_per_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut simulation = scripted_simulation(dir.path(), test_inputs(), ScriptedEngine::new(1e-3));

        raw_facets(&mut simulation).unwrap();
        clean_facets(&mut simulation).unwrap();

        let interfaces = dir.path().join(INTERFACES_PATH);
        let raw = fs::read_to_string(interfaces.join("interfacesPoolRaw-0.000.dat")).unwrap();
        assert_eq!(raw, "ffPool\n");
        let clean = fs::read_to_string(interfaces.join("interfacesDrop-0.0.dat")).unwrap();
        assert_eq!(clean, "drop_tracer\n");
        assert_eq!(fs::read_dir(&interfaces).unwrap().count(), 6);
    }

    #[test]
    fn test_raw_fields_on_reference_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.output.raw_half_space = 1.0;
        let engine = CartesianEngine::impact_domain(8.0, 3);
        let mut simulation = simulation_with(dir.path(), low_resolution(), settings, engine);

        raw_facets(&mut simulation).unwrap();

        let engine = simulation.get_engine();
        let mesh = engine.get_mesh();
        let mut gas = 0;
        for i in 0..mesh.len() {
            let cell = mesh.view(i);
            let raw = cell.value(Field::DropRaw);
            if cell.center[0] >= 1.0 {
                assert_eq!(raw, 1.0);
            } else {
                assert!(raw == 0.0 || raw == 1.0 || (0.4..=0.6).contains(&raw));
                if raw == 0.0 {
                    gas += 1;
                }
            }
        }
        assert!(gas > 0);
        let liquid = dir.path().join(INTERFACES_PATH).join("interfacesLiquidRaw-0.000.dat");
        assert!(liquid.exists());
    }

    #[test]
    fn test_clean_facets_on_reference_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CartesianEngine::impact_domain(8.0, 3);
        let mut simulation =
            simulation_with(dir.path(), low_resolution(), Settings::default(), engine);

        clean_facets(&mut simulation).unwrap();

        let drop = fs::read_to_string(
            dir.path().join(INTERFACES_PATH).join("interfacesDrop-0.0.dat"),
        )
        .unwrap();
        assert!(drop.lines().any(|line| !line.is_empty()));
    }

    #[test]
    fn test_logs_on_reference_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CartesianEngine::impact_domain(8.0, 3);
        let mut simulation =
            simulation_with(dir.path(), low_resolution(), Settings::default(), engine);

        log_interface(&mut simulation).unwrap();
        log_stats(&mut simulation).unwrap();

        let interface = fs::read_to_string(dir.path().join(INTERFACE_LOG_FILE)).unwrap();
        let columns = interface.split_whitespace().collect::<Vec<_>>();
        assert_eq!(columns.len(), 9);
        assert_eq!(columns[0], "0");
        assert_eq!(columns[1], "0");
        let volume: Float = columns[2].parse().unwrap();
        assert!((volume - 130.0944).abs() < 0.01);
        let stats = fs::read_to_string(dir.path().join(STATS_LOG_FILE)).unwrap();
        assert!(stats.starts_with("i: 0 t: 0 dt: 0.001 #Cells: "));
    }

    #[test]
    fn test_snapshot_can_restart_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CartesianEngine::impact_domain(8.0, 3);
        let mut simulation =
            simulation_with(dir.path(), low_resolution(), Settings::default(), engine);
        let cells = simulation.get_engine().cell_count();

        snapshot(&mut simulation).unwrap();
        let slice = dir.path().join(SLICES_PATH).join("DropImpact-0.00.gfs");
        fs::copy(&slice, dir.path().join(RESTART_FILE)).unwrap();
        drop(simulation);
        let engine = CartesianEngine::impact_domain(8.0, 3);
        let resumed = simulation_with(dir.path(), low_resolution(), Settings::default(), engine);

        assert!(resumed.get_restored().is_some());
        assert_eq!(resumed.get_engine().cell_count(), cells);
    }

    #[test]
    fn test_render_writes_every_animation() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CartesianEngine::impact_domain(8.0, 3);
        let mut simulation =
            simulation_with(dir.path(), low_resolution(), small_render_settings(), engine);

        render(&mut simulation).unwrap();

        for view in views(16) {
            let path = frame_path(&simulation.get_layout().animation(view.name));
            let bytes = fs::read(&path).unwrap();
            assert!(bytes.starts_with(b"P6\n16 16\n255\n"), "{}", path.display());
        }
        let mesh = simulation.get_engine().get_mesh();
        let gas = mesh.locate([3.5, 7.5, 3.5]).unwrap();
        assert_eq!(mesh.value(gas, Field::Liquids), 1.0);
    }
}
