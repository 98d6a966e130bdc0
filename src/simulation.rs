//! The simulation context and the binary's entry points.

use crate::cli::{self, Config};
use crate::engine::cartesian::CartesianEngine;
use crate::engine::{AdaptSummary, BoundaryConditions, RestoredState};
use crate::initial::InitialStateBuilder;
use crate::io::{create_case_directories, DiagnosticsWriter, OutputLayout};
use crate::parameters::settings::Settings;
use crate::parameters::SimulationParameters;
use crate::prelude_crate::*;
use crate::refinement::RefinementPolicy;
use crate::scheduler::{RunSummary, RuntimeLimit, Scheduler};
use colored::*;

// ---------------------------------------------------------------------- STRUCT: Simulation

/// Everything the scheduled events act on. The log files stay open for the
/// lifetime of the context and are flushed and closed when it is dropped.
#[derive(Debug)]
pub struct Simulation<E: Engine> {
    params: SimulationParameters,
    settings: Settings,
    layout: OutputLayout,
    engine: E,
    diagnostics: DiagnosticsWriter,
    refinement: RefinementPolicy,
    restored: Option<RestoredState>,
}

impl<E: Engine> Simulation<E> {
    /// Prepares the output tree and the engine, then either restores the
    /// `restart` checkpoint or builds the initial state.
    pub fn new(
        params: SimulationParameters,
        settings: Settings,
        layout: OutputLayout,
        mut engine: E,
    ) -> ImpactResult<Self> {
        create_case_directories(layout.get_root())?;
        let diagnostics = DiagnosticsWriter::open(&layout)?;

        engine.set_coefficients(params.get_coefficients());
        engine.set_boundary_conditions(&BoundaryConditions::impact(params.speed_ratio()));

        let restored = engine.restore(&layout.restart())?;
        match restored {
            Some(state) => {
                engine.set_solver_controls(settings.solver);
                log::info!(
                    "restored {} at i = {}, t = {}",
                    layout.restart().display(),
                    state.iteration,
                    state.time
                );
            }
            None => {
                params.print_summary();
                InitialStateBuilder::new(&params, &settings).build(&mut engine);
            }
        }

        let refinement = RefinementPolicy::new(params.get_max_level(), &settings.refinement);
        Ok(Simulation {
            params,
            settings,
            layout,
            engine,
            diagnostics,
            refinement,
            restored,
        })
    }
}

impl<E: Engine> Simulation<E> {
    pub fn get_params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get_layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn get_engine(&self) -> &E {
        &self.engine
    }

    pub fn get_engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn get_refinement(&self) -> &RefinementPolicy {
        &self.refinement
    }

    /// Adapts the engine's mesh with the run's refinement policy.
    pub fn adapt_mesh(&mut self) -> AdaptSummary {
        self.refinement.apply(&mut self.engine)
    }

    pub fn get_diagnostics_mut(&mut self) -> &mut DiagnosticsWriter {
        &mut self.diagnostics
    }

    /// The checkpoint state this run resumed from, if any.
    pub fn get_restored(&self) -> Option<RestoredState> {
        self.restored
    }
}

// --------------------------------------------------------------------------- ENTRY POINTS

/// Runs one impact case on the reference engine.
pub fn run(config: &Config, settings: Settings) -> ImpactResult<RunSummary> {
    let params = SimulationParameters::derive(settings.physics, config.inputs)?;
    let level = settings.refinement.initial_level.min(params.get_max_level());
    let engine = CartesianEngine::impact_domain(params.get_domain_size(), level);
    let layout = OutputLayout::new(&config.output_dir, &settings.output.case_name);

    let mut scheduler = Scheduler::standard(&settings, params.get_end_time())?
        .with_runtime_limit(config.max_runtime.map(RuntimeLimit::new));
    let mut simulation = Simulation::new(params, settings, layout, engine)?;
    scheduler.run(&mut simulation)
}

pub fn load() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = cli::parse_matches(&cli::get_args()).and_then(|config| {
        let settings = Settings::load(config.settings_path().as_deref())?;
        cli::init_global_pool(config.get_number_of_threads(), config.core_affinity)?;
        run(&config, settings)
    });

    if let Err(e) = result {
        eprintln!("{}", e.to_string().red().bold());
        std::process::exit(1);
    }
}
