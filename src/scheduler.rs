//! Event registry and main loop.
//!
//! Every step, the events whose trigger is due fire in registration order;
//! then the run either stops or asks the engine for one more step, never
//! stepping past the next time an event is due.

// ------------------------------------------------------------------------------- MODULES

pub mod events;

// ------------------------------------------------------------------------------- IMPORTS

use crate::parameters::settings::Settings;
use crate::prelude_crate::*;
use crate::simulation::Simulation;
use colored::*;
use std::time::{Duration, Instant};

pub type Action<E> = fn(&mut Simulation<E>) -> ImpactResult<()>;

// ------------------------------------------------------------------------- ENUM: Trigger

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    EveryIteration,
    Iterations {
        start: usize,
        step: usize,
    },
    /// Fires at `start`, `start + step`, `start + step + step`, ... while the
    /// accumulated time does not exceed `end`.
    Times {
        start: Float,
        step: Float,
        end: Option<Float>,
    },
}

impl Trigger {
    pub fn every(step: Float) -> Self {
        Trigger::Times {
            start: 0.0,
            step,
            end: None,
        }
    }

    pub fn every_until(step: Float, end: Float) -> Self {
        Trigger::Times {
            start: 0.0,
            step,
            end: Some(end),
        }
    }

    fn validate(&self) -> ImpactResult<()> {
        match *self {
            Trigger::Iterations { step: 0, .. } => {
                Err(ImpactError::config("iteration trigger step must be at least one"))
            }
            Trigger::Times { step, .. } if !(step.is_finite() && step > 0.0) => Err(
                ImpactError::config(format!("time trigger step must be positive, got {step}")),
            ),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------- STRUCT: ScheduledEvent

pub struct ScheduledEvent<E: Engine> {
    name: &'static str,
    trigger: Trigger,
    action: Action<E>,
    next_iteration: usize,
    next_time: Float,
    fired: usize,
}

impl<E: Engine> std::fmt::Debug for ScheduledEvent<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("next_iteration", &self.next_iteration)
            .field("next_time", &self.next_time)
            .field("fired", &self.fired)
            .finish()
    }
}

impl<E: Engine> ScheduledEvent<E> {
    pub fn new(name: &'static str, trigger: Trigger, action: Action<E>) -> Self {
        let (next_iteration, next_time) = match trigger {
            Trigger::EveryIteration => (0, 0.0),
            Trigger::Iterations { start, .. } => (start, 0.0),
            Trigger::Times { start, .. } => (0, start),
        };
        ScheduledEvent {
            name,
            trigger,
            action,
            next_iteration,
            next_time,
            fired: 0,
        }
    }

    pub fn get_name(&self) -> &'static str {
        self.name
    }

    pub fn get_trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn get_fired(&self) -> usize {
        self.fired
    }

    /// Next time the event is due, for time-triggered events still alive.
    pub fn next_time(&self) -> Option<Float> {
        match self.trigger {
            Trigger::Times { .. } if self.is_alive() => Some(self.next_time),
            _ => None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self.trigger, Trigger::Times { end: Some(_), .. })
    }

    pub fn is_alive(&self) -> bool {
        match self.trigger {
            Trigger::Times { end: Some(end), .. } => self.next_time <= end,
            _ => true,
        }
    }

    pub fn is_due(&self, iteration: usize, time: Float) -> bool {
        match self.trigger {
            Trigger::EveryIteration | Trigger::Iterations { .. } => iteration >= self.next_iteration,
            Trigger::Times { .. } => self.is_alive() && self.next_time <= time + TIME_EPSILON,
        }
    }

    fn advance(&mut self, iteration: usize) {
        self.fired += 1;
        match self.trigger {
            Trigger::EveryIteration => self.next_iteration = iteration + 1,
            Trigger::Iterations { step, .. } => {
                while self.next_iteration <= iteration {
                    self.next_iteration += step;
                }
            }
            Trigger::Times { step, .. } => self.next_time += step,
        }
    }

    /// Moves the event past a restored `(iteration, time)`: iteration events
    /// become due at the first iteration not before it, time events at the
    /// first accumulated time after it.
    pub fn align(&mut self, iteration: usize, time: Float) {
        match self.trigger {
            Trigger::EveryIteration => self.next_iteration = iteration,
            Trigger::Iterations { step, .. } => {
                while self.next_iteration < iteration {
                    self.next_iteration += step;
                }
            }
            Trigger::Times { step, .. } => {
                while self.next_time <= time + TIME_EPSILON {
                    self.next_time += step;
                }
            }
        }
    }
}

// ------------------------------------------------------------------- STRUCT: RuntimeLimit

/// Wall-clock budget of a run, counted from its creation.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeLimit {
    budget: Duration,
    started: Instant,
}

impl RuntimeLimit {
    pub fn new(budget: Duration) -> Self {
        RuntimeLimit {
            budget,
            started: Instant::now(),
        }
    }

    pub fn get_budget(&self) -> Duration {
        self.budget
    }

    pub fn is_exhausted(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

// ---------------------------------------------------------------------- STRUCT: RunSummary

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every bounded event has run past its end time.
    EndTime,
    RuntimeLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub iterations: usize,
    pub time: Float,
    pub fired: Vec<(&'static str, usize)>,
    pub stop: StopReason,
}

impl RunSummary {
    pub fn fired(&self, name: &str) -> usize {
        self.fired
            .iter()
            .find(|(event, _)| *event == name)
            .map_or(0, |(_, count)| *count)
    }
}

// ----------------------------------------------------------------------- STRUCT: Scheduler

#[derive(Debug)]
pub struct Scheduler<E: Engine> {
    events: Vec<ScheduledEvent<E>>,
    limit: Option<RuntimeLimit>,
}

impl<E: Engine> Default for Scheduler<E> {
    fn default() -> Self {
        Scheduler {
            events: Vec::new(),
            limit: None,
        }
    }
}

impl<E: Engine> Scheduler<E> {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// The impact run: body force, refinement and cleanup every iteration,
    /// then the logs and outputs at their configured intervals. The stats log
    /// is bounded by `end_time` and so ends the run.
    pub fn standard(settings: &Settings, end_time: Float) -> ImpactResult<Self> {
        let output = &settings.output;
        let mut scheduler = Scheduler::new();
        scheduler
            .register("acceleration", Trigger::EveryIteration, events::body_force)?
            .register("adapt", Trigger::EveryIteration, events::refinement)?
            .register(
                "small_droplet_removal",
                Trigger::EveryIteration,
                events::remove_small_structures,
            )?
            .register(
                "loginterface",
                Trigger::every(output.interface_log_interval),
                events::log_interface,
            )?
            .register(
                "logstats",
                Trigger::every_until(output.stats_interval, end_time),
                events::log_stats,
            )?
            .register(
                "snapshot",
                Trigger::every(output.snapshot_interval),
                events::snapshot,
            )?
            .register(
                "interfaces_raw",
                Trigger::every(output.raw_facets_interval),
                events::raw_facets,
            )?
            .register(
                "interfaces",
                Trigger::every(output.facets_interval),
                events::clean_facets,
            )?;
        if output.render {
            scheduler.register(
                "movies",
                Trigger::every(output.render_interval),
                events::render,
            )?;
        }
        Ok(scheduler)
    }

    pub fn register(
        &mut self,
        name: &'static str,
        trigger: Trigger,
        action: Action<E>,
    ) -> ImpactResult<&mut Self> {
        trigger.validate()?;
        self.events.push(ScheduledEvent::new(name, trigger, action));
        Ok(self)
    }

    pub fn with_runtime_limit(mut self, limit: Option<RuntimeLimit>) -> Self {
        self.limit = limit;
        self
    }

    pub fn get_events(&self) -> &[ScheduledEvent<E>] {
        &self.events
    }

    /// False once every bounded event has run past its end. A scheduler
    /// without bounded events runs until its runtime limit.
    pub fn is_running(&self) -> bool {
        let mut bounded = self.events.iter().filter(|event| event.is_bounded()).peekable();
        bounded.peek().is_none() || bounded.any(|event| event.is_alive())
    }

    /// Earliest time a live time-triggered event is due strictly after `time`.
    pub fn next_event_time(&self, time: Float) -> Option<Float> {
        self.events
            .iter()
            .filter_map(|event| event.next_time())
            .filter(|&next| next > time + TIME_EPSILON)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn align(&mut self, iteration: usize, time: Float) {
        for event in self.events.iter_mut() {
            event.align(iteration, time);
        }
    }

    /// Fires every due event in registration order; returns how many fired.
    pub fn fire_due(&mut self, simulation: &mut Simulation<E>) -> ImpactResult<usize> {
        let iteration = simulation.get_engine().get_iteration();
        let time = simulation.get_engine().get_time();
        let mut count = 0;
        for event in self.events.iter_mut() {
            if event.is_due(iteration, time) {
                log::debug!("event {} at i = {iteration}, t = {time}", event.name);
                (event.action)(simulation)?;
                event.advance(iteration);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Largest step the engine may take from `time` without passing an event.
    pub fn max_step(&self, time: Float, solver_dt: Float) -> Float {
        self.next_event_time(time)
            .map_or(solver_dt, |next| solver_dt.min(next - time))
    }

    pub fn run(&mut self, simulation: &mut Simulation<E>) -> ImpactResult<RunSummary> {
        if !self.events.iter().any(|event| event.is_bounded()) && self.limit.is_none() {
            return Err(ImpactError::config(
                "no event bounds the run and no runtime limit is set",
            ));
        }
        if let Some(state) = simulation.get_restored() {
            self.align(state.iteration, state.time);
        }
        log::info!(
            "starting main loop at i = {}, t = {}",
            simulation.get_engine().get_iteration(),
            simulation.get_engine().get_time()
        );

        let stop = loop {
            self.fire_due(simulation)?;
            if !self.is_running() {
                break StopReason::EndTime;
            }
            if self.limit.is_some_and(|limit| limit.is_exhausted()) {
                log::warn!("runtime limit reached, stopping after the current step");
                break StopReason::RuntimeLimit;
            }
            let engine = simulation.get_engine_mut();
            let dt_max = self.max_step(engine.get_time(), engine.get_solver_controls().dt);
            engine.advance(dt_max)?;
        };

        let engine = simulation.get_engine();
        let summary = RunSummary {
            iterations: engine.get_iteration(),
            time: engine.get_time(),
            fired: self
                .events
                .iter()
                .map(|event| (event.name, event.fired))
                .collect(),
            stop,
        };
        log::info!(
            "run stopped ({:?}) at i = {}, t = {}",
            summary.stop,
            summary.iterations,
            summary.time
        );
        println!(
            "Simulation finished at iteration {} (t = {}).\n",
            summary.iterations.to_string().yellow().bold(),
            format!("{:.6}", summary.time).yellow().bold()
        );
        Ok(summary)
    }
}
