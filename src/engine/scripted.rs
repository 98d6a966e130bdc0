//! Deterministic engine for controller tests: fixed step, no mesh, every
//! call recorded by name.

use super::{
    AdaptSummary, BoundaryConditions, CellView, FieldStatistics, Performance,
    RefinementCriterion, RestoredState, SolverControls, View, FIELD_COUNT,
};
use crate::parameters::EngineCoefficients;
use crate::prelude_crate::*;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Coefficients,
    BoundaryConditions,
    SolverControls(SolverControls),
    Refine,
    Unrefine,
    Adapt { max_level: u8, min_level: u8, criteria: Vec<Field> },
    Fraction(Field),
    Fill(Field),
    Acceleration(Point),
    Vorticity,
    RemoveStructures { field: Field, min_diameter: usize, bubbles: bool },
    Restore,
    Render(&'static str),
    Advance(Float),
}

#[derive(Debug)]
pub struct ScriptedEngine {
    time: Float,
    iteration: usize,
    dt: Float,
    step: Float,
    controls: SolverControls,
    checkpoint: Option<RestoredState>,
    pub calls: Vec<Call>,
    pub fail_at: Option<usize>,
}

impl ScriptedEngine {
    /// Engine advancing by at most `step` per call.
    pub fn new(step: Float) -> Self {
        ScriptedEngine {
            time: 0.0,
            iteration: 0,
            dt: step,
            step,
            controls: SolverControls::default(),
            checkpoint: None,
            calls: Vec::new(),
            fail_at: None,
        }
    }

    /// Makes `restore` succeed with `state`.
    pub fn with_checkpoint(mut self, state: RestoredState) -> Self {
        self.checkpoint = Some(state);
        self
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }
}

impl Engine for ScriptedEngine {
    fn get_time(&self) -> Float {
        self.time
    }

    fn get_iteration(&self) -> usize {
        self.iteration
    }

    fn get_dt(&self) -> Float {
        self.dt
    }

    fn cell_count(&self) -> usize {
        4096
    }

    fn performance(&self) -> Performance {
        Performance {
            wall: 0.5 * self.iteration as Float,
            cpu: 0.25 * self.iteration as Float,
        }
    }

    fn set_coefficients(&mut self, _coefficients: &EngineCoefficients) {
        self.calls.push(Call::Coefficients);
    }

    fn set_boundary_conditions(&mut self, _conditions: &BoundaryConditions) {
        self.calls.push(Call::BoundaryConditions);
    }

    fn set_solver_controls(&mut self, controls: SolverControls) {
        self.controls = controls;
        self.calls.push(Call::SolverControls(controls));
    }

    fn get_solver_controls(&self) -> SolverControls {
        self.controls
    }

    fn refine(&mut self, _predicate: &(dyn Fn(&CellView) -> bool + Sync)) {
        self.calls.push(Call::Refine);
    }

    fn unrefine(&mut self, _predicate: &(dyn Fn(&CellView) -> bool + Sync)) {
        self.calls.push(Call::Unrefine);
    }

    fn adapt_wavelet(
        &mut self,
        criteria: &[RefinementCriterion],
        max_level: u8,
        min_level: u8,
    ) -> AdaptSummary {
        self.calls.push(Call::Adapt {
            max_level,
            min_level,
            criteria: criteria.iter().map(|c| c.field).collect(),
        });
        AdaptSummary::default()
    }

    fn set_fraction(&mut self, field: Field, _phi: &(dyn Fn(Point) -> Float + Sync)) {
        self.calls.push(Call::Fraction(field));
    }

    fn fill(&mut self, field: Field, value: &(dyn Fn(&CellView) -> Float + Sync)) {
        let values = [0.0; FIELD_COUNT];
        value(&CellView {
            center: [0.0; 3],
            size: 1.0,
            level: 0,
            values: &values,
        });
        self.calls.push(Call::Fill(field));
    }

    fn add_acceleration(&mut self, acceleration: Point) {
        self.calls.push(Call::Acceleration(acceleration));
    }

    fn compute_vorticity(&mut self, _target: Field) {
        self.calls.push(Call::Vorticity);
    }

    fn remove_small_structures(
        &mut self,
        field: Field,
        min_diameter: usize,
        bubbles: bool,
    ) -> usize {
        self.calls.push(Call::RemoveStructures {
            field,
            min_diameter,
            bubbles,
        });
        0
    }

    fn statistics(&self, _field: Field) -> FieldStatistics {
        FieldStatistics {
            sum: 130.0944,
            min: 0.0,
            max: 1.0,
        }
    }

    fn interface_extent(&self, _field: Field, axis: Axis) -> Option<(Float, Float)> {
        match axis {
            Axis::Y => Some((1.9375, 4.0625)),
            _ => Some((-1.0, 1.0)),
        }
    }

    fn write_facets(&self, field: Field, out: &mut dyn Write) -> ImpactResult<()> {
        writeln!(out, "{}", field.name())?;
        Ok(())
    }

    fn write_snapshot(&self, out: &mut dyn Write) -> ImpactResult<()> {
        writeln!(out, "{} {}", self.iteration, self.time)?;
        Ok(())
    }

    fn restore(&mut self, _path: &Path) -> ImpactResult<Option<RestoredState>> {
        self.calls.push(Call::Restore);
        if let Some(state) = self.checkpoint {
            self.iteration = state.iteration;
            self.time = state.time;
        }
        Ok(self.checkpoint)
    }

    fn render(&mut self, view: &View, _path: &Path) -> ImpactResult<()> {
        self.calls.push(Call::Render(view.name));
        Ok(())
    }

    fn advance(&mut self, dt_max: Float) -> ImpactResult<Float> {
        if self.fail_at == Some(self.iteration) {
            return Err(ImpactError::engine(format!(
                "solver diverged at iteration {}",
                self.iteration
            )));
        }
        let dt = dt_max.min(self.step);
        self.calls.push(Call::Advance(dt));
        self.time += dt;
        self.iteration += 1;
        self.dt = dt;
        Ok(dt)
    }
}
