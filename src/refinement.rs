//! Mesh adaptation applied every iteration: wavelet refinement on the
//! interface, the drop tracer and the velocity, then a hard level cap away
//! from the impact axis.

use crate::engine::{AdaptSummary, CellView, RefinementCriterion};
use crate::parameters::settings::RefinementSettings;
use crate::prelude_crate::*;

// ------------------------------------------------------------- STRUCT: RefinementPolicy

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementPolicy {
    criteria: Vec<RefinementCriterion>,
    max_level: u8,
    min_level: u8,
    far_field_radius: Float,
    far_field_level: u8,
}

impl RefinementPolicy {
    pub fn new(max_level: u8, settings: &RefinementSettings) -> Self {
        let mut criteria = vec![
            RefinementCriterion::new(Field::Interface, settings.interface_tolerance),
            RefinementCriterion::new(Field::DropTracer, settings.tracer_tolerance),
        ];
        criteria.extend(
            Field::VELOCITY
                .iter()
                .map(|&field| RefinementCriterion::new(field, settings.velocity_tolerance)),
        );
        RefinementPolicy {
            criteria,
            max_level,
            min_level: max_level.saturating_sub(settings.level_span),
            far_field_radius: settings.far_field_radius,
            far_field_level: max_level.saturating_sub(settings.far_field_level_drop),
        }
    }

    pub fn get_criteria(&self) -> &[RefinementCriterion] {
        &self.criteria
    }

    pub fn get_max_level(&self) -> u8 {
        self.max_level
    }

    pub fn get_min_level(&self) -> u8 {
        self.min_level
    }

    pub fn get_far_field_level(&self) -> u8 {
        self.far_field_level
    }

    /// Horizontal distance to the vertical impact axis exceeds the far-field radius.
    pub fn is_far_field(&self, p: Point) -> bool {
        let (x, z) = (p[Axis::X.index()], p[Axis::Z.index()]);
        x * x + z * z > self.far_field_radius * self.far_field_radius
    }

    /// Collapse target of the far-field cap: the cell at the capped level
    /// reaching past the radius. Its farthest corner from the axis decides, so
    /// no finer leaf is left with its centre outside.
    pub fn caps(&self, cell: &CellView) -> bool {
        if cell.level != self.far_field_level {
            return false;
        }
        let reach = |axis: Axis| cell.center[axis.index()].abs() + 0.5 * cell.size;
        self.is_far_field([reach(Axis::X), 0.0, reach(Axis::Z)])
    }

    /// Recomputes vorticity and velocity magnitude from the current velocity.
    pub fn update_diagnostics<E: Engine + ?Sized>(engine: &mut E) {
        engine.compute_vorticity(Field::Vorticity);
        engine.fill(Field::VelocityNorm, &|cell| {
            cell.velocity().iter().map(|u| u * u).sum::<Float>().sqrt()
        });
    }

    pub fn apply<E: Engine + ?Sized>(&self, engine: &mut E) -> AdaptSummary {
        RefinementPolicy::update_diagnostics(engine);
        let summary = engine.adapt_wavelet(&self.criteria, self.max_level, self.min_level);
        engine.unrefine(&|cell| self.caps(cell));
        log::debug!(
            "adapted mesh: {} refined, {} coarsened, {} cells",
            summary.refined,
            summary.coarsened,
            engine.cell_count()
        );
        summary
    }
}
