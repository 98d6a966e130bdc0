//! Reference engine over a cubic octree of leaf cells.
//!
//! Stepping is kinematic: the body force is integrated into the velocity,
//! the inflow face is enforced and the interface and tracers are carried by
//! first-order upwind transport. There is no pressure projection, viscosity
//! or surface tension; coefficients are stored for inspection only.

// ------------------------------------------------------------------------------- MODULES

mod facets;
pub mod mesh;
mod render;

// ------------------------------------------------------------------------------- IMPORTS

use super::{
    AdaptSummary, BoundaryConditions, CellView, FieldStatistics, Performance,
    RefinementCriterion, RestoredState, SolverControls, VelocityCondition, View, FIELD_COUNT,
};
use crate::parameters::EngineCoefficients;
use crate::prelude_crate::*;
use crate::FACES;
use mesh::{Cell, CellKey, Mesh, MAX_LEVEL};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

pub use render::frame_path;

const CFL: Float = 0.5;
const STRUCTURE_THRESHOLD: Float = 1e-4;
const FRACTION_SUBSAMPLES: usize = 6;
const COARSEN_FACTOR: Float = 1.5;
const NO_VALUES: [Float; FIELD_COUNT] = [0.0; FIELD_COUNT];

// ----------------------------------------------------------------- STRUCT: Snapshot

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    time: Float,
    iteration: usize,
    dt: Float,
    origin: Point,
    size: Float,
    cells: Vec<Cell>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    time: Float,
    iteration: usize,
    dt: Float,
    origin: Point,
    size: Float,
    cells: &'a [Cell],
}

// ----------------------------------------------------------- STRUCT: CartesianEngine

#[derive(Debug)]
pub struct CartesianEngine {
    mesh: Mesh,
    time: Float,
    iteration: usize,
    dt: Float,
    acceleration: Point,
    controls: SolverControls,
    coefficients: Option<EngineCoefficients>,
    boundary_conditions: BoundaryConditions,
    started: Instant,
    busy: Float,
}

impl CartesianEngine {
    /// Domain of edge `size` with its lower corner at `origin`, meshed
    /// uniformly at `level`.
    pub fn new(origin: Point, size: Float, level: u8) -> Self {
        let controls = SolverControls::default();
        CartesianEngine {
            mesh: Mesh::uniform(origin, size, level.min(MAX_LEVEL)),
            time: 0.0,
            iteration: 0,
            dt: controls.dt,
            acceleration: [0.0; 3],
            controls,
            coefficients: None,
            boundary_conditions: BoundaryConditions::default(),
            started: Instant::now(),
            busy: 0.0,
        }
    }

    /// Impact domain: `x` starts on the symmetry plane, `z` is centred.
    pub fn impact_domain(size: Float, level: u8) -> Self {
        CartesianEngine::new([0.0, 0.0, -size / 2.0], size, level)
    }

    pub fn get_mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn get_coefficients(&self) -> Option<&EngineCoefficients> {
        self.coefficients.as_ref()
    }

    pub fn get_boundary_conditions(&self) -> &BoundaryConditions {
        &self.boundary_conditions
    }

    fn charge(&mut self, start: Instant) {
        self.busy += start.elapsed().as_secs_f64();
    }

    fn views(&self) -> Vec<CellView<'_>> {
        (0..self.mesh.len()).map(|i| self.mesh.view(i)).collect()
    }

    /// Largest ratio of estimated error to threshold over `criteria`.
    fn error_ratio(&self, i: usize, criteria: &[RefinementCriterion]) -> Float {
        let mut ratio: Float = 0.0;
        for criterion in criteria.iter().filter(|c| c.active) {
            let v = self.mesh.value(i, criterion.field);
            for axis in AXES {
                let v_l = self
                    .mesh
                    .neighbor(i, axis, -1)
                    .map_or(v, |l| self.mesh.value(l, criterion.field));
                let v_r = self
                    .mesh
                    .neighbor(i, axis, 1)
                    .map_or(v, |r| self.mesh.value(r, criterion.field));
                let estimate = 0.5 * (v_l - 2.0 * v + v_r).abs();
                ratio = ratio.max(estimate / criterion.threshold);
            }
        }
        ratio
    }

    fn apply_boundary_conditions(&mut self) {
        for face in FACES {
            let Some(condition) = self.boundary_conditions.get(face).copied() else {
                continue;
            };
            if let VelocityCondition::InterfaceScaled { ratio } = condition.normal_velocity {
                let axis = face.axis();
                let boundary = (0..self.mesh.len())
                    .filter(|&i| self.mesh.on_boundary(i, axis, face.direction()))
                    .collect::<Vec<usize>>();
                let component = Field::velocity(axis).index();
                let interface = Field::Interface.index();
                let cells = self.mesh.get_cells_mut();
                for i in boundary {
                    cells[i].values[component] = ratio * cells[i].values[interface];
                }
            }
        }
    }

    fn transport(&mut self, dt: Float) {
        let mesh = &self.mesh;
        let updated = (0..mesh.len())
            .into_par_iter()
            .map(|i| {
                let velocity = mesh.view(i).velocity();
                let center = mesh.view(i).center;
                Field::TRANSPORTED.map(|field| {
                    let v = mesh.value(i, field);
                    let mut rate = 0.0;
                    for axis in AXES {
                        let u = velocity[axis.index()];
                        if u == 0.0 {
                            continue;
                        }
                        let dir = if u > 0.0 { -1 } else { 1 };
                        if let Some(n) = mesh.neighbor(i, axis, dir) {
                            let distance =
                                (mesh.view(n).center[axis.index()] - center[axis.index()]).abs();
                            if distance > 0.0 {
                                rate += u.abs() * (v - mesh.value(n, field)) / distance;
                            }
                        }
                    }
                    (v - dt * rate).clamp(0.0, 1.0)
                })
            })
            .collect::<Vec<[Float; 3]>>();
        for (cell, values) in self.mesh.get_cells_mut().iter_mut().zip(updated) {
            for (field, value) in Field::TRANSPORTED.iter().zip(values) {
                cell.values[field.index()] = value;
            }
        }
    }
}

impl Engine for CartesianEngine {
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
        self.mesh.len()
    }

    fn performance(&self) -> Performance {
        Performance {
            wall: self.started.elapsed().as_secs_f64(),
            cpu: self.busy,
        }
    }

    fn set_coefficients(&mut self, coefficients: &EngineCoefficients) {
        self.coefficients = Some(*coefficients);
    }

    fn set_boundary_conditions(&mut self, conditions: &BoundaryConditions) {
        self.boundary_conditions = conditions.clone();
    }

    fn set_solver_controls(&mut self, controls: SolverControls) {
        self.controls = controls;
        if self.iteration == 0 {
            self.dt = controls.dt;
        }
    }

    fn get_solver_controls(&self) -> SolverControls {
        self.controls
    }

    fn refine(&mut self, predicate: &(dyn Fn(&CellView) -> bool + Sync)) {
        let start = Instant::now();
        loop {
            let flags = self
                .views()
                .par_iter()
                .map(|cell| cell.level < MAX_LEVEL && predicate(cell))
                .collect::<Vec<bool>>();
            if self.mesh.split(&flags) == 0 {
                break;
            }
        }
        self.charge(start);
    }

    fn unrefine(&mut self, predicate: &(dyn Fn(&CellView) -> bool + Sync)) {
        let start = Instant::now();
        let mesh = &self.mesh;
        let targets = (0..mesh.len())
            .into_par_iter()
            .map(|i| {
                let key = mesh.get_cells()[i].key;
                (0..key.level).find_map(|level| {
                    let ancestor = key.ancestor(level);
                    let coarse = CellView {
                        center: mesh.center(&ancestor),
                        size: mesh.cell_size(level),
                        level,
                        values: &NO_VALUES,
                    };
                    predicate(&coarse).then_some(ancestor)
                })
            })
            .collect::<Vec<Option<CellKey>>>();
        self.mesh.collapse(&targets);
        self.charge(start);
    }

    fn adapt_wavelet(
        &mut self,
        criteria: &[RefinementCriterion],
        max_level: u8,
        min_level: u8,
    ) -> AdaptSummary {
        let start = Instant::now();
        let max_level = max_level.min(MAX_LEVEL);
        let min_level = min_level.min(max_level);
        let mut summary = AdaptSummary {
            coarsened: self.mesh.collapse_above(max_level),
            ..Default::default()
        };

        let errors = (0..self.mesh.len())
            .into_par_iter()
            .map(|i| self.error_ratio(i, criteria))
            .collect::<Vec<Float>>();

        let cells = self.mesh.get_cells();
        let mut groups: HashMap<CellKey, (usize, bool)> = HashMap::new();
        for (cell, &error) in cells.iter().zip(errors.iter()) {
            if cell.key.level <= min_level {
                continue;
            }
            if let Some(parent) = cell.key.parent() {
                let entry = groups.entry(parent).or_insert((0, true));
                entry.0 += 1;
                entry.1 &= error < 1.0 / COARSEN_FACTOR;
            }
        }
        let targets = cells
            .iter()
            .map(|cell| {
                cell.key
                    .parent()
                    .filter(|parent| cell.key.level > min_level && groups[parent] == (8, true))
            })
            .collect::<Vec<Option<CellKey>>>();
        let to_split = cells
            .iter()
            .zip(errors.iter())
            .filter(|(cell, &error)| cell.key.level < max_level && error > 1.0)
            .map(|(cell, _)| cell.key)
            .collect::<HashSet<CellKey>>();

        summary.coarsened += self.mesh.collapse(&targets);
        let flags = self
            .mesh
            .get_cells()
            .iter()
            .map(|cell| to_split.contains(&cell.key))
            .collect::<Vec<bool>>();
        summary.refined += self.mesh.split(&flags);

        while self.mesh.get_coarsest() < min_level {
            let flags = self
                .mesh
                .get_cells()
                .iter()
                .map(|cell| cell.key.level < min_level)
                .collect::<Vec<bool>>();
            summary.refined += self.mesh.split(&flags);
        }
        self.charge(start);
        summary
    }

    fn set_fraction(&mut self, field: Field, phi: &(dyn Fn(Point) -> Float + Sync)) {
        let start = Instant::now();
        let fractions = self
            .views()
            .par_iter()
            .map(|cell| {
                let h = cell.size;
                let corners = (0..8)
                    .map(|n| {
                        let p: Point = std::array::from_fn(|a| {
                            let sign = if (n >> a) & 1 == 1 { 0.5 } else { -0.5 };
                            cell.center[a] + sign * h
                        });
                        phi(p)
                    })
                    .collect::<Vec<Float>>();
                if corners.iter().all(|&v| v > 0.0) && phi(cell.center) > 0.0 {
                    return 1.0;
                }
                if corners.iter().all(|&v| v < 0.0) && phi(cell.center) < 0.0 {
                    return 0.0;
                }
                let n = FRACTION_SUBSAMPLES;
                let step = h / n as Float;
                let mut inside = 0usize;
                for k in 0..n {
                    for j in 0..n {
                        for i in 0..n {
                            let offsets = [i, j, k];
                            let p: Point = std::array::from_fn(|a| {
                                cell.center[a] - 0.5 * h + (offsets[a] as Float + 0.5) * step
                            });
                            if phi(p) > 0.0 {
                                inside += 1;
                            }
                        }
                    }
                }
                inside as Float / (n * n * n) as Float
            })
            .collect::<Vec<Float>>();
        for (cell, value) in self.mesh.get_cells_mut().iter_mut().zip(fractions) {
            cell.values[field.index()] = value;
        }
        self.charge(start);
    }

    fn fill(&mut self, field: Field, value: &(dyn Fn(&CellView) -> Float + Sync)) {
        let values = self
            .views()
            .par_iter()
            .map(|cell| value(cell))
            .collect::<Vec<Float>>();
        for (cell, v) in self.mesh.get_cells_mut().iter_mut().zip(values) {
            cell.values[field.index()] = v;
        }
    }

    fn add_acceleration(&mut self, acceleration: Point) {
        for (a, da) in self.acceleration.iter_mut().zip(acceleration) {
            *a += da;
        }
    }

    fn compute_vorticity(&mut self, target: Field) {
        let mesh = &self.mesh;
        let omega = (0..mesh.len())
            .into_par_iter()
            .map(|i| {
                let grad_uy = mesh.gradient(i, Field::VelocityY);
                let grad_uz = mesh.gradient(i, Field::VelocityZ);
                grad_uz[Axis::Y.index()] - grad_uy[Axis::Z.index()]
            })
            .collect::<Vec<Float>>();
        for (cell, value) in self.mesh.get_cells_mut().iter_mut().zip(omega) {
            cell.values[target.index()] = value;
        }
    }

    fn remove_small_structures(
        &mut self,
        field: Field,
        min_diameter: usize,
        bubbles: bool,
    ) -> usize {
        let start = Instant::now();
        let n = self.mesh.len();
        let phase = |v: Float| if bubbles { 1.0 - v } else { v };
        let active = (0..n)
            .map(|i| phase(self.mesh.value(i, field)) > STRUCTURE_THRESHOLD)
            .collect::<Vec<bool>>();

        let mut parent = (0..n).collect::<Vec<usize>>();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for i in (0..n).filter(|&i| active[i]) {
            for axis in AXES {
                if let Some(j) = self.mesh.neighbor(i, axis, 1) {
                    if active[j] {
                        let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                        if a != b {
                            parent[a] = b;
                        }
                    }
                }
            }
        }
        // a coarse cell only sees one of its finer neighbours; link the others back
        for i in (0..n).filter(|&i| active[i]) {
            for axis in AXES {
                if let Some(j) = self.mesh.neighbor(i, axis, -1) {
                    if active[j] {
                        let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                        if a != b {
                            parent[a] = b;
                        }
                    }
                }
            }
        }

        let mut sizes: HashMap<usize, usize> = HashMap::new();
        let roots = (0..n)
            .map(|i| {
                if active[i] {
                    let root = find(&mut parent, i);
                    *sizes.entry(root).or_insert(0) += 1;
                    Some(root)
                } else {
                    None
                }
            })
            .collect::<Vec<Option<usize>>>();
        let min_cells = min_diameter.pow(3);
        let fill = if bubbles { 1.0 } else { 0.0 };
        let cells = self.mesh.get_cells_mut();
        for (cell, root) in cells.iter_mut().zip(roots.iter()) {
            if let Some(root) = root {
                if sizes[root] < min_cells {
                    cell.values[field.index()] = fill;
                }
            }
        }
        self.charge(start);
        sizes.values().filter(|&&size| size < min_cells).count()
    }

    fn statistics(&self, field: Field) -> FieldStatistics {
        let mut stats = FieldStatistics {
            sum: 0.0,
            min: Float::INFINITY,
            max: Float::NEG_INFINITY,
        };
        for i in 0..self.mesh.len() {
            let v = self.mesh.value(i, field);
            stats.sum += v * self.mesh.volume(i);
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
        }
        stats
    }

    fn interface_extent(&self, field: Field, axis: Axis) -> Option<(Float, Float)> {
        (0..self.mesh.len())
            .filter(|&i| {
                let v = self.mesh.value(i, field);
                v > 1e-6 && v < 1.0 - 1e-6
            })
            .map(|i| self.mesh.view(i).center[axis.index()])
            .fold(None, |extent, x| match extent {
                None => Some((x, x)),
                Some((low, high)) => Some((x.min(low), x.max(high))),
            })
    }

    fn write_facets(&self, field: Field, out: &mut dyn Write) -> ImpactResult<()> {
        facets::write_facets(&self.mesh, field, out)
    }

    fn write_snapshot(&self, out: &mut dyn Write) -> ImpactResult<()> {
        let snapshot = SnapshotRef {
            time: self.time,
            iteration: self.iteration,
            dt: self.dt,
            origin: self.mesh.get_origin(),
            size: self.mesh.get_size(),
            cells: self.mesh.get_cells(),
        };
        serde_json::to_writer(&mut *out, &snapshot)?;
        out.flush()?;
        Ok(())
    }

    fn restore(&mut self, path: &Path) -> ImpactResult<Option<RestoredState>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(path).map_err(|e| ImpactError::path(path, e))?;
        let snapshot: Snapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        if snapshot.cells.is_empty() {
            return Err(ImpactError::engine(format!(
                "checkpoint {} holds no cells",
                path.display()
            )));
        }
        self.mesh = Mesh::from_cells(snapshot.origin, snapshot.size, snapshot.cells);
        self.time = snapshot.time;
        self.iteration = snapshot.iteration;
        self.dt = snapshot.dt;
        Ok(Some(RestoredState {
            iteration: self.iteration,
            time: self.time,
        }))
    }

    fn render(&mut self, view: &View, path: &Path) -> ImpactResult<()> {
        let rgb = render::render_frame(&self.mesh, view);
        render::append_frame(path, view, &rgb)
    }

    fn advance(&mut self, dt_max: Float) -> ImpactResult<Float> {
        let start = Instant::now();
        let h_min = self.mesh.cell_size(self.mesh.get_finest());
        let u_max = self
            .mesh
            .get_cells()
            .par_iter()
            .map(|cell| {
                Field::VELOCITY
                    .iter()
                    .map(|f| cell.values[f.index()].abs())
                    .fold(0.0, Float::max)
            })
            .reduce(|| 0.0, Float::max);
        let mut dt = dt_max.min(self.controls.dt);
        if u_max > 0.0 {
            dt = dt.min(CFL * h_min / u_max);
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ImpactError::engine(format!(
                "invalid time step {dt} at t = {}",
                self.time
            )));
        }

        let acceleration = self.acceleration;
        for cell in self.mesh.get_cells_mut() {
            for axis in AXES {
                cell.values[Field::velocity(axis).index()] += dt * acceleration[axis.index()];
            }
        }
        self.apply_boundary_conditions();
        self.transport(dt);

        self.acceleration = [0.0; 3];
        self.time += dt;
        self.iteration += 1;
        self.dt = dt;
        self.charge(start);
        Ok(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{DropPlacement, ImpactOffset, Implicit};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn engine(level: u8) -> CartesianEngine {
        CartesianEngine::impact_domain(8.0, level)
    }

    #[test]
    fn test_pool_fraction_volume_is_exact_on_aligned_mesh() {
        let mut engine = engine(3);

        engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);

        assert_abs_diff_eq!(engine.statistics(Field::Interface).sum, 128.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere_fraction_volume() {
        let mut engine = engine(4);
        let placement = DropPlacement::new(2.0, 0.1, 90.0, &ImpactOffset::default());
        let sphere = placement.sphere;
        engine.refine(&|cell| cell.level < 6 && sphere.eval(cell.center).abs() < 2.0 * cell.size);

        engine.set_fraction(Field::DropTracer, &|p| sphere.eval(p));

        // half the sphere lies in the domain (x >= 0)
        let expected = 0.5 * 4.0 / 3.0 * PI;
        assert_abs_diff_eq!(engine.statistics(Field::DropTracer).sum, expected, epsilon = 0.05);
    }

    #[test]
    fn test_refine_stops_when_predicate_fails() {
        let mut engine = engine(2);

        engine.refine(&|cell| cell.level < 4 && cell.center[1] < 2.0);

        let mesh = engine.get_mesh();
        for i in 0..mesh.len() {
            let cell = mesh.view(i);
            if cell.center[1] < 2.0 {
                assert_eq!(cell.level, 4);
            }
            assert!(cell.level <= 4);
        }
    }

    #[test]
    fn test_unrefine_collapses_to_the_satisfying_ancestor() {
        let mut engine = engine(4);

        engine.unrefine(&|cell| cell.level == 2 && cell.center[1] > 4.0);

        let mesh = engine.get_mesh();
        for i in 0..mesh.len() {
            let cell = mesh.view(i);
            if cell.center[1] > 4.0 {
                assert_eq!(cell.level, 2);
            } else {
                assert_eq!(cell.level, 4);
            }
        }
    }

    #[test]
    fn test_adapt_wavelet_keeps_levels_in_range() {
        let mut engine = engine(3);
        engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);
        let criteria = [RefinementCriterion::new(Field::Interface, 1e-4)];

        for _ in 0..3 {
            engine.adapt_wavelet(&criteria, 5, 2);
            engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);
        }

        let mesh = engine.get_mesh();
        assert!(mesh.get_coarsest() >= 2);
        assert!(mesh.get_finest() <= 5);
        let at_surface = mesh.locate([1.0, 1.99, 0.0]).unwrap();
        assert_eq!(mesh.view(at_surface).level, 5);
        let far = mesh.locate([1.0, 7.0, 0.0]).unwrap();
        assert_eq!(mesh.view(far).level, 2);
    }

    #[test]
    fn test_adapt_wavelet_refines_up_to_minimum() {
        let mut engine = engine(1);

        let summary = engine.adapt_wavelet(&[], 5, 3);

        assert!(summary.refined > 0);
        assert_eq!(engine.get_mesh().get_coarsest(), 3);
    }

    #[test]
    fn test_remove_small_droplets_and_bubbles() {
        let mut engine = engine(4);
        // a pool, one droplet of a single cell and one bubble of a single cell
        engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);
        let drop = engine.get_mesh().locate([3.25, 6.25, 0.25]).unwrap();
        let bubble = engine.get_mesh().locate([3.25, 0.75, 0.25]).unwrap();
        engine.mesh.get_cells_mut()[drop].values[Field::Interface.index()] = 1.0;
        engine.mesh.get_cells_mut()[bubble].values[Field::Interface.index()] = 0.0;

        let droplets = engine.remove_small_structures(Field::Interface, 2, false);
        let bubbles = engine.remove_small_structures(Field::Interface, 2, true);

        assert_eq!(droplets, 1);
        assert_eq!(bubbles, 1);
        assert_eq!(engine.get_mesh().value(drop, Field::Interface), 0.0);
        assert_eq!(engine.get_mesh().value(bubble, Field::Interface), 1.0);
        assert_abs_diff_eq!(engine.statistics(Field::Interface).sum, 128.0, epsilon = 1e-9);
    }

    #[test]
    fn test_advance_applies_body_force_and_counts() {
        let mut engine = engine(2);
        engine.add_acceleration([0.0, -2.0, 0.0]);

        let dt = engine.advance(1e-3).unwrap();

        assert_eq!(dt, 1e-3);
        assert_eq!(engine.get_iteration(), 1);
        assert_abs_diff_eq!(engine.get_time(), 1e-3);
        assert_abs_diff_eq!(engine.get_mesh().value(0, Field::VelocityY), -2e-3);

        // the acceleration only applies to one step
        engine.advance(1e-3).unwrap();
        assert_abs_diff_eq!(engine.get_mesh().value(0, Field::VelocityY), -2e-3);
    }

    #[test]
    fn test_advance_respects_cfl() {
        let mut engine = engine(3);
        engine.set_solver_controls(SolverControls {
            dt: 1.0,
            ..Default::default()
        });
        engine.fill(Field::VelocityZ, &|_| 10.0);

        let dt = engine.advance(1.0).unwrap();

        // unit cells
        assert_abs_diff_eq!(dt, CFL / 10.0);
    }

    #[test]
    fn test_advance_rejects_zero_step() {
        let mut engine = engine(1);

        assert!(matches!(engine.advance(0.0), Err(ImpactError::Engine(_))));
    }

    #[test]
    fn test_upwind_transport_moves_the_interface() {
        let mut engine = engine(3);
        engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);
        engine.fill(Field::VelocityY, &|_| 1.0);
        let before = engine.statistics(Field::Interface).sum;

        for _ in 0..10 {
            engine.advance(1e-3).unwrap();
        }

        assert!(engine.statistics(Field::Interface).sum > before);
    }

    #[test]
    fn test_inflow_boundary_scales_with_interface() {
        let mut engine = engine(2);
        engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);
        engine.set_boundary_conditions(&BoundaryConditions::impact(0.5));

        engine.advance(1e-3).unwrap();

        let mesh = engine.get_mesh();
        let front_liquid = mesh.locate([1.0, 1.0, 3.5]).unwrap();
        let front_gas = mesh.locate([1.0, 5.0, 3.5]).unwrap();
        let inner = mesh.locate([1.0, 1.0, 0.5]).unwrap();
        assert_eq!(mesh.value(front_liquid, Field::VelocityZ), 0.5);
        assert_eq!(mesh.value(front_gas, Field::VelocityZ), 0.0);
        assert_eq!(mesh.value(inner, Field::VelocityZ), 0.0);
    }

    #[test]
    fn test_vorticity_of_rigid_rotation() {
        let mut engine = engine(3);
        // u = (0, -(z - z0), (y - y0)) rotates about x with vorticity 2
        engine.fill(Field::VelocityY, &|cell| -cell.center[2]);
        engine.fill(Field::VelocityZ, &|cell| cell.center[1] - 4.0);

        engine.compute_vorticity(Field::Vorticity);

        let i = engine.get_mesh().locate([4.0, 4.0, 0.0]).unwrap();
        assert_abs_diff_eq!(engine.get_mesh().value(i, Field::Vorticity), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interface_extent() {
        let mut engine = engine(3);
        engine.set_fraction(Field::Interface, &|p| 2.2 - p[1]);

        let (low, high) = engine.interface_extent(Field::Interface, Axis::Y).unwrap();

        assert_abs_diff_eq!(low, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(high, 2.5, epsilon = 1e-12);
        engine.fill(Field::Interface, &|_| 1.0);
        assert!(engine.interface_extent(Field::Interface, Axis::Y).is_none());
    }

    #[test]
    fn test_snapshot_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart");
        let mut engine = engine(2);
        engine.set_fraction(Field::Interface, &|p| 2.0 - p[1]);
        engine.advance(1e-3).unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        engine.write_snapshot(&mut file).unwrap();

        let mut restored = CartesianEngine::impact_domain(8.0, 1);
        let state = restored.restore(&path).unwrap().unwrap();

        assert_eq!(state.iteration, 1);
        assert_eq!(state.time, engine.get_time());
        assert_eq!(restored.cell_count(), engine.cell_count());
        assert_eq!(
            restored.statistics(Field::Interface),
            engine.statistics(Field::Interface)
        );
    }

    #[test]
    fn test_restore_without_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(1);

        assert!(engine.restore(&dir.path().join("restart")).unwrap().is_none());
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart");
        std::fs::write(&path, "not a checkpoint").unwrap();
        let mut engine = engine(1);

        assert!(matches!(engine.restore(&path), Err(ImpactError::Snapshot(_))));
    }
}
