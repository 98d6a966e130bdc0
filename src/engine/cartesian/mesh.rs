use crate::engine::{CellView, FIELD_COUNT};
use crate::prelude_crate::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deepest level the reference mesh supports.
pub const MAX_LEVEL: u8 = 20;

// ----------------------------------------------------------------------- STRUCT: CellKey

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub level: u8,
    pub index: [u32; 3],
}

impl CellKey {
    pub fn parent(&self) -> Option<CellKey> {
        if self.level == 0 {
            return None;
        }
        Some(self.ancestor(self.level - 1))
    }

    /// Ancestor at `level`, which must not be finer than `self`.
    pub fn ancestor(&self, level: u8) -> CellKey {
        let shift = self.level - level;
        CellKey {
            level,
            index: self.index.map(|i| i >> shift),
        }
    }

    pub fn children(&self) -> [CellKey; 8] {
        std::array::from_fn(|n| CellKey {
            level: self.level + 1,
            index: [
                2 * self.index[0] + (n & 1) as u32,
                2 * self.index[1] + ((n >> 1) & 1) as u32,
                2 * self.index[2] + ((n >> 2) & 1) as u32,
            ],
        })
    }
}

// -------------------------------------------------------------------------- STRUCT: Cell

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub key: CellKey,
    pub values: [Float; FIELD_COUNT],
}

// -------------------------------------------------------------------------- STRUCT: Mesh

/// Leaf cells of a cubic octree, with a hash index for point location.
#[derive(Debug, Clone)]
pub struct Mesh {
    origin: Point,
    size: Float,
    cells: Vec<Cell>,
    lookup: HashMap<CellKey, usize>,
    coarsest: u8,
    finest: u8,
}

impl Mesh {
    pub fn uniform(origin: Point, size: Float, level: u8) -> Self {
        let n = 1u32 << level;
        let mut cells = Vec::with_capacity((n as usize).pow(3));
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    cells.push(Cell {
                        key: CellKey {
                            level,
                            index: [i, j, k],
                        },
                        values: [0.0; FIELD_COUNT],
                    });
                }
            }
        }
        Mesh::from_cells(origin, size, cells)
    }

    pub fn from_cells(origin: Point, size: Float, cells: Vec<Cell>) -> Self {
        let mut mesh = Mesh {
            origin,
            size,
            cells,
            lookup: HashMap::new(),
            coarsest: 0,
            finest: 0,
        };
        mesh.rebuild_index();
        mesh
    }

    fn rebuild_index(&mut self) {
        self.lookup = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell.key, i))
            .collect();
        self.coarsest = self.cells.iter().map(|c| c.key.level).min().unwrap_or(0);
        self.finest = self.cells.iter().map(|c| c.key.level).max().unwrap_or(0);
    }
}

impl Mesh {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get_origin(&self) -> Point {
        self.origin
    }

    pub fn get_size(&self) -> Float {
        self.size
    }

    pub fn get_cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get_cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn get_finest(&self) -> u8 {
        self.finest
    }

    pub fn get_coarsest(&self) -> u8 {
        self.coarsest
    }

    pub fn cell_size(&self, level: u8) -> Float {
        self.size / (1u64 << level) as Float
    }

    pub fn center(&self, key: &CellKey) -> Point {
        let h = self.cell_size(key.level);
        std::array::from_fn(|a| self.origin[a] + (key.index[a] as Float + 0.5) * h)
    }

    pub fn volume(&self, i: usize) -> Float {
        self.cell_size(self.cells[i].key.level).powi(3)
    }

    pub fn view(&self, i: usize) -> CellView<'_> {
        let cell = &self.cells[i];
        CellView {
            center: self.center(&cell.key),
            size: self.cell_size(cell.key.level),
            level: cell.key.level,
            values: &cell.values,
        }
    }

    pub fn value(&self, i: usize, field: Field) -> Float {
        self.cells[i].values[field.index()]
    }

    /// Key of the cell at `level` containing `p`, or `None` outside the domain.
    pub fn key_at(&self, p: Point, level: u8) -> Option<CellKey> {
        let n = (1u64 << level) as Float;
        let h = self.cell_size(level);
        let mut index = [0u32; 3];
        for a in 0..3 {
            let x = ((p[a] - self.origin[a]) / h).floor();
            if !(0.0..n).contains(&x) {
                return None;
            }
            index[a] = x as u32;
        }
        Some(CellKey { level, index })
    }

    /// Leaf cell containing `p`.
    pub fn locate(&self, p: Point) -> Option<usize> {
        for level in self.coarsest..=self.finest {
            let key = self.key_at(p, level)?;
            if let Some(&i) = self.lookup.get(&key) {
                return Some(i);
            }
        }
        None
    }

    /// Leaf across the face of cell `i` in direction `dir` (`-1` or `+1`) along `axis`.
    pub fn neighbor(&self, i: usize, axis: Axis, dir: i32) -> Option<usize> {
        let key = self.cells[i].key;
        let h = self.cell_size(key.level);
        let mut p = self.center(&key);
        p[axis.index()] += dir as Float * (0.5 * h + 0.25 * self.cell_size(self.finest));
        self.locate(p)
    }

    /// Central-difference gradient of `field` at cell `i`, one-sided at
    /// the domain boundary.
    pub fn gradient(&self, i: usize, field: Field) -> Point {
        let center = self.center(&self.cells[i].key);
        let v = self.value(i, field);
        let mut gradient = [0.0; 3];
        for axis in AXES {
            let a = axis.index();
            let left = self.neighbor(i, axis, -1);
            let right = self.neighbor(i, axis, 1);
            let (x_l, v_l) = match left {
                Some(l) => (self.center(&self.cells[l].key)[a], self.value(l, field)),
                None => (center[a], v),
            };
            let (x_r, v_r) = match right {
                Some(r) => (self.center(&self.cells[r].key)[a], self.value(r, field)),
                None => (center[a], v),
            };
            if x_r > x_l {
                gradient[a] = (v_r - v_l) / (x_r - x_l);
            }
        }
        gradient
    }

    /// Touches the domain face `dir` along `axis`.
    pub fn on_boundary(&self, i: usize, axis: Axis, dir: i32) -> bool {
        let key = self.cells[i].key;
        let n = 1u32 << key.level;
        let index = key.index[axis.index()];
        if dir < 0 {
            index == 0
        } else {
            index == n - 1
        }
    }
}

// ------------------------------------------------------------------------- RESTRUCTURING

impl Mesh {
    /// Replaces each flagged leaf by its eight children, which inherit its values.
    pub fn split(&mut self, flags: &[bool]) -> usize {
        let count = flags.iter().filter(|&&f| f).count();
        if count == 0 {
            return 0;
        }
        let mut cells = Vec::with_capacity(self.cells.len() + 7 * count);
        for (cell, &flag) in self.cells.drain(..).zip(flags.iter()) {
            if flag && cell.key.level < MAX_LEVEL {
                for key in cell.key.children() {
                    cells.push(Cell {
                        key,
                        values: cell.values,
                    });
                }
            } else {
                cells.push(cell);
            }
        }
        self.cells = cells;
        self.rebuild_index();
        count
    }

    /// Replaces leaves by the ancestor they are mapped to, averaging values by
    /// volume. Every leaf under a target ancestor must map to it.
    pub fn collapse(&mut self, targets: &[Option<CellKey>]) -> usize {
        let mut merged: HashMap<CellKey, usize> = HashMap::new();
        let mut cells: Vec<Cell> = Vec::with_capacity(self.cells.len());
        for (cell, target) in self.cells.drain(..).zip(targets.iter()) {
            match target {
                Some(ancestor) => {
                    let weight = 0.125_f64.powi((cell.key.level - ancestor.level) as i32);
                    let slot = *merged.entry(*ancestor).or_insert_with(|| {
                        cells.push(Cell {
                            key: *ancestor,
                            values: [0.0; FIELD_COUNT],
                        });
                        cells.len() - 1
                    });
                    for (acc, v) in cells[slot].values.iter_mut().zip(cell.values.iter()) {
                        *acc += weight * v;
                    }
                }
                None => cells.push(cell),
            }
        }
        self.cells = cells;
        self.rebuild_index();
        merged.len()
    }

    /// Collapses every leaf finer than `level` to its ancestor at `level`.
    pub fn collapse_above(&mut self, level: u8) -> usize {
        if self.finest <= level {
            return 0;
        }
        let targets = self
            .cells
            .iter()
            .map(|cell| (cell.key.level > level).then(|| cell.key.ancestor(level)))
            .collect::<Vec<Option<CellKey>>>();
        self.collapse(&targets)
    }
}
