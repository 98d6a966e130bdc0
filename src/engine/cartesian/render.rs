use super::mesh::Mesh;
use crate::engine::{Camera, ColorRange, View};
use crate::prelude_crate::*;
use rayon::prelude::*;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const COOL: [Float; 3] = [0.230, 0.299, 0.754];
const NEUTRAL: [Float; 3] = [0.865, 0.865, 0.865];
const WARM: [Float; 3] = [0.706, 0.016, 0.150];
const BACKGROUND: [u8; 3] = [255, 255, 255];
const GRID: [u8; 3] = [0, 0, 0];
const ISOLINE: [u8; 3] = [255, 255, 255];

#[derive(Debug, Clone, Copy)]
struct Sample {
    cell: usize,
    value: Float,
    iso: Float,
}

/// Diverging blue-white-red colour map on `[0, 1]`.
pub fn cool_warm(s: Float) -> [u8; 3] {
    let s = if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.5 };
    let (from, to, t) = if s < 0.5 {
        (COOL, NEUTRAL, 2.0 * s)
    } else {
        (NEUTRAL, WARM, 2.0 * s - 1.0)
    };
    std::array::from_fn(|k| ((from[k] + t * (to[k] - from[k])) * 255.0).round() as u8)
}

/// Renders `view` on the symmetry plane `x = 0` as packed RGB rows.
pub fn render_frame(mesh: &Mesh, view: &View) -> Vec<u8> {
    let origin = mesh.get_origin();
    let size = mesh.get_size();
    let x = origin[0] + 0.5 * mesh.cell_size(mesh.get_finest());
    let (width, height) = (view.width, view.height);

    let samples = (0..width * height)
        .into_par_iter()
        .map(|n| {
            let (px, py) = (n % width, n / width);
            let s = (px as Float + 0.5) / width as Float;
            let z = match view.camera {
                Camera::Left => origin[2] + size * (1.0 - s),
                Camera::Right => origin[2] + size * s,
            };
            let y = origin[1] + size * (1.0 - (py as Float + 0.5) / height as Float);
            mesh.locate([x, y, z]).map(|cell| Sample {
                cell,
                value: mesh.value(cell, view.field),
                iso: view.isoline.map_or(0.0, |(field, _)| mesh.value(cell, field)),
            })
        })
        .collect::<Vec<Option<Sample>>>();

    let (low, high) = match view.range {
        ColorRange::Fixed(low, high) => (low, high),
        ColorRange::Auto => samples.iter().flatten().fold(
            (Float::INFINITY, Float::NEG_INFINITY),
            |(low, high), s| (low.min(s.value), high.max(s.value)),
        ),
    };
    let span = if high > low { high - low } else { 1.0 };

    let mut rgb = Vec::with_capacity(width * height * 3);
    for n in 0..width * height {
        let (px, py) = (n % width, n / width);
        let pixel = match samples[n] {
            None => BACKGROUND,
            Some(sample) => {
                let right = (px + 1 < width).then(|| samples[n + 1]).flatten();
                let below = (py + 1 < height).then(|| samples[n + width]).flatten();
                let edge = view.cells
                    && [right, below]
                        .iter()
                        .flatten()
                        .any(|other| other.cell != sample.cell);
                let crossing = view.isoline.is_some_and(|(_, level)| {
                    [right, below]
                        .iter()
                        .flatten()
                        .any(|other| (sample.iso - level) * (other.iso - level) < 0.0)
                });
                if crossing {
                    ISOLINE
                } else if edge {
                    GRID
                } else {
                    cool_warm((sample.value - low) / span)
                }
            }
        };
        rgb.extend_from_slice(&pixel);
    }
    rgb
}

/// Frames for `path` are appended as binary PPM images next to it.
pub fn frame_path(path: &Path) -> PathBuf {
    path.with_extension("ppm")
}

pub fn append_frame(path: &Path, view: &View, rgb: &[u8]) -> ImpactResult<()> {
    let path = frame_path(path);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| ImpactError::path(&path, e))?;
    let mut out = BufWriter::new(file);
    write!(out, "P6\n{} {}\n255\n", view.width, view.height)?;
    out.write_all(rgb)?;
    out.flush()?;
    Ok(())
}
