use super::mesh::Mesh;
use crate::io::format_g;
use crate::prelude_crate::*;
use std::io::Write;

const INTERFACE_CLIP: Float = 1e-6;

/// Cube edges as pairs of corner numbers, corner `n` sitting at
/// `(±1, ±1, ±1)` with bit `a` of `n` giving the sign along axis `a`.
const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Planar facet of the interface inside cell `i`, as an ordered polygon.
///
/// The plane normal follows the fraction gradient; its offset is the linear
/// estimate matching the cell's volume fraction.
pub fn facet(mesh: &Mesh, i: usize, field: Field) -> Option<Vec<Point>> {
    let c = mesh.value(i, field);
    if c <= INTERFACE_CLIP || c >= 1.0 - INTERFACE_CLIP {
        return None;
    }
    let gradient = mesh.gradient(i, field);
    let norm = gradient.iter().map(|g| g * g).sum::<Float>().sqrt();
    if norm < 1e-12 {
        return None;
    }
    let m = gradient.map(|g| -g / norm);
    let view = mesh.view(i);
    let h = view.size;
    let x_c = view.center;
    let d = (c - 0.5) * h * m.iter().map(|m_a| m_a.abs()).sum::<Float>();

    let corners: [Point; 8] = std::array::from_fn(|n| {
        std::array::from_fn(|a| {
            let sign = if (n >> a) & 1 == 1 { 1.0 } else { -1.0 };
            x_c[a] + 0.5 * h * sign
        })
    });
    let side = |p: &Point| (0..3).map(|a| m[a] * (p[a] - x_c[a])).sum::<Float>() - d;

    let mut points: Vec<Point> = Vec::with_capacity(6);
    for (a, b) in EDGES {
        let (s_a, s_b) = (side(&corners[a]), side(&corners[b]));
        if s_a * s_b > 0.0 || s_a == s_b {
            continue;
        }
        let t = s_a / (s_a - s_b);
        let p: Point = std::array::from_fn(|k| corners[a][k] + t * (corners[b][k] - corners[a][k]));
        let duplicate = points
            .iter()
            .any(|q| (0..3).all(|k| (q[k] - p[k]).abs() < 1e-12 * h.max(1.0)));
        if !duplicate {
            points.push(p);
        }
    }
    if points.len() < 3 {
        return None;
    }

    let n = points.len() as Float;
    let centroid: Point = std::array::from_fn(|k| points.iter().map(|p| p[k]).sum::<Float>() / n);
    let (u, v) = plane_basis(m);
    points.sort_by(|p, q| {
        let angle = |r: &Point| {
            let rel: Point = std::array::from_fn(|k| r[k] - centroid[k]);
            dot(rel, v).atan2(dot(rel, u))
        };
        angle(p).total_cmp(&angle(q))
    });
    Some(points)
}

/// Writes every facet as one `x y z` line per vertex, facets separated by a
/// blank line.
pub fn write_facets(mesh: &Mesh, field: Field, out: &mut dyn Write) -> ImpactResult<()> {
    for i in 0..mesh.len() {
        if let Some(polygon) = facet(mesh, i, field) {
            for p in polygon {
                writeln!(out, "{} {} {}", format_g(p[0]), format_g(p[1]), format_g(p[2]))?;
            }
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn dot(a: Point, b: Point) -> Float {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Point, b: Point) -> Point {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn plane_basis(m: Point) -> (Point, Point) {
    let helper = if m[0].abs() < 0.9 {
        [1.0, 0.0, 0.0]
    } else {
        [0.0, 1.0, 0.0]
    };
    let u = cross(m, helper);
    let norm = dot(u, u).sqrt();
    let u = u.map(|x| x / norm);
    (u, cross(m, u))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cartesian::mesh::Mesh;

    fn layered_mesh() -> Mesh {
        let mut mesh = Mesh::uniform([0.0; 3], 1.0, 3);
        let centers = (0..mesh.len())
            .map(|i| mesh.view(i).center)
            .collect::<Vec<Point>>();
        // liquid below y = 0.5 + h/4, so the row at y = 0.5625 is three quarters full
        for (cell, c) in mesh.get_cells_mut().iter_mut().zip(centers.iter()) {
            cell.values[Field::Interface.index()] = if c[1] < 0.5 {
                1.0
            } else if c[1] < 0.625 {
                0.75
            } else {
                0.0
            };
        }
        mesh
    }

    #[test]
    fn test_horizontal_facet_is_a_square() {
        let mesh = layered_mesh();
        let i = mesh.locate([0.5625, 0.5625, 0.5625]).unwrap();

        let polygon = facet(&mesh, i, Field::Interface).unwrap();

        assert_eq!(polygon.len(), 4);
        for p in &polygon {
            assert!((p[1] - 0.59375).abs() < 1e-12, "vertex off the plane: {p:?}");
        }
    }

    #[test]
    fn test_full_and_empty_cells_have_no_facet() {
        let mesh = layered_mesh();

        assert!(facet(&mesh, mesh.locate([0.5, 0.1, 0.5]).unwrap(), Field::Interface).is_none());
        assert!(facet(&mesh, mesh.locate([0.5, 0.9, 0.5]).unwrap(), Field::Interface).is_none());
    }

    #[test]
    fn test_write_facets_blocks() {
        let mesh = layered_mesh();
        let mut out = Vec::new();

        write_facets(&mesh, Field::Interface, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let blocks = text.split("\n\n").filter(|b| !b.trim().is_empty()).count();
        assert_eq!(blocks, 64);
        assert!(text.lines().next().unwrap().split_whitespace().count() == 3);
    }
}
