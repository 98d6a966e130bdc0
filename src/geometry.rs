//! Implicit geometry of the initial state.
//!
//! Shapes are functions from a point to a signed scalar that is positive
//! inside the shape. The engine turns them into volume fractions.

use crate::prelude_crate::*;
use serde::Deserialize;

pub trait Implicit: Sync {
    fn eval(&self, p: Point) -> Float;
}

impl<F> Implicit for F
where
    F: Fn(Point) -> Float + Sync,
{
    fn eval(&self, p: Point) -> Float {
        self(p)
    }
}

/// Solid sphere, `r² - |p - c|²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Point,
    pub radius: Float,
}

impl Sphere {
    pub fn squared_distance(&self, p: Point) -> Float {
        (0..3).map(|i| (p[i] - self.center[i]).powi(2)).sum()
    }
}

impl Implicit for Sphere {
    fn eval(&self, p: Point) -> Float {
        self.radius * self.radius - self.squared_distance(p)
    }
}

/// Half-space below the horizontal plane `y = height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BelowPlane {
    pub height: Float,
}

impl Implicit for BelowPlane {
    fn eval(&self, p: Point) -> Float {
        self.height - p[Axis::Y.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Union<A, B>(pub A, pub B);

impl<A: Implicit, B: Implicit> Implicit for Union<A, B> {
    fn eval(&self, p: Point) -> Float {
        self.0.eval(p).max(self.1.eval(p))
    }
}

pub fn union<A: Implicit, B: Implicit>(a: A, b: B) -> Union<A, B> {
    Union(a, b)
}

// ----------------------------------------------------------------- STRUCT: ImpactOffset

/// Empirical linear relation between impact angle and the horizontal offset of
/// the drop centre, keeping the drop's leading point at a fixed standoff.
///
/// Angles at or beyond `cutoff_angle` give no offset. The fit is only known to
/// hold between 15° and the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImpactOffset {
    pub slope: Float,
    pub intercept: Float,
    pub cutoff_angle: Float,
}

impl Default for ImpactOffset {
    fn default() -> Self {
        ImpactOffset {
            slope: -0.016666,
            intercept: 1.5,
            cutoff_angle: 90.0,
        }
    }
}

impl ImpactOffset {
    /// # Examples
    /// ```
    /// # use dropimpact::geometry::ImpactOffset;
    /// let offset = ImpactOffset::default();
    ///
    /// assert!((offset.offset(15.0) - 1.25).abs() < 1e-3);
    /// assert_eq!(offset.offset(90.0), 0.0);
    /// ```
    pub fn offset(&self, angle: Float) -> Float {
        if angle < self.cutoff_angle {
            self.slope * angle + self.intercept
        } else {
            0.0
        }
    }
}

// --------------------------------------------------------------- STRUCT: DropPlacement

/// Position of the unit drop at the start of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropPlacement {
    pub sphere: Sphere,
    pub pool: BelowPlane,
}

impl DropPlacement {
    pub fn new(
        pool_surface: Float,
        clearance: Float,
        impact_angle: Float,
        offset: &ImpactOffset,
    ) -> Self {
        let radius = 1.0;
        let center = [
            0.0,
            pool_surface + radius + clearance,
            offset.offset(impact_angle),
        ];
        DropPlacement {
            sphere: Sphere { center, radius },
            pool: BelowPlane {
                height: pool_surface,
            },
        }
    }

    pub fn liquid(&self) -> Union<BelowPlane, Sphere> {
        union(self.pool, self.sphere)
    }

    /// Lowest point of the drop.
    pub fn south_pole(&self) -> Point {
        let c = self.sphere.center;
        [c[0], c[1] - self.sphere.radius, c[2]]
    }
}

/// Unit drop velocity for an impact angle in degrees: `(0, -sin, -cos)`.
///
/// 90° is a vertical impact; smaller angles tilt the drop towards `-z`.
pub fn impact_velocity(angle: Float) -> Point {
    let theta = angle.to_radians();
    [0.0, -theta.sin(), -theta.cos()]
}
