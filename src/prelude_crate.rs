pub(crate) use crate::constants::*;
pub(crate) use crate::engine::{Engine, Field};
pub(crate) use crate::error::{ImpactError, ImpactResult};
pub(crate) use crate::{Axis, Float, Point, AXES};
