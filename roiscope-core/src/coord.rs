//! Plane coordinates and plane ranges.

use crate::error::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies one XY plane of a 5D image by Z-section and time-point.
///
/// Ordering is by time-point first, then Z-section, so iterating a
/// `BTreeMap<Coord3D, _>` walks each time-point's stack bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coord3D {
    // Field order drives the derived `Ord`.
    /// Time-point index.
    pub t: u32,
    /// Z-section index.
    pub z: u32,
}

impl Coord3D {
    /// Creates a plane coordinate.
    #[inline]
    #[must_use]
    pub fn new(z: u32, t: u32) -> Self {
        Self { t, z }
    }

    /// Creates a plane coordinate from signed indices.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] if either index is negative or
    /// does not fit in `u32`.
    pub fn try_new(z: i64, t: i64) -> Result<Self> {
        match (u32::try_from(z), u32::try_from(t)) {
            (Ok(z), Ok(t)) => Ok(Self::new(z, t)),
            _ => Err(Error::InvalidCoordinate { z, t }),
        }
    }

    /// Z-section index.
    #[inline]
    #[must_use]
    pub fn z_section(&self) -> u32 {
        self.z
    }

    /// Time-point index.
    #[inline]
    #[must_use]
    pub fn time_point(&self) -> u32 {
        self.t
    }
}

impl fmt::Display for Coord3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(z={}, t={})", self.z, self.t)
    }
}

/// Inclusive rectangular range of planes over the Z and T axes.
///
/// A range whose corners share an axis value is a single-point range on
/// that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneRange {
    z_min: u32,
    z_max: u32,
    t_min: u32,
    t_max: u32,
}

impl PlaneRange {
    /// Range spanned by two corner planes, in either order.
    #[must_use]
    pub fn spanning(a: Coord3D, b: Coord3D) -> Self {
        Self {
            z_min: a.z.min(b.z),
            z_max: a.z.max(b.z),
            t_min: a.t.min(b.t),
            t_max: a.t.max(b.t),
        }
    }

    /// Lowest plane of the range.
    #[must_use]
    pub fn start(&self) -> Coord3D {
        Coord3D::new(self.z_min, self.t_min)
    }

    /// Highest plane of the range.
    #[must_use]
    pub fn end(&self) -> Coord3D {
        Coord3D::new(self.z_max, self.t_max)
    }

    /// Whether the plane lies in the range.
    #[must_use]
    pub fn contains(&self, coord: Coord3D) -> bool {
        (self.z_min..=self.z_max).contains(&coord.z) && (self.t_min..=self.t_max).contains(&coord.t)
    }

    /// Number of planes in the range, saturating at `usize::MAX`.
    #[must_use]
    pub fn len(&self) -> usize {
        let dz = u64::from(self.z_max - self.z_min) + 1;
        let dt = u64::from(self.t_max - self.t_min) + 1;
        dz.checked_mul(dt)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX)
    }

    /// Ranges always contain at least one plane.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the planes in `Coord3D` order (time-point major).
    pub fn iter(&self) -> impl Iterator<Item = Coord3D> {
        let (z_min, z_max) = (self.z_min, self.z_max);
        (self.t_min..=self.t_max).flat_map(move |t| (z_min..=z_max).map(move |z| Coord3D::new(z, t)))
    }
}
