//! Physical pixel size calibration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Microns-per-pixel along each axis.
///
/// An axis with no calibration (`None`) reports measurements in pixels only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    pub microns_per_pixel_x: Option<f64>,
    pub microns_per_pixel_y: Option<f64>,
    pub microns_per_pixel_z: Option<f64>,
}

impl Calibration {
    /// Uncalibrated (pixel units).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Same pixel size in X and Y.
    #[must_use]
    pub fn isotropic(microns_per_pixel: f64) -> Self {
        Self::default()
            .with_microns_per_pixel_x(microns_per_pixel)
            .with_microns_per_pixel_y(microns_per_pixel)
    }

    /// Set the X pixel size. Non-positive or non-finite values clear it.
    #[must_use]
    pub fn with_microns_per_pixel_x(mut self, value: f64) -> Self {
        self.microns_per_pixel_x = sanitize(value);
        self
    }

    /// Set the Y pixel size. Non-positive or non-finite values clear it.
    #[must_use]
    pub fn with_microns_per_pixel_y(mut self, value: f64) -> Self {
        self.microns_per_pixel_y = sanitize(value);
        self
    }

    /// Set the Z step. Non-positive or non-finite values clear it.
    #[must_use]
    pub fn with_microns_per_pixel_z(mut self, value: f64) -> Self {
        self.microns_per_pixel_z = sanitize(value);
        self
    }

    /// Whether both in-plane axes are calibrated.
    #[must_use]
    pub fn is_planar_calibrated(&self) -> bool {
        self.microns_per_pixel_x.is_some() && self.microns_per_pixel_y.is_some()
    }

    /// Converts an in-plane pixel distance along `(dx, dy)` to microns.
    #[must_use]
    pub fn distance_in_microns(&self, dx: f64, dy: f64) -> Option<f64> {
        let sx = self.microns_per_pixel_x?;
        let sy = self.microns_per_pixel_y?;
        Some((dx * sx).hypot(dy * sy))
    }

    /// Converts a length measured along an arbitrary in-plane path to microns.
    ///
    /// Exact for isotropic pixels; anisotropic pixels use the geometric mean
    /// of the two pixel sizes.
    #[must_use]
    pub fn length_in_microns(&self, pixels: f64) -> Option<f64> {
        let sx = self.microns_per_pixel_x?;
        let sy = self.microns_per_pixel_y?;
        Some(pixels * (sx * sy).sqrt())
    }

    /// Converts an area in square pixels to square microns.
    #[must_use]
    pub fn area_in_microns(&self, square_pixels: f64) -> Option<f64> {
        Some(square_pixels * self.microns_per_pixel_x? * self.microns_per_pixel_y?)
    }

    /// Converts a Z-section count to microns.
    #[must_use]
    pub fn depth_in_microns(&self, sections: f64) -> Option<f64> {
        Some(sections * self.microns_per_pixel_z?)
    }
}

fn sanitize(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}
