//! Pixel sources: where plane intensities come from.

use crate::error::PixelSourceError;
use ndarray::Array2;
use roiscope_core::Coord3D;
use std::collections::HashMap;

/// Supplier of per-plane intensity arrays.
///
/// Arrays are indexed `[[y, x]]` (row-major). Implementations decide how
/// planes are decoded or loaded; the engine calls `plane` at most once per
/// (plane, channel) in a batch.
pub trait PixelSource: Send + Sync {
    /// Number of channels in the image.
    fn channel_count(&self) -> usize;

    /// Intensities of one plane for one channel.
    ///
    /// # Errors
    /// Returns a [`PixelSourceError`] if the plane cannot be supplied.
    fn plane(&self, coord: Coord3D, channel: usize) -> Result<Array2<f64>, PixelSourceError>;
}

/// Pixel source holding planes in memory.
#[derive(Debug, Clone)]
pub struct InMemoryStack {
    width: usize,
    height: usize,
    channel_count: usize,
    planes: HashMap<(Coord3D, usize), Array2<f64>>,
}

impl InMemoryStack {
    /// Creates an empty stack of `width` x `height` planes.
    #[must_use]
    pub fn new(width: usize, height: usize, channel_count: usize) -> Self {
        Self {
            width,
            height,
            channel_count,
            planes: HashMap::new(),
        }
    }

    /// Stores a plane.
    ///
    /// # Errors
    /// Returns an error if the channel is out of range or the array has the
    /// wrong dimensions.
    pub fn insert_plane(
        &mut self,
        coord: Coord3D,
        channel: usize,
        plane: Array2<f64>,
    ) -> Result<(), PixelSourceError> {
        if channel >= self.channel_count {
            return Err(PixelSourceError::ChannelOutOfRange {
                channel,
                channel_count: self.channel_count,
            });
        }
        let (rows, cols) = plane.dim();
        if rows != self.height || cols != self.width {
            return Err(PixelSourceError::DimensionMismatch {
                width: self.width,
                height: self.height,
                found_width: cols,
                found_height: rows,
            });
        }
        self.planes.insert((coord, channel), plane);
        Ok(())
    }

    /// Builder form of [`InMemoryStack::insert_plane`].
    ///
    /// # Errors
    /// See [`InMemoryStack::insert_plane`].
    pub fn with_plane(
        mut self,
        coord: Coord3D,
        channel: usize,
        plane: Array2<f64>,
    ) -> Result<Self, PixelSourceError> {
        self.insert_plane(coord, channel, plane)?;
        Ok(self)
    }

    /// Fills a plane from a function of `(x, y)`.
    pub fn fill_plane<F>(&mut self, coord: Coord3D, channel: usize, f: F)
    where
        F: Fn(usize, usize) -> f64,
    {
        if channel >= self.channel_count {
            log::warn!("ignoring plane for channel {channel}: out of range");
            return;
        }
        let plane = Array2::from_shape_fn((self.height, self.width), |(y, x)| f(x, y));
        self.planes.insert((coord, channel), plane);
    }

    /// Plane width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Plane height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }
}

impl PixelSource for InMemoryStack {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn plane(&self, coord: Coord3D, channel: usize) -> Result<Array2<f64>, PixelSourceError> {
        if channel >= self.channel_count {
            return Err(PixelSourceError::ChannelOutOfRange {
                channel,
                channel_count: self.channel_count,
            });
        }
        self.planes
            .get(&(coord, channel))
            .cloned()
            .ok_or(PixelSourceError::PlaneUnavailable { coord, channel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_insert_and_fetch() {
        let coord = Coord3D::new(0, 0);
        let stack = InMemoryStack::new(2, 2, 1)
            .with_plane(coord, 0, array![[1.0, 2.0], [3.0, 4.0]])
            .unwrap();
        let plane = stack.plane(coord, 0).unwrap();
        assert_eq!(plane[[1, 0]], 3.0);
        assert_eq!(
            stack.plane(Coord3D::new(1, 0), 0).unwrap_err(),
            PixelSourceError::PlaneUnavailable {
                coord: Coord3D::new(1, 0),
                channel: 0
            }
        );
    }

    #[test]
    fn test_rejects_bad_channel_and_dims() {
        let mut stack = InMemoryStack::new(2, 2, 1);
        let coord = Coord3D::new(0, 0);
        assert!(matches!(
            stack.insert_plane(coord, 1, Array2::zeros((2, 2))),
            Err(PixelSourceError::ChannelOutOfRange { .. })
        ));
        assert!(matches!(
            stack.insert_plane(coord, 0, Array2::zeros((3, 2))),
            Err(PixelSourceError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            stack.plane(coord, 4),
            Err(PixelSourceError::ChannelOutOfRange { .. })
        ));
    }

    #[test]
    fn test_fill_plane_is_xy_indexed() {
        let mut stack = InMemoryStack::new(3, 2, 1);
        let coord = Coord3D::new(0, 0);
        #[allow(clippy::cast_precision_loss)]
        stack.fill_plane(coord, 0, |x, y| (10 * y + x) as f64);
        let plane = stack.plane(coord, 0).unwrap();
        assert_eq!(plane.dim(), (2, 3));
        assert_eq!(plane[[1, 2]], 12.0);
    }
}
