//! Memory-mapped raw image stacks.
//!
//! A raw stack is a headerless file of little-endian samples in XYZCT order:
//! X varies fastest, then Y, Z, channel and time. Dimensions are supplied by
//! the caller through [`RawStackLayout`].

use crate::{Error, Result};
use memmap2::Mmap;
use ndarray::Array2;
use roiscope_algorithms::{PixelSource, PixelSourceError};
use roiscope_core::{Coord3D, VolumeExtent};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Sample encoding of a raw stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PixelType {
    U8,
    #[default]
    U16,
    F32,
}

impl PixelType {
    /// Size of one sample in bytes.
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }

    fn decode(self, bytes: &[u8]) -> Vec<f64> {
        match self {
            Self::U8 => bytes.iter().map(|&b| f64::from(b)).collect(),
            Self::U16 => bytes
                .chunks_exact(2)
                .map(|c| f64::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            Self::F32 => bytes
                .chunks_exact(4)
                .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::F32 => "f32",
        })
    }
}

impl FromStr for PixelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Ok(Self::U8),
            "u16" | "uint16" => Ok(Self::U16),
            "f32" | "float" | "float32" => Ok(Self::F32),
            other => Err(Error::InvalidFormat(format!("unknown pixel type '{other}'"))),
        }
    }
}

/// Dimensions and encoding of a raw stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawStackLayout {
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub size_c: usize,
    pub size_t: usize,
    pub pixel_type: PixelType,
    /// Bytes to skip before the first sample.
    pub offset: usize,
}

impl Default for RawStackLayout {
    fn default() -> Self {
        Self {
            size_x: 1,
            size_y: 1,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            pixel_type: PixelType::default(),
            offset: 0,
        }
    }
}

impl RawStackLayout {
    /// Layout of a single-plane image.
    #[must_use]
    pub fn new(size_x: usize, size_y: usize) -> Self {
        Self {
            size_x,
            size_y,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_size_z(mut self, size_z: usize) -> Self {
        self.size_z = size_z;
        self
    }

    #[must_use]
    pub fn with_size_c(mut self, size_c: usize) -> Self {
        self.size_c = size_c;
        self
    }

    #[must_use]
    pub fn with_size_t(mut self, size_t: usize) -> Self {
        self.size_t = size_t;
        self
    }

    #[must_use]
    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = pixel_type;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Bytes in one plane, or `None` if the size overflows `usize`.
    #[must_use]
    pub fn plane_bytes(&self) -> Option<usize> {
        self.size_x
            .checked_mul(self.size_y)?
            .checked_mul(self.pixel_type.bytes_per_sample())
    }

    /// Number of planes across Z, C and T, or `None` on overflow.
    #[must_use]
    pub fn plane_count(&self) -> Option<usize> {
        self.size_z.checked_mul(self.size_c)?.checked_mul(self.size_t)
    }

    /// Minimum file length for this layout, or `None` on overflow.
    #[must_use]
    pub fn expected_len(&self) -> Option<usize> {
        self.plane_bytes()?
            .checked_mul(self.plane_count()?)?
            .checked_add(self.offset)
    }

    /// Plane index of (z, c, t) in XYZCT order.
    #[must_use]
    pub fn plane_index(&self, z: usize, c: usize, t: usize) -> Option<usize> {
        self.size_c
            .checked_mul(t)?
            .checked_add(c)?
            .checked_mul(self.size_z)?
            .checked_add(z)
    }

    /// Z/T extent for an ROI registry on this image.
    ///
    /// # Errors
    /// Returns an error if a size does not fit in `u32`.
    pub fn extent(&self) -> Result<VolumeExtent> {
        let to_u32 = |v: usize, axis: &str| {
            u32::try_from(v).map_err(|_| Error::InvalidFormat(format!("{axis} size {v} too large")))
        };
        Ok(VolumeExtent::new(
            to_u32(self.size_z, "Z")?,
            to_u32(self.size_t, "T")?,
        ))
    }

    /// Checks the sizes and returns the file length they need.
    fn validate(&self) -> Result<usize> {
        let dims = || {
            format!(
                "{}x{}x{}x{}x{}",
                self.size_x, self.size_y, self.size_z, self.size_c, self.size_t
            )
        };
        if self.size_x == 0 || self.size_y == 0 || self.plane_count() == Some(0) {
            return Err(Error::InvalidFormat(format!(
                "raw stack dimensions must be non-zero: {}",
                dims()
            )));
        }
        self.expected_len().ok_or_else(|| {
            Error::InvalidFormat(format!("raw stack dimensions overflow: {}", dims()))
        })
    }
}

/// A memory-mapped raw stack serving planes as `f64` arrays.
pub struct RawPlaneStack {
    mmap: Mmap,
    layout: RawStackLayout,
    path: PathBuf,
}

impl RawPlaneStack {
    /// Maps `path` with the given layout.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or is shorter than the
    /// layout requires.
    pub fn open<P: AsRef<Path>>(path: P, layout: RawStackLayout) -> Result<Self> {
        let expected = layout.validate()?;
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < expected {
            return Err(Error::InvalidFormat(format!(
                "{} is {} bytes, layout needs {expected}",
                path.as_ref().display(),
                mmap.len(),
            )));
        }
        if mmap.len() > expected {
            log::warn!(
                "{} has {} trailing bytes beyond the layout",
                path.as_ref().display(),
                mmap.len() - expected
            );
        }
        Ok(Self {
            mmap,
            layout,
            path: path.as_ref().to_path_buf(),
        })
    }

    #[must_use]
    pub fn layout(&self) -> &RawStackLayout {
        &self.layout
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes one plane, indexed `[[y, x]]`.
    ///
    /// # Errors
    /// Returns an error if the plane lies outside the layout.
    pub fn read_plane(&self, coord: Coord3D, channel: usize) -> Result<Array2<f64>> {
        self.plane_array(coord, channel)
            .map_err(|e| Error::InvalidFormat(e.to_string()))
    }

    fn plane_array(
        &self,
        coord: Coord3D,
        channel: usize,
    ) -> std::result::Result<Array2<f64>, PixelSourceError> {
        let layout = &self.layout;
        if channel >= layout.size_c {
            return Err(PixelSourceError::ChannelOutOfRange {
                channel,
                channel_count: layout.size_c,
            });
        }
        let z = coord.z_section() as usize;
        let t = coord.time_point() as usize;
        let unavailable = || PixelSourceError::PlaneUnavailable { coord, channel };
        if z >= layout.size_z || t >= layout.size_t {
            return Err(unavailable());
        }
        let plane_bytes = layout.plane_bytes().ok_or_else(unavailable)?;
        let start = layout
            .plane_index(z, channel, t)
            .and_then(|index| index.checked_mul(plane_bytes))
            .and_then(|bytes| bytes.checked_add(layout.offset))
            .ok_or_else(unavailable)?;
        let bytes = self
            .mmap
            .get(start..start.saturating_add(plane_bytes))
            .ok_or_else(unavailable)?;
        let samples = layout.pixel_type.decode(bytes);
        Array2::from_shape_vec((layout.size_y, layout.size_x), samples)
            .map_err(|e| PixelSourceError::Backend(e.to_string()))
    }
}

impl PixelSource for RawPlaneStack {
    fn channel_count(&self) -> usize {
        self.layout.size_c
    }

    fn plane(
        &self,
        coord: Coord3D,
        channel: usize,
    ) -> std::result::Result<Array2<f64>, PixelSourceError> {
        self.plane_array(coord, channel)
    }
}
