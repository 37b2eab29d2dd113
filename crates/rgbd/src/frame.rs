use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stream dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("color plane holds {actual} bytes, expected {expected} for {resolution}")]
    ColorPlaneSize {
        resolution: Resolution,
        expected: usize,
        actual: usize,
    },
    #[error("depth plane holds {actual} samples, expected {expected} for {resolution}")]
    DepthPlaneSize {
        resolution: Resolution,
        expected: usize,
        actual: usize,
    },
}

/// Immutable snapshot produced by a frame source.
///
/// Either plane may be absent when the corresponding stream is inactive.
/// Frames are shared by reference count; the viewer retains the latest one
/// until the source supersedes it.
#[derive(Clone)]
pub struct Frame {
    timestamp_us: u64,
    resolution: Resolution,
    color: Option<Arc<[u8]>>,
    depth: Option<Arc<[u16]>>,
}

impl Frame {
    /// Builds a frame, validating that each present plane is dense at
    /// `resolution` (RGBA8 for color, one `u16` millimeter sample per pixel
    /// for depth).
    pub fn new(
        timestamp_us: u64,
        resolution: Resolution,
        color: Option<Vec<u8>>,
        depth: Option<Vec<u16>>,
    ) -> Result<Self, FrameError> {
        let pixels = resolution.pixel_count();
        if let Some(plane) = &color {
            if plane.len() != pixels * 4 {
                return Err(FrameError::ColorPlaneSize {
                    resolution,
                    expected: pixels * 4,
                    actual: plane.len(),
                });
            }
        }
        if let Some(plane) = &depth {
            if plane.len() != pixels {
                return Err(FrameError::DepthPlaneSize {
                    resolution,
                    expected: pixels,
                    actual: plane.len(),
                });
            }
        }
        Ok(Self {
            timestamp_us,
            resolution,
            color: color.map(Arc::from),
            depth: depth.map(Arc::from),
        })
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn has_color(&self) -> bool {
        self.color.is_some()
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    pub fn color(&self) -> Option<&Arc<[u8]>> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&Arc<[u16]>> {
        self.depth.as_ref()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("timestamp_us", &self.timestamp_us)
            .field("resolution", &self.resolution)
            .field("color", &self.color.is_some())
            .field("depth", &self.depth.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dense_planes() {
        let res = Resolution::new(4, 2);
        let frame = Frame::new(7, res, Some(vec![0u8; 32]), Some(vec![0u16; 8])).unwrap();
        assert_eq!(frame.timestamp_us(), 7);
        assert_eq!(frame.resolution(), res);
        assert!(frame.has_color());
        assert!(frame.has_depth());
    }

    #[test]
    fn accepts_partial_frames() {
        let res = Resolution::new(4, 2);
        let frame = Frame::new(0, res, None, Some(vec![0u16; 8])).unwrap();
        assert!(!frame.has_color());
        assert!(frame.has_depth());
    }

    #[test]
    fn rejects_short_color_plane() {
        let res = Resolution::new(4, 2);
        let err = Frame::new(0, res, Some(vec![0u8; 31]), None).unwrap_err();
        assert!(matches!(err, FrameError::ColorPlaneSize { actual: 31, .. }));
    }

    #[test]
    fn rejects_wrong_depth_plane() {
        let res = Resolution::new(4, 2);
        let err = Frame::new(0, res, None, Some(vec![0u16; 9])).unwrap_err();
        assert!(matches!(err, FrameError::DepthPlaneSize { actual: 9, .. }));
    }

    #[test]
    fn resolution_formats_as_pair() {
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }
}
