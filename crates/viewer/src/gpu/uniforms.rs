use bytemuck::{Pod, Zeroable};

use rgbd::Resolution;

/// Depth-camera intrinsics at the 640x480 base resolution, scaled linearly
/// for other stream sizes.
pub(crate) const BASE_FX: f32 = 594.21;
pub(crate) const BASE_FY: f32 = 591.04;
pub(crate) const BASE_CX: f32 = 339.5;
pub(crate) const BASE_CY: f32 = 242.7;
pub(crate) const BASE_WIDTH: f32 = 640.0;
pub(crate) const BASE_HEIGHT: f32 = 480.0;

/// Sensor depth range used for visualization normalization (millimeters).
pub(crate) const DEPTH_MIN_MM: f32 = 400.0;
pub(crate) const DEPTH_MAX_MM: f32 = 4000.0;
/// Samples above this are sensor noise and treated as invalid.
pub(crate) const DEPTH_MAX_VALID_MM: f32 = 8000.0;

/// Per-draw quad placement: xy = NDC scale, zw = NDC offset.
///
/// Uploaded through a staging copy before each render pass so every step in
/// a multi-pane layout sees its own transform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct QuadUniforms {
    pub rect: [f32; 4],
}

/// Uniforms for the stream-space compute passes. Field order matches the
/// `StreamParams` struct in `stream.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct StreamParams {
    pub width: u32,
    pub height: u32,
    pub stride_px: u32,
    pub _pad0: u32,
    pub depth_min_mm: f32,
    pub depth_max_mm: f32,
    pub depth_max_valid_mm: f32,
    pub _pad1: f32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl StreamParams {
    pub(crate) fn new(resolution: Resolution, stride_px: u32) -> Self {
        let scale_x = resolution.width as f32 / BASE_WIDTH;
        let scale_y = resolution.height as f32 / BASE_HEIGHT;
        Self {
            width: resolution.width,
            height: resolution.height,
            stride_px,
            _pad0: 0,
            depth_min_mm: DEPTH_MIN_MM,
            depth_max_mm: DEPTH_MAX_MM,
            depth_max_valid_mm: DEPTH_MAX_VALID_MM,
            _pad1: 0.0,
            fx: BASE_FX * scale_x,
            fy: BASE_FY * scale_y,
            cx: BASE_CX * scale_x,
            cy: BASE_CY * scale_y,
        }
    }
}

/// Uniforms for the point-cloud splat passes. Field order matches the
/// `CompositeParams` struct in `composite.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct CompositeParams {
    pub in_width: u32,
    pub in_height: u32,
    pub in_stride_px: u32,
    pub _pad0: u32,
    pub out_width: u32,
    pub out_height: u32,
    pub out_stride_px: u32,
    pub _pad1: u32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub depth_min_mm: f32,
    pub depth_max_mm: f32,
    pub point_px: u32,
    pub _pad2: u32,
}

impl CompositeParams {
    pub(crate) fn new(
        stream: Resolution,
        stream_stride_px: u32,
        screen: Resolution,
        screen_stride_px: u32,
    ) -> Self {
        // Reprojection uses the base intrinsics scaled to the output target,
        // so the cloud fills the pane whatever the window size is.
        let scale_x = screen.width as f32 / BASE_WIDTH;
        let scale_y = screen.height as f32 / BASE_HEIGHT;
        Self {
            in_width: stream.width,
            in_height: stream.height,
            in_stride_px: stream_stride_px,
            _pad0: 0,
            out_width: screen.width,
            out_height: screen.height,
            out_stride_px: screen_stride_px,
            _pad1: 0,
            fx: BASE_FX * scale_x,
            fy: BASE_FY * scale_y,
            cx: BASE_CX * scale_x,
            cy: BASE_CY * scale_y,
            depth_min_mm: DEPTH_MIN_MM,
            depth_max_mm: DEPTH_MAX_MM,
            point_px: 2,
            _pad2: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_params_scale_intrinsics() {
        let params = StreamParams::new(Resolution::new(640, 480), 640);
        assert_eq!(params.fx, BASE_FX);
        assert_eq!(params.cy, BASE_CY);

        let half = StreamParams::new(Resolution::new(320, 240), 320);
        assert!((half.fx - BASE_FX / 2.0).abs() < 1e-3);
        assert!((half.cx - BASE_CX / 2.0).abs() < 1e-3);
    }

    #[test]
    fn uniform_sizes_match_wgsl_layouts() {
        assert_eq!(std::mem::size_of::<QuadUniforms>(), 16);
        assert_eq!(std::mem::size_of::<StreamParams>(), 48);
        assert_eq!(std::mem::size_of::<CompositeParams>(), 64);
    }
}
