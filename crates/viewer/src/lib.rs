//! Viewer crate for the RGB-D stream viewer.
//!
//! The crate owns the whole display path: a winit event loop drives
//! per-frame rendering, while an asynchronous frame source pushes frames
//! into a mutex-guarded cache. The flow is:
//!
//! ```text
//!   FrameSource thread ──▶ FrameCache (latest planes)
//!                                │ snapshot()
//!                                ▼
//!   event loop tick ──▶ GpuState::render ──▶ upload ─▶ compute ─▶ blit ─▶ quads ─▶ present
//! ```
//!
//! [`GpuState`](gpu::GpuState) owns every GPU resource (surface, device,
//! interop buffers, textures, shader programs, quad geometry); [`run`] is the
//! entry point that negotiates the stream resolution, wires the listener, and
//! hands control to the event loop. View modes are plain data: each mode maps
//! to an ordered list of draw steps, so adding a mode touches only the tables
//! in [`view`].

mod frames;
mod gpu;
mod negotiate;
mod view;
mod window;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rgbd::{FrameListener, FrameSource};

pub use frames::{FrameCache, PlaneSnapshot};
pub use negotiate::{negotiate_resolution, ConfigError};
pub use view::ViewMode;

/// Everything the viewer needs besides the frame source itself.
pub struct ViewerConfig {
    /// Initial window size in physical pixels.
    pub window_size: (u32, u32),
    /// Directory holding the GLSL shader assets.
    pub shader_dir: PathBuf,
    /// Optional extra listener fed the same frames as the viewer (used for
    /// session recording).
    pub tap: Option<Arc<dyn FrameListener>>,
}

/// Negotiates the stream resolution, registers the viewer as frame listener,
/// brings up the window and GPU resources, and runs the event loop until the
/// user quits.
///
/// Configuration errors surface before any GPU resource is allocated; GPU
/// bring-up errors abort before the loop starts. The source passed in must
/// already be connected with its streams created.
pub fn run(config: ViewerConfig, source: Box<dyn FrameSource>) -> Result<()> {
    window::run_event_loop(config, source)
}
