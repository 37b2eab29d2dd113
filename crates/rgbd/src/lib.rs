//! Frame-source domain for the RGB-D viewer.
//!
//! The crate defines the device abstraction the renderer consumes: immutable
//! [`Frame`] snapshots, the [`FrameSource`] trait with push-style listener
//! registration, and two concrete sources: [`LogSource`] replaying recorded
//! frame logs from disk and [`SyntheticSource`] generating procedural test
//! frames. Sources that replay recorded data expose rate control through the
//! [`PlaybackHandle`] capability; live-style sources simply return `None`.

mod device;
mod frame;
mod log;
mod playback;
mod synthetic;

pub use device::{DeviceError, FanoutListener, FrameListener, FrameSource, StreamInfo};
pub use frame::{Frame, FrameError, Resolution};
pub use log::{LogFrameEntry, LogManifest, LogSource, LogWriter, RecordingListener, MANIFEST_NAME};
pub use playback::{PlaybackHandle, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
pub use synthetic::SyntheticSource;
