use std::sync::Arc;

use crate::frame::{Frame, Resolution};
use crate::playback::PlaybackHandle;

/// Description of an active stream, fixed once the stream is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub resolution: Resolution,
    pub fps: u32,
}

/// Receives frames pushed from a source's producer thread.
///
/// Implementations must tolerate being called from outside the event loop;
/// the viewer side treats delivery as a pure handoff.
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, frame: Arc<Frame>);
}

/// Device abstraction producing synchronized color/depth frames.
///
/// Lifecycle mirrors a camera session: `connect`, create the streams that
/// are wanted, deliver frames to the registered listener, then tear down with
/// `destroy_*_stream`, `disconnect`, `shutdown`. Stream queries return `None`
/// until the corresponding stream has been created.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    fn connect(&mut self) -> Result<(), DeviceError>;
    fn disconnect(&mut self);
    fn shutdown(&mut self);

    fn create_depth_stream(&mut self) -> Result<(), DeviceError>;
    fn create_color_stream(&mut self) -> Result<(), DeviceError>;
    fn destroy_depth_stream(&mut self);
    fn destroy_color_stream(&mut self);

    fn depth_stream(&self) -> Option<StreamInfo>;
    fn color_stream(&self) -> Option<StreamInfo>;

    fn set_listener(&mut self, listener: Arc<dyn FrameListener>);

    /// Rate control for sources backed by recorded data; live devices
    /// return `None`.
    fn playback(&self) -> Option<PlaybackHandle> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("could not connect to device: {0}")]
    Connect(String),
    #[error("could not create depth stream: {0}")]
    DepthStream(String),
    #[error("could not create color stream: {0}")]
    ColorStream(String),
}

impl DeviceError {
    /// Process exit code reported when startup fails on this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeviceError::Connect(_) => 1,
            DeviceError::DepthStream(_) => 2,
            DeviceError::ColorStream(_) => 3,
        }
    }
}

/// Forwards each frame to every registered listener in order.
pub struct FanoutListener {
    listeners: Vec<Arc<dyn FrameListener>>,
}

impl FanoutListener {
    pub fn new(listeners: Vec<Arc<dyn FrameListener>>) -> Self {
        Self { listeners }
    }
}

impl FrameListener for FanoutListener {
    fn on_frame(&self, frame: Arc<Frame>) {
        for listener in &self.listeners {
            listener.on_frame(frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn exit_codes_match_cli_contract() {
        assert_eq!(DeviceError::Connect(String::new()).exit_code(), 1);
        assert_eq!(DeviceError::DepthStream(String::new()).exit_code(), 2);
        assert_eq!(DeviceError::ColorStream(String::new()).exit_code(), 3);
    }

    struct Counter(AtomicUsize);

    impl FrameListener for Counter {
        fn on_frame(&self, _frame: Arc<Frame>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fanout_reaches_every_listener() {
        let first = Arc::new(Counter(AtomicUsize::new(0)));
        let second = Arc::new(Counter(AtomicUsize::new(0)));
        let fanout = FanoutListener::new(vec![first.clone(), second.clone()]);
        let frame = Arc::new(
            Frame::new(0, Resolution::new(2, 2), None, Some(vec![0u16; 4])).unwrap(),
        );
        fanout.on_frame(frame.clone());
        fanout.on_frame(frame);
        assert_eq!(first.0.load(Ordering::SeqCst), 2);
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
    }
}
