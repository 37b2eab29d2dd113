//! Procedural frame source for demos and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::device::{DeviceError, FrameListener, FrameSource, StreamInfo};
use crate::frame::{Frame, Resolution};

const DEFAULT_RESOLUTION: Resolution = Resolution {
    width: 640,
    height: 480,
};
const DEFAULT_FPS: u32 = 30;
const INVALID_BORDER_PX: u32 = 8;
const SPECKLE_COUNT: usize = 64;

struct Shared {
    listener: Mutex<Option<Arc<dyn FrameListener>>>,
    color_active: AtomicBool,
    depth_active: AtomicBool,
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Generates an animated color gradient and a sweeping depth ramp.
///
/// Stands in for "any available device" when no log path is given. The
/// depth plane carries an invalid (zero) border so the invalid-sample path
/// stays exercised, and a seeded speckle pattern keeps successive frames
/// visually distinct. No playback capability: the source behaves like a
/// live camera.
pub struct SyntheticSource {
    resolution: Resolution,
    fps: u32,
    connected: bool,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl SyntheticSource {
    pub fn new(resolution: Resolution, fps: u32) -> Self {
        Self {
            resolution,
            fps: fps.max(1),
            connected: false,
            shared: Arc::new(Shared {
                listener: Mutex::new(None),
                color_active: AtomicBool::new(false),
                depth_active: AtomicBool::new(false),
            }),
            worker: None,
        }
    }

    fn ensure_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let resolution = self.resolution;
        let fps = self.fps;
        let spawned = std::thread::Builder::new()
            .name("rgbd-synthetic".into())
            .spawn(move || generate_loop(resolution, fps, &shared, &stop_rx));
        match spawned {
            Ok(handle) => self.worker = Some(Worker { stop_tx, handle }),
            Err(err) => warn!(error = %err, "failed to spawn synthetic frame thread"),
        }
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.handle.join();
        }
    }

    fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            resolution: self.resolution,
            fps: self.fps,
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION, DEFAULT_FPS)
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stop_worker();
        self.shared.color_active.store(false, Ordering::SeqCst);
        self.shared.depth_active.store(false, Ordering::SeqCst);
        self.connected = false;
    }

    fn shutdown(&mut self) {
        self.stop_worker();
    }

    fn create_depth_stream(&mut self) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::DepthStream("source is not connected".into()));
        }
        self.shared.depth_active.store(true, Ordering::SeqCst);
        self.ensure_worker();
        Ok(())
    }

    fn create_color_stream(&mut self) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::ColorStream("source is not connected".into()));
        }
        self.shared.color_active.store(true, Ordering::SeqCst);
        self.ensure_worker();
        Ok(())
    }

    fn destroy_depth_stream(&mut self) {
        self.shared.depth_active.store(false, Ordering::SeqCst);
    }

    fn destroy_color_stream(&mut self) {
        self.shared.color_active.store(false, Ordering::SeqCst);
    }

    fn depth_stream(&self) -> Option<StreamInfo> {
        self.shared
            .depth_active
            .load(Ordering::SeqCst)
            .then(|| self.stream_info())
    }

    fn color_stream(&self) -> Option<StreamInfo> {
        self.shared
            .color_active
            .load(Ordering::SeqCst)
            .then(|| self.stream_info())
    }

    fn set_listener(&mut self, listener: Arc<dyn FrameListener>) {
        let mut slot = self
            .shared
            .listener
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        *slot = Some(listener);
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn generate_loop(
    resolution: Resolution,
    fps: u32,
    shared: &Shared,
    stop_rx: &Receiver<()>,
) {
    let interval = Duration::from_secs_f64(1.0 / fps as f64);
    let frame_us = 1_000_000u64 / fps as u64;
    debug!(%resolution, fps, "synthetic frame generation started");
    let mut index = 0u64;
    loop {
        let listener = {
            let slot = shared
                .listener
                .lock()
                .unwrap_or_else(|err| err.into_inner());
            slot.clone()
        };
        if let Some(listener) = listener {
            let color = shared
                .color_active
                .load(Ordering::SeqCst)
                .then(|| color_plane(resolution, index));
            let depth = shared
                .depth_active
                .load(Ordering::SeqCst)
                .then(|| depth_plane(resolution, index));
            if color.is_some() || depth.is_some() {
                match Frame::new(index * frame_us, resolution, color, depth) {
                    Ok(frame) => listener.on_frame(Arc::new(frame)),
                    Err(err) => warn!(error = %err, "dropping malformed synthetic frame"),
                }
            }
        }
        index += 1;
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("synthetic frame generation stopped");
}

fn color_plane(resolution: Resolution, index: u64) -> Vec<u8> {
    let (width, height) = (resolution.width, resolution.height);
    let mut plane = Vec::with_capacity(resolution.pixel_count() * 4);
    let phase = (index * 2 % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            plane.push((x * 255 / width.max(1)) as u8);
            plane.push((y * 255 / height.max(1)) as u8);
            plane.push(phase);
            plane.push(255);
        }
    }
    // Seeded per-frame speckle so motion is visible even on a still gradient.
    let mut rng = StdRng::seed_from_u64(index);
    for _ in 0..SPECKLE_COUNT {
        let pixel = rng.gen_range(0..resolution.pixel_count());
        plane[pixel * 4..pixel * 4 + 3].fill(255);
    }
    plane
}

fn depth_plane(resolution: Resolution, index: u64) -> Vec<u16> {
    let (width, height) = (resolution.width, resolution.height);
    let sweep = (index % 240) as u16 * 10;
    let mut plane = Vec::with_capacity(resolution.pixel_count());
    for y in 0..height {
        for x in 0..width {
            let border = x < INVALID_BORDER_PX
                || y < INVALID_BORDER_PX
                || x >= width - INVALID_BORDER_PX
                || y >= height - INVALID_BORDER_PX;
            if border {
                plane.push(0);
            } else {
                plane.push(1200 + sweep + (x / 4 + y / 4) as u16);
            }
        }
    }
    plane
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    struct ChannelListener(Sender<Arc<Frame>>);

    impl FrameListener for ChannelListener {
        fn on_frame(&self, frame: Arc<Frame>) {
            let _ = self.0.send(frame);
        }
    }

    #[test]
    fn streams_require_connection() {
        let mut source = SyntheticSource::new(Resolution::new(32, 32), 60);
        assert!(source.create_depth_stream().is_err());
        source.connect().unwrap();
        source.create_depth_stream().unwrap();
        assert!(source.depth_stream().is_some());
        assert!(source.color_stream().is_none());
        source.shutdown();
    }

    #[test]
    fn no_playback_capability() {
        let source = SyntheticSource::default();
        assert!(source.playback().is_none());
    }

    #[test]
    fn delivers_well_formed_frames() {
        let resolution = Resolution::new(32, 24);
        let mut source = SyntheticSource::new(resolution, 120);
        source.connect().unwrap();
        let (tx, rx) = unbounded();
        source.set_listener(Arc::new(ChannelListener(tx)));
        source.create_depth_stream().unwrap();
        source.create_color_stream().unwrap();

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.resolution(), resolution);
        let depth = frame.depth().unwrap();
        assert_eq!(depth.len(), resolution.pixel_count());
        // Border samples are invalid, interior samples are in range.
        assert_eq!(depth[0], 0);
        let center = (12 * 32 + 16) as usize;
        assert!(depth[center] >= 1200);
        assert_eq!(frame.color().unwrap().len(), resolution.pixel_count() * 4);

        source.shutdown();
    }

    #[test]
    fn depth_plane_sweeps_over_time() {
        let resolution = Resolution::new(32, 32);
        let early = depth_plane(resolution, 0);
        let later = depth_plane(resolution, 10);
        let center = (16 * 32 + 16) as usize;
        assert_eq!(later[center] - early[center], 100);
    }
}
