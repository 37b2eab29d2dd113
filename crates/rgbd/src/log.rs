//! Recorded frame-log replay and capture.
//!
//! A log is a directory holding `manifest.json` plus one blob file per plane
//! per frame (`NNNNNN.rgba` for color, `NNNNNN.d16` for little-endian `u16`
//! depth). [`LogWriter`] produces the format, [`LogSource`] replays it in a
//! loop on a producer thread paced by the manifest fps and the playback rate.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::{DeviceError, FrameListener, FrameSource, StreamInfo};
use crate::frame::{Frame, Resolution};
use crate::playback::PlaybackHandle;

pub const MANIFEST_NAME: &str = "manifest.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogManifest {
    pub name: String,
    pub resolution: Resolution,
    pub fps: u32,
    pub frames: Vec<LogFrameEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogFrameEntry {
    pub timestamp_us: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
}

impl LogManifest {
    pub fn has_color(&self) -> bool {
        self.frames.iter().any(|entry| entry.color.is_some())
    }

    pub fn has_depth(&self) -> bool {
        self.frames.iter().any(|entry| entry.depth.is_some())
    }
}

/// Mutable state shared between the source handle and its replay thread.
struct Shared {
    listener: Mutex<Option<Arc<dyn FrameListener>>>,
    color_active: AtomicBool,
    depth_active: AtomicBool,
    playback: PlaybackHandle,
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Replays a recorded frame log directory as a [`FrameSource`].
///
/// The replay loops over the manifest until the source is shut down, which
/// matches how a viewer treats an endless live device.
pub struct LogSource {
    root: PathBuf,
    manifest: Option<LogManifest>,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl LogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: None,
            shared: Arc::new(Shared {
                listener: Mutex::new(None),
                color_active: AtomicBool::new(false),
                depth_active: AtomicBool::new(false),
                playback: PlaybackHandle::new(),
            }),
            worker: None,
        }
    }

    fn ensure_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let Some(manifest) = self.manifest.clone() else {
            return;
        };
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let root = self.root.clone();
        let spawned = std::thread::Builder::new()
            .name("rgbd-log-replay".into())
            .spawn(move || replay_loop(&root, &manifest, &shared, &stop_rx));
        match spawned {
            Ok(handle) => self.worker = Some(Worker { stop_tx, handle }),
            Err(err) => warn!(error = %err, "failed to spawn log replay thread"),
        }
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.handle.join();
        }
    }
}

impl FrameSource for LogSource {
    fn name(&self) -> &str {
        "log"
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        let path = self.root.join(MANIFEST_NAME);
        let text = fs::read_to_string(&path)
            .map_err(|err| DeviceError::Connect(format!("{}: {err}", path.display())))?;
        let manifest: LogManifest = serde_json::from_str(&text)
            .map_err(|err| DeviceError::Connect(format!("{}: {err}", path.display())))?;
        if manifest.frames.is_empty() {
            return Err(DeviceError::Connect(format!(
                "log {} contains no frames",
                self.root.display()
            )));
        }
        info!(
            log = %self.root.display(),
            frames = manifest.frames.len(),
            resolution = %manifest.resolution,
            fps = manifest.fps,
            "opened frame log"
        );
        self.manifest = Some(manifest);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stop_worker();
        self.shared.color_active.store(false, Ordering::SeqCst);
        self.shared.depth_active.store(false, Ordering::SeqCst);
        self.manifest = None;
    }

    fn shutdown(&mut self) {
        self.stop_worker();
    }

    fn create_depth_stream(&mut self) -> Result<(), DeviceError> {
        let has_depth = self
            .manifest
            .as_ref()
            .ok_or_else(|| DeviceError::DepthStream("log source is not connected".into()))?
            .has_depth();
        if !has_depth {
            return Err(DeviceError::DepthStream(format!(
                "log {} records no depth plane",
                self.root.display()
            )));
        }
        self.shared.depth_active.store(true, Ordering::SeqCst);
        self.ensure_worker();
        Ok(())
    }

    fn create_color_stream(&mut self) -> Result<(), DeviceError> {
        let has_color = self
            .manifest
            .as_ref()
            .ok_or_else(|| DeviceError::ColorStream("log source is not connected".into()))?
            .has_color();
        if !has_color {
            return Err(DeviceError::ColorStream(format!(
                "log {} records no color plane",
                self.root.display()
            )));
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
        let manifest = self.manifest.as_ref()?;
        self.shared
            .depth_active
            .load(Ordering::SeqCst)
            .then_some(StreamInfo {
                resolution: manifest.resolution,
                fps: manifest.fps,
            })
    }

    fn color_stream(&self) -> Option<StreamInfo> {
        let manifest = self.manifest.as_ref()?;
        self.shared
            .color_active
            .load(Ordering::SeqCst)
            .then_some(StreamInfo {
                resolution: manifest.resolution,
                fps: manifest.fps,
            })
    }

    fn set_listener(&mut self, listener: Arc<dyn FrameListener>) {
        let mut slot = self
            .shared
            .listener
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        *slot = Some(listener);
    }

    fn playback(&self) -> Option<PlaybackHandle> {
        Some(self.shared.playback.clone())
    }
}

impl Drop for LogSource {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn replay_loop(
    root: &Path,
    manifest: &LogManifest,
    shared: &Shared,
    stop_rx: &crossbeam_channel::Receiver<()>,
) {
    let base_interval = Duration::from_secs_f64(1.0 / manifest.fps.max(1) as f64);
    debug!(frames = manifest.frames.len(), "log replay started");
    for entry in manifest.frames.iter().cycle() {
        match deliver_entry(root, manifest.resolution, entry, shared) {
            Ok(()) => {}
            Err(err) => warn!(error = %err, "skipping unreadable log frame"),
        }
        let interval = base_interval.div_f32(shared.playback.rate());
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("log replay stopped");
}

fn deliver_entry(
    root: &Path,
    resolution: Resolution,
    entry: &LogFrameEntry,
    shared: &Shared,
) -> Result<()> {
    let listener = {
        let slot = shared
            .listener
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        slot.clone()
    };
    let Some(listener) = listener else {
        return Ok(());
    };

    let color = if shared.color_active.load(Ordering::SeqCst) {
        match &entry.color {
            Some(file) => {
                let path = root.join(file);
                Some(fs::read(&path).with_context(|| format!("reading {}", path.display()))?)
            }
            None => None,
        }
    } else {
        None
    };
    let depth = if shared.depth_active.load(Ordering::SeqCst) {
        match &entry.depth {
            Some(file) => {
                let path = root.join(file);
                let bytes =
                    fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                Some(
                    bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .collect(),
                )
            }
            None => None,
        }
    } else {
        None
    };

    if color.is_none() && depth.is_none() {
        return Ok(());
    }
    let frame = Frame::new(entry.timestamp_us, resolution, color, depth)
        .context("log frame does not match manifest resolution")?;
    listener.on_frame(Arc::new(frame));
    Ok(())
}

/// Writes a frame log in the format [`LogSource`] replays.
pub struct LogWriter {
    root: PathBuf,
    manifest: LogManifest,
}

impl LogWriter {
    pub fn create(
        root: impl Into<PathBuf>,
        name: impl Into<String>,
        resolution: Resolution,
        fps: u32,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating log directory {}", root.display()))?;
        Ok(Self {
            root,
            manifest: LogManifest {
                name: name.into(),
                resolution,
                fps,
                frames: Vec::new(),
            },
        })
    }

    pub fn append(&mut self, frame: &Frame) -> Result<()> {
        let index = self.manifest.frames.len();
        let mut entry = LogFrameEntry {
            timestamp_us: frame.timestamp_us(),
            color: None,
            depth: None,
        };
        if let Some(plane) = frame.color() {
            let file = format!("{index:06}.rgba");
            fs::write(self.root.join(&file), plane.as_ref())
                .with_context(|| format!("writing color blob {file}"))?;
            entry.color = Some(file);
        }
        if let Some(plane) = frame.depth() {
            let file = format!("{index:06}.d16");
            let bytes: Vec<u8> = plane
                .iter()
                .flat_map(|sample| sample.to_le_bytes())
                .collect();
            fs::write(self.root.join(&file), bytes)
                .with_context(|| format!("writing depth blob {file}"))?;
            entry.depth = Some(file);
        }
        self.manifest.frames.push(entry);
        Ok(())
    }

    /// Writes the manifest and returns the log root.
    pub fn finish(self) -> Result<PathBuf> {
        let path = self.root.join(MANIFEST_NAME);
        let text = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        info!(
            log = %self.root.display(),
            frames = self.manifest.frames.len(),
            "finished frame log"
        );
        Ok(self.root)
    }
}

/// Listener that tees received frames into a log on disk.
///
/// A write failure stops the recording with a warning rather than disturbing
/// frame delivery.
pub struct RecordingListener {
    writer: Mutex<Option<LogWriter>>,
}

impl RecordingListener {
    pub fn new(writer: LogWriter) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Finalizes the log; returns the root, or `None` if recording already
    /// stopped on an error.
    pub fn finish(&self) -> Result<Option<PathBuf>> {
        let mut slot = self.writer.lock().unwrap_or_else(|err| err.into_inner());
        match slot.take() {
            Some(writer) => writer.finish().map(Some),
            None => Ok(None),
        }
    }
}

impl FrameListener for RecordingListener {
    fn on_frame(&self, frame: Arc<Frame>) {
        let mut slot = self.writer.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(writer) = slot.as_mut() {
            if let Err(err) = writer.append(&frame) {
                warn!(error = %err, "frame recording failed; stopping capture");
                *slot = None;
            }
        }
    }
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

    fn sample_frame(timestamp_us: u64, resolution: Resolution) -> Frame {
        let pixels = resolution.pixel_count();
        let color = (0..pixels * 4).map(|value| value as u8).collect();
        let depth = (0..pixels).map(|value| 400 + value as u16).collect();
        Frame::new(timestamp_us, resolution, Some(color), Some(depth)).unwrap()
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = LogManifest {
            name: "bench".into(),
            resolution: Resolution::new(640, 480),
            fps: 30,
            frames: vec![LogFrameEntry {
                timestamp_us: 33_333,
                color: Some("000000.rgba".into()),
                depth: None,
            }],
        };
        let text = serde_json::to_string(&manifest).unwrap();
        let parsed: LogManifest = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.name, "bench");
        assert_eq!(parsed.resolution, manifest.resolution);
        assert!(parsed.has_color());
        assert!(!parsed.has_depth());
    }

    #[test]
    fn writer_then_source_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let resolution = Resolution::new(8, 4);
        let mut writer = LogWriter::create(dir.path(), "roundtrip", resolution, 120).unwrap();
        writer.append(&sample_frame(0, resolution)).unwrap();
        writer.append(&sample_frame(8_333, resolution)).unwrap();
        writer.finish().unwrap();

        let mut source = LogSource::new(dir.path());
        source.connect().unwrap();
        let (tx, rx) = unbounded();
        source.set_listener(Arc::new(ChannelListener(tx)));
        source.create_depth_stream().unwrap();
        source.create_color_stream().unwrap();

        assert_eq!(
            source.depth_stream().unwrap().resolution,
            resolution
        );
        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.resolution(), resolution);
        assert!(frame.has_color());
        assert!(frame.has_depth());
        assert_eq!(frame.depth().unwrap()[0], 400);

        source.shutdown();
    }

    #[test]
    fn connect_fails_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = LogSource::new(dir.path());
        let err = source.connect().unwrap_err();
        assert!(matches!(err, DeviceError::Connect(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_plane_fails_stream_creation() {
        let dir = tempfile::tempdir().unwrap();
        let resolution = Resolution::new(4, 4);
        let mut writer = LogWriter::create(dir.path(), "depth-only", resolution, 30).unwrap();
        let frame = Frame::new(0, resolution, None, Some(vec![500u16; 16])).unwrap();
        writer.append(&frame).unwrap();
        writer.finish().unwrap();

        let mut source = LogSource::new(dir.path());
        source.connect().unwrap();
        source.create_depth_stream().unwrap();
        let err = source.create_color_stream().unwrap_err();
        assert!(matches!(err, DeviceError::ColorStream(_)));
        assert_eq!(err.exit_code(), 3);
        source.shutdown();
    }

    #[test]
    fn exposes_playback_capability() {
        let source = LogSource::new("/nonexistent");
        let handle = source.playback().unwrap();
        handle.set_rate(2.0);
        assert_eq!(source.playback().unwrap().rate(), 2.0);
    }
}
