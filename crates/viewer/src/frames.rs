use std::sync::{Arc, Mutex};

use rgbd::{Frame, FrameListener, Resolution};

/// Tear-free copy of the cached planes, taken at the start of a render tick.
///
/// Holding `Arc` clones means a frame arriving mid-render replaces the cache
/// without invalidating what this tick is uploading.
#[derive(Clone, Default)]
pub struct PlaneSnapshot {
    pub color: Option<(Arc<[u8]>, Resolution)>,
    pub depth: Option<(Arc<[u16]>, Resolution)>,
}

#[derive(Default)]
struct CacheInner {
    latest: Option<Arc<Frame>>,
    color: Option<(Arc<[u8]>, Resolution)>,
    depth: Option<(Arc<[u16]>, Resolution)>,
}

/// Latest-frame cache; the single mutation point for frame state.
///
/// `on_frame` is a pure handoff called from the producer thread: it replaces
/// whichever planes the frame carries and retains the frame itself until
/// superseded. No processing happens here.
#[derive(Default)]
pub struct FrameCache {
    inner: Mutex<CacheInner>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PlaneSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        PlaneSnapshot {
            color: inner.color.clone(),
            depth: inner.depth.clone(),
        }
    }

    /// The most recently delivered frame, retained until superseded.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        inner.latest.clone()
    }
}

impl FrameListener for FrameCache {
    fn on_frame(&self, frame: Arc<Frame>) {
        let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(plane) = frame.color() {
            inner.color = Some((plane.clone(), frame.resolution()));
        }
        if let Some(plane) = frame.depth() {
            inner.depth = Some((plane.clone(), frame.resolution()));
        }
        inner.latest = Some(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(
        timestamp_us: u64,
        resolution: Resolution,
        color: bool,
        depth: bool,
    ) -> Arc<Frame> {
        let pixels = resolution.pixel_count();
        Arc::new(
            Frame::new(
                timestamp_us,
                resolution,
                color.then(|| vec![timestamp_us as u8; pixels * 4]),
                depth.then(|| vec![timestamp_us as u16; pixels]),
            )
            .unwrap(),
        )
    }

    #[test]
    fn empty_cache_snapshots_nothing() {
        let cache = FrameCache::new();
        let snapshot = cache.snapshot();
        assert!(snapshot.color.is_none());
        assert!(snapshot.depth.is_none());
    }

    #[test]
    fn later_frames_replace_planes() {
        let cache = FrameCache::new();
        let res = Resolution::new(2, 2);
        cache.on_frame(frame(1, res, true, true));
        cache.on_frame(frame(2, res, true, true));
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.color.unwrap().0[0], 2);
        assert_eq!(snapshot.depth.unwrap().0[0], 2);
        assert_eq!(cache.latest().unwrap().timestamp_us(), 2);
    }

    #[test]
    fn partial_frame_keeps_other_plane() {
        let cache = FrameCache::new();
        let res = Resolution::new(2, 2);
        cache.on_frame(frame(1, res, true, true));
        cache.on_frame(frame(2, res, false, true));
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.color.unwrap().0[0], 1, "color survives a depth-only frame");
        assert_eq!(snapshot.depth.unwrap().0[0], 2);
    }

    #[test]
    fn snapshot_survives_replacement() {
        let cache = FrameCache::new();
        let res = Resolution::new(2, 2);
        cache.on_frame(frame(1, res, true, false));
        let snapshot = cache.snapshot();
        cache.on_frame(frame(2, res, true, false));
        // The earlier snapshot still sees the plane it captured.
        assert_eq!(snapshot.color.unwrap().0[0], 1);
    }

    #[test]
    fn handoff_crosses_threads() {
        let cache = Arc::new(FrameCache::new());
        let res = Resolution::new(4, 4);
        let producer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for index in 0..50u64 {
                    cache.on_frame(frame(index, res, true, true));
                }
            })
        };
        // Reader just has to never observe a torn pair; sizes stay dense.
        for _ in 0..50 {
            let snapshot = cache.snapshot();
            if let Some((plane, seen)) = snapshot.color {
                assert_eq!(seen, res);
                assert_eq!(plane.len(), res.pixel_count() * 4);
            }
        }
        producer.join().unwrap();
    }
}
