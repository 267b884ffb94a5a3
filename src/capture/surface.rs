//! Capture surface
//!
//! The stream side publishes decoded frames into a [`FrameSlot`]; the
//! session reads the newest one through a [`CaptureSurface`]. There is no
//! history: a publish overwrites whatever was there.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A decoded RGB8 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixels, `width * height * 3` bytes
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Single-entry frame slot shared between a stream and its surface
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<RawFrame>>>,
    published: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn publish(&self, frame: RawFrame) {
        *self.latest.lock() = Some(Arc::new(frame));
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latest(&self) -> Option<Arc<RawFrame>> {
        self.latest.lock().clone()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// The session's view of the attached stream
#[derive(Debug, Default)]
pub struct CaptureSurface {
    source: Option<Arc<FrameSlot>>,
}

impl CaptureSurface {
    pub fn attach(&mut self, slot: Arc<FrameSlot>) {
        self.source = Some(slot);
    }

    /// Detach the source; later reads see nothing
    pub fn clear(&mut self) {
        self.source = None;
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Newest decoded frame, or None if nothing with dimensions was decoded yet
    pub fn snapshot(&self) -> Option<Arc<RawFrame>> {
        self.source
            .as_ref()
            .and_then(|slot| slot.latest())
            .filter(|frame| frame.has_dimensions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_frame_wins() {
        let slot = Arc::new(FrameSlot::new());
        slot.publish(RawFrame::new(2, 2, vec![0; 12]));
        slot.publish(RawFrame::new(4, 2, vec![1; 24]));

        let mut surface = CaptureSurface::default();
        surface.attach(slot.clone());

        let frame = surface.snapshot().unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(slot.published_count(), 2);
    }

    #[test]
    fn test_no_dimensions_is_empty() {
        let slot = Arc::new(FrameSlot::new());
        slot.publish(RawFrame::new(0, 0, vec![]));

        let mut surface = CaptureSurface::default();
        surface.attach(slot);
        assert!(surface.snapshot().is_none());
    }

    #[test]
    fn test_clear_detaches() {
        let slot = Arc::new(FrameSlot::new());
        slot.publish(RawFrame::new(1, 1, vec![0; 3]));

        let mut surface = CaptureSurface::default();
        surface.attach(slot);
        surface.clear();
        assert!(!surface.has_source());
        assert!(surface.snapshot().is_none());
    }
}
