//! Native webcam backend using nokhwa
//!
//! Each acquired stream runs a capture thread that decodes frames to RGB8
//! and publishes them into the stream's frame slot. The camera itself is
//! opened on that thread; the open result is reported back before
//! `acquire` returns.

use super::surface::{FrameSlot, RawFrame};
use super::traits::{AcquireFailure, CameraBackend, CaptureConstraints, DeviceDescriptor, MediaStream};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as NokhwaResolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// Consecutive frame errors before the stream is considered revoked
const MAX_CONSECUTIVE_FRAME_ERRORS: u32 = 30;

/// Camera backend over the platform's native capture API
#[derive(Debug, Default, Clone, Copy)]
pub struct WebcamBackend;

impl WebcamBackend {
    pub fn new() -> Self {
        Self
    }
}

fn list_cameras() -> Result<Vec<DeviceDescriptor>, AcquireFailure> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| AcquireFailure::Backend(e.to_string()))?;

    Ok(cameras
        .into_iter()
        .map(|info| {
            let id = match info.index() {
                CameraIndex::Index(i) => i.to_string(),
                CameraIndex::String(s) => s.to_string(),
            };
            DeviceDescriptor {
                id,
                label: info.human_name(),
            }
        })
        .collect())
}

/// Camera index from a device id
fn camera_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id.to_string()),
        },
        // Default to first camera
        None => CameraIndex::Index(0),
    }
}

#[async_trait]
impl CameraBackend for WebcamBackend {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, AcquireFailure> {
        tokio::task::spawn_blocking(list_cameras)
            .await
            .map_err(|e| AcquireFailure::Backend(format!("Camera enumeration task failed: {}", e)))?
    }

    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireFailure> {
        let index = camera_index(constraints.device_id.as_deref());
        let ideal = constraints.ideal;
        let slot = Arc::new(FrameSlot::new());
        let running = Arc::new(AtomicBool::new(true));
        let live = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = oneshot::channel::<Result<(), AcquireFailure>>();

        let thread_slot = slot.clone();
        let thread_running = running.clone();
        let thread_live = live.clone();

        let handle = std::thread::spawn(move || {
            let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                CameraFormat::new(
                    NokhwaResolution::new(ideal.width, ideal.height),
                    FrameFormat::MJPEG,
                    30,
                ),
            ));

            let mut camera = match Camera::new(index.clone(), format) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to open camera {:?}: {}", index, e);
                    let _ = opened_tx.send(Err(AcquireFailure::Backend(e.to_string())));
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                tracing::error!("Failed to open camera stream: {}", e);
                let _ = opened_tx.send(Err(AcquireFailure::Backend(e.to_string())));
                return;
            }

            let camera_format = camera.camera_format();
            tracing::info!(
                "Webcam opened: {}x{} @ {}fps, format={:?} (requested {}x{})",
                camera_format.resolution().width(),
                camera_format.resolution().height(),
                camera_format.frame_rate(),
                camera_format.format(),
                ideal.width,
                ideal.height
            );
            let _ = opened_tx.send(Ok(()));

            let mut consecutive_errors = 0u32;
            while thread_running.load(Ordering::SeqCst) {
                // Blocks until the camera delivers the next frame
                let decoded = camera
                    .frame()
                    .and_then(|buffer| buffer.decode_image::<RgbFormat>());

                match decoded {
                    Ok(image) => {
                        consecutive_errors = 0;
                        let (width, height) = image.dimensions();
                        thread_slot.publish(RawFrame::new(width, height, image.into_raw()));
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        tracing::debug!("Failed to capture frame: {}", e);
                        if consecutive_errors >= MAX_CONSECUTIVE_FRAME_ERRORS {
                            tracing::warn!("Camera stopped delivering frames; marking stream ended");
                            thread_live.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {}", e);
            }
            tracing::info!("Webcam capture thread stopped");
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(Box::new(WebcamStream {
                slot,
                running,
                live,
                thread: Some(handle),
            })),
            Ok(Err(failure)) => {
                let _ = handle.join();
                Err(failure)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AcquireFailure::Backend("Capture thread exited before opening the camera".to_string()))
            }
        }
    }
}

/// A stream backed by a nokhwa capture thread
pub struct WebcamStream {
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MediaStream for WebcamStream {
    fn video_track_count(&self) -> usize {
        1
    }

    fn frame_slot(&self) -> Arc<FrameSlot> {
        self.slot.clone()
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);

        // Wait for the capture thread so the device is released
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WebcamStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_index_parsing() {
        assert!(matches!(camera_index(Some("2")), CameraIndex::Index(2)));
        assert!(matches!(camera_index(None), CameraIndex::Index(0)));
        assert!(matches!(
            camera_index(Some("/dev/video-usb")),
            CameraIndex::String(_)
        ));
    }
}
