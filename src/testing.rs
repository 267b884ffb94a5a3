//! Test doubles for the camera backend and live channel

use crate::capture::{
    AcquireFailure, CameraBackend, CaptureConstraints, DeviceDescriptor, FrameSlot, MediaStream,
    RawFrame,
};
use crate::stream::{ChannelConnector, ChannelEvent, FrameMessage, SendOutcome, StreamChannel};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Ordered record of teardown calls shared between mocks
pub(crate) type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub(crate) fn two_devices() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor {
            id: "cam-a".to_string(),
            label: "Front Camera".to_string(),
        },
        DeviceDescriptor {
            id: "cam-b".to_string(),
            label: String::new(),
        },
    ]
}

/// Scripted result of the next acquisition
#[derive(Debug, Clone, Copy)]
pub(crate) enum MockOutcome {
    Grant { tracks: usize },
    Deny,
    NotFound,
    Busy,
    Overconstrained,
}

pub(crate) struct MockBackend {
    devices: Vec<DeviceDescriptor>,
    enumerate_fails: AtomicBool,
    outcomes: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<CaptureConstraints>>,
    streams: Mutex<Vec<(Arc<FrameSlot>, Arc<AtomicBool>)>>,
    last_tracks: AtomicUsize,
    outstanding: Arc<AtomicUsize>,
    max_outstanding: Arc<AtomicUsize>,
    log: CallLog,
}

impl MockBackend {
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            enumerate_fails: AtomicBool::new(false),
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            last_tracks: AtomicUsize::new(0),
            outstanding: Arc::new(AtomicUsize::new(0)),
            max_outstanding: Arc::new(AtomicUsize::new(0)),
            log: CallLog::default(),
        }
    }

    /// Record track stops into `log`
    pub fn logging_to(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Queue an outcome; when the queue is empty every request is granted
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.enumerate_fails.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CaptureConstraints> {
        self.requests.lock().clone()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn last_track_count(&self) -> usize {
        self.last_tracks.load(Ordering::SeqCst)
    }

    /// Publish a frame into the newest stream
    pub fn publish_frame(&self, frame: RawFrame) {
        if let Some((slot, _)) = self.streams.lock().last() {
            slot.publish(frame);
        }
    }

    /// Simulate the OS revoking every granted stream
    pub fn revoke_all(&self) {
        for (_, live) in self.streams.lock().iter() {
            live.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl CameraBackend for MockBackend {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, AcquireFailure> {
        if self.enumerate_fails.load(Ordering::SeqCst) {
            return Err(AcquireFailure::Backend("enumeration unavailable".to_string()));
        }
        Ok(self.devices.clone())
    }

    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireFailure> {
        self.requests.lock().push(constraints.clone());

        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(MockOutcome::Grant { tracks: 1 });

        match outcome {
            MockOutcome::Grant { tracks } => {
                let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_outstanding.fetch_max(now, Ordering::SeqCst);
                self.last_tracks.store(tracks, Ordering::SeqCst);

                let slot = Arc::new(FrameSlot::new());
                let live = Arc::new(AtomicBool::new(true));
                self.streams.lock().push((slot.clone(), live.clone()));
                Ok(Box::new(MockStream {
                    slot,
                    tracks,
                    live,
                    stopped: false,
                    outstanding: self.outstanding.clone(),
                    log: self.log.clone(),
                }))
            }
            MockOutcome::Deny => Err(AcquireFailure::Os(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "NotAllowedError",
            ))),
            MockOutcome::NotFound => Err(AcquireFailure::Os(io::Error::new(
                io::ErrorKind::NotFound,
                "no device",
            ))),
            MockOutcome::Busy => Err(AcquireFailure::Backend(
                "Could not start video source: device busy".to_string(),
            )),
            MockOutcome::Overconstrained => Err(AcquireFailure::Backend(
                "Overconstrained: no mode matches 640x480".to_string(),
            )),
        }
    }
}

pub(crate) struct MockStream {
    slot: Arc<FrameSlot>,
    tracks: usize,
    live: Arc<AtomicBool>,
    stopped: bool,
    outstanding: Arc<AtomicUsize>,
    log: CallLog,
}

impl MediaStream for MockStream {
    fn video_track_count(&self) -> usize {
        self.tracks
    }

    fn frame_slot(&self) -> Arc<FrameSlot> {
        self.slot.clone()
    }

    fn is_live(&self) -> bool {
        !self.stopped && self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.store(false, Ordering::SeqCst);
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            self.log.lock().push("stop_tracks");
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

#[derive(Default)]
struct ChannelState {
    connected: bool,
    busy: bool,
    closed: bool,
    sent: Vec<FrameMessage>,
    inbound: VecDeque<ChannelEvent>,
}

/// Connector whose channels share one inspectable state
#[derive(Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<ChannelState>>,
    opened: AtomicUsize,
    log: CallLog,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record channel closes into `log`
    pub fn logging_to(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    pub fn set_busy(&self, busy: bool) {
        self.state.lock().busy = busy;
    }

    pub fn push_inbound(&self, event: ChannelEvent) {
        self.state.lock().inbound.push_back(event);
    }

    pub fn sent(&self) -> Vec<FrameMessage> {
        self.state.lock().sent.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl ChannelConnector for MockConnector {
    fn open(&self) -> Box<dyn StreamChannel> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.state.lock().closed = false;
        Box::new(MockChannel {
            state: self.state.clone(),
            log: self.log.clone(),
        })
    }
}

pub(crate) struct MockChannel {
    state: Arc<Mutex<ChannelState>>,
    log: CallLog,
}

impl StreamChannel for MockChannel {
    fn try_send_frame(&mut self, frame: FrameMessage) -> SendOutcome {
        let mut state = self.state.lock();
        if state.closed {
            SendOutcome::DroppedClosed
        } else if !state.connected {
            SendOutcome::DroppedDisconnected
        } else if state.busy {
            SendOutcome::DroppedBusy
        } else {
            state.sent.push(frame);
            SendOutcome::Sent
        }
    }

    fn try_recv_event(&mut self) -> Option<ChannelEvent> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.inbound.pop_front()
    }

    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.connected && !state.closed
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            self.log.lock().push("close");
        }
    }
}
