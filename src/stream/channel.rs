//! Streaming channel abstraction
//!
//! A channel is opened when the camera becomes active and closed when it
//! stops. Sends never block: a frame the channel cannot take right now is
//! dropped in favor of the next one.

use super::protocol::{FeedbackMessage, FrameMessage};

/// Asynchronous notifications from the channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Transport connected (or reconnected)
    Connected,
    /// Transport lost; reconnection is attempted in the background
    Disconnected,
    /// Annotated frame / feedback from the server
    Feedback(FeedbackMessage),
    /// Server-side error report
    ServerError(String),
    /// A frame could not be delivered
    DeliveryFailed(String),
}

/// Result of offering a frame to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Transport not connected
    DroppedDisconnected,
    /// The channel cannot take a frame right now
    DroppedBusy,
    /// Channel closed
    DroppedClosed,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// A persistent bidirectional channel to the analysis service
pub trait StreamChannel: Send {
    /// Offer a frame; never blocks, never queues more than one frame
    fn try_send_frame(&mut self, frame: FrameMessage) -> SendOutcome;

    /// Next pending event, if any
    fn try_recv_event(&mut self) -> Option<ChannelEvent>;

    fn is_connected(&self) -> bool;

    /// Close the channel. Must be idempotent.
    fn close(&mut self);
}

/// Opens channels. Opening returns immediately; the connection itself is
/// established in the background.
pub trait ChannelConnector: Send + Sync {
    fn open(&self) -> Box<dyn StreamChannel>;
}
