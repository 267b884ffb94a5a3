//! Live analysis channel
//!
//! Wire protocol, the channel abstraction used by the capture session, and
//! the websocket implementation.

pub mod channel;
pub mod protocol;
pub mod ws;

pub use channel::{ChannelConnector, ChannelEvent, SendOutcome, StreamChannel};
pub use protocol::{FeedbackMessage, FrameMessage, ServerErrorMessage};
pub use ws::{Backoff, WsChannel, WsConnector};
