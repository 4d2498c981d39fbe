//! Phone-link boundary: inbound hand-off and outbound messages.
//!
//! The radio stack delivers frames from its own thread or interrupt context.
//! Those frames must not touch the runtime directly, so the transport callback
//! copies them into an [`InboundQueue`] and the event loop drains it on its
//! next tick. The queue is the only structure in the core shared across
//! execution contexts.
//!
//! ```rust,ignore
//! static INBOUND: InboundQueue = InboundQueue::new();
//!
//! // Radio callback
//! fn on_write(conn: u16, data: &[u8]) {
//!     if let Err(e) = INBOUND.on_receive(ConnectionHandle(conn), data) {
//!         warn!("Inbound frame dropped: {}", e);
//!     }
//! }
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{Deque, Vec};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Largest frame accepted from the phone
pub const MAX_FRAME_LEN: usize = 256;

/// Frames the radio can queue before the event loop drains them
pub const INBOUND_QUEUE_DEPTH: usize = 4;

/// Outbound messages waiting for the next flush
pub const OUTBOX_CAPACITY: usize = 4;

/// Frame tag of a battery status report
pub const TAG_BATTERY_STATUS: u8 = 0x81;

/// Identifies the phone connection a frame arrived on or is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle(pub u16);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("peer has not enabled notifications")]
    NotSubscribed,
    #[error("no connection")]
    Disconnected,
    #[error("transport I/O error")]
    Io,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundError {
    #[error("frame of {len} bytes exceeds {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("inbound queue is full")]
    QueueFull,
}

/// The write side of the phone link.
pub trait Transport {
    /// Send one frame on the notify characteristic of `conn`.
    fn send(&mut self, conn: ConnectionHandle, bytes: &[u8]) -> Result<(), TransportError>;
}

/// A frame received from the phone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub conn: ConnectionHandle,
    pub bytes: Vec<u8, MAX_FRAME_LEN>,
}

/// Single-producer, single-consumer hand-off from the radio to the event loop
pub struct InboundQueue {
    channel: Channel<CriticalSectionRawMutex, InboundFrame, INBOUND_QUEUE_DEPTH>,
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Copy a received frame into the queue. Never blocks.
    pub fn on_receive(&self, conn: ConnectionHandle, bytes: &[u8]) -> Result<(), InboundError> {
        let frame = Vec::from_slice(bytes).map_err(|_| InboundError::FrameTooLarge {
            len: bytes.len(),
            max: MAX_FRAME_LEN,
        })?;

        self.channel
            .try_send(InboundFrame { conn, bytes: frame })
            .map_err(|_| InboundError::QueueFull)
    }

    /// Take the oldest queued frame
    pub fn try_next(&self) -> Option<InboundFrame> {
        self.channel.try_receive().ok()
    }
}

/// Battery report sent to the phone
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub percent: u8,
    pub millivolts: u16,
    pub charging: bool,
}

/// Messages the watch sends to the phone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundMessage {
    BatteryStatus(BatteryStatus),
}

impl OutboundMessage {
    pub const fn tag(&self) -> u8 {
        match self {
            Self::BatteryStatus(_) => TAG_BATTERY_STATUS,
        }
    }

    /// Encode as a tagged frame into `buf`, returning the filled prefix.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b [u8], postcard::Error> {
        let tag = self.tag();
        let Some((head, body)) = buf.split_first_mut() else {
            return Err(postcard::Error::SerializeBufferFull);
        };
        *head = tag;

        let body_len = match self {
            Self::BatteryStatus(status) => postcard::to_slice(status, body)?.len(),
        };
        Ok(&buf[..body_len + 1])
    }
}

/// Messages queued for the phone
pub type Outbox = Deque<OutboundMessage, OUTBOX_CAPACITY>;

/// Sends queued outbound messages to the connected phone.
///
/// Failed sends are logged and dropped; callers that care resend on a later
/// event.
pub struct Uplink<T> {
    transport: T,
    conn: Option<ConnectionHandle>,
    sent: u32,
    dropped: u32,
}

impl<T: Transport> Uplink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            conn: None,
            sent: 0,
            dropped: 0,
        }
    }

    /// Remember the connection outbound messages go to
    pub fn set_connection(&mut self, conn: ConnectionHandle) {
        if self.conn != Some(conn) {
            info!("Phone connected on handle {}", conn.0);
        }
        self.conn = Some(conn);
    }

    pub fn clear_connection(&mut self) {
        if self.conn.take().is_some() {
            info!("Phone disconnected");
        }
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.conn
    }

    /// Send every queued message. Returns the number sent.
    pub fn flush(&mut self, outbox: &mut Outbox) -> usize {
        let mut sent = 0;
        while let Some(message) = outbox.pop_front() {
            match self.send(&message) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("Dropping outbound {:?}: {}", message, e);
                    self.dropped = self.dropped.wrapping_add(1);
                }
            }
        }
        self.sent = self.sent.wrapping_add(sent as u32);
        sent
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let conn = self.conn.ok_or(TransportError::Disconnected)?;

        let mut buf = [0u8; 32];
        let frame = message.encode(&mut buf).map_err(|e| {
            warn!("Failed to encode {:?}: {}", message, e);
            TransportError::Io
        })?;

        debug!("Sending {} byte frame to handle {}", frame.len(), conn.0);
        self.transport.send(conn, frame)
    }

    /// Messages sent since start
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Messages dropped because the send failed
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec as StdVec;

    #[derive(Default)]
    struct Recorder {
        subscribed: bool,
        frames: StdVec<(u16, StdVec<u8>)>,
    }

    impl Transport for Recorder {
        fn send(&mut self, conn: ConnectionHandle, bytes: &[u8]) -> Result<(), TransportError> {
            if !self.subscribed {
                return Err(TransportError::NotSubscribed);
            }
            self.frames.push((conn.0, bytes.to_vec()));
            Ok(())
        }
    }

    fn battery(percent: u8) -> OutboundMessage {
        OutboundMessage::BatteryStatus(BatteryStatus {
            percent,
            millivolts: 3900,
            charging: false,
        })
    }

    #[test]
    fn test_inbound_queue_is_fifo() {
        let queue = InboundQueue::new();
        queue.on_receive(ConnectionHandle(1), &[1, 2]).unwrap();
        queue.on_receive(ConnectionHandle(1), &[3]).unwrap();

        assert_eq!(queue.try_next().unwrap().bytes.as_slice(), [1, 2]);
        assert_eq!(queue.try_next().unwrap().bytes.as_slice(), [3]);
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn test_inbound_queue_overflow() {
        let queue = InboundQueue::new();
        for _ in 0..INBOUND_QUEUE_DEPTH {
            queue.on_receive(ConnectionHandle(1), &[0]).unwrap();
        }

        assert_eq!(
            queue.on_receive(ConnectionHandle(1), &[0]),
            Err(InboundError::QueueFull)
        );
    }

    #[test]
    fn test_oversized_frame_is_refused() {
        let queue = InboundQueue::new();
        let big = [0u8; MAX_FRAME_LEN + 1];

        assert_eq!(
            queue.on_receive(ConnectionHandle(1), &big),
            Err(InboundError::FrameTooLarge {
                len: MAX_FRAME_LEN + 1,
                max: MAX_FRAME_LEN
            })
        );
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn test_battery_frame_layout() {
        let mut buf = [0u8; 16];
        let frame = battery(80).encode(&mut buf).unwrap();

        assert_eq!(frame[0], TAG_BATTERY_STATUS);
        let status: BatteryStatus = postcard::from_bytes(&frame[1..]).unwrap();
        assert_eq!(status.percent, 80);
    }

    #[test]
    fn test_flush_sends_to_connection() {
        let mut uplink = Uplink::new(Recorder {
            subscribed: true,
            ..Default::default()
        });
        let mut outbox = Outbox::new();
        outbox.push_back(battery(50)).unwrap();
        outbox.push_back(battery(49)).unwrap();
        uplink.set_connection(ConnectionHandle(7));

        assert_eq!(uplink.flush(&mut outbox), 2);
        assert!(outbox.is_empty());
        assert_eq!(uplink.transport().frames.len(), 2);
        assert_eq!(uplink.transport().frames[0].0, 7);
    }

    #[test]
    fn test_not_subscribed_is_dropped_without_retry() {
        let mut uplink = Uplink::new(Recorder::default());
        let mut outbox = Outbox::new();
        outbox.push_back(battery(50)).unwrap();
        uplink.set_connection(ConnectionHandle(7));

        assert_eq!(uplink.flush(&mut outbox), 0);
        assert!(outbox.is_empty());
        assert_eq!(uplink.dropped(), 1);

        uplink.transport_mut().subscribed = true;
        assert_eq!(uplink.flush(&mut outbox), 0);
        assert!(uplink.transport().frames.is_empty());
    }

    #[test]
    fn test_no_connection_drops() {
        let mut uplink = Uplink::new(Recorder {
            subscribed: true,
            ..Default::default()
        });
        let mut outbox = Outbox::new();
        outbox.push_back(battery(10)).unwrap();

        assert_eq!(uplink.flush(&mut outbox), 0);
        assert_eq!(uplink.dropped(), 1);
    }
}
