//! Decoding of phone-link frames into bus events.
//!
//! A frame is one tag byte followed by a postcard-encoded body:
//!
//! | Tag    | Body                 | Event                                  |
//! |--------|----------------------|----------------------------------------|
//! | `0x01` | [`WireNotification`] | [`CommunicationEvent::Notification`]   |
//!
//! Text fields longer than [`MAX_FIELD_LEN`] are cut to fit by default. The
//! [`FieldPolicy`] makes this choice explicit: [`FieldPolicy::Reject`] drops
//! such frames instead.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::bus::Channel;
use crate::events::CommunicationEvent;
use crate::notifications::{MAX_FIELD_LEN, NotificationFields, Source, fits_field};

/// Frame tag of a notification
pub const TAG_NOTIFICATION: u8 = 0x01;

/// Notification body as sent by the phone
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireNotification<'a> {
    pub source: u8,
    pub sender: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// What to do with text fields longer than [`MAX_FIELD_LEN`]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPolicy {
    /// Cut the field at the last character boundary that fits
    #[default]
    Truncate,
    /// Refuse the whole frame
    Reject,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error("malformed frame body: {0}")]
    Malformed(postcard::Error),
    #[error("{0} unexpected bytes after frame body")]
    TrailingBytes(usize),
    #[error("field '{field}' is {len} characters, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Decode a notification frame into bounded fields.
pub fn decode_notification(
    frame: &[u8],
    policy: FieldPolicy,
) -> Result<NotificationFields, DecodeError> {
    let (&tag, body) = frame.split_first().ok_or(DecodeError::Empty)?;
    if tag != TAG_NOTIFICATION {
        return Err(DecodeError::UnknownTag(tag));
    }

    let (wire, rest): (WireNotification<'_>, &[u8]) =
        postcard::take_from_bytes(body).map_err(DecodeError::Malformed)?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes(rest.len()));
    }

    if policy == FieldPolicy::Reject {
        for (field, value) in [
            ("sender", wire.sender),
            ("title", wire.title),
            ("body", wire.body),
        ] {
            if !fits_field(value) {
                return Err(DecodeError::FieldTooLong {
                    field,
                    len: value.chars().count(),
                    max: MAX_FIELD_LEN,
                });
            }
        }
    }

    Ok(NotificationFields::new(
        wire.sender,
        wire.title,
        wire.body,
        Source::from_wire(wire.source),
    ))
}

/// Encode a notification frame into `buf`, phone side.
///
/// Returns the filled prefix of `buf`.
pub fn encode_notification<'b>(
    notification: &WireNotification<'_>,
    buf: &'b mut [u8],
) -> Result<&'b [u8], postcard::Error> {
    let Some((tag, body)) = buf.split_first_mut() else {
        return Err(postcard::Error::SerializeBufferFull);
    };
    *tag = TAG_NOTIFICATION;
    let body_len = postcard::to_slice(notification, body)?.len();
    Ok(&buf[..body_len + 1])
}

/// Turns raw frames into events on the communication channel
#[derive(Debug, Default)]
pub struct Ingest {
    policy: FieldPolicy,
    decoded: u32,
    dropped: u32,
}

impl Ingest {
    pub fn new(policy: FieldPolicy) -> Self {
        Self {
            policy,
            decoded: 0,
            dropped: 0,
        }
    }

    /// Decode `frame` and publish the result on `channel`.
    ///
    /// Nothing is published when decoding fails.
    pub fn handle_frame<C>(
        &mut self,
        frame: &[u8],
        channel: &mut Channel<CommunicationEvent, C>,
        ctx: &mut C,
    ) -> Result<(), DecodeError> {
        match decode_notification(frame, self.policy) {
            Ok(fields) => {
                debug!("Decoded notification from '{}'", fields.sender);
                self.decoded = self.decoded.wrapping_add(1);
                channel.publish(CommunicationEvent::Notification(fields), ctx);
                Ok(())
            }
            Err(e) => {
                warn!("Dropping {} byte frame: {}", frame.len(), e);
                self.dropped = self.dropped.wrapping_add(1);
                Err(e)
            }
        }
    }

    pub fn policy(&self) -> FieldPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FieldPolicy) {
        self.policy = policy;
    }

    /// Frames successfully decoded and published
    pub fn decoded(&self) -> u32 {
        self.decoded
    }

    /// Frames dropped because they did not decode
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
