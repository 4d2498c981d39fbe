//! Static publish-subscribe fabric connecting producers to consumers.
//!
//! Each [`Channel`] carries one message type and a subscriber list fixed at
//! definition time. Publishing retains the message and then runs every
//! subscriber synchronously, in declaration order, before returning. There
//! is no ordering between different channels.
//!
//! Subscribers are plain functions taking the shared context by mutable
//! reference, so the bus never owns the state it fans out to:
//!
//! ```rust,ignore
//! fn on_pressure(ctx: &mut Context, sample: PressureSample) { /* ... */ }
//!
//! let mut pressure = Channel::define(Topic::PressureSample, &[on_pressure])?;
//! pressure.publish(sample, &mut ctx);
//! ```
//!
//! The three periodic channels own a [`PeriodicDriver`] and are published by
//! [`Bus::poll_timers`] instead of a producer. Subscribers cannot tell the
//! difference.

mod channel;
mod periodic;
mod topic;

pub use channel::*;
pub use periodic::*;
pub use topic::*;

use embassy_time::Instant;
use thiserror_no_std::Error;

use crate::events::{
    ActivityState, AmbientLight, ChargeState, CommunicationEvent, MagnetometerSample,
    PressureSample, Tick,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("channel {topic} declared with more than {max} subscribers")]
    TooManySubscribers { topic: Topic, max: usize },
    #[error("periodic channel {topic} declared with a zero period")]
    ZeroPeriod { topic: Topic },
}

/// The full set of channels of a running system.
///
/// Built once at startup (see [`crate::runtime::standard_bus`]) and kept
/// for the lifetime of the process. `C` is the context type every
/// subscriber receives.
pub struct Bus<C> {
    pub activity: Channel<ActivityState, C>,
    pub communication: Channel<CommunicationEvent, C>,
    pub charge: Channel<ChargeState, C>,
    pub ambient_light: Channel<AmbientLight, C>,
    pub magnetometer: Channel<MagnetometerSample, C>,
    pub pressure: Channel<PressureSample, C>,
    pub periodic_10s: Channel<Tick, C>,
    pub periodic_1s: Channel<Tick, C>,
    pub periodic_100ms: Channel<Tick, C>,
}

impl<C> Bus<C> {
    /// Publish on every periodic channel whose timer is due.
    ///
    /// Channels are polled fastest first. Returns the number of ticks
    /// published.
    pub fn poll_timers(&mut self, now: Instant, ctx: &mut C) -> usize {
        [
            self.periodic_100ms.fire_if_due(now, ctx),
            self.periodic_1s.fire_if_due(now, ctx),
            self.periodic_10s.fire_if_due(now, ctx),
        ]
        .into_iter()
        .filter(|fired| *fired)
        .count()
    }

    /// Publication count per topic, in [`Topic::ALL`] order
    pub fn publication_counts(&self) -> [(Topic, u32); 9] {
        [
            (Topic::ActivityState, self.activity.published()),
            (Topic::CommunicationData, self.communication.published()),
            (Topic::ChargeState, self.charge.published()),
            (Topic::AmbientLight, self.ambient_light.published()),
            (Topic::MagnetometerSample, self.magnetometer.published()),
            (Topic::PressureSample, self.pressure.published()),
            (Topic::Periodic10s, self.periodic_10s.published()),
            (Topic::Periodic1s, self.periodic_1s.published()),
            (Topic::Periodic100ms, self.periodic_100ms.published()),
        ]
    }
}
