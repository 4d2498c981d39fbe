use embassy_time::{Duration, Instant};
use heapless::Vec;
use log::trace;

use super::{BusError, PeriodicDriver, Topic};
use crate::events::Tick;

/// Maximum number of subscribers a single channel can be declared with
pub const MAX_SUBSCRIBERS: usize = 4;

/// Subscriber callback.
///
/// Receives the shared context and its own copy of the message.
pub type Subscriber<M, C> = fn(&mut C, M);

/// A typed, named channel with a fixed subscriber list.
///
/// The subscriber list is set when the channel is defined and cannot change
/// afterwards. Every publication is retained so that readers which do not
/// subscribe (a refresh loop, for instance) can poll the latest value.
pub struct Channel<M, C> {
    topic: Topic,
    subscribers: Vec<Subscriber<M, C>, MAX_SUBSCRIBERS>,
    retained: Option<M>,
    published: u32,
    driver: Option<PeriodicDriver>,
}

impl<M: Clone, C> Channel<M, C> {
    /// Declare a producer-driven channel.
    pub fn define(topic: Topic, subscribers: &[Subscriber<M, C>]) -> Result<Self, BusError> {
        let mut list = Vec::new();
        for subscriber in subscribers {
            list.push(*subscriber)
                .map_err(|_| BusError::TooManySubscribers {
                    topic,
                    max: MAX_SUBSCRIBERS,
                })?;
        }

        Ok(Self {
            topic,
            subscribers: list,
            retained: None,
            published: 0,
            driver: None,
        })
    }

    /// Publish a message.
    ///
    /// The message is retained first, then each subscriber runs once, in
    /// declaration order, before this returns.
    pub fn publish(&mut self, message: M, ctx: &mut C) {
        self.retained = Some(message.clone());
        self.published = self.published.wrapping_add(1);
        trace!(
            "Publishing on {} to {} subscribers",
            self.topic,
            self.subscribers.len()
        );

        for subscriber in self.subscribers.iter() {
            subscriber(ctx, message.clone());
        }
    }

    /// Latest retained value, if anything was published yet
    pub fn poll(&self) -> Option<M> {
        self.retained.clone()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of publications since the channel was defined
    pub fn published(&self) -> u32 {
        self.published
    }

    /// The timer driving this channel, if any
    pub fn driver(&self) -> Option<&PeriodicDriver> {
        self.driver.as_ref()
    }
}

impl<C> Channel<Tick, C> {
    /// Declare a timer-driven channel publishing [`Tick`]s every `period`.
    pub fn periodic(
        topic: Topic,
        period: Duration,
        start: Instant,
        subscribers: &[Subscriber<Tick, C>],
    ) -> Result<Self, BusError> {
        let driver = PeriodicDriver::new(period, start).ok_or(BusError::ZeroPeriod { topic })?;
        let mut channel = Self::define(topic, subscribers)?;
        channel.driver = Some(driver);
        Ok(channel)
    }

    /// Publish a tick if the channel's timer is due at `now`.
    ///
    /// Goes through the same [`publish`](Self::publish) path as a producer
    /// would. Returns whether a tick was published.
    pub fn fire_if_due(&mut self, now: Instant, ctx: &mut C) -> bool {
        let due = match self.driver.as_mut() {
            Some(driver) => driver.poll(now),
            None => false,
        };

        if due {
            self.publish(
                Tick {
                    uptime_ms: now.as_millis(),
                },
                ctx,
            );
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec as StdVec;

    #[derive(Default)]
    struct Trace {
        calls: StdVec<(&'static str, u32)>,
    }

    fn first(ctx: &mut Trace, msg: u32) {
        ctx.calls.push(("A", msg));
    }

    fn second(ctx: &mut Trace, msg: u32) {
        ctx.calls.push(("B", msg));
    }

    fn third(ctx: &mut Trace, msg: u32) {
        ctx.calls.push(("C", msg));
    }

    fn on_tick(ctx: &mut Trace, tick: Tick) {
        ctx.calls.push(("tick", tick.uptime_ms as u32));
    }

    #[test]
    fn test_fan_out_in_declaration_order() {
        let mut channel =
            Channel::define(Topic::PressureSample, &[first, second, third]).unwrap();
        let mut trace = Trace::default();

        channel.publish(7, &mut trace);

        assert_eq!(trace.calls, [("A", 7), ("B", 7), ("C", 7)]);
        assert_eq!(channel.published(), 1);
    }

    #[test]
    fn test_too_many_subscribers() {
        let result = Channel::<u32, Trace>::define(
            Topic::AmbientLight,
            &[first, second, third, first, second],
        );

        assert!(matches!(
            result,
            Err(BusError::TooManySubscribers {
                topic: Topic::AmbientLight,
                max: MAX_SUBSCRIBERS
            })
        ));
    }

    #[test]
    fn test_poll_returns_last_published() {
        let mut channel = Channel::<u32, Trace>::define(Topic::ChargeState, &[]).unwrap();
        let mut trace = Trace::default();

        assert_eq!(channel.poll(), None);
        channel.publish(1, &mut trace);
        channel.publish(2, &mut trace);
        assert_eq!(channel.poll(), Some(2));
        assert!(trace.calls.is_empty());
    }

    #[test]
    fn test_periodic_channel_uses_publish_path() {
        let start = Instant::from_millis(0);
        let mut channel =
            Channel::periodic(Topic::Periodic1s, Duration::from_secs(1), start, &[on_tick])
                .unwrap();
        let mut trace = Trace::default();

        assert!(!channel.fire_if_due(Instant::from_millis(999), &mut trace));
        assert!(channel.fire_if_due(Instant::from_millis(1000), &mut trace));

        assert_eq!(trace.calls, [("tick", 1000)]);
        assert_eq!(channel.poll(), Some(Tick { uptime_ms: 1000 }));
    }

    #[test]
    fn test_producer_channel_never_fires() {
        let mut channel = Channel::<Tick, Trace>::define(Topic::Periodic10s, &[on_tick]).unwrap();
        let mut trace = Trace::default();

        assert!(!channel.fire_if_due(Instant::from_millis(60_000), &mut trace));
        assert!(trace.calls.is_empty());
    }

    #[test]
    fn test_periodic_rejects_zero_period() {
        let result = Channel::<Tick, Trace>::periodic(
            Topic::Periodic100ms,
            Duration::from_millis(0),
            Instant::from_millis(0),
            &[],
        );

        assert!(matches!(
            result,
            Err(BusError::ZeroPeriod {
                topic: Topic::Periodic100ms
            })
        ));
    }
}
