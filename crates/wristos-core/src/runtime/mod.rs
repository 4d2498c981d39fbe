//! The cooperative event loop tying the core together.
//!
//! [`Runtime`] owns the bus and the [`Context`] its subscribers mutate. The
//! board glue calls [`Runtime::tick`] from a single task at a steady
//! cadence and feeds it input events; sensor tasks publish through
//! `runtime.bus.<channel>.publish(msg, &mut runtime.ctx)` or
//! [`crate::sensors::sample`].

mod context;
mod wiring;

pub use context::*;
pub use wiring::*;

use embassy_time::Instant;
use log::{debug, info};

use crate::apps::{
    AppDescriptor, AppError, Application, CloseCallback, InputEvent, InputGroupHandle,
    InputResponse, SurfaceHandle,
};
use crate::bus::{Bus, BusError};
use crate::config::Config;
use crate::ingest::Ingest;
use crate::notifications::DEFAULT_CAPACITY;
use crate::scheduler::DeferredTask;
use crate::transport::{ConnectionHandle, INBOUND_QUEUE_DEPTH, InboundQueue, Transport, Uplink};

/// What one [`Runtime::tick`] did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Deferred tasks run
    pub deferred: usize,
    /// Slot brought to the foreground by a deferred start
    pub started: Option<usize>,
    pub frames_ingested: usize,
    pub frames_dropped: usize,
    /// Periodic channels that published
    pub ticks: usize,
    pub messages_sent: usize,
}

pub struct Runtime<'q, A, T, const N: usize, const K: usize = DEFAULT_CAPACITY> {
    pub bus: Bus<Context<A, N, K>>,
    pub ctx: Context<A, N, K>,
    inbound: &'q InboundQueue,
    ingest: Ingest,
    uplink: Uplink<T>,
}

impl<'q, A, T, const N: usize, const K: usize> Runtime<'q, A, T, N, K>
where
    A: Application,
    T: Transport,
{
    /// Build the runtime with the standard bus wiring.
    ///
    /// Periodic channels count their first period from `start`.
    pub fn new(
        config: Config,
        inbound: &'q InboundQueue,
        transport: T,
        start: Instant,
    ) -> Result<Self, BusError> {
        let bus = standard_bus(&config, start)?;
        info!(
            "Runtime ready: {} app slots, {} notification slots, policy {:?}",
            N, K, config.field_policy
        );

        Ok(Self {
            bus,
            ctx: Context::new(config),
            inbound,
            ingest: Ingest::new(config.field_policy),
            uplink: Uplink::new(transport),
        })
    }

    pub fn register(&mut self, descriptor: AppDescriptor<A>) -> Result<usize, AppError> {
        self.ctx.apps.register(descriptor)
    }

    /// Start showing the registered applications from slot 0.
    pub fn show_apps(
        &mut self,
        on_close: CloseCallback,
        surface: SurfaceHandle,
        input: InputGroupHandle,
    ) -> Result<(), AppError> {
        self.ctx.apps.show(on_close, surface, input)?;
        self.ctx.ui.app_needs_redraw = true;
        Ok(())
    }

    /// Deliver an input event to the foreground application.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<InputResponse, AppError> {
        let response = self.ctx.apps.dispatch_input(event, &mut self.ctx.deferred)?;
        if response == InputResponse::Handled {
            self.ctx.ui.app_needs_redraw = true;
        }
        Ok(response)
    }

    /// Take the screen away from the foreground application.
    pub fn interrupt(&mut self) -> Result<(), AppError> {
        self.ctx.apps.force_stop()
    }

    /// Give the screen back after [`interrupt`](Self::interrupt).
    pub fn resume(&mut self) -> Result<(), AppError> {
        self.ctx.apps.resume()?;
        self.ctx.ui.app_needs_redraw = true;
        Ok(())
    }

    /// Run one iteration of the event loop.
    ///
    /// In order: deferred tasks queued before this call, inbound frames,
    /// periodic timers, then the outbox. Work queued by any of these steps
    /// that is itself deferred runs on the next call.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        for task in self.ctx.deferred.take_batch() {
            report.deferred += 1;
            match task {
                DeferredTask::StartApp(slot) => {
                    if self.ctx.apps.run_deferred_start(slot) {
                        self.ctx.ui.app_needs_redraw = true;
                        report.started = Some(slot);
                    }
                }
            }
        }

        // Bounded so a chatty phone cannot starve the timers
        for _ in 0..INBOUND_QUEUE_DEPTH {
            let Some(frame) = self.inbound.try_next() else {
                break;
            };
            self.uplink.set_connection(frame.conn);

            match self
                .ingest
                .handle_frame(&frame.bytes, &mut self.bus.communication, &mut self.ctx)
            {
                Ok(()) => report.frames_ingested += 1,
                Err(_) => report.frames_dropped += 1,
            }
        }

        report.ticks = self.bus.poll_timers(now, &mut self.ctx);

        if !self.ctx.outbox.is_empty() {
            report.messages_sent = self.uplink.flush(&mut self.ctx.outbox);
        }

        if report != TickReport::default() {
            debug!("Tick at {} ms: {:?}", now.as_millis(), report);
        }
        report
    }

    /// Swap in a new configuration.
    ///
    /// The field policy and battery reporting apply immediately. Periodic
    /// channel periods are fixed when the bus is built and only change on
    /// the next start.
    pub fn apply_config(&mut self, config: Config) {
        if config.periodic != self.ctx.config.periodic {
            info!("Periodic configuration changes apply after restart");
        }
        self.ingest.set_policy(config.field_policy);
        self.ctx.config = config;
    }

    /// The phone connected on `conn`
    pub fn connect(&mut self, conn: ConnectionHandle) {
        self.uplink.set_connection(conn);
    }

    pub fn disconnect(&mut self) {
        self.uplink.clear_connection();
    }

    pub fn ingest(&self) -> &Ingest {
        &self.ingest
    }

    pub fn uplink(&self) -> &Uplink<T> {
        &self.uplink
    }

    pub fn uplink_mut(&mut self) -> &mut Uplink<T> {
        &mut self.uplink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{Button, IconHandle, ManagerState};
    use crate::events::{AppEvent, ChargeState, TickRate};
    use crate::ingest::{FieldPolicy, WireNotification, encode_notification};
    use crate::notifications::Source;
    use crate::transport::{TAG_BATTERY_STATUS, TransportError};
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec::Vec as StdVec;
    use core::cell::{Cell, RefCell};

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Start(usize),
        Stop(usize),
        Event(usize, AppEvent),
    }

    type Log = Rc<RefCell<StdVec<Seen>>>;

    struct TestApp {
        slot: usize,
        log: Log,
    }

    impl Application for TestApp {
        fn start(&mut self, _surface: SurfaceHandle, _input: InputGroupHandle) {
            self.log.borrow_mut().push(Seen::Start(self.slot));
        }

        fn stop(&mut self) {
            self.log.borrow_mut().push(Seen::Stop(self.slot));
        }

        fn handle_input(&mut self, event: InputEvent) -> InputResponse {
            match event {
                InputEvent::Press(Button::Back) => InputResponse::Close,
                _ => InputResponse::Handled,
            }
        }

        fn on_event(&mut self, event: &AppEvent) -> bool {
            self.log
                .borrow_mut()
                .push(Seen::Event(self.slot, event.clone()));
            matches!(event, AppEvent::Notification(_))
        }
    }

    #[derive(Default)]
    struct Phone {
        frames: StdVec<StdVec<u8>>,
    }

    impl Transport for Phone {
        fn send(&mut self, _conn: ConnectionHandle, bytes: &[u8]) -> Result<(), TransportError> {
            self.frames.push(bytes.to_vec());
            Ok(())
        }
    }

    type TestRuntime<'q> = Runtime<'q, TestApp, Phone, 3>;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn runtime_with<'q>(
        queue: &'q InboundQueue,
        config: Config,
        apps: usize,
        log: &Log,
    ) -> TestRuntime<'q> {
        let mut runtime = Runtime::new(config, queue, Phone::default(), at(0)).unwrap();
        for slot in 0..apps {
            let app = TestApp {
                slot,
                log: log.clone(),
            };
            runtime
                .register(AppDescriptor::new("test", IconHandle(slot as u16), app))
                .unwrap();
        }
        runtime
    }

    fn show(runtime: &mut TestRuntime<'_>) -> Rc<Cell<u32>> {
        let closed = Rc::new(Cell::new(0));
        let seen = closed.clone();
        runtime
            .show_apps(
                Box::new(move || seen.set(seen.get() + 1)),
                SurfaceHandle(0),
                InputGroupHandle(0),
            )
            .unwrap();
        closed
    }

    fn send_notification(queue: &InboundQueue, sender: &str, title: &str) {
        let wire = WireNotification {
            source: Source::Messenger.to_wire(),
            sender,
            title,
            body: "",
        };
        let mut buf = [0u8; 128];
        let frame = encode_notification(&wire, &mut buf).unwrap();
        queue.on_receive(ConnectionHandle(3), frame).unwrap();
    }

    #[test]
    fn test_frame_reaches_store_and_foreground_app() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);
        show(&mut runtime);
        runtime.ctx.ui.take();

        send_notification(&queue, "Dana", "Dinner");
        let report = runtime.tick(at(10));

        assert_eq!(report.frames_ingested, 1);
        assert_eq!(runtime.ctx.notifications.count(), 1);
        assert_eq!(runtime.ctx.notifications.newest().unwrap().id, 0);

        let ui = runtime.ctx.ui.take();
        assert!(ui.notifications_changed);
        assert!(ui.app_needs_redraw);

        let forwarded = log.borrow().iter().any(|seen| {
            matches!(seen, Seen::Event(0, AppEvent::Notification(n)) if n.sender.as_str() == "Dana")
        });
        assert!(forwarded);
        assert_eq!(runtime.uplink().connection(), Some(ConnectionHandle(3)));
    }

    #[test]
    fn test_bad_frame_publishes_nothing() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);

        queue.on_receive(ConnectionHandle(1), &[0x01, 0x05]).unwrap();
        let report = runtime.tick(at(10));

        assert_eq!(report.frames_dropped, 1);
        assert_eq!(runtime.bus.communication.published(), 0);
        assert!(runtime.ctx.notifications.is_empty());
        assert!(!runtime.ctx.ui.notifications_changed);
    }

    #[test]
    fn test_sixth_notification_evicts_oldest() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);

        for (i, title) in ["a", "b", "c", "d", "e", "f"].into_iter().enumerate() {
            send_notification(&queue, "x", title);
            runtime.tick(at(i as u64));
        }

        let ids: StdVec<u64> = runtime.ctx.notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        assert_eq!(runtime.ctx.notifications.newest().unwrap().title.as_str(), "f");
    }

    #[test]
    fn test_rotation_across_ticks() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 3, &log);
        let closed = show(&mut runtime);

        for slot in 0..2 {
            let response = runtime.handle_input(InputEvent::Press(Button::Back)).unwrap();
            assert_eq!(response, InputResponse::Close);
            assert_eq!(
                runtime.ctx.apps.state(),
                ManagerState::PendingTransition(slot)
            );

            let report = runtime.tick(at(1));
            assert_eq!(report.started, Some(slot + 1));
            assert_eq!(runtime.ctx.apps.state(), ManagerState::Running(slot + 1));
        }

        runtime.handle_input(InputEvent::Press(Button::Back)).unwrap();
        assert_eq!(runtime.ctx.apps.state(), ManagerState::Idle);
        assert_eq!(closed.get(), 1);

        let lifecycle: StdVec<Seen> = log
            .borrow()
            .iter()
            .filter(|seen| !matches!(seen, Seen::Event(..)))
            .cloned()
            .collect();
        assert_eq!(
            lifecycle,
            [
                Seen::Start(0),
                Seen::Stop(0),
                Seen::Start(1),
                Seen::Stop(1),
                Seen::Start(2),
                Seen::Stop(2),
            ]
        );
    }

    #[test]
    fn test_interrupted_app_gets_no_events() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);
        show(&mut runtime);

        runtime.interrupt().unwrap();
        send_notification(&queue, "x", "y");
        runtime.tick(at(5));
        runtime.resume().unwrap();

        assert_eq!(runtime.ctx.notifications.count(), 1);
        assert_eq!(
            log.borrow().as_slice(),
            [Seen::Start(0), Seen::Stop(0), Seen::Start(0)]
        );
    }

    #[test]
    fn test_charge_change_reports_battery() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);
        runtime.connect(ConnectionHandle(9));

        let state = ChargeState {
            percent: 64,
            millivolts: 3870,
            charging: true,
        };
        runtime.bus.charge.publish(state, &mut runtime.ctx);
        let report = runtime.tick(at(1));

        assert_eq!(report.messages_sent, 1);
        assert!(runtime.ctx.ui.status_changed);
        let frames = &runtime.uplink().transport().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], TAG_BATTERY_STATUS);
    }

    #[test]
    fn test_battery_reporting_can_be_disabled() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let config = Config {
            report_battery: false,
            ..Config::default()
        };
        let mut runtime = runtime_with(&queue, config, 1, &log);
        runtime.connect(ConnectionHandle(9));

        let state = ChargeState {
            percent: 10,
            millivolts: 3500,
            charging: false,
        };
        runtime.bus.charge.publish(state, &mut runtime.ctx);

        assert!(runtime.ctx.outbox.is_empty());
        assert_eq!(runtime.tick(at(1)).messages_sent, 0);
    }

    #[test]
    fn test_periodic_channels_follow_config() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);
        show(&mut runtime);

        assert_eq!(runtime.tick(at(50)).ticks, 0);
        assert_eq!(runtime.tick(at(100)).ticks, 1);
        assert!(!runtime.ctx.ui.clock_changed);

        // 100 ms and 1 s both due
        assert_eq!(runtime.tick(at(1_000)).ticks, 2);
        assert!(runtime.ctx.ui.clock_changed);
        assert_eq!(runtime.bus.periodic_1s.published(), 1);

        let second_ticks = log
            .borrow()
            .iter()
            .filter(|seen| matches!(seen, Seen::Event(_, AppEvent::Tick(TickRate::Second, _))))
            .count();
        assert_eq!(second_ticks, 1);

        // Long stall: each channel fires once, no burst
        assert_eq!(runtime.tick(at(25_000)).ticks, 3);
        assert_eq!(runtime.bus.periodic_100ms.published(), 3);
    }

    #[test]
    fn test_apply_config_switches_policy() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 1, &log);

        runtime.apply_config(Config {
            field_policy: FieldPolicy::Reject,
            ..Config::default()
        });

        let long = "z".repeat(60);
        send_notification(&queue, "x", &long);
        let report = runtime.tick(at(1));

        assert_eq!(report.frames_dropped, 1);
        assert_eq!(runtime.ingest().policy(), FieldPolicy::Reject);
    }

    #[test]
    fn test_zero_period_is_refused() {
        let queue = InboundQueue::new();
        let mut config = Config::default();
        config.periodic.fast_ms = 0;

        let result = Runtime::<TestApp, Phone, 3>::new(config, &queue, Phone::default(), at(0));

        assert!(matches!(result, Err(BusError::ZeroPeriod { .. })));
    }

    #[test]
    fn test_next_start_waits_for_tick() {
        let queue = InboundQueue::new();
        let log = Log::default();
        let mut runtime = runtime_with(&queue, Config::default(), 2, &log);
        show(&mut runtime);

        runtime.handle_input(InputEvent::Press(Button::Back)).unwrap();
        assert_eq!(runtime.ctx.deferred.len(), 1);
        assert_eq!(log.borrow().last(), Some(&Seen::Stop(0)));

        runtime.tick(at(1));
        assert_eq!(log.borrow().last(), Some(&Seen::Start(1)));
    }
}
