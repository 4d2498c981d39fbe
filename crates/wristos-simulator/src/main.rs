//! Desktop simulator for the wristos runtime core.
//!
//! Runs the same event loop the watch runs, headless, against in-memory
//! collaborators:
//!
//! | Collaborator | Simulated by                                         |
//! |--------------|------------------------------------------------------|
//! | Phone        | a thread pushing encoded frames into the inbound queue |
//! | Radio uplink | [`ConsoleTransport`], which logs outbound frames     |
//! | Sensors      | [`MockBarometer`] / [`MockMagnetometer`]             |
//! | Flash        | [`MemorySettings`]                                   |
//! | Buttons      | a fixed script of presses                            |
//!
//! Run with `RUST_LOG=debug` to see every tick.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use wristos_core::apps::{
    AppDescriptor, Application, Button, IconHandle, InputEvent, InputGroupHandle, InputResponse,
    SurfaceHandle,
};
use wristos_core::config::Config;
use wristos_core::events::{AppEvent, ChargeState, MagnetometerSample, PressureSample, TickRate};
use wristos_core::ingest::{WireNotification, encode_notification};
use wristos_core::notifications::Source;
use wristos_core::runtime::Runtime;
use wristos_core::sensors::{Sensor, SensorError, sample};
use wristos_core::settings::MemorySettings;
use wristos_core::transport::{ConnectionHandle, InboundQueue, Transport, TransportError};

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Event loop period (~50 Hz)
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Interval between mock sensor samples
const MOCK_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Interval between battery readings
const CHARGE_INTERVAL: Duration = Duration::from_secs(2);

/// Give up if the script has not closed every app by then
const MAX_RUN_TIME: Duration = Duration::from_secs(30);

const APP_SLOTS: usize = 3;

/// Frames from the phone thread to the event loop
static INBOUND: InboundQueue = InboundQueue::new();

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

struct WatchFace {
    uptime_s: u64,
    battery: Option<u8>,
}

impl Application for WatchFace {
    fn start(&mut self, surface: SurfaceHandle, _input: InputGroupHandle) {
        info!("[face] start on surface {}", surface.0);
    }

    fn stop(&mut self) {
        info!("[face] stop after {} s", self.uptime_s);
    }

    fn handle_input(&mut self, event: InputEvent) -> InputResponse {
        match event {
            InputEvent::Press(Button::Back) => InputResponse::Close,
            _ => InputResponse::Ignored,
        }
    }

    fn on_event(&mut self, event: &AppEvent) -> bool {
        match event {
            AppEvent::Tick(TickRate::Second, tick) => {
                self.uptime_s = tick.uptime_ms / 1000;
                debug!(
                    "[face] {:02}:{:02} battery {:?}%",
                    self.uptime_s / 60,
                    self.uptime_s % 60,
                    self.battery
                );
                true
            }
            AppEvent::Charge(state) => {
                self.battery = Some(state.percent);
                true
            }
            _ => false,
        }
    }
}

struct Inbox {
    unread: usize,
    cursor: usize,
}

impl Application for Inbox {
    fn start(&mut self, _surface: SurfaceHandle, _input: InputGroupHandle) {
        info!("[inbox] start, {} unread", self.unread);
        self.cursor = 0;
    }

    fn stop(&mut self) {
        info!("[inbox] stop");
    }

    fn handle_input(&mut self, event: InputEvent) -> InputResponse {
        match event {
            InputEvent::Press(Button::Back) => InputResponse::Close,
            InputEvent::Press(Button::Down) => {
                self.cursor = self.cursor.saturating_add(1);
                InputResponse::Handled
            }
            InputEvent::Press(Button::Up) => {
                self.cursor = self.cursor.saturating_sub(1);
                InputResponse::Handled
            }
            InputEvent::Press(Button::Select) => {
                self.unread = 0;
                InputResponse::Handled
            }
            _ => InputResponse::Ignored,
        }
    }

    fn on_event(&mut self, event: &AppEvent) -> bool {
        if let AppEvent::Notification(record) = event {
            self.unread += 1;
            info!(
                "[inbox] #{} {} from {}: {}",
                record.id,
                record.source.label(),
                record.sender,
                record.title
            );
            return true;
        }
        false
    }
}

struct Compass {
    heading_deg: f32,
    pressure_hpa: f32,
}

impl Application for Compass {
    fn start(&mut self, _surface: SurfaceHandle, _input: InputGroupHandle) {
        info!("[compass] start");
    }

    fn stop(&mut self) {
        info!(
            "[compass] stop at {:.0}° / {:.1} hPa",
            self.heading_deg, self.pressure_hpa
        );
    }

    fn handle_input(&mut self, event: InputEvent) -> InputResponse {
        match event {
            InputEvent::Press(Button::Back) => InputResponse::Close,
            _ => InputResponse::Ignored,
        }
    }

    fn on_event(&mut self, event: &AppEvent) -> bool {
        match event {
            AppEvent::Magnetometer(sample) => {
                let heading = sample.y_ut.atan2(sample.x_ut).to_degrees().rem_euclid(360.0);
                let changed = (heading - self.heading_deg).abs() >= 1.0;
                self.heading_deg = heading;
                changed
            }
            AppEvent::Pressure(sample) => {
                self.pressure_hpa = sample.pascal / 100.0;
                false
            }
            _ => false,
        }
    }
}

/// Closed set of applications in this image
enum SimApp {
    Face(Box<WatchFace>),
    Inbox(Box<Inbox>),
    Compass(Box<Compass>),
}

impl Application for SimApp {
    fn start(&mut self, surface: SurfaceHandle, input: InputGroupHandle) {
        match self {
            SimApp::Face(app) => app.start(surface, input),
            SimApp::Inbox(app) => app.start(surface, input),
            SimApp::Compass(app) => app.start(surface, input),
        }
    }

    fn stop(&mut self) {
        match self {
            SimApp::Face(app) => app.stop(),
            SimApp::Inbox(app) => app.stop(),
            SimApp::Compass(app) => app.stop(),
        }
    }

    fn handle_input(&mut self, event: InputEvent) -> InputResponse {
        match self {
            SimApp::Face(app) => app.handle_input(event),
            SimApp::Inbox(app) => app.handle_input(event),
            SimApp::Compass(app) => app.handle_input(event),
        }
    }

    fn on_event(&mut self, event: &AppEvent) -> bool {
        match self {
            SimApp::Face(app) => app.on_event(event),
            SimApp::Inbox(app) => app.on_event(event),
            SimApp::Compass(app) => app.on_event(event),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Uplink that prints frames instead of sending them over the air
struct ConsoleTransport;

impl Transport for ConsoleTransport {
    fn send(&mut self, conn: ConnectionHandle, bytes: &[u8]) -> Result<(), TransportError> {
        info!("[radio] -> handle {}: {:02x?}", conn.0, bytes);
        Ok(())
    }
}

/// Barometer whose pressure drifts slowly around sea level
struct MockBarometer {
    t: f32,
}

impl Sensor for MockBarometer {
    type Reading = PressureSample;

    fn name(&self) -> &'static str {
        "mock-baro"
    }

    async fn fetch(&mut self) -> Result<PressureSample, SensorError> {
        self.t += MOCK_SAMPLE_INTERVAL.as_secs_f32();
        Ok(PressureSample {
            pascal: 101_325.0 + 150.0 * (self.t / 40.0).sin(),
            celsius: 22.0 + 0.5 * (self.t / 17.0).cos(),
        })
    }
}

/// Magnetometer on a slowly turning wrist. Every 7th read fails.
struct MockMagnetometer {
    reads: u32,
}

impl Sensor for MockMagnetometer {
    type Reading = MagnetometerSample;

    fn name(&self) -> &'static str {
        "mock-mag"
    }

    async fn fetch(&mut self) -> Result<MagnetometerSample, SensorError> {
        self.reads += 1;
        if self.reads % 7 == 0 {
            return Err(SensorError::Timeout {
                sensor: "mock-mag",
                operation: "read field",
            });
        }

        let angle = self.reads as f32 * 0.2;
        Ok(MagnetometerSample {
            x_ut: 30.0 * angle.cos(),
            y_ut: 30.0 * angle.sin(),
            z_ut: -40.0,
        })
    }
}

/// Script of notifications the phone sends, with pauses in between
fn run_phone() {
    const CONN: ConnectionHandle = ConnectionHandle(1);
    let script: [(Source, &str, &str, &str); 7] = [
        (Source::Messenger, "Alice", "Running late", "Be there in 10"),
        (Source::Mail, "Billing", "Your invoice", "Invoice #4411 is ready"),
        (Source::Messenger, "Bob", "Lunch?", "Noodles at noon"),
        (
            Source::None,
            "Calendar",
            "Standup in 5 minutes with the platform team and guests",
            "Room 3",
        ),
        (Source::Messenger, "Alice", "Here", "At the door"),
        (Source::Mail, "CI", "Build passed", "main is green"),
        (Source::Messenger, "Carol", "Call me", "When you can"),
    ];

    for (i, (source, sender, title, body)) in script.into_iter().enumerate() {
        thread::sleep(Duration::from_millis(700));

        let wire = WireNotification {
            source: source.to_wire(),
            sender,
            title,
            body,
        };
        let mut buf = [0u8; 256];
        let frame = match encode_notification(&wire, &mut buf) {
            Ok(frame) => frame,
            Err(e) => {
                error!("[phone] encode failed: {}", e);
                continue;
            }
        };

        if let Err(e) = INBOUND.on_receive(CONN, frame) {
            warn!("[phone] frame {} not delivered: {}", i, e);
        }

        // A garbled frame halfway through
        if i == 3 {
            if let Err(e) = INBOUND.on_receive(CONN, &[0x01, 0xff]) {
                warn!("[phone] garbled frame not delivered: {}", e);
            }
        }
    }
    info!("[phone] script done");
}

/// Buttons pressed at fixed times after boot
fn scripted_input(elapsed: Duration, next: &mut usize) -> Option<InputEvent> {
    const SCRIPT: [(u64, InputEvent); 6] = [
        (2_500, InputEvent::Press(Button::Back)),
        (4_000, InputEvent::Press(Button::Down)),
        (5_000, InputEvent::Press(Button::Select)),
        (6_500, InputEvent::Press(Button::Back)),
        (8_000, InputEvent::Touch { x: 120, y: 120 }),
        (9_500, InputEvent::Press(Button::Back)),
    ];

    let (at_ms, event) = SCRIPT.get(*next)?;
    if elapsed.as_millis() as u64 >= *at_ms {
        *next += 1;
        return Some(*event);
    }
    None
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting wristos simulator");

    let mut settings = MemorySettings::new();
    let config = Config::load(&settings);
    if let Err(e) = config.save(&mut settings) {
        warn!("Could not persist configuration: {}", e);
    }
    info!("Configuration: {:?}", config);

    let boot = Instant::now();
    let start = embassy_time::Instant::now();
    let mut runtime: Runtime<'static, SimApp, ConsoleTransport, APP_SLOTS> =
        match Runtime::new(config, &INBOUND, ConsoleTransport, start) {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to build the event bus: {}", e);
                return;
            }
        };

    let apps = [
        AppDescriptor::new(
            "Watch face",
            IconHandle(1),
            SimApp::Face(Box::new(WatchFace {
                uptime_s: 0,
                battery: None,
            })),
        )
        .hidden(),
        AppDescriptor::new(
            "Inbox",
            IconHandle(2),
            SimApp::Inbox(Box::new(Inbox {
                unread: 0,
                cursor: 0,
            })),
        ),
        AppDescriptor::new(
            "Compass",
            IconHandle(3),
            SimApp::Compass(Box::new(Compass {
                heading_deg: 0.0,
                pressure_hpa: 0.0,
            })),
        ),
    ];
    for descriptor in apps {
        if let Err(e) = runtime.register(descriptor) {
            error!("Failed to register application: {}", e);
            return;
        }
    }
    let launcher: Vec<&str> = runtime.ctx.apps.visible().map(|d| d.name()).collect();
    info!("Launcher shows {:?}", launcher);

    let all_closed = Rc::new(Cell::new(false));
    let flag = all_closed.clone();
    if let Err(e) = runtime.show_apps(
        Box::new(move || flag.set(true)),
        SurfaceHandle(0),
        InputGroupHandle(0),
    ) {
        error!("Failed to show applications: {}", e);
        return;
    }

    let phone = thread::spawn(run_phone);

    let mut barometer = MockBarometer { t: 0.0 };
    let mut magnetometer = MockMagnetometer { reads: 0 };
    let mut battery_mv: u16 = 4_150;
    let mut last_sample = Instant::now();
    let mut last_charge = Instant::now();
    let mut next_input = 0;

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    while !all_closed.get() {
        let frame_start = Instant::now();
        if boot.elapsed() >= MAX_RUN_TIME {
            warn!("Script did not finish in {:?}", MAX_RUN_TIME);
            break;
        }

        // --- Input --------------------------------------------------------
        if let Some(event) = scripted_input(boot.elapsed(), &mut next_input) {
            info!("Input {:?}", event);
            if let Err(e) = runtime.handle_input(event) {
                warn!("Input not delivered: {}", e);
            }
        }

        // --- Mock sensors -------------------------------------------------
        if last_sample.elapsed() >= MOCK_SAMPLE_INTERVAL {
            if let Err(e) = embassy_futures::block_on(sample(
                &mut barometer,
                &mut runtime.bus.pressure,
                &mut runtime.ctx,
            )) {
                debug!("Barometer sample skipped: {}", e);
            }
            if let Err(e) = embassy_futures::block_on(sample(
                &mut magnetometer,
                &mut runtime.bus.magnetometer,
                &mut runtime.ctx,
            )) {
                debug!("Magnetometer sample skipped: {}", e);
            }
            last_sample = Instant::now();
        }

        if last_charge.elapsed() >= CHARGE_INTERVAL {
            battery_mv = battery_mv.saturating_sub(15);
            let percent = ((battery_mv.saturating_sub(3_300)) / 9).min(100) as u8;
            let state = ChargeState {
                percent,
                millivolts: battery_mv,
                charging: false,
            };
            runtime.bus.charge.publish(state, &mut runtime.ctx);
            last_charge = Instant::now();
        }

        // --- Event loop tick ----------------------------------------------
        runtime.tick(embassy_time::Instant::now());

        // --- "Render" -----------------------------------------------------
        let ui = runtime.ctx.ui.take();
        if ui.notifications_changed {
            let titles: Vec<String> = runtime
                .ctx
                .notifications
                .iter()
                .map(|n| format!("#{} {}", n.id, n.title))
                .collect();
            info!("Notification list: {:?}", titles);
        }
        if ui.app_needs_redraw {
            if let Some(app) = runtime.ctx.apps.foreground() {
                debug!("Redraw '{}'", app.name());
            }
        }

        // --- Frame pacing -------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    if phone.join().is_err() {
        error!("Phone thread panicked");
    }

    info!(
        "Simulator exiting: {} frames decoded, {} dropped, {} messages sent",
        runtime.ingest().decoded(),
        runtime.ingest().dropped(),
        runtime.uplink().sent()
    );
    for (topic, count) in runtime.bus.publication_counts() {
        info!("  {:<20} {}", topic.name(), count);
    }
}
