//! Default subscriber wiring of the bus.
//!
//! | Topic                | Subscribers, in order                                  |
//! |----------------------|--------------------------------------------------------|
//! | `activity_state`     | flag status, forward to app                            |
//! | `communication_data` | store notification, forward stored record to app       |
//! | `charge_state`       | flag status, queue battery report, forward to app      |
//! | `ambient_light`      | forward to app                                         |
//! | `magnetometer_sample`| forward to app                                         |
//! | `pressure_sample`    | forward to app                                         |
//! | `periodic_10s`       | forward to app                                         |
//! | `periodic_1s`        | flag clock, forward to app                             |
//! | `periodic_100ms`     | forward to app                                         |

use embassy_time::Instant;
use log::{debug, warn};

use super::Context;
use crate::apps::Application;
use crate::bus::{Bus, BusError, Channel, Topic};
use crate::config::Config;
use crate::events::{
    ActivityState, AmbientLight, AppEvent, ChargeState, CommunicationEvent, MagnetometerSample,
    PressureSample, Tick, TickRate,
};
use crate::transport::{BatteryStatus, OutboundMessage};

/// Build the bus with the standard subscriber lists.
pub fn standard_bus<A, const N: usize, const K: usize>(
    config: &Config,
    start: Instant,
) -> Result<Bus<Context<A, N, K>>, BusError>
where
    A: Application,
{
    let periods = config.periodic;

    Ok(Bus {
        activity: Channel::define(
            Topic::ActivityState,
            &[flag_status::<ActivityState, A, N, K>, forward_activity::<A, N, K>],
        )?,
        communication: Channel::define(
            Topic::CommunicationData,
            &[store_notification::<A, N, K>, announce_notification::<A, N, K>],
        )?,
        charge: Channel::define(
            Topic::ChargeState,
            &[
                flag_status::<ChargeState, A, N, K>,
                queue_battery_report::<A, N, K>,
                forward_charge::<A, N, K>,
            ],
        )?,
        ambient_light: Channel::define(
            Topic::AmbientLight,
            &[forward_ambient_light::<A, N, K>],
        )?,
        magnetometer: Channel::define(
            Topic::MagnetometerSample,
            &[forward_magnetometer::<A, N, K>],
        )?,
        pressure: Channel::define(Topic::PressureSample, &[forward_pressure::<A, N, K>])?,
        periodic_10s: Channel::periodic(
            Topic::Periodic10s,
            periods.slow(),
            start,
            &[forward_slow_tick::<A, N, K>],
        )?,
        periodic_1s: Channel::periodic(
            Topic::Periodic1s,
            periods.second(),
            start,
            &[mark_clock::<A, N, K>, forward_second_tick::<A, N, K>],
        )?,
        periodic_100ms: Channel::periodic(
            Topic::Periodic100ms,
            periods.fast(),
            start,
            &[forward_fast_tick::<A, N, K>],
        )?,
    })
}

/// Hand an event to the foreground application, flagging a redraw if asked.
fn forward<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    event: AppEvent,
) {
    if ctx.apps.dispatch_event(&event) {
        ctx.ui.app_needs_redraw = true;
    }
}

fn store_notification<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    event: CommunicationEvent,
) {
    let CommunicationEvent::Notification(fields) = event;
    let id = ctx.notifications.add(fields).id;
    debug!(
        "Stored notification {} ({} of {})",
        id,
        ctx.notifications.count(),
        ctx.notifications.capacity()
    );
    ctx.ui.notifications_changed = true;
}

/// Runs after [`store_notification`], so the newest record is the one just added
fn announce_notification<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    _event: CommunicationEvent,
) {
    if let Ok(record) = ctx.notifications.newest() {
        let event = AppEvent::Notification(record.clone());
        forward(ctx, event);
    }
}

fn flag_status<M, A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    _message: M,
) {
    ctx.ui.status_changed = true;
}

fn queue_battery_report<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    state: ChargeState,
) {
    if !ctx.config.report_battery {
        return;
    }

    let message = OutboundMessage::BatteryStatus(BatteryStatus {
        percent: state.percent,
        millivolts: state.millivolts,
        charging: state.charging,
    });
    if ctx.outbox.push_back(message).is_err() {
        warn!("Outbox full, battery report at {}% not queued", state.percent);
    }
}

fn forward_activity<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    state: ActivityState,
) {
    forward(ctx, AppEvent::Activity(state));
}

fn forward_charge<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    state: ChargeState,
) {
    forward(ctx, AppEvent::Charge(state));
}

fn forward_ambient_light<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    light: AmbientLight,
) {
    forward(ctx, AppEvent::AmbientLight(light));
}

fn forward_magnetometer<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    sample: MagnetometerSample,
) {
    forward(ctx, AppEvent::Magnetometer(sample));
}

fn forward_pressure<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    sample: PressureSample,
) {
    forward(ctx, AppEvent::Pressure(sample));
}

fn mark_clock<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    _tick: Tick,
) {
    ctx.ui.clock_changed = true;
}

fn forward_fast_tick<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    tick: Tick,
) {
    forward(ctx, AppEvent::Tick(TickRate::Fast, tick));
}

fn forward_second_tick<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    tick: Tick,
) {
    forward(ctx, AppEvent::Tick(TickRate::Second, tick));
}

fn forward_slow_tick<A: Application, const N: usize, const K: usize>(
    ctx: &mut Context<A, N, K>,
    tick: Tick,
) {
    forward(ctx, AppEvent::Tick(TickRate::Slow, tick));
}
