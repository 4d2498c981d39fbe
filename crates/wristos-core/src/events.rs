//! Message shapes carried on the event bus

use crate::notifications::{Notification, NotificationFields};

/// Wear/motion state reported by the activity classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    /// Worn and moving
    Active,
    /// Worn but still
    Inactive,
    /// Off the wrist
    NotWorn,
}

/// Events decoded from the phone link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommunicationEvent {
    /// A phone notification, fields already bounded
    Notification(NotificationFields),
}

/// Battery and charger state from the power-management chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeState {
    pub percent: u8,
    pub millivolts: u16,
    pub charging: bool,
}

/// Ambient light level in lux
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub lux: f32,
}

/// Magnetic field sample in micro-tesla
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnetometerSample {
    pub x_ut: f32,
    pub y_ut: f32,
    pub z_ut: f32,
}

/// Barometer sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSample {
    pub pascal: f32,
    pub celsius: f32,
}

/// Payload of the periodic channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub uptime_ms: u64,
}

/// Cadence of a periodic channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRate {
    /// 100 ms tier
    Fast,
    /// 1 s tier
    Second,
    /// 10 s tier
    Slow,
}

/// Events forwarded from bus subscribers to the foreground application
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Tick(TickRate, Tick),
    Activity(ActivityState),
    Charge(ChargeState),
    AmbientLight(AmbientLight),
    Magnetometer(MagnetometerSample),
    Pressure(PressureSample),
    /// A notification was just stored
    Notification(Notification),
}
