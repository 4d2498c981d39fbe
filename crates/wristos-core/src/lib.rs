//! Hardware-independent runtime core for the wristos wearable firmware
//!
//! This crate holds the pieces of the firmware that carry real invariants:
//! the foreground application scheduler, the bounded notification store, the
//! static event bus, and the phone-link ingest that feeds them. Sensor chips,
//! the display stack, the radio and flash are reached only through the small
//! traits defined here.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! watch and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod apps;
pub mod bus;
pub mod config;
pub mod events;
pub mod ingest;
pub mod notifications;
pub mod runtime;
pub mod scheduler;
pub mod sensors;
pub mod settings;
pub mod transport;
