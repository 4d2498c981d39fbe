//! Sensor driver seam and sampling into bus channels

use log::error;
use thiserror_no_std::Error;

use crate::bus::Channel;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} read failed during {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out during {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// Trait for sensor drivers that produce typed readings.
///
/// Register-level protocols live in the driver; the core only ever calls
/// [`fetch`](Sensor::fetch).
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Reading: Clone;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read the sensor once.
    fn fetch(&mut self) -> impl Future<Output = Result<Self::Reading, SensorError>>;
}

/// Fetch one reading and publish it on `channel`.
///
/// On failure the error is logged, returned, and nothing is published.
pub async fn sample<S, C>(
    sensor: &mut S,
    channel: &mut Channel<S::Reading, C>,
    ctx: &mut C,
) -> Result<(), SensorError>
where
    S: Sensor,
{
    let reading = sensor.fetch().await.map_err(|e| {
        error!("Failed to read {}: {}", sensor.name(), e);
        e
    })?;

    channel.publish(reading, ctx);
    Ok(())
}
