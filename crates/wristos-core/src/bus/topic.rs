use core::fmt;

/// Named topics known to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ActivityState,
    CommunicationData,
    ChargeState,
    AmbientLight,
    MagnetometerSample,
    PressureSample,
    Periodic10s,
    Periodic1s,
    Periodic100ms,
}

impl Topic {
    /// Every topic, in declaration order
    pub const ALL: [Topic; 9] = [
        Topic::ActivityState,
        Topic::CommunicationData,
        Topic::ChargeState,
        Topic::AmbientLight,
        Topic::MagnetometerSample,
        Topic::PressureSample,
        Topic::Periodic10s,
        Topic::Periodic1s,
        Topic::Periodic100ms,
    ];

    /// Stable name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::ActivityState => "activity_state",
            Self::CommunicationData => "communication_data",
            Self::ChargeState => "charge_state",
            Self::AmbientLight => "ambient_light",
            Self::MagnetometerSample => "magnetometer_sample",
            Self::PressureSample => "pressure_sample",
            Self::Periodic10s => "periodic_10s",
            Self::Periodic1s => "periodic_1s",
            Self::Periodic100ms => "periodic_100ms",
        }
    }

    /// Whether the topic is driven by a timer instead of a producer
    pub const fn is_periodic(self) -> bool {
        matches!(
            self,
            Self::Periodic10s | Self::Periodic1s | Self::Periodic100ms
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
