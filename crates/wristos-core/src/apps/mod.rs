//! Application registry and foreground lifecycle.

mod application;
mod manager;

pub use application::*;
pub use manager::*;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("application registry is full ({capacity} slots)")]
    RegistryFull { capacity: usize },
    #[error("applications are already being shown")]
    AlreadyActive,
    #[error("no applications registered")]
    NoApplications,
    #[error("no application is running")]
    NotRunning,
    #[error("deferred queue is full")]
    SchedulerFull,
}
