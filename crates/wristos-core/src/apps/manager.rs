//! Foreground application scheduler.

use heapless::Vec;
use log::{debug, info, warn};

use super::application::{
    AppDescriptor, Application, InputEvent, InputGroupHandle, InputResponse, SurfaceHandle,
};
use super::AppError;
use crate::events::AppEvent;
use crate::scheduler::{DeferredQueue, DeferredTask};

extern crate alloc;
use alloc::boxed::Box;

/// Invoked once when the last application in the rotation has closed
pub type CloseCallback = Box<dyn FnMut()>;

/// Foreground state of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No application owns the screen
    Idle,
    /// The application at this slot owns the screen
    Running(usize),
    /// The application at this slot was stopped, the next start is deferred
    PendingTransition(usize),
}

/// Result of a close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The application at this slot will be started on the next tick
    NextScheduled(usize),
    /// Every application has been shown; the close callback has run
    AllClosed,
}

/// Owns the application registry and decides which single application is
/// in the foreground.
///
/// Applications are shown in registration order. `show` starts slot 0;
/// each close request stops the current slot and schedules the next one on
/// the deferred queue, so its `start` never runs inside the input dispatch
/// that asked for the close. After the last slot closes the manager goes
/// idle and calls the close callback.
pub struct AppManager<A, const N: usize> {
    registry: Vec<AppDescriptor<A>, N>,
    state: ManagerState,
    current: usize,
    suspended: bool,
    handles: Option<(SurfaceHandle, InputGroupHandle)>,
    on_close: Option<CloseCallback>,
}

impl<A: Application, const N: usize> Default for AppManager<A, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Application, const N: usize> AppManager<A, N> {
    pub fn new() -> Self {
        Self {
            registry: Vec::new(),
            state: ManagerState::Idle,
            current: 0,
            suspended: false,
            handles: None,
            on_close: None,
        }
    }

    /// Append an application to the rotation. Init-time only.
    pub fn register(&mut self, mut descriptor: AppDescriptor<A>) -> Result<usize, AppError> {
        if self.state != ManagerState::Idle {
            return Err(AppError::AlreadyActive);
        }

        let slot = self.registry.len();
        descriptor.assign_slot(slot);
        let name = descriptor.name();
        self.registry
            .push(descriptor)
            .map_err(|_| AppError::RegistryFull { capacity: N })?;

        debug!("Registered application '{}' at slot {}", name, slot);
        Ok(slot)
    }

    /// Start the rotation at slot 0.
    pub fn show(
        &mut self,
        on_close: CloseCallback,
        surface: SurfaceHandle,
        input: InputGroupHandle,
    ) -> Result<(), AppError> {
        if self.state != ManagerState::Idle {
            return Err(AppError::AlreadyActive);
        }
        if self.registry.is_empty() {
            return Err(AppError::NoApplications);
        }

        self.on_close = Some(on_close);
        self.handles = Some((surface, input));
        self.current = 0;
        self.suspended = false;
        self.state = ManagerState::Running(0);

        info!("Showing applications, starting '{}'", self.registry[0].name());
        self.registry[0].app_mut().start(surface, input);
        Ok(())
    }

    /// Stop the foreground application and move the rotation forward.
    ///
    /// The next application's `start` is queued on `deferred` instead of
    /// being called here. When the closed application was the last one the
    /// manager goes idle and the close callback runs.
    pub fn request_close(
        &mut self,
        deferred: &mut DeferredQueue,
    ) -> Result<CloseOutcome, AppError> {
        let ManagerState::Running(slot) = self.state else {
            return Err(AppError::NotRunning);
        };

        let next = slot + 1;
        if next < self.registry.len() && deferred.is_full() {
            return Err(AppError::SchedulerFull);
        }

        self.state = ManagerState::PendingTransition(slot);
        if !self.suspended {
            self.registry[slot].app_mut().stop();
        }
        self.suspended = false;
        self.current = next;
        debug!("Closed '{}' at slot {}", self.registry[slot].name(), slot);

        if self.current == self.registry.len() {
            self.state = ManagerState::Idle;
            self.current = 0;
            self.handles = None;
            info!("All applications closed");
            if let Some(mut on_close) = self.on_close.take() {
                on_close();
            }
            return Ok(CloseOutcome::AllClosed);
        }

        deferred
            .push(DeferredTask::StartApp(next))
            .map_err(|_| AppError::SchedulerFull)?;
        Ok(CloseOutcome::NextScheduled(next))
    }

    /// Run a deferred start queued by [`request_close`](Self::request_close).
    ///
    /// Returns `false` and does nothing for a task that no longer matches
    /// the pending transition.
    pub fn run_deferred_start(&mut self, slot: usize) -> bool {
        match self.state {
            ManagerState::PendingTransition(previous)
                if previous + 1 == slot && slot == self.current =>
            {
                let Some((surface, input)) = self.handles else {
                    warn!("Deferred start of slot {} without display handles", slot);
                    return false;
                };

                self.state = ManagerState::Running(slot);
                info!("Starting '{}' at slot {}", self.registry[slot].name(), slot);
                self.registry[slot].app_mut().start(surface, input);
                true
            }
            state => {
                warn!("Ignoring stale start of slot {} in state {:?}", slot, state);
                false
            }
        }
    }

    /// Stop the foreground application without moving the rotation.
    ///
    /// Used when something outside the rotation takes over the screen, an
    /// incoming call for instance. The slot stays current and can be
    /// brought back with [`resume`](Self::resume).
    pub fn force_stop(&mut self) -> Result<(), AppError> {
        let ManagerState::Running(slot) = self.state else {
            return Err(AppError::NotRunning);
        };

        if !self.suspended {
            info!("Force stopping '{}'", self.registry[slot].name());
            self.registry[slot].app_mut().stop();
            self.suspended = true;
        }
        Ok(())
    }

    /// Restart a force-stopped application in its slot.
    pub fn resume(&mut self) -> Result<(), AppError> {
        let ManagerState::Running(slot) = self.state else {
            return Err(AppError::NotRunning);
        };

        if self.suspended {
            if let Some((surface, input)) = self.handles {
                info!("Resuming '{}'", self.registry[slot].name());
                self.registry[slot].app_mut().start(surface, input);
                self.suspended = false;
            }
        }
        Ok(())
    }

    /// Give an input event to the foreground application.
    ///
    /// A [`InputResponse::Close`] answer is turned into a close request once
    /// the application's handler has returned.
    pub fn dispatch_input(
        &mut self,
        event: InputEvent,
        deferred: &mut DeferredQueue,
    ) -> Result<InputResponse, AppError> {
        let Some(slot) = self.active_slot() else {
            debug!("No foreground application for {:?}", event);
            return Ok(InputResponse::Ignored);
        };

        let response = self.registry[slot].app_mut().handle_input(event);
        if response == InputResponse::Close {
            self.request_close(deferred)?;
        }
        Ok(response)
    }

    /// Forward a bus event to the foreground application.
    ///
    /// Returns true if the application needs a redraw.
    pub fn dispatch_event(&mut self, event: &AppEvent) -> bool {
        match self.active_slot() {
            Some(slot) => self.registry[slot].app_mut().on_event(event),
            None => false,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Rotation index; equals `len()` only transiently while closing the last slot
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_active(&self) -> bool {
        self.state != ManagerState::Idle
    }

    /// Whether the foreground application was force stopped
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn descriptor(&self, slot: usize) -> Option<&AppDescriptor<A>> {
        self.registry.get(slot)
    }

    /// Descriptor of the application currently on screen
    pub fn foreground(&self) -> Option<&AppDescriptor<A>> {
        self.active_slot().and_then(|slot| self.registry.get(slot))
    }

    /// Applications shown in launcher lists
    pub fn visible(&self) -> impl Iterator<Item = &AppDescriptor<A>> {
        self.registry.iter().filter(|descriptor| !descriptor.is_hidden())
    }

    fn active_slot(&self) -> Option<usize> {
        match self.state {
            ManagerState::Running(slot) if !self.suspended => Some(slot),
            _ => None,
        }
    }
}
