//! Application capability contract and registry descriptor.
//!
//! Every screen-owning application implements [`Application`]. The
//! [`AppManager`](super::manager::AppManager) stores applications of a
//! single type `A`; a firmware image with several applications closes the
//! set with an enum that delegates every method to its variants, the same
//! way a page wrapper does:
//!
//! ```rust,ignore
//! enum WatchApp {
//!     Face(Box<WatchFace>),
//!     Inbox(Box<InboxApp>),
//! }
//!
//! impl Application for WatchApp {
//!     fn start(&mut self, surface: SurfaceHandle, input: InputGroupHandle) {
//!         match self {
//!             WatchApp::Face(app) => app.start(surface, input),
//!             WatchApp::Inbox(app) => app.start(surface, input),
//!         }
//!     }
//!     // ...
//! }
//! ```

use crate::events::AppEvent;

extern crate alloc;
use alloc::boxed::Box;

/// Opaque handle to the drawing surface an application renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub u16);

/// Opaque handle to the input group an application registers handlers in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputGroupHandle(pub u16);

/// Opaque handle to an application's launcher icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IconHandle(pub u16);

/// Physical buttons on the case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Select,
    Back,
}

/// Input delivered to the foreground application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(Button),
    LongPress(Button),
    Touch { x: u16, y: u16 },
}

/// What an application wants after handling an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    /// The event was consumed
    Handled,
    /// The event was not for this application
    Ignored,
    /// The application is done and asks to give up the screen
    Close,
}

/// Trait that every screen-owning application must implement.
///
/// The manager calls these methods in a fixed order:
///
/// 1. **`start`** once, when the application becomes foreground.
/// 2. **`handle_input`** / **`on_event`** zero or more times while it is.
/// 3. **`stop`** once, when it gives up the screen.
///
/// `start` may be called again after a forced stop when the interruption
/// ends.
pub trait Application {
    /// Build the UI on `surface` and register input handlers in `input`.
    fn start(&mut self, surface: SurfaceHandle, input: InputGroupHandle);

    /// Tear the UI down and release every handler registered in `start`.
    fn stop(&mut self);

    /// Handle an input event.
    fn handle_input(&mut self, _event: InputEvent) -> InputResponse {
        InputResponse::Ignored
    }

    /// Handle a bus event forwarded to the foreground application.
    ///
    /// Returns `true` if the application needs a redraw.
    fn on_event(&mut self, _event: &AppEvent) -> bool {
        false
    }
}

/// Allows a `Box<T>` to be used anywhere an `Application` is expected.
impl<T: Application> Application for Box<T> {
    fn start(&mut self, surface: SurfaceHandle, input: InputGroupHandle) {
        (**self).start(surface, input)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn handle_input(&mut self, event: InputEvent) -> InputResponse {
        (**self).handle_input(event)
    }

    fn on_event(&mut self, event: &AppEvent) -> bool {
        (**self).on_event(event)
    }
}

/// Registry entry for one application
pub struct AppDescriptor<A> {
    name: &'static str,
    icon: IconHandle,
    hidden: bool,
    slot: usize,
    app: A,
}

impl<A> AppDescriptor<A> {
    pub fn new(name: &'static str, icon: IconHandle, app: A) -> Self {
        Self {
            name,
            icon,
            hidden: false,
            slot: 0,
            app,
        }
    }

    /// Keep the application out of launcher lists. It is still scheduled.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn icon(&self) -> IconHandle {
        self.icon
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Rotation slot assigned at registration
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub(super) fn assign_slot(&mut self, slot: usize) {
        self.slot = slot;
    }
}
