use crate::apps::{AppManager, Application};
use crate::config::Config;
use crate::notifications::{DEFAULT_CAPACITY, NotificationStore};
use crate::scheduler::DeferredQueue;
use crate::transport::Outbox;

/// Parts of the screen that changed since the UI last redrew
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UiState {
    pub notifications_changed: bool,
    /// Battery, charger or wear state
    pub status_changed: bool,
    pub clock_changed: bool,
    /// The foreground application asked for a redraw
    pub app_needs_redraw: bool,
}

impl UiState {
    /// Return the pending flags and clear them
    pub fn take(&mut self) -> UiState {
        core::mem::take(self)
    }

    pub fn any(&self) -> bool {
        self.notifications_changed
            || self.status_changed
            || self.clock_changed
            || self.app_needs_redraw
    }
}

/// State every bus subscriber receives.
///
/// Owned by the [`Runtime`](super::Runtime) and only touched from the event
/// loop, so subscribers get plain `&mut` access.
pub struct Context<A, const N: usize, const K: usize = DEFAULT_CAPACITY> {
    pub notifications: NotificationStore<K>,
    pub apps: AppManager<A, N>,
    pub deferred: DeferredQueue,
    pub ui: UiState,
    pub outbox: Outbox,
    pub config: Config,
}

impl<A: Application, const N: usize, const K: usize> Context<A, N, K> {
    pub fn new(config: Config) -> Self {
        Self {
            notifications: NotificationStore::new(),
            apps: AppManager::new(),
            deferred: DeferredQueue::new(),
            ui: UiState::default(),
            outbox: Outbox::new(),
            config,
        }
    }
}
