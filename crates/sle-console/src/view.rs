//! Rendering seam.
//!
//! Controllers never draw anything themselves; they hand their current
//! status to a [`ConsoleView`] after every change. All methods default to
//! doing nothing so a front end implements only what it shows.

use sle_proto::{LogEntry, Profile, ProviderType};

use crate::link::LinkStatus;
use crate::provider::ProviderStatus;

/// Receives status updates from the controllers.
pub trait ConsoleView: Send + Sync {
    /// A provider's status changed.
    fn provider_changed(&self, _status: &ProviderStatus) {}

    /// A link's status changed.
    fn link_changed(&self, _status: &LinkStatus) {}

    /// The profile selection for a provider changed.
    fn selection_changed(&self, _provider: ProviderType, _profile: Option<&str>, _locked: bool) {}

    /// The profile list was reloaded.
    fn profiles_changed(&self, _profiles: &[Profile]) {}

    /// A log entry arrived.
    fn log_appended(&self, _entry: &LogEntry) {}

    /// The websocket opened or closed.
    fn connection_changed(&self, _connected: bool) {}
}

/// A view that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ConsoleView for NullView {}
