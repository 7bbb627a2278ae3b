//! Profile list, per-provider profile selection, and profile editing.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use sle_proto::validation::validate_profile_form;
use sle_proto::{FormMode, Profile, ProfileForm, ProtoError, ProviderType, ValidationError};
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus, Topic};
use crate::data::{DataService, Outcome};
use crate::error::{ConsoleError, ConsoleResult};
use crate::notice::{report_failure, Notice, NoticeSink, Recovery};
use crate::view::ConsoleView;

// ==================== Store ====================

/// The server's profile list, indexed by name.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: RwLock<BTreeMap<String, Profile>>,
}

impl ProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list.
    pub fn replace_all(&self, profiles: Vec<Profile>) {
        let map = profiles.into_iter().map(|p| (p.name.clone(), p)).collect();
        *self.profiles.write() = map;
    }

    /// Refetch the list from the server. On failure the current list is
    /// kept and `false` is returned.
    pub async fn reload(&self, data: &DataService) -> bool {
        match data.get_sle_providers().await {
            Some(profiles) => {
                debug!(count = profiles.len(), "profile list reloaded");
                self.replace_all(profiles);
                true
            }
            None => {
                warn!("profile list reload failed, keeping the previous list");
                false
            }
        }
    }

    /// Look up a profile by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Profile> {
        self.profiles.read().get(name).cloned()
    }

    /// Every profile, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<Profile> {
        self.profiles.read().values().cloned().collect()
    }

    /// Profiles usable by one provider slot, sorted by name.
    #[must_use]
    pub fn for_provider(&self, provider: ProviderType) -> Vec<Profile> {
        self.profiles
            .read()
            .values()
            .filter(|p| p.provider_type() == provider)
            .cloned()
            .collect()
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

// ==================== Selection ====================

#[derive(Debug, Default)]
struct Selection {
    selected: Option<String>,
    locked: bool,
}

/// Profile selection for one provider slot.
///
/// The selection is locked while the provider is bound.
pub struct ProviderConfig {
    provider: ProviderType,
    bus: Arc<EventBus>,
    store: Arc<ProfileStore>,
    view: Arc<dyn ConsoleView>,
    selection: Mutex<Selection>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("selection", &*self.selection.lock())
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// Create an unlocked config with nothing selected.
    #[must_use]
    pub fn new(
        provider: ProviderType,
        bus: Arc<EventBus>,
        store: Arc<ProfileStore>,
        view: Arc<dyn ConsoleView>,
    ) -> Self {
        Self {
            provider,
            bus,
            store,
            view,
            selection: Mutex::default(),
        }
    }

    /// Subscribe to bind state and profile change topics.
    pub fn attach(self: &Arc<Self>) {
        let provider = self.provider;
        self.on(Topic::ProviderBound(provider), |this, event| {
            if let Event::ProviderBound { profile, .. } = event {
                this.handle_bound(profile.as_deref());
            }
        });
        self.on(Topic::ProviderUnbound(provider), |this, _| this.handle_unbound());
        self.on(Topic::ProfileUpdated, |this, event| {
            if let Event::ProfileUpdated(change) = event {
                this.handle_profile_updated(&change.profile_name);
            }
        });
        self.on(Topic::ProfileDeleted, |this, event| {
            if let Event::ProfileDeleted(change) = event {
                this.handle_profile_deleted(&change.profile_name);
            }
        });
    }

    fn on(self: &Arc<Self>, topic: Topic, handler: fn(&Self, &Event)) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(topic, move |event| {
            if let Some(this) = weak.upgrade() {
                handler(&this, event);
            }
        });
    }

    /// Provider slot.
    #[must_use]
    pub const fn provider(&self) -> ProviderType {
        self.provider
    }

    /// Currently selected profile.
    #[must_use]
    pub fn selected(&self) -> Option<String> {
        self.selection.lock().selected.clone()
    }

    /// Whether the selection is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.selection.lock().locked
    }

    /// Select a profile for the next bind.
    ///
    /// # Errors
    ///
    /// Fails while the provider is bound, or if no profile of this
    /// provider's type has that name.
    pub fn select(&self, name: &str) -> ConsoleResult<()> {
        if self.is_locked() {
            return Err(ConsoleError::SelectionLocked(self.provider));
        }
        let matches = self
            .store
            .get(name)
            .is_some_and(|p| p.provider_type() == self.provider);
        if !matches {
            return Err(ConsoleError::UnknownProfile {
                provider: self.provider,
                name: name.to_string(),
            });
        }

        self.set_selection(Some(name.to_string()), None);
        Ok(())
    }

    /// Store the selection, optionally change the lock, render, and
    /// announce the selection.
    fn set_selection(&self, selected: Option<String>, locked: Option<bool>) {
        let locked = {
            let mut selection = self.selection.lock();
            selection.selected.clone_from(&selected);
            if let Some(locked) = locked {
                selection.locked = locked;
            }
            selection.locked
        };
        self.view
            .selection_changed(self.provider, selected.as_deref(), locked);
        self.bus.publish(&Event::ProfileSelected {
            provider: self.provider,
            profile: selected,
        });
    }

    /// Drop an unlocked selection whose profile no longer exists, after the
    /// store was reloaded outside of a profile event.
    pub fn revalidate(&self) {
        let stale = {
            let selection = self.selection.lock();
            !selection.locked
                && selection.selected.as_deref().is_some_and(|name| {
                    self.store
                        .get(name)
                        .is_none_or(|p| p.provider_type() != self.provider)
                })
        };
        if stale {
            debug!(provider = %self.provider, "selected profile no longer exists");
            self.set_selection(None, None);
        }
    }

    fn handle_bound(&self, profile: Option<&str>) {
        let current = self.selected();
        match profile {
            Some(name) if current.as_deref() != Some(name) => {
                self.set_selection(Some(name.to_string()), Some(true));
            }
            _ => {
                self.selection.lock().locked = true;
                self.view
                    .selection_changed(self.provider, current.as_deref(), true);
            }
        }
    }

    fn handle_unbound(&self) {
        let selected = {
            let mut selection = self.selection.lock();
            selection.locked = false;
            selection.selected.clone()
        };
        self.view
            .selection_changed(self.provider, selected.as_deref(), false);
    }

    /// The store has already been reloaded when this runs.
    fn handle_profile_updated(&self, name: &str) {
        let selection_affected = {
            let selection = self.selection.lock();
            !selection.locked && selection.selected.as_deref() == Some(name)
        };
        if !selection_affected {
            return;
        }

        let still_usable = self
            .store
            .get(name)
            .is_some_and(|p| p.provider_type() == self.provider);
        if still_usable {
            self.set_selection(Some(name.to_string()), None);
        } else {
            self.set_selection(None, None);
        }
    }

    fn handle_profile_deleted(&self, name: &str) {
        let selection_affected = {
            let selection = self.selection.lock();
            !selection.locked && selection.selected.as_deref() == Some(name)
        };
        if selection_affected {
            info!(provider = %self.provider, profile = name, "selected profile deleted");
            self.set_selection(None, None);
        }
    }
}

// ==================== Editing ====================

/// The fields of `after` that changed from `before`.
///
/// Only keys that are non-null on both sides are compared, matching how an
/// edit form reports untouched optional fields.
#[must_use]
pub fn sparse_update(before: &Map<String, Value>, after: &Map<String, Value>) -> Map<String, Value> {
    before
        .iter()
        .filter(|(_, old)| !old.is_null())
        .filter_map(|(key, old)| match after.get(key) {
            Some(new) if !new.is_null() && new != old => Some((key.clone(), new.clone())),
            _ => None,
        })
        .collect()
}

/// What happened to a profile submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The server accepted it.
    Submitted,
    /// Nothing changed; no request was made.
    Unchanged,
    /// Validation failed; no request was made.
    Invalid(Vec<ValidationError>),
    /// The server answered 403.
    Unauthorized,
}

impl From<Outcome<()>> for EditOutcome {
    fn from(outcome: Outcome<()>) -> Self {
        match outcome {
            Outcome::Done(()) => Self::Submitted,
            Outcome::Unauthorized => Self::Unauthorized,
        }
    }
}

/// Creates, edits and deletes profiles.
#[derive(Clone)]
pub struct ProfileManager {
    data: DataService,
    notices: Arc<dyn NoticeSink>,
}

impl std::fmt::Debug for ProfileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileManager").finish_non_exhaustive()
    }
}

impl ProfileManager {
    /// Create a manager.
    #[must_use]
    pub fn new(data: DataService, notices: Arc<dyn NoticeSink>) -> Self {
        Self { data, notices }
    }

    fn reject(&self, errors: Vec<ValidationError>) -> EditOutcome {
        warn!(errors = errors.len(), "profile failed validation");
        self.notices.show(Notice::Validation(errors.clone()));
        EditOutcome::Invalid(errors)
    }

    fn submitted(&self, result: ConsoleResult<Outcome<()>>) -> ConsoleResult<EditOutcome> {
        match result {
            Ok(outcome) => Ok(outcome.into()),
            Err(e) => {
                report_failure(self.notices.as_ref(), &e, Recovery::None);
                Err(e)
            }
        }
    }

    /// Validate and submit a new profile.
    pub async fn create(&self, form: &ProfileForm) -> ConsoleResult<EditOutcome> {
        if let Err(errors) = validate_profile_form(form, FormMode::Create).into_result() {
            return Ok(self.reject(errors));
        }
        let name = form
            .profile_name
            .as_deref()
            .ok_or(ProtoError::MissingField("profile_name"))?;

        info!(profile = name, "creating profile");
        let result = self.data.create_profile(name, &form.submission_body()).await;
        self.submitted(result)
    }

    /// Submit the fields that changed between `before` and `after`.
    ///
    /// Nothing is sent when no field changed.
    pub async fn edit(
        &self,
        before: &ProfileForm,
        after: &ProfileForm,
    ) -> ConsoleResult<EditOutcome> {
        let name = before
            .profile_name
            .as_deref()
            .ok_or(ProtoError::MissingField("profile_name"))?;

        let mut changes = sparse_update(&before.to_map(), &after.to_map());
        if changes.is_empty() {
            debug!(profile = name, "profile unchanged, nothing to submit");
            return Ok(EditOutcome::Unchanged);
        }

        let after_map = after.to_map();
        for (password, confirmation) in [
            ("user_password", "user_password_confirmation"),
            ("provider_password", "provider_password_confirmation"),
        ] {
            if changes.contains_key(password) {
                if let Some(value) = after_map.get(confirmation) {
                    changes.insert(confirmation.to_string(), value.clone());
                }
            }
        }

        let update = ProfileForm::from_map(changes)?;
        if let Err(errors) = validate_profile_form(&update, FormMode::Update).into_result() {
            return Ok(self.reject(errors));
        }

        info!(profile = name, "updating profile");
        let result = self.data.update_profile(name, &update.submission_body()).await;
        self.submitted(result)
    }

    /// Delete a profile.
    pub async fn delete(&self, name: &str) -> ConsoleResult<EditOutcome> {
        info!(profile = name, "deleting profile");
        let result = self.data.delete_profile(name).await;
        self.submitted(result)
    }
}
