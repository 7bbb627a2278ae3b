//! Forward and return provider state controllers.
//!
//! The provider state only moves on websocket confirmations (and snapshot
//! seeding). Actions are REST requests whose success means "the server
//! accepted it", not "it happened":
//!
//! | From | Action | To |
//! |---|---|---|
//! | UNBOUND | bind | READY |
//! | READY | start | ACTIVE |
//! | ACTIVE | stop | READY |
//! | READY, ACTIVE | unbind, abort | UNBOUND |

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use sle_proto::messages::{
    DataFlow, DeliveryModeChange, ProviderStateChange, ThrowEventFailure, ThrowEventSuccess,
};
use sle_proto::{
    CommandModState, ForwardConfig, LinkState, ProviderAction, ProviderSnapshot, ProviderState,
    ProviderType, RangeModState,
};
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus, Topic};
use crate::data::{DataService, Outcome, ThrowCommand};
use crate::error::{ConsoleError, ConsoleResult};
use crate::link::LinkStateController;
use crate::notice::{report_failure, Notice, NoticeSink, Recovery, ResyncHandle};
use crate::view::ConsoleView;

/// Placeholder shown for an unknown or empty delivery mode.
pub const UNKNOWN_LABEL: &str = "...";

/// Forward modulation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModulationStatus {
    /// Command modulation.
    pub command: Option<CommandModState>,
    /// Range modulation.
    pub range: Option<RangeModState>,
    /// Bitrate.
    pub bitrate: Option<f64>,
    /// Modulation index.
    pub mod_index: Option<u32>,
}

/// What the operator can do with a provider right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affordances {
    /// Bind the selected profile.
    pub bind: bool,
    /// Release the association.
    pub unbind: bool,
    /// Start the data transfer.
    pub start: bool,
    /// Stop the data transfer.
    pub stop: bool,
    /// Abort the association.
    pub abort: bool,
    /// Turn command modulation on.
    pub command_mod_on: bool,
    /// Turn command modulation off.
    pub command_mod_off: bool,
    /// Turn range modulation on.
    pub range_mod_on: bool,
    /// Turn range modulation off.
    pub range_mod_off: bool,
    /// Change bitrate or modulation index.
    pub modulation_parameters: bool,
}

impl Affordances {
    /// Whether a provider action is enabled.
    #[must_use]
    pub const fn allows(&self, action: ProviderAction) -> bool {
        match action {
            ProviderAction::Bind => self.bind,
            ProviderAction::Unbind => self.unbind,
            ProviderAction::Start => self.start,
            ProviderAction::Stop => self.stop,
            ProviderAction::Abort => self.abort,
        }
    }
}

/// Displayed status of one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    /// Provider slot.
    pub provider: ProviderType,
    /// Confirmed state.
    pub state: ProviderState,
    /// Profile the provider is bound with.
    pub bound_profile: Option<String>,
    /// Profile chosen for the next bind.
    pub selected_profile: Option<String>,
    /// A bind request was issued and not yet refused or confirmed.
    pub bind_in_flight: bool,
    /// Time of the last confirmed change.
    pub state_change_time: Option<String>,
    /// Time of the last transfer.
    pub last_transfer_data_time: Option<String>,
    /// Units transferred since the last bind.
    pub transfer_data_count: u64,
    /// Connection number of the current association.
    pub connection_number: Option<u64>,
    /// Delivery mode; `None` when the server reported none.
    pub delivery_mode: Option<String>,
    /// Forward modulation; always `None` for the return provider.
    pub modulation: Option<ModulationStatus>,
}

impl ProviderStatus {
    /// Status before seeding.
    #[must_use]
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            state: ProviderState::Unbound,
            bound_profile: None,
            selected_profile: None,
            bind_in_flight: false,
            state_change_time: None,
            last_transfer_data_time: None,
            transfer_data_count: 0,
            connection_number: None,
            delivery_mode: None,
            modulation: (provider == ProviderType::Forward).then(ModulationStatus::default),
        }
    }

    /// Delivery mode as displayed.
    #[must_use]
    pub fn delivery_mode_label(&self) -> &str {
        self.delivery_mode.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    /// Available actions.
    #[must_use]
    pub fn affordances(&self) -> Affordances {
        let state = self.state;
        let bound = state.is_bound();
        let mut affordances = Affordances {
            bind: state == ProviderState::Unbound
                && self.selected_profile.is_some()
                && !self.bind_in_flight,
            unbind: state == ProviderState::Ready,
            start: state == ProviderState::Ready,
            stop: state == ProviderState::Active,
            abort: bound,
            ..Affordances::default()
        };

        if let (Some(modulation), true) = (self.modulation, bound) {
            let command_on = modulation.command == Some(CommandModState::On);
            affordances.command_mod_on = !command_on;
            affordances.command_mod_off = command_on;
            affordances.range_mod_on = matches!(modulation.range, None | Some(RangeModState::Off));
            affordances.range_mod_off = modulation.range == Some(RangeModState::On);
            affordances.modulation_parameters = true;
        }
        affordances
    }
}

/// What applying a confirmed action did.
enum Applied {
    Moved {
        from: ProviderState,
        to: ProviderState,
        bound_profile: Option<String>,
    },
    /// The action targets the current state; only its metadata applies.
    Repeated {
        rebound: Option<String>,
    },
    Illegal(ProviderState),
}

/// Controller for one provider slot.
pub struct ProviderStateController {
    provider: ProviderType,
    bus: Arc<EventBus>,
    data: DataService,
    notices: Arc<dyn NoticeSink>,
    resync: ResyncHandle,
    view: Arc<dyn ConsoleView>,
    downlink: Option<Arc<LinkStateController>>,
    status: Mutex<ProviderStatus>,
}

impl std::fmt::Debug for ProviderStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStateController")
            .field("status", &*self.status.lock())
            .finish_non_exhaustive()
    }
}

impl ProviderStateController {
    /// Create an unbound controller.
    #[must_use]
    pub fn new(
        provider: ProviderType,
        bus: Arc<EventBus>,
        data: DataService,
        notices: Arc<dyn NoticeSink>,
        resync: ResyncHandle,
        view: Arc<dyn ConsoleView>,
    ) -> Self {
        Self {
            provider,
            bus,
            data,
            notices,
            resync,
            view,
            downlink: None,
            status: Mutex::new(ProviderStatus::new(provider)),
        }
    }

    /// Consult the downlink when deciding whether a failed return start
    /// needs a resync.
    #[must_use]
    pub fn with_downlink(mut self, downlink: Arc<LinkStateController>) -> Self {
        self.downlink = Some(downlink);
        self
    }

    /// Subscribe to this provider's topics.
    pub fn attach(self: &Arc<Self>) {
        let provider = self.provider;

        self.on(Topic::ProviderStateChange(provider), |this, event| {
            if let Event::ProviderStateChange { change, .. } = event {
                this.handle_state_change(change);
            }
        });
        self.on(Topic::ProviderDataFlow(provider), |this, event| {
            if let Event::ProviderDataFlow { flow, .. } = event {
                this.handle_data_flow(flow);
            }
        });
        self.on(Topic::DeliveryModeChange(provider), |this, event| {
            if let Event::DeliveryModeChange { change, .. } = event {
                this.handle_delivery_mode(change);
            }
        });
        self.on(Topic::ProfileSelected(provider), |this, event| {
            if let Event::ProfileSelected { profile, .. } = event {
                this.handle_selection(profile.clone());
            }
        });

        if provider == ProviderType::Forward {
            self.on(Topic::ThrowSucceeded, |this, event| {
                if let Event::ThrowSucceeded(success) = event {
                    this.handle_throw_success(success);
                }
            });
            self.on(Topic::ThrowFailed, |this, event| {
                if let Event::ThrowFailed(failure) = event {
                    this.handle_throw_failure(failure);
                }
            });
        }
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

    /// Confirmed state.
    #[must_use]
    pub fn state(&self) -> ProviderState {
        self.status.lock().state
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ProviderStatus {
        self.status.lock().clone()
    }

    fn update(&self, f: impl FnOnce(&mut ProviderStatus)) {
        let status = {
            let mut status = self.status.lock();
            f(&mut status);
            status.clone()
        };
        self.view.provider_changed(&status);
    }

    fn render(&self) {
        self.update(|_| {});
    }

    // ==================== Seeding ====================

    /// Replace the status with the server's snapshot and announce whether
    /// the provider is bound.
    pub fn seed(&self, snapshot: &ProviderSnapshot, forward: &ForwardConfig) {
        let bound_profile = snapshot.bound_profile().map(str::to_string);
        let bound = snapshot.state.is_bound();

        self.update(|status| {
            let selected = if bound {
                bound_profile.clone()
            } else {
                status.selected_profile.take()
            };
            *status = ProviderStatus {
                state: snapshot.state,
                bound_profile: bound_profile.clone().filter(|_| bound),
                selected_profile: selected,
                bind_in_flight: false,
                state_change_time: snapshot.state_change_time.clone(),
                last_transfer_data_time: snapshot.last_transfer_data_time.clone(),
                transfer_data_count: snapshot.transfer_data_count,
                connection_number: snapshot.current_connection_number,
                delivery_mode: Some(snapshot.delivery_mode.clone()).filter(|m| !m.is_empty()),
                ..ProviderStatus::new(self.provider)
            };
            if let Some(modulation) = status.modulation.as_mut() {
                *modulation = ModulationStatus {
                    command: snapshot.command_mod_state,
                    range: snapshot.range_mod_state,
                    bitrate: forward.bitrate,
                    mod_index: forward.mod_index,
                };
            }
        });

        debug!(provider = %self.provider, state = %snapshot.state, "seeded provider");
        if bound {
            self.bus.publish(&Event::ProviderBound {
                provider: self.provider,
                profile: bound_profile,
            });
        } else {
            self.bus.publish(&Event::ProviderUnbound(self.provider));
        }
    }

    // ==================== Confirmations ====================

    /// Apply a confirmed state change.
    ///
    /// A confirmation matching the current state keeps the state but still
    /// applies its time and connection number (and, for bind, resets the
    /// transfer count). Any other move outside the transition table means
    /// local state has drifted, so a resync is requested.
    pub fn handle_state_change(&self, change: &ProviderStateChange) {
        let action = change.action;
        let (applied, status) = {
            let mut status = self.status.lock();
            let current = status.state;
            let applied = match current.transition(action) {
                Some(next) => {
                    status.state = next;
                    status.state_change_time.clone_from(&change.state_change_time);
                    status.connection_number = change.current_connection_number;
                    match action {
                        ProviderAction::Bind => {
                            let profile = change
                                .profile_name
                                .clone()
                                .or_else(|| status.selected_profile.clone());
                            status.transfer_data_count = 0;
                            status.selected_profile.clone_from(&profile);
                            status.bound_profile = profile;
                            status.bind_in_flight = false;
                        }
                        ProviderAction::Unbind | ProviderAction::Abort => {
                            status.bound_profile = None;
                            status.bind_in_flight = false;
                        }
                        ProviderAction::Start | ProviderAction::Stop => {}
                    }
                    Applied::Moved {
                        from: current,
                        to: next,
                        bound_profile: status.bound_profile.clone(),
                    }
                }
                None if action.target_state() == current => {
                    status.state_change_time.clone_from(&change.state_change_time);
                    status.connection_number = change.current_connection_number;
                    let mut rebound = None;
                    if action == ProviderAction::Bind {
                        status.transfer_data_count = 0;
                        status.bind_in_flight = false;
                        if let Some(name) = &change.profile_name {
                            if status.bound_profile.as_deref() != Some(name.as_str()) {
                                rebound = Some(name.clone());
                            }
                            status.bound_profile = Some(name.clone());
                            status.selected_profile = Some(name.clone());
                        }
                    }
                    Applied::Repeated { rebound }
                }
                None => Applied::Illegal(current),
            };
            (applied, status.clone())
        };

        match applied {
            Applied::Moved {
                from,
                to,
                bound_profile,
            } => {
                info!(provider = %self.provider, %action, %from, %to, "provider state confirmed");
                self.view.provider_changed(&status);
                if from == ProviderState::Unbound {
                    self.bus.publish(&Event::ProviderBound {
                        provider: self.provider,
                        profile: bound_profile,
                    });
                } else if to == ProviderState::Unbound {
                    self.bus.publish(&Event::ProviderUnbound(self.provider));
                }
            }
            Applied::Repeated { rebound } => {
                debug!(provider = %self.provider, %action, "confirmation matches current state");
                self.view.provider_changed(&status);
                if let Some(profile) = rebound {
                    warn!(
                        provider = %self.provider,
                        %profile,
                        "bind confirmed for a different profile, requesting resync"
                    );
                    self.bus.publish(&Event::ProviderBound {
                        provider: self.provider,
                        profile: Some(profile),
                    });
                    self.resync.request_resync();
                }
            }
            Applied::Illegal(state) => {
                warn!(
                    provider = %self.provider,
                    %action,
                    %state,
                    "confirmed action is not legal from the local state, requesting resync"
                );
                self.resync.request_resync();
            }
        }
    }

    /// Record a data transfer.
    pub fn handle_data_flow(&self, flow: &DataFlow) {
        self.update(|status| {
            status.last_transfer_data_time.clone_from(&flow.last_transfer_data_time);
            status.transfer_data_count = flow.transfer_data_count;
        });
    }

    /// Record a delivery mode change.
    pub fn handle_delivery_mode(&self, change: &DeliveryModeChange) {
        self.update(|status| {
            status.delivery_mode = Some(change.delivery_mode.clone()).filter(|m| !m.is_empty());
        });
    }

    /// Record the profile chosen for the next bind.
    pub fn handle_selection(&self, profile: Option<String>) {
        self.update(|status| status.selected_profile = profile);
    }

    /// Apply the modulation settings a throw changed.
    pub fn handle_throw_success(&self, success: &ThrowEventSuccess) {
        self.update(|status| {
            if let Some(modulation) = status.modulation.as_mut() {
                if let Some(command) = success.command_modulation {
                    modulation.command = Some(command);
                }
                if let Some(range) = success.range_modulation {
                    modulation.range = Some(range);
                }
                if let Some(bitrate) = success.bitrate {
                    modulation.bitrate = Some(bitrate);
                }
                if let Some(index) = success.mod_index {
                    modulation.mod_index = Some(index);
                }
            }
        });
    }

    /// Report a rejected throw. The notice asks for a resync.
    pub fn handle_throw_failure(&self, failure: &ThrowEventFailure) {
        warn!(error = %failure.error_message, "throw event failed");
        self.notices.show(Notice::ThrowFailed {
            message: failure.error_message.clone(),
        });
    }

    // ==================== Actions ====================

    /// Bind the selected profile.
    pub async fn bind(&self) -> ConsoleResult<Outcome<()>> {
        self.perform(ProviderAction::Bind).await
    }

    /// Release the association.
    pub async fn unbind(&self) -> ConsoleResult<Outcome<()>> {
        self.perform(ProviderAction::Unbind).await
    }

    /// Start the data transfer.
    pub async fn start(&self) -> ConsoleResult<Outcome<()>> {
        self.perform(ProviderAction::Start).await
    }

    /// Stop the data transfer.
    pub async fn stop(&self) -> ConsoleResult<Outcome<()>> {
        self.perform(ProviderAction::Stop).await
    }

    /// Abort the association.
    pub async fn abort(&self) -> ConsoleResult<Outcome<()>> {
        self.perform(ProviderAction::Abort).await
    }

    /// Request `action` if the current state allows it.
    ///
    /// Issuing bind disables it until the request fails or the bind is
    /// confirmed; the state itself never changes here.
    pub async fn perform(&self, action: ProviderAction) -> ConsoleResult<Outcome<()>> {
        let profile = {
            let mut status = self.status.lock();
            if action == ProviderAction::Bind
                && status.state == ProviderState::Unbound
                && status.selected_profile.is_none()
            {
                return Err(ConsoleError::NoProfileSelected(self.provider));
            }
            if !status.affordances().allows(action) {
                return Err(ConsoleError::ActionUnavailable {
                    provider: self.provider,
                    action,
                    state: status.state.to_string(),
                });
            }
            if action == ProviderAction::Bind {
                status.bind_in_flight = true;
            }
            status.selected_profile.clone()
        };

        let is_bind = action == ProviderAction::Bind;
        if is_bind {
            self.render();
        }

        let profile = profile.as_deref().filter(|_| is_bind);
        let result = self
            .data
            .provider_state_change(self.provider, action, profile)
            .await;

        if is_bind && !matches!(result, Ok(Outcome::Done(()))) {
            self.update(|status| status.bind_in_flight = false);
        }
        if let Err(e) = &result {
            report_failure(self.notices.as_ref(), e, self.failure_recovery(action));
        }
        result
    }

    /// Recovery for a failed action. A return start failing while the
    /// downlink is down is expected and leaves nothing out of sync.
    fn failure_recovery(&self, action: ProviderAction) -> Recovery {
        let downlink_down = self
            .downlink
            .as_ref()
            .is_some_and(|link| link.state() != LinkState::Connected);
        if self.provider == ProviderType::Return && action == ProviderAction::Start && downlink_down
        {
            Recovery::None
        } else {
            Recovery::Resync
        }
    }

    // ==================== Forward Modulation ====================

    fn forward_affordances(&self, operation: &'static str) -> ConsoleResult<Affordances> {
        if self.provider != ProviderType::Forward {
            return Err(ConsoleError::ForwardOnly(operation));
        }
        Ok(self.status.lock().affordances())
    }

    async fn throw(&self, commands: &[ThrowCommand]) -> ConsoleResult<Outcome<()>> {
        let result = self.data.forward_provider_throw(commands).await;
        if let Err(e) = &result {
            report_failure(self.notices.as_ref(), e, Recovery::Resync);
        }
        result
    }

    /// Turn command modulation on or off.
    pub async fn set_command_mod(&self, on: bool) -> ConsoleResult<Outcome<()>> {
        const OPERATION: &str = "command modulation";
        let affordances = self.forward_affordances(OPERATION)?;
        let allowed = if on {
            affordances.command_mod_on
        } else {
            affordances.command_mod_off
        };
        if !allowed {
            return Err(ConsoleError::ModulationUnavailable(OPERATION));
        }
        self.throw(&[ThrowCommand::CommandMod(on)]).await
    }

    /// Turn range modulation on or off.
    pub async fn set_range_mod(&self, on: bool) -> ConsoleResult<Outcome<()>> {
        const OPERATION: &str = "range modulation";
        let affordances = self.forward_affordances(OPERATION)?;
        let allowed = if on {
            affordances.range_mod_on
        } else {
            affordances.range_mod_off
        };
        if !allowed {
            return Err(ConsoleError::ModulationUnavailable(OPERATION));
        }
        self.throw(&[ThrowCommand::RangeMod(on)]).await
    }

    /// Change the bitrate. The value must be finite and positive.
    pub async fn change_bitrate(&self, bitrate: f64) -> ConsoleResult<Outcome<()>> {
        const OPERATION: &str = "bitrate";
        if !self.forward_affordances(OPERATION)?.modulation_parameters {
            return Err(ConsoleError::ModulationUnavailable(OPERATION));
        }
        if !bitrate.is_finite() || bitrate <= 0.0 {
            return Err(ConsoleError::InvalidParameter {
                parameter: OPERATION,
                value: bitrate.to_string(),
            });
        }
        self.throw(&[ThrowCommand::Bitrate(bitrate)]).await
    }

    /// Change the modulation index.
    pub async fn change_mod_index(&self, index: u32) -> ConsoleResult<Outcome<()>> {
        const OPERATION: &str = "modulation index";
        if !self.forward_affordances(OPERATION)?.modulation_parameters {
            return Err(ConsoleError::ModulationUnavailable(OPERATION));
        }
        self.throw(&[ThrowCommand::ModIndex(index)]).await
    }
}
