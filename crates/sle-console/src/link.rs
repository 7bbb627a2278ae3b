//! Uplink and downlink state controllers.
//!
//! Each link is a two-state machine confirmed only by its websocket state
//! change topic. Requests go out over REST; the state moves when the
//! server's broadcast arrives.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use sle_proto::messages::{DataFlow, LinkStateChange};
use sle_proto::{DownlinkConfig, Link, LinkAction, LinkSnapshot, LinkState};
use tracing::{info, warn};

use crate::bus::{Event, EventBus, Topic};
use crate::data::{DataService, Outcome};
use crate::error::{ConsoleError, ConsoleResult};
use crate::notice::{report_failure, NoticeSink, Recovery};
use crate::view::ConsoleView;

/// What the operator can do with a link right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAffordances {
    /// Enable the uplink or connect the downlink.
    pub raise: bool,
    /// Disable the uplink or disconnect the downlink.
    pub lower: bool,
}

/// Displayed status of one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    /// Which link.
    pub link: Link,
    /// Current state.
    pub state: LinkState,
    /// Time of the last confirmed change.
    pub state_change_time: Option<String>,
    /// Time of the last transfer.
    pub last_transfer_data_time: Option<String>,
    /// Units transferred.
    pub transfer_data_count: u64,
}

impl LinkStatus {
    /// Initial status before seeding.
    #[must_use]
    pub const fn new(link: Link) -> Self {
        Self {
            link,
            state: link.initial_state(),
            state_change_time: None,
            last_transfer_data_time: None,
            transfer_data_count: 0,
        }
    }

    /// Available actions.
    #[must_use]
    pub const fn affordances(&self) -> LinkAffordances {
        let up = self.state.is_up();
        LinkAffordances {
            raise: !up,
            lower: up,
        }
    }
}

/// Controller for one link.
pub struct LinkStateController {
    link: Link,
    data: DataService,
    notices: Arc<dyn NoticeSink>,
    view: Arc<dyn ConsoleView>,
    status: Mutex<LinkStatus>,
}

impl std::fmt::Debug for LinkStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStateController")
            .field("status", &*self.status.lock())
            .finish_non_exhaustive()
    }
}

impl LinkStateController {
    /// Create a controller in the link's initial state.
    #[must_use]
    pub fn new(
        link: Link,
        data: DataService,
        notices: Arc<dyn NoticeSink>,
        view: Arc<dyn ConsoleView>,
    ) -> Self {
        Self {
            link,
            data,
            notices,
            view,
            status: Mutex::new(LinkStatus::new(link)),
        }
    }

    /// Subscribe to this link's topics.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let weak: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::LinkStateChange(self.link), move |event| {
            if let (Some(this), Event::LinkStateChange { change, .. }) = (weak.upgrade(), event) {
                this.handle_state_change(change);
            }
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::LinkDataFlow(self.link), move |event| {
            if let (Some(this), Event::LinkDataFlow { flow, .. }) = (weak.upgrade(), event) {
                this.handle_data_flow(flow);
            }
        });
    }

    /// Which link this controls.
    #[must_use]
    pub const fn link(&self) -> Link {
        self.link
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.status.lock().state
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.status.lock().clone()
    }

    fn update(&self, f: impl FnOnce(&mut LinkStatus)) {
        let status = {
            let mut status = self.status.lock();
            f(&mut status);
            status.clone()
        };
        self.view.link_changed(&status);
    }

    /// Replace the status with the server's snapshot.
    pub fn seed(&self, snapshot: &LinkSnapshot) {
        let link = self.link;
        let state = match snapshot.state {
            Some(state) if state.link() == link => state,
            Some(state) => {
                warn!(%link, %state, "snapshot state belongs to the other link");
                link.initial_state()
            }
            None => link.initial_state(),
        };

        self.update(|status| {
            *status = LinkStatus {
                link,
                state,
                state_change_time: snapshot.state_change_time.clone(),
                last_transfer_data_time: snapshot.last_transfer_data_time.clone(),
                transfer_data_count: snapshot.transfer_data_count,
            };
        });
    }

    /// Apply a confirmed state change.
    pub fn handle_state_change(&self, change: &LinkStateChange) {
        if change.action.link() != self.link {
            warn!(link = %self.link, action = %change.action, "ignoring action for the other link");
            return;
        }
        let state = change.action.target_state();
        info!(link = %self.link, %state, "link state confirmed");
        self.update(|status| {
            status.state = state;
            status.state_change_time.clone_from(&change.state_change_time);
        });
    }

    /// Record a data transfer. The state is unchanged.
    pub fn handle_data_flow(&self, flow: &DataFlow) {
        self.update(|status| {
            status.last_transfer_data_time.clone_from(&flow.last_transfer_data_time);
            status.transfer_data_count = flow.transfer_data_count;
        });
    }

    /// Ask the server to enable/disable or connect/disconnect the link.
    ///
    /// The state only changes once the server confirms over the websocket.
    /// A server failure raises a notice asking for a resync.
    pub async fn request(&self, action: LinkAction) -> ConsoleResult<Outcome<()>> {
        if action.link() != self.link {
            return Err(ConsoleError::WrongLink {
                link: self.link,
                action,
            });
        }

        let result = self.data.chill_state_change(self.link, action).await;
        if let Err(e) = &result {
            report_failure(self.notices.as_ref(), e, Recovery::Resync);
        }
        result
    }

    /// Change where the downlink connects.
    pub async fn configure(&self, config: &DownlinkConfig) -> ConsoleResult<Outcome<()>> {
        if self.link != Link::Downlink {
            return Err(ConsoleError::Config(
                "only the downlink has a connection configuration".to_string(),
            ));
        }
        let result = self.data.update_downlink_config(config).await;
        if let Err(e) = &result {
            report_failure(self.notices.as_ref(), e, Recovery::None);
        }
        result
    }
}
