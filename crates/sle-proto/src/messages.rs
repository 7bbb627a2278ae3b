//! Websocket messages pushed by the proxy.
//!
//! Every frame is a JSON object whose `message_type` field names one of the
//! [`MessageType`]s below. The remaining fields form the type-specific
//! payload; each payload struct ignores fields it does not know.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CommandModState, Link, LinkAction, ProviderAction, ProviderType, RangeModState};

/// Name of the discriminant field carried by every websocket frame.
pub const MESSAGE_TYPE_FIELD: &str = "message_type";

/// Recognized websocket message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Forward provider bind/unbind/start/stop/abort confirmed.
    ForwardProviderStateChange,
    /// Return provider bind/unbind/start/stop/abort confirmed.
    ReturnProviderStateChange,
    /// Forward throw event accepted by the provider.
    ForwardThrowEventSuccess,
    /// Forward throw event rejected by the provider.
    ForwardThrowEventFailure,
    /// Forward data transferred.
    ForwardDataFlow,
    /// Return data transferred.
    ReturnDataFlow,
    /// Forward delivery mode changed.
    ForwardDeliveryModeChange,
    /// Return delivery mode changed.
    ReturnDeliveryModeChange,
    /// Uplink enabled or disabled.
    UplinkStateChange,
    /// Downlink connected or disconnected.
    DownlinkStateChange,
    /// Uplink data transferred.
    UplinkDataFlow,
    /// Downlink data transferred.
    DownlinkDataFlow,
    /// A profile was created.
    ProfileCreate,
    /// A profile was updated.
    ProfileUpdate,
    /// A profile was deleted.
    ProfileDelete,
    /// A log message.
    Log,
}

impl MessageType {
    /// Every recognized message type.
    pub const ALL: [Self; 16] = [
        Self::ForwardProviderStateChange,
        Self::ReturnProviderStateChange,
        Self::ForwardThrowEventSuccess,
        Self::ForwardThrowEventFailure,
        Self::ForwardDataFlow,
        Self::ReturnDataFlow,
        Self::ForwardDeliveryModeChange,
        Self::ReturnDeliveryModeChange,
        Self::UplinkStateChange,
        Self::DownlinkStateChange,
        Self::UplinkDataFlow,
        Self::DownlinkDataFlow,
        Self::ProfileCreate,
        Self::ProfileUpdate,
        Self::ProfileDelete,
        Self::Log,
    ];

    /// Value of the `message_type` field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ForwardProviderStateChange => "sle_forward_provider_state_change",
            Self::ReturnProviderStateChange => "sle_return_provider_state_change",
            Self::ForwardThrowEventSuccess => "sle_forward_provider_throw_event_success",
            Self::ForwardThrowEventFailure => "sle_forward_provider_throw_event_failure",
            Self::ForwardDataFlow => "sle_forward_data_flow",
            Self::ReturnDataFlow => "sle_return_data_flow",
            Self::ForwardDeliveryModeChange => "sle_forward_delivery_mode_change",
            Self::ReturnDeliveryModeChange => "sle_return_delivery_mode_change",
            Self::UplinkStateChange => "chill_uplink_state_change",
            Self::DownlinkStateChange => "chill_downlink_state_change",
            Self::UplinkDataFlow => "chill_uplink_data_flow",
            Self::DownlinkDataFlow => "chill_downlink_data_flow",
            Self::ProfileCreate => "sle_profile_create",
            Self::ProfileUpdate => "sle_profile_update",
            Self::ProfileDelete => "sle_profile_delete",
            Self::Log => "log",
        }
    }

    /// Look up a message type by its wire name. Unknown names yield `None`.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Provider slot concerned, for provider-scoped types.
    #[must_use]
    pub const fn provider(&self) -> Option<ProviderType> {
        match self {
            Self::ForwardProviderStateChange
            | Self::ForwardThrowEventSuccess
            | Self::ForwardThrowEventFailure
            | Self::ForwardDataFlow
            | Self::ForwardDeliveryModeChange => Some(ProviderType::Forward),
            Self::ReturnProviderStateChange
            | Self::ReturnDataFlow
            | Self::ReturnDeliveryModeChange => Some(ProviderType::Return),
            _ => None,
        }
    }

    /// Link concerned, for link-scoped types.
    #[must_use]
    pub const fn link(&self) -> Option<Link> {
        match self {
            Self::UplinkStateChange | Self::UplinkDataFlow => Some(Link::Uplink),
            Self::DownlinkStateChange | Self::DownlinkDataFlow => Some(Link::Downlink),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a provider state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStateChange {
    /// The confirmed action.
    pub action: ProviderAction,
    /// Profile used, present on bind.
    #[serde(default)]
    pub profile_name: Option<String>,
    /// Server time of the change.
    #[serde(default)]
    pub state_change_time: Option<String>,
    /// Connection number of the association, present on bind.
    #[serde(default)]
    pub current_connection_number: Option<u64>,
}

/// Payload of a successful forward throw event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThrowEventSuccess {
    /// New command modulation state, when the throw changed it.
    #[serde(default)]
    pub command_modulation: Option<CommandModState>,
    /// New range modulation state, when the throw changed it.
    #[serde(default)]
    pub range_modulation: Option<RangeModState>,
    /// New bitrate, when the throw changed it.
    #[serde(default)]
    pub bitrate: Option<f64>,
    /// New modulation index, when the throw changed it.
    #[serde(default)]
    pub mod_index: Option<u32>,
}

/// Payload of a failed forward throw event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowEventFailure {
    /// Provider's explanation.
    pub error_message: String,
}

/// Payload of a data flow update, for providers and links alike.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFlow {
    /// Time of the last transfer.
    #[serde(default)]
    pub last_transfer_data_time: Option<String>,
    /// Units transferred.
    #[serde(default)]
    pub transfer_data_count: u64,
}

/// Payload of a delivery mode change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryModeChange {
    /// New delivery mode; empty once the provider unbinds.
    #[serde(default)]
    pub delivery_mode: String,
}

/// Payload of a link state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStateChange {
    /// The confirmed action.
    pub action: LinkAction,
    /// Server time of the change.
    #[serde(default)]
    pub state_change_time: Option<String>,
}

/// Payload of a profile create, update or delete notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChange {
    /// Name of the affected profile.
    pub profile_name: String,
}
