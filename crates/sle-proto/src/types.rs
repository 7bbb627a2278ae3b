//! Core enumerations shared by the proxy's REST and websocket interfaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtoError;

/// Which SLE provider slot a message or action concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    /// Forward (uplink, CLTU) provider.
    Forward,
    /// Return (downlink, RAF/RCF) provider.
    Return,
}

impl ProviderType {
    /// Both provider slots, forward first.
    pub const ALL: [Self; 2] = [Self::Forward, Self::Return];

    /// Path segment used by the REST interface.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "return" => Ok(Self::Return),
            _ => Err(ProtoError::invalid("provider_type", s)),
        }
    }
}

/// Connection state of one SLE provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    /// No association with the provider.
    #[default]
    #[serde(alias = "unbound")]
    Unbound,
    /// Bound, but no data is flowing.
    #[serde(alias = "ready")]
    Ready,
    /// Bound and transferring data.
    #[serde(alias = "active")]
    Active,
}

impl ProviderState {
    /// The state reached by applying a confirmed action, or `None` when the
    /// action is not a legal move from this state.
    ///
    /// ```
    /// use sle_proto::{ProviderAction, ProviderState};
    ///
    /// assert_eq!(
    ///     ProviderState::Unbound.transition(ProviderAction::Bind),
    ///     Some(ProviderState::Ready)
    /// );
    /// assert_eq!(ProviderState::Active.transition(ProviderAction::Bind), None);
    /// ```
    #[must_use]
    pub const fn transition(self, action: ProviderAction) -> Option<Self> {
        match (self, action) {
            (Self::Unbound, ProviderAction::Bind) => Some(Self::Ready),
            (Self::Ready, ProviderAction::Start) => Some(Self::Active),
            (Self::Active, ProviderAction::Stop) => Some(Self::Ready),
            (Self::Ready | Self::Active, ProviderAction::Unbind | ProviderAction::Abort) => {
                Some(Self::Unbound)
            }
            _ => None,
        }
    }

    /// Whether the provider holds an association (READY or ACTIVE).
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        matches!(self, Self::Ready | Self::Active)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unbound => "UNBOUND",
            Self::Ready => "READY",
            Self::Active => "ACTIVE",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle action on an SLE provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderAction {
    /// Associate with the provider using a profile.
    #[serde(alias = "BIND")]
    Bind,
    /// Release the association.
    #[serde(alias = "UNBIND")]
    Unbind,
    /// Start data transfer.
    #[serde(alias = "START")]
    Start,
    /// Stop data transfer.
    #[serde(alias = "STOP")]
    Stop,
    /// Tear the association down immediately.
    #[serde(alias = "ABORT")]
    Abort,
}

impl ProviderAction {
    /// Every provider action.
    pub const ALL: [Self; 5] = [Self::Bind, Self::Unbind, Self::Start, Self::Stop, Self::Abort];

    /// Path segment used by the REST interface.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bind => "bind",
            Self::Unbind => "unbind",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Abort => "abort",
        }
    }

    /// State the provider ends up in once the action is confirmed.
    #[must_use]
    pub const fn target_state(&self) -> ProviderState {
        match self {
            Self::Bind | Self::Stop => ProviderState::Ready,
            Self::Start => ProviderState::Active,
            Self::Unbind | Self::Abort => ProviderState::Unbound,
        }
    }
}

impl fmt::Display for ProviderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderAction {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| ProtoError::invalid("action", s))
    }
}

/// A ground-system link component controlled through the chill interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    /// Command uplink.
    Uplink,
    /// Telemetry downlink.
    Downlink,
}

impl Link {
    /// Both links, uplink first.
    pub const ALL: [Self; 2] = [Self::Uplink, Self::Downlink];

    /// Path segment used by the REST interface.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uplink => "uplink",
            Self::Downlink => "downlink",
        }
    }

    /// State assumed before any snapshot or event arrives.
    #[must_use]
    pub const fn initial_state(&self) -> LinkState {
        match self {
            Self::Uplink => LinkState::Disabled,
            Self::Downlink => LinkState::Disconnected,
        }
    }

    /// The (raise, lower) action pair for this link.
    #[must_use]
    pub const fn actions(&self) -> (LinkAction, LinkAction) {
        match self {
            Self::Uplink => (LinkAction::Enable, LinkAction::Disable),
            Self::Downlink => (LinkAction::Connect, LinkAction::Disconnect),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Link {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uplink" => Ok(Self::Uplink),
            "downlink" => Ok(Self::Downlink),
            _ => Err(ProtoError::invalid("link", s)),
        }
    }
}

/// State of a link component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    /// Uplink accepting connections.
    #[serde(alias = "enabled")]
    Enabled,
    /// Uplink refusing connections.
    #[serde(alias = "disabled")]
    Disabled,
    /// Downlink attached to its data source.
    #[serde(alias = "connected")]
    Connected,
    /// Downlink detached.
    #[serde(alias = "disconnected")]
    Disconnected,
}

impl LinkState {
    /// The link this state belongs to.
    #[must_use]
    pub const fn link(&self) -> Link {
        match self {
            Self::Enabled | Self::Disabled => Link::Uplink,
            Self::Connected | Self::Disconnected => Link::Downlink,
        }
    }

    /// Whether the link is enabled or connected.
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self, Self::Enabled | Self::Connected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        };
        write!(f, "{s}")
    }
}

/// Action on a link component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    /// Enable the uplink.
    #[serde(alias = "ENABLE")]
    Enable,
    /// Disable the uplink.
    #[serde(alias = "DISABLE")]
    Disable,
    /// Connect the downlink.
    #[serde(alias = "CONNECT")]
    Connect,
    /// Disconnect the downlink.
    #[serde(alias = "DISCONNECT")]
    Disconnect,
}

impl LinkAction {
    /// Every link action.
    pub const ALL: [Self; 4] = [Self::Enable, Self::Disable, Self::Connect, Self::Disconnect];

    /// Path segment used by the REST interface.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }

    /// The link this action applies to.
    #[must_use]
    pub const fn link(&self) -> Link {
        self.target_state().link()
    }

    /// State the link ends up in once the action is confirmed.
    #[must_use]
    pub const fn target_state(&self) -> LinkState {
        match self {
            Self::Enable => LinkState::Enabled,
            Self::Disable => LinkState::Disabled,
            Self::Connect => LinkState::Connected,
            Self::Disconnect => LinkState::Disconnected,
        }
    }
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LinkAction {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| ProtoError::invalid("action", s))
    }
}

/// Authentication mode for user or provider credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    /// No credentials exchanged.
    #[default]
    None,
    /// Credentials on BIND only.
    Bind,
    /// Credentials on every operation.
    All,
}

impl AuthMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Bind => "BIND",
            Self::All => "ALL",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "BIND" => Ok(Self::Bind),
            "ALL" => Ok(Self::All),
            _ => Err(ProtoError::invalid("authentication_mode", s)),
        }
    }
}

/// Kind of return service a RETURN profile requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnType {
    /// Return All Frames.
    #[default]
    ReturnAll,
    /// Return Channel Frames for one virtual channel.
    ReturnChannel,
}

impl ReturnType {
    /// Wire name of the return type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReturnAll => "RETURN_ALL",
            Self::ReturnChannel => "RETURN_CHANNEL",
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReturnType {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RETURN_ALL" => Ok(Self::ReturnAll),
            "RETURN_CHANNEL" => Ok(Self::ReturnChannel),
            _ => Err(ProtoError::invalid("return_type", s)),
        }
    }
}

/// Frame quality filter for RETURN_ALL service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameQuality {
    /// Only frames that passed decoding.
    Good,
    /// Only frames that failed decoding.
    Erred,
    /// Every frame.
    #[default]
    All,
}

impl FrameQuality {
    /// Wire name of the quality filter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Erred => "ERRED",
            Self::All => "ALL",
        }
    }
}

impl fmt::Display for FrameQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FrameQuality {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GOOD" => Ok(Self::Good),
            "ERRED" => Ok(Self::Erred),
            "ALL" => Ok(Self::All),
            _ => Err(ProtoError::invalid("frame_quality", s)),
        }
    }
}

/// Combined provider/return type the server reports for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceType {
    /// Forward CLTU service.
    Forward,
    /// Return All Frames service.
    ReturnAll,
    /// Return Channel Frames service.
    ReturnChannel,
}

impl InterfaceType {
    /// Provider slot served by this interface.
    #[must_use]
    pub const fn provider_type(&self) -> ProviderType {
        match self {
            Self::Forward => ProviderType::Forward,
            Self::ReturnAll | Self::ReturnChannel => ProviderType::Return,
        }
    }

    /// Return type, for return interfaces.
    #[must_use]
    pub const fn return_type(&self) -> Option<ReturnType> {
        match self {
            Self::Forward => None,
            Self::ReturnAll => Some(ReturnType::ReturnAll),
            Self::ReturnChannel => Some(ReturnType::ReturnChannel),
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "FORWARD",
            Self::ReturnAll => "RETURN_ALL",
            Self::ReturnChannel => "RETURN_CHANNEL",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Forward command modulation sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandModState {
    /// Command modulation on.
    #[serde(alias = "ON")]
    On,
    /// Command modulation off.
    #[default]
    #[serde(alias = "OFF")]
    Off,
}

impl fmt::Display for CommandModState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Forward range modulation sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeModState {
    /// Range modulation on.
    #[serde(alias = "ON")]
    On,
    /// Range modulation off.
    #[default]
    #[serde(alias = "OFF")]
    Off,
    /// Range modulation not available for the current provider.
    #[serde(alias = "DISABLED")]
    Disabled,
}

impl fmt::Display for RangeModState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    // ==================== Provider State Tests ====================

    #[test_case(ProviderState::Unbound, ProviderAction::Bind, Some(ProviderState::Ready) ; "bind from unbound")]
    #[test_case(ProviderState::Ready, ProviderAction::Start, Some(ProviderState::Active) ; "start from ready")]
    #[test_case(ProviderState::Active, ProviderAction::Stop, Some(ProviderState::Ready) ; "stop from active")]
    #[test_case(ProviderState::Ready, ProviderAction::Unbind, Some(ProviderState::Unbound) ; "unbind from ready")]
    #[test_case(ProviderState::Active, ProviderAction::Abort, Some(ProviderState::Unbound) ; "abort from active")]
    #[test_case(ProviderState::Active, ProviderAction::Bind, None ; "bind from active")]
    #[test_case(ProviderState::Ready, ProviderAction::Stop, None ; "stop from ready")]
    #[test_case(ProviderState::Unbound, ProviderAction::Start, None ; "start from unbound")]
    #[test_case(ProviderState::Unbound, ProviderAction::Abort, None ; "abort from unbound")]
    fn test_provider_transition(
        from: ProviderState,
        action: ProviderAction,
        expected: Option<ProviderState>,
    ) {
        assert_eq!(from.transition(action), expected);
    }

    #[test]
    fn test_provider_state_wire_format() {
        let state: ProviderState = serde_json::from_str("\"READY\"").unwrap();
        assert_eq!(state, ProviderState::Ready);
        let state: ProviderState = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(state, ProviderState::Active);
        assert_eq!(serde_json::to_string(&ProviderState::Unbound).unwrap(), "\"UNBOUND\"");
    }

    #[test]
    fn test_provider_action_accepts_either_case() {
        let action: ProviderAction = serde_json::from_str("\"BIND\"").unwrap();
        assert_eq!(action, ProviderAction::Bind);
        assert_eq!("Abort".parse::<ProviderAction>().unwrap(), ProviderAction::Abort);
        assert!("throw".parse::<ProviderAction>().is_err());
    }

    proptest! {
        #[test]
        fn prop_transition_always_lands_on_target(
            from in prop::sample::select(vec![
                ProviderState::Unbound,
                ProviderState::Ready,
                ProviderState::Active,
            ]),
            action in prop::sample::select(ProviderAction::ALL.to_vec()),
        ) {
            if let Some(to) = from.transition(action) {
                prop_assert_eq!(to, action.target_state());
            }
        }
    }

    // ==================== Link Tests ====================

    #[test]
    fn test_link_actions_belong_to_their_link() {
        for link in Link::ALL {
            let (up, down) = link.actions();
            assert_eq!(up.link(), link);
            assert_eq!(down.link(), link);
            assert!(up.target_state().is_up());
            assert!(!down.target_state().is_up());
            assert!(!link.initial_state().is_up());
        }
    }

    #[test]
    fn test_link_state_display() {
        assert_eq!(LinkState::Connected.to_string(), "CONNECTED");
        assert_eq!(LinkState::Disabled.to_string(), "DISABLED");
    }

    // ==================== Profile Enum Tests ====================

    #[test]
    fn test_profile_enum_defaults() {
        assert_eq!(AuthMode::default(), AuthMode::None);
        assert_eq!(ReturnType::default(), ReturnType::ReturnAll);
        assert_eq!(FrameQuality::default(), FrameQuality::All);
    }

    #[test_case("RETURN_ALL", Some(ReturnType::ReturnAll) ; "return all")]
    #[test_case("return_channel", Some(ReturnType::ReturnChannel) ; "lowercase channel")]
    #[test_case("RETURN_SOME", None ; "unknown")]
    fn test_return_type_parse(input: &str, expected: Option<ReturnType>) {
        assert_eq!(input.parse::<ReturnType>().ok(), expected);
    }

    #[test]
    fn test_interface_type_splits_into_provider_and_return() {
        assert_eq!(InterfaceType::Forward.provider_type(), ProviderType::Forward);
        assert_eq!(InterfaceType::Forward.return_type(), None);
        assert_eq!(
            InterfaceType::ReturnChannel.return_type(),
            Some(ReturnType::ReturnChannel)
        );
    }

    #[test]
    fn test_modulation_states_wire_format() {
        let on: CommandModState = serde_json::from_str("\"ON\"").unwrap();
        assert_eq!(on, CommandModState::On);
        let disabled: RangeModState = serde_json::from_str("\"disabled\"").unwrap();
        assert_eq!(disabled, RangeModState::Disabled);
    }
}
