//! Documents returned by the proxy's REST queries.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{CommandModState, LinkState, ProviderState, RangeModState};

/// Full state snapshot returned by `GET /state`.
///
/// Every section defaults when absent so a partial document still seeds
/// whatever it does describe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerState {
    /// Forward provider state.
    #[serde(default)]
    pub forward_provider: ProviderSnapshot,
    /// Return provider state.
    #[serde(default)]
    pub return_provider: ProviderSnapshot,
    /// Uplink state.
    #[serde(default)]
    pub chill_uplink: LinkSnapshot,
    /// Downlink state.
    #[serde(default)]
    pub chill_downlink: LinkSnapshot,
    /// Forward modulation parameters.
    #[serde(default)]
    pub forward_config: ForwardConfig,
}

/// State of one SLE provider at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    /// Connection state; an unrecognised value reads as UNBOUND.
    #[serde(default, deserialize_with = "lenient")]
    pub state: ProviderState,
    /// Name of the bound profile; empty or absent when unbound.
    #[serde(default)]
    pub bound_profile: Option<String>,
    /// Forward only: command modulation.
    #[serde(default, deserialize_with = "lenient")]
    pub command_mod_state: Option<CommandModState>,
    /// Forward only: range modulation.
    #[serde(default, deserialize_with = "lenient")]
    pub range_mod_state: Option<RangeModState>,
    /// Time of the last state change.
    #[serde(default)]
    pub state_change_time: Option<String>,
    /// Time of the last data transfer.
    #[serde(default)]
    pub last_transfer_data_time: Option<String>,
    /// Units transferred since the last bind.
    #[serde(default)]
    pub transfer_data_count: u64,
    /// Connection number of the current association.
    #[serde(default)]
    pub current_connection_number: Option<u64>,
    /// Delivery mode reported by the provider.
    #[serde(default)]
    pub delivery_mode: String,
}

/// Decode `T`, falling back to its default when the value is not one `T`
/// understands. Keeps one odd field from failing the whole snapshot.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

impl ProviderSnapshot {
    /// The bound profile name, treating an empty string as none.
    #[must_use]
    pub fn bound_profile(&self) -> Option<&str> {
        self.bound_profile.as_deref().filter(|name| !name.is_empty())
    }
}

/// State of one link at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkSnapshot {
    /// Link state, absent when the server has not reported a known one.
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<LinkState>,
    /// Time of the last state change.
    #[serde(default)]
    pub state_change_time: Option<String>,
    /// Time of the last data transfer.
    #[serde(default)]
    pub last_transfer_data_time: Option<String>,
    /// Units transferred.
    #[serde(default)]
    pub transfer_data_count: u64,
}

/// Forward modulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Uplink bitrate in bits per second.
    #[serde(default)]
    pub bitrate: Option<f64>,
    /// Modulation index in milliradians.
    #[serde(default)]
    pub mod_index: Option<u32>,
}

/// One entry of the proxy's message log (`GET /messages` or a `log` event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Event time.
    #[serde(rename = "t")]
    pub time: String,
    /// Severity.
    #[serde(rename = "l")]
    pub level: String,
    /// Message text.
    #[serde(rename = "m")]
    pub message: String,
}

/// Downlink connection settings served by `/chill-interface/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownlinkConfig {
    /// Host the downlink connects to.
    pub host: String,
    /// Port the downlink connects to.
    pub port: u16,
}
