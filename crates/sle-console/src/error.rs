//! Error types for the console.

use std::fmt;

use serde::{Deserialize, Serialize};
use sle_proto::{Link, LinkAction, ProtoError, ProviderAction, ProviderType, ValidationError};
use thiserror::Error;

/// Result type alias for console operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// A request the server refused (any non-2xx other than 403), or one that
/// never reached it.
///
/// Transport failures carry code 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFailure {
    /// HTTP status code, 0 for transport failures.
    pub code: u16,
    /// Status reason phrase.
    pub reason_phrase: String,
    /// Server supplied description.
    pub description: String,
}

impl ServerFailure {
    /// A failure that happened before any HTTP status was received.
    #[must_use]
    pub fn transport(description: impl Into<String>) -> Self {
        Self {
            code: 0,
            reason_phrase: "Network Error".to_string(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase)?;
        if !self.description.is_empty() {
            write!(f, ": {}", self.description)?;
        }
        Ok(())
    }
}

/// Errors that can occur in the console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server refused a request or could not be reached.
    #[error("request failed: {0}")]
    Server(ServerFailure),

    /// The server answered 403; the not-authorized notice has been shown.
    #[error("not authorized")]
    NotAuthorized,

    /// A profile failed client-side validation; nothing was sent.
    #[error("profile validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// A server document could not be interpreted.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// The action is not available in the provider's current state.
    #[error("{provider} provider cannot {action} while {state}")]
    ActionUnavailable {
        /// Provider slot.
        provider: ProviderType,
        /// Requested action.
        action: ProviderAction,
        /// Current state, as displayed.
        state: String,
    },

    /// A forward modulation control is disabled in the current state.
    #[error("{0} is not available in the current forward provider state")]
    ModulationUnavailable(&'static str),

    /// A modulation parameter is out of range; nothing was sent.
    #[error("invalid {parameter}: {value}")]
    InvalidParameter {
        /// Parameter name.
        parameter: &'static str,
        /// Rejected value, as given.
        value: String,
    },

    /// Bind requested without a selected profile.
    #[error("no profile selected for the {0} provider")]
    NoProfileSelected(ProviderType),

    /// The action belongs to the other link.
    #[error("{action} does not apply to the {link}")]
    WrongLink {
        /// Controller's link.
        link: Link,
        /// Requested action.
        action: LinkAction,
    },

    /// Forward-only operation requested on the return provider.
    #[error("{0} is only available on the forward provider")]
    ForwardOnly(&'static str),

    /// Profile lookup failed.
    #[error("unknown {provider} profile: {name}")]
    UnknownProfile {
        /// Provider slot searched.
        provider: ProviderType,
        /// Requested name.
        name: String,
    },

    /// The profile dropdown is locked while the provider is bound.
    #[error("profile selection for the {0} provider is locked while bound")]
    SelectionLocked(ProviderType),

    /// The startup snapshot could not be fetched.
    #[error("server state unavailable")]
    SnapshotUnavailable,

    /// The websocket closed and will not reconnect.
    #[error("connection to the proxy closed")]
    ConnectionClosed,

    /// A resync was requested under the exit strategy.
    #[error("resynchronisation requested")]
    ResyncRequested,

    /// The message pump was already started.
    #[error("console is already running")]
    AlreadyRunning,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ServerFailure> for ConsoleError {
    fn from(failure: ServerFailure) -> Self {
        Self::Server(failure)
    }
}
