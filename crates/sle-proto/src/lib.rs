//! # sle-proto
//!
//! Wire types for the SLE proxy's REST and websocket interfaces, and the
//! client-side validation applied to profiles before they are submitted.
//!
//! | Module | Contents |
//! |---|---|
//! | [`types`] | Provider and link states, actions, profile enumerations |
//! | [`profile`] | The [`Profile`] model and its flat wire record |
//! | [`snapshot`] | `GET /state` snapshot, log entries, downlink config |
//! | [`messages`] | Websocket message types and payloads |
//! | [`validation`] | Profile form validation |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod messages;
pub mod profile;
pub mod snapshot;
pub mod types;
pub mod validation;

pub use error::ProtoError;
pub use messages::{MessageType, MESSAGE_TYPE_FIELD};
pub use profile::{Profile, ProfileRecord, ReturnSelection, ReturnService, ServiceKind};
pub use snapshot::{
    DownlinkConfig, ForwardConfig, LinkSnapshot, LogEntry, ProviderSnapshot, ServerState,
};
pub use types::{
    AuthMode, CommandModState, FrameQuality, InterfaceType, Link, LinkAction, LinkState,
    ProviderAction, ProviderState, ProviderType, RangeModState, ReturnType,
};
pub use validation::{FormMode, ProfileForm, ValidationError, ValidationResult};
