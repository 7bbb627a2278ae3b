//! Provider profiles.
//!
//! On the wire a profile is one flat JSON object ([`ProfileRecord`]). In
//! memory it is a [`Profile`], whose return-service fields can only exist in
//! the combination that the provider and return type allow.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtoError;
use crate::types::{AuthMode, FrameQuality, InterfaceType, ProviderType, ReturnType};

/// A named configuration for connecting to one SLE provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileRecord", into = "ProfileRecord")]
pub struct Profile {
    /// Unique profile name. Immutable once created.
    pub name: String,
    /// Provider name as known to the SLE provider.
    pub provider_name: Option<String>,
    /// `host:port` pairs separated by `|`.
    pub hosts: String,
    /// Service instance identifier.
    pub service_instance_id: String,
    /// Service mode, passed through untouched.
    pub service_mode: Option<String>,
    /// User side authentication mode.
    pub user_auth: AuthMode,
    /// User name.
    pub user_name: Option<String>,
    /// User password, when the server discloses it.
    pub user_password: Option<String>,
    /// Provider side authentication mode.
    pub provider_auth: AuthMode,
    /// Provider password, when the server discloses it.
    pub provider_password: Option<String>,
    /// Forward, or return with its service parameters.
    pub service: ServiceKind,
}

/// Provider-type specific half of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    /// Forward CLTU service. Carries no extra parameters.
    Forward,
    /// Return service.
    Return(ReturnService),
}

/// Parameters of a return service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnService {
    /// Start of the delivery window (DOY format).
    pub start_time: Option<String>,
    /// End of the delivery window (DOY format).
    pub stop_time: Option<String>,
    /// Frame selection.
    pub selection: ReturnSelection,
}

/// Frame selection of a return service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnSelection {
    /// RETURN_ALL: every frame of the requested quality.
    All {
        /// Quality filter.
        frame_quality: FrameQuality,
    },
    /// RETURN_CHANNEL: frames of one virtual channel.
    Channel {
        /// Spacecraft identifier.
        spacecraft_id: u32,
        /// Transfer frame version number.
        frame_version: u32,
        /// Virtual channel identifier.
        virtual_channel: u32,
    },
}

impl ReturnSelection {
    /// The return type this selection implements.
    #[must_use]
    pub const fn return_type(&self) -> ReturnType {
        match self {
            Self::All { .. } => ReturnType::ReturnAll,
            Self::Channel { .. } => ReturnType::ReturnChannel,
        }
    }
}

impl Profile {
    /// Provider slot this profile binds.
    #[must_use]
    pub const fn provider_type(&self) -> ProviderType {
        match self.service {
            ServiceKind::Forward => ProviderType::Forward,
            ServiceKind::Return(_) => ProviderType::Return,
        }
    }

    /// Return type, for RETURN profiles.
    #[must_use]
    pub const fn return_type(&self) -> Option<ReturnType> {
        match &self.service {
            ServiceKind::Forward => None,
            ServiceKind::Return(service) => Some(service.selection.return_type()),
        }
    }

    /// Combined interface type as reported by the server.
    #[must_use]
    pub const fn interface_type(&self) -> InterfaceType {
        match self.return_type() {
            None => InterfaceType::Forward,
            Some(ReturnType::ReturnAll) => InterfaceType::ReturnAll,
            Some(ReturnType::ReturnChannel) => InterfaceType::ReturnChannel,
        }
    }
}

/// Flat wire representation of a profile. Every field is optional so the
/// same shape serves full profiles, create bodies and sparse updates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ProfileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<InterfaceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_hosts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_authentication_mode: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_authentication_mode: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<ReturnType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_quality: Option<FrameQuality>,
    #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub spacecraft_id: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub frame_version: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub virtual_channel: Option<u32>,
}

/// Accepts numeric fields sent either as JSON numbers or numeric strings.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::String(s)) => s.trim().parse().map(Some).map_err(D::Error::custom),
    }
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = ProtoError;

    fn try_from(record: ProfileRecord) -> Result<Self, Self::Error> {
        let name = record
            .profile_name
            .ok_or(ProtoError::MissingField("profile_name"))?;

        let provider_type = match (record.provider_type, record.interface_type) {
            (Some(declared), Some(interface)) if declared != interface.provider_type() => {
                return Err(ProtoError::InconsistentProfile(format!(
                    "{name}: provider type {declared} does not match interface type"
                )));
            }
            (Some(declared), _) => declared,
            (None, Some(interface)) => interface.provider_type(),
            (None, None) => return Err(ProtoError::MissingField("provider_type")),
        };

        let has_channel_fields = record.spacecraft_id.is_some()
            || record.frame_version.is_some()
            || record.virtual_channel.is_some();

        let service = match provider_type {
            ProviderType::Forward => {
                if record.return_type.is_some()
                    || record.frame_quality.is_some()
                    || has_channel_fields
                {
                    return Err(ProtoError::InconsistentProfile(format!(
                        "{name}: forward profile carries return service fields"
                    )));
                }
                ServiceKind::Forward
            }
            ProviderType::Return => {
                let return_type = record
                    .return_type
                    .or_else(|| record.interface_type.and_then(|i| i.return_type()))
                    .unwrap_or_default();
                let selection = match return_type {
                    ReturnType::ReturnAll => {
                        if has_channel_fields {
                            return Err(ProtoError::InconsistentProfile(format!(
                                "{name}: RETURN_ALL profile carries channel fields"
                            )));
                        }
                        ReturnSelection::All {
                            frame_quality: record.frame_quality.unwrap_or_default(),
                        }
                    }
                    ReturnType::ReturnChannel => {
                        if record.frame_quality.is_some() {
                            return Err(ProtoError::InconsistentProfile(format!(
                                "{name}: RETURN_CHANNEL profile carries a frame quality"
                            )));
                        }
                        ReturnSelection::Channel {
                            spacecraft_id: record
                                .spacecraft_id
                                .ok_or(ProtoError::MissingField("spacecraft_id"))?,
                            frame_version: record
                                .frame_version
                                .ok_or(ProtoError::MissingField("frame_version"))?,
                            virtual_channel: record
                                .virtual_channel
                                .ok_or(ProtoError::MissingField("virtual_channel"))?,
                        }
                    }
                };
                ServiceKind::Return(ReturnService {
                    start_time: record.start_time,
                    stop_time: record.stop_time,
                    selection,
                })
            }
        };

        Ok(Self {
            name,
            provider_name: record.provider_name,
            hosts: record.provider_hosts.unwrap_or_default(),
            service_instance_id: record.service_instance_id.unwrap_or_default(),
            service_mode: record.service_mode,
            user_auth: record.user_authentication_mode.unwrap_or_default(),
            user_name: record.user_name,
            user_password: record.user_password,
            provider_auth: record.provider_authentication_mode.unwrap_or_default(),
            provider_password: record.provider_password,
            service,
        })
    }
}

impl From<Profile> for ProfileRecord {
    fn from(profile: Profile) -> Self {
        let provider_type = profile.provider_type();
        let interface_type = profile.interface_type();
        let mut record = Self {
            profile_name: Some(profile.name),
            provider_name: profile.provider_name,
            provider_type: Some(provider_type),
            interface_type: Some(interface_type),
            provider_hosts: Some(profile.hosts),
            service_instance_id: Some(profile.service_instance_id),
            service_mode: profile.service_mode,
            user_authentication_mode: Some(profile.user_auth),
            user_name: profile.user_name,
            user_password: profile.user_password,
            provider_authentication_mode: Some(profile.provider_auth),
            provider_password: profile.provider_password,
            ..Self::default()
        };

        if let ServiceKind::Return(service) = profile.service {
            record.return_type = Some(service.selection.return_type());
            record.start_time = service.start_time;
            record.stop_time = service.stop_time;
            match service.selection {
                ReturnSelection::All { frame_quality } => {
                    record.frame_quality = Some(frame_quality);
                }
                ReturnSelection::Channel {
                    spacecraft_id,
                    frame_version,
                    virtual_channel,
                } => {
                    record.spacecraft_id = Some(spacecraft_id);
                    record.frame_version = Some(frame_version);
                    record.virtual_channel = Some(virtual_channel);
                }
            }
        }
        record
    }
}
