//! Client-side validation of profile edits.
//!
//! Profiles are edited as a [`ProfileForm`]: every field is the raw text an
//! operator typed, `None` when the field is not part of the edit. A form is
//! checked with [`validate_profile_form`] before anything is sent to the
//! server, and [`ProfileForm::submission_body`] strips the fields the server
//! must never receive.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtoError;
use crate::profile::{Profile, ReturnSelection, ServiceKind};
use crate::types::{AuthMode, FrameQuality, InterfaceType, ProviderType, ReturnType};

/// Highest valid TCP port.
pub const MAX_PORT: u32 = 65_535;

/// Characters allowed anywhere in a host list.
static HOSTS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9.\-:|]*$").unwrap_or_else(|_| unreachable!()));

/// Unsigned decimal integer.
static DIGITS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").unwrap_or_else(|_| unreachable!()));

/// Day-of-year timestamp, milliseconds optional.
static DOY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{3})T(\d{2}):(\d{2}):(\d{2})(?:\.\d{1,3})?$")
        .unwrap_or_else(|_| unreachable!())
});

/// Validation error with detailed information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ProtoError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result of validation that may contain multiple errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Add an error with field and message.
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(field, message));
    }

    /// Record the error of a failed check, if any.
    pub fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(e) = outcome {
            self.errors.push(e);
        }
    }

    /// Check if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all errors.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Whether any error concerns `field`.
    #[must_use]
    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Convert into the collected errors, or `Ok` when there are none.
    ///
    /// # Errors
    ///
    /// Returns every validation error if validation failed.
    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }
}

/// One `host:port` entry of a provider host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Whether a form describes a new profile or edits to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// New profile: identity fields are required.
    Create,
    /// Sparse update of an existing profile.
    Update,
}

/// Validate a profile name.
///
/// Names must be non-blank and contain neither whitespace nor `.`.
///
/// # Errors
///
/// Returns an error describing the first rule the name breaks.
pub fn validate_profile_name(name: &str) -> Result<(), ValidationError> {
    let field = "profile_name";
    if name.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    if name.contains('.') {
        return Err(ValidationError::new(field, "cannot contain the '.' character"));
    }
    if name.contains(char::is_whitespace) {
        return Err(ValidationError::new(field, "cannot contain spaces"));
    }
    Ok(())
}

/// Parse and validate a `|` separated list of `host:port` pairs.
///
/// ```
/// use sle_proto::validation::parse_hosts;
///
/// let hosts = parse_hosts("host1:80|host2:443").unwrap();
/// assert_eq!(hosts.len(), 2);
/// assert!(parse_hosts("host1:99999").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if the list contains foreign characters, a malformed
/// pair, or a port outside `1..=65535`.
pub fn parse_hosts(hosts: &str) -> Result<Vec<HostPort>, ValidationError> {
    let field = "provider_hosts";
    if !HOSTS_REGEX.is_match(hosts) {
        return Err(ValidationError::new(
            field,
            "may only contain letters, digits, '.', '-', ':' and '|'",
        ));
    }

    hosts
        .split('|')
        .map(|pair| {
            let pair = pair.trim();
            let parts: Vec<&str> = pair.split(':').collect();
            let [host, port] = parts.as_slice() else {
                return Err(ValidationError::new(
                    field,
                    format!("'{pair}' must be of the form host:port"),
                ));
            };
            if host.is_empty() {
                return Err(ValidationError::new(field, format!("'{pair}' is missing a host")));
            }
            if !DIGITS_REGEX.is_match(port) {
                return Err(ValidationError::new(
                    field,
                    format!("port '{port}' must be a number"),
                ));
            }
            let port = port
                .parse::<u32>()
                .ok()
                .filter(|p| (1..=MAX_PORT).contains(p))
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| {
                    ValidationError::new(
                        field,
                        format!("port '{port}' must be between 1 and {MAX_PORT}"),
                    )
                })?;
            Ok(HostPort {
                host: (*host).to_string(),
                port,
            })
        })
        .collect()
}

/// Validate a day-of-year timestamp (`yyyy-dddThh:mm:ss[.sss]`).
///
/// # Errors
///
/// Returns an error if the text does not follow the format or a component
/// is out of range.
pub fn validate_doy_time(field: &str, value: &str) -> Result<(), ValidationError> {
    let invalid = || {
        ValidationError::new(
            field,
            "must be specified as yyyy-dddThh:mm:ss.sss, milliseconds optional",
        )
    };
    let captures = DOY_REGEX.captures(value).ok_or_else(invalid)?;
    let component = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(u32::MAX)
    };
    let in_range = (1..=366).contains(&component(2))
        && component(3) <= 23
        && component(4) <= 59
        && component(5) <= 59;
    if in_range { Ok(()) } else { Err(invalid()) }
}

/// Validate that a numeric field holds an unsigned decimal integer.
///
/// # Errors
///
/// Returns an error if the value is not all digits.
pub fn validate_digits(field: &str, value: &str) -> Result<(), ValidationError> {
    if DIGITS_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be a non-negative integer"))
    }
}

/// Raw profile fields as entered by an operator.
///
/// Field names match the wire names so a form serializes straight into a
/// request body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ProfileForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_hosts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_authentication_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_password_confirmation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_authentication_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_password_confirmation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacecraft_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_channel: Option<String>,
}

/// Fields that exist only in the client and are never submitted.
const CLIENT_ONLY_FIELDS: [&str; 5] = [
    "profile_name",
    "provider_type",
    "return_type",
    "user_password_confirmation",
    "provider_password_confirmation",
];

impl ProfileForm {
    /// An empty form for a new profile of `provider_type`, pre-filled with
    /// the default authentication modes and return service.
    #[must_use]
    pub fn new_profile(provider_type: ProviderType) -> Self {
        let mut form = Self {
            provider_type: Some(provider_type.to_string().to_ascii_uppercase()),
            user_authentication_mode: Some(AuthMode::default().to_string()),
            provider_authentication_mode: Some(AuthMode::default().to_string()),
            ..Self::default()
        };
        if provider_type == ProviderType::Return {
            form.return_type = Some(ReturnType::default().to_string());
            form.frame_quality = Some(FrameQuality::default().to_string());
        }
        form
    }

    /// The form as a JSON object, omitting absent fields.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Rebuild a form from a JSON object such as a sparse update.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is not a string.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, ProtoError> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Interface type implied by the provider and return type fields.
    #[must_use]
    pub fn interface_type(&self) -> Option<InterfaceType> {
        let provider = self.provider_type.as_deref().and_then(|p| p.parse().ok());
        let return_type = self.return_type.as_deref().and_then(|r| r.parse().ok());
        match (provider, return_type) {
            (Some(ProviderType::Forward), _) => Some(InterfaceType::Forward),
            (_, Some(ReturnType::ReturnChannel)) => Some(InterfaceType::ReturnChannel),
            (_, Some(ReturnType::ReturnAll)) | (Some(ProviderType::Return), None) => {
                Some(InterfaceType::ReturnAll)
            }
            (None, None) => None,
        }
    }

    /// Request body for this form: client-only fields removed and the
    /// implied `interface_type` added.
    #[must_use]
    pub fn submission_body(&self) -> Map<String, Value> {
        let mut body = self.to_map();
        for field in CLIENT_ONLY_FIELDS {
            body.remove(field);
        }
        if let Some(interface) = self.interface_type() {
            if let Ok(value) = serde_json::to_value(interface) {
                body.insert("interface_type".into(), value);
            }
        }
        body
    }
}

impl From<&Profile> for ProfileForm {
    /// The fields an edit form shows for an existing profile.
    fn from(profile: &Profile) -> Self {
        let mut form = Self {
            profile_name: Some(profile.name.clone()),
            provider_name: profile.provider_name.clone(),
            provider_type: Some(profile.provider_type().to_string().to_ascii_uppercase()),
            provider_hosts: Some(profile.hosts.clone()),
            service_instance_id: Some(profile.service_instance_id.clone()),
            service_mode: profile.service_mode.clone(),
            user_authentication_mode: Some(profile.user_auth.to_string()),
            user_name: profile.user_name.clone(),
            user_password: profile.user_password.clone(),
            provider_authentication_mode: Some(profile.provider_auth.to_string()),
            provider_password: profile.provider_password.clone(),
            ..Self::default()
        };
        if let ServiceKind::Return(service) = &profile.service {
            form.return_type = Some(service.selection.return_type().to_string());
            form.start_time.clone_from(&service.start_time);
            form.stop_time.clone_from(&service.stop_time);
            match service.selection {
                ReturnSelection::All { frame_quality } => {
                    form.frame_quality = Some(frame_quality.to_string());
                }
                ReturnSelection::Channel {
                    spacecraft_id,
                    frame_version,
                    virtual_channel,
                } => {
                    form.spacecraft_id = Some(spacecraft_id.to_string());
                    form.frame_version = Some(frame_version.to_string());
                    form.virtual_channel = Some(virtual_channel.to_string());
                }
            }
        }
        form
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

fn require<'a>(
    result: &mut ValidationResult,
    field: &str,
    value: Option<&'a String>,
) -> Option<&'a str> {
    let value = present(value);
    if value.is_none() {
        result.error(field, "is required");
    }
    value
}

fn check_parse<T: std::str::FromStr>(
    result: &mut ValidationResult,
    field: &str,
    value: Option<&str>,
) -> Option<T> {
    let value = value?;
    let parsed = value.parse().ok();
    if parsed.is_none() {
        result.error(field, format!("'{value}' is not a recognized value"));
    }
    parsed
}

fn check_confirmation(
    result: &mut ValidationResult,
    field: &str,
    password: Option<&String>,
    confirmation: Option<&String>,
) {
    if password.is_none() && confirmation.is_none() {
        return;
    }
    let password = password.map_or("", String::as_str);
    let confirmation = confirmation.map_or("", String::as_str);
    if password != confirmation {
        result.error(field, "does not match its confirmation");
    }
}

/// Validate a profile form.
///
/// In [`FormMode::Create`] the identity fields (name, provider type, hosts,
/// service instance id and, for RETURN, the return service) are required.
/// In [`FormMode::Update`] only the fields present are checked, and the
/// name may not appear at all since it is immutable.
pub fn validate_profile_form(form: &ProfileForm, mode: FormMode) -> ValidationResult {
    let mut result = ValidationResult::new();

    let provider_type = match mode {
        FormMode::Create => {
            if let Some(name) = form.profile_name.as_deref() {
                result.check(validate_profile_name(name));
            } else {
                result.error("profile_name", "is required");
            }
            let provider = require(&mut result, "provider_type", form.provider_type.as_ref());
            require(&mut result, "provider_hosts", form.provider_hosts.as_ref());
            require(
                &mut result,
                "service_instance_id",
                form.service_instance_id.as_ref(),
            );
            check_parse::<ProviderType>(&mut result, "provider_type", provider)
        }
        FormMode::Update => {
            if form.profile_name.is_some() {
                result.error("profile_name", "cannot be changed");
            }
            if form.provider_type.is_some() {
                result.error("provider_type", "cannot be changed");
            }
            None
        }
    };

    if let Some(hosts) = present(form.provider_hosts.as_ref()) {
        result.check(parse_hosts(hosts).map(|_| ()));
    }

    check_parse::<AuthMode>(
        &mut result,
        "user_authentication_mode",
        present(form.user_authentication_mode.as_ref()),
    );
    check_parse::<AuthMode>(
        &mut result,
        "provider_authentication_mode",
        present(form.provider_authentication_mode.as_ref()),
    );
    check_parse::<FrameQuality>(
        &mut result,
        "frame_quality",
        present(form.frame_quality.as_ref()),
    );

    let return_type = check_parse::<ReturnType>(
        &mut result,
        "return_type",
        present(form.return_type.as_ref()),
    );
    if provider_type == Some(ProviderType::Return)
        && return_type.is_none()
        && !result.has_error_for("return_type")
    {
        result.error("return_type", "is required for return profiles");
    }

    for (field, value) in [("start_time", &form.start_time), ("stop_time", &form.stop_time)] {
        if let Some(time) = present(value.as_ref()) {
            result.check(validate_doy_time(field, time));
        }
    }

    let channel_fields = [
        ("spacecraft_id", &form.spacecraft_id),
        ("frame_version", &form.frame_version),
        ("virtual_channel", &form.virtual_channel),
    ];
    let creating_channel = mode == FormMode::Create
        && provider_type == Some(ProviderType::Return)
        && return_type == Some(ReturnType::ReturnChannel);
    for (field, value) in channel_fields {
        match present(value.as_ref()) {
            Some(v) => result.check(validate_digits(field, v)),
            None if creating_channel => result.error(field, "is required for RETURN_CHANNEL"),
            None => {}
        }
    }

    check_confirmation(
        &mut result,
        "user_password",
        form.user_password.as_ref(),
        form.user_password_confirmation.as_ref(),
    );
    check_confirmation(
        &mut result,
        "provider_password",
        form.provider_password.as_ref(),
        form.provider_password_confirmation.as_ref(),
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn forward_form() -> ProfileForm {
        ProfileForm {
            profile_name: Some("fwd-dss24".into()),
            provider_hosts: Some("dss24:5100".into()),
            service_instance_id: Some("sagr=1.spack=facility-PASS1".into()),
            ..ProfileForm::new_profile(ProviderType::Forward)
        }
    }

    fn channel_form() -> ProfileForm {
        ProfileForm {
            profile_name: Some("rcf-vc0".into()),
            provider_hosts: Some("dss34:5200".into()),
            service_instance_id: Some("sagr=1".into()),
            return_type: Some("RETURN_CHANNEL".into()),
            frame_quality: None,
            spacecraft_id: Some("76".into()),
            frame_version: Some("1".into()),
            virtual_channel: Some("0".into()),
            ..ProfileForm::new_profile(ProviderType::Return)
        }
    }

    // ==================== Profile Name Tests ====================

    #[test_case("my-profile", true ; "plain name")]
    #[test_case("my.profile", false ; "contains period")]
    #[test_case("my profile", false ; "contains space")]
    #[test_case("", false ; "empty")]
    #[test_case("   ", false ; "whitespace only")]
    fn test_validate_profile_name(name: &str, valid: bool) {
        assert_eq!(validate_profile_name(name).is_ok(), valid);
    }

    // ==================== Host List Tests ====================

    #[test_case("host1:80|host2:443", true ; "two pairs")]
    #[test_case("host1:80 | host2:443", false ; "spaces are foreign characters")]
    #[test_case("10.0.0.1:5100", true ; "ip address")]
    #[test_case("host1:99999", false ; "port out of range")]
    #[test_case("host1:0", false ; "port zero")]
    #[test_case("host1:65535", true ; "highest port")]
    #[test_case("host1", false ; "missing port")]
    #[test_case("host1:80:90", false ; "too many components")]
    #[test_case("host1:http", false ; "non numeric port")]
    #[test_case("host_1:80", false ; "underscore")]
    #[test_case(":80", false ; "missing host")]
    fn test_parse_hosts(hosts: &str, valid: bool) {
        assert_eq!(parse_hosts(hosts).is_ok(), valid);
    }

    #[test]
    fn test_parse_hosts_values() {
        let hosts = parse_hosts("host1:80|host2:443").unwrap();
        assert_eq!(
            hosts,
            vec![
                HostPort { host: "host1".into(), port: 80 },
                HostPort { host: "host2".into(), port: 443 },
            ]
        );
    }

    #[test]
    fn test_parse_hosts_huge_port_is_range_error() {
        let err = parse_hosts("host1:123456789012345678901").unwrap_err();
        assert!(err.message.contains("between 1 and 65535"));
    }

    // ==================== DOY Time Tests ====================

    #[test_case("2026-292T10:15:00", true ; "seconds precision")]
    #[test_case("2026-292T10:15:00.125", true ; "milliseconds")]
    #[test_case("2026-366T23:59:59.9", true ; "leap day single digit millis")]
    #[test_case("2026-000T10:15:00", false ; "day zero")]
    #[test_case("2026-367T10:15:00", false ; "day out of range")]
    #[test_case("2026-292T24:00:00", false ; "hour out of range")]
    #[test_case("2026-10-19T10:15:00", false ; "calendar date")]
    #[test_case("2026-292T10:15:00.1234", false ; "too many millis digits")]
    fn test_validate_doy_time(value: &str, valid: bool) {
        assert_eq!(validate_doy_time("start_time", value).is_ok(), valid);
    }

    // ==================== Form Validation Tests ====================

    #[test]
    fn test_valid_forward_form() {
        let result = validate_profile_form(&forward_form(), FormMode::Create);
        assert!(result.is_valid(), "{:?}", result.errors());
    }

    #[test]
    fn test_valid_channel_form() {
        let result = validate_profile_form(&channel_form(), FormMode::Create);
        assert!(result.is_valid(), "{:?}", result.errors());
    }

    #[test]
    fn test_create_requires_identity_fields() {
        let form = ProfileForm::new_profile(ProviderType::Forward);
        let result = validate_profile_form(&form, FormMode::Create);
        assert!(result.has_error_for("profile_name"));
        assert!(result.has_error_for("provider_hosts"));
        assert!(result.has_error_for("service_instance_id"));
    }

    #[test]
    fn test_create_channel_requires_channel_fields() {
        let form = ProfileForm {
            virtual_channel: None,
            ..channel_form()
        };
        let result = validate_profile_form(&form, FormMode::Create);
        assert!(result.has_error_for("virtual_channel"));
        assert!(!result.has_error_for("spacecraft_id"));
    }

    #[test]
    fn test_create_return_requires_return_type() {
        let form = ProfileForm {
            return_type: None,
            ..channel_form()
        };
        let result = validate_profile_form(&form, FormMode::Create);
        assert!(result.has_error_for("return_type"));
    }

    #[test]
    fn test_numeric_fields_must_be_digits() {
        let form = ProfileForm {
            spacecraft_id: Some("-76".into()),
            frame_version: Some("1.0".into()),
            ..channel_form()
        };
        let result = validate_profile_form(&form, FormMode::Create);
        assert!(result.has_error_for("spacecraft_id"));
        assert!(result.has_error_for("frame_version"));
        assert!(!result.has_error_for("virtual_channel"));
    }

    #[test]
    fn test_password_mismatch_rejected() {
        let form = ProfileForm {
            user_password: Some("abc".into()),
            user_password_confirmation: Some("abd".into()),
            ..forward_form()
        };
        let result = validate_profile_form(&form, FormMode::Create);
        assert!(result.has_error_for("user_password"));
    }

    #[test]
    fn test_password_without_confirmation_rejected() {
        let form = ProfileForm {
            provider_password: Some("secret".into()),
            ..forward_form()
        };
        let result = validate_profile_form(&form, FormMode::Create);
        assert!(result.has_error_for("provider_password"));
    }

    #[test]
    fn test_update_only_checks_present_fields() {
        let update = ProfileForm {
            provider_hosts: Some("dss25:5100".into()),
            ..ProfileForm::default()
        };
        assert!(validate_profile_form(&update, FormMode::Update).is_valid());

        let bad = ProfileForm {
            provider_hosts: Some("dss25:70000".into()),
            ..ProfileForm::default()
        };
        assert!(validate_profile_form(&bad, FormMode::Update).has_error_for("provider_hosts"));
    }

    #[test]
    fn test_update_cannot_rename() {
        let update = ProfileForm {
            profile_name: Some("renamed".into()),
            ..ProfileForm::default()
        };
        assert!(validate_profile_form(&update, FormMode::Update).has_error_for("profile_name"));
    }

    #[test]
    fn test_errors_accumulate() {
        let form = ProfileForm {
            profile_name: Some("my.profile".into()),
            provider_hosts: Some("host1:99999".into()),
            start_time: Some("yesterday".into()),
            ..forward_form()
        };
        let errors = validate_profile_form(&form, FormMode::Create)
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    // ==================== Submission Tests ====================

    #[test]
    fn test_submission_body_strips_client_fields() {
        let form = ProfileForm {
            user_password: Some("abc".into()),
            user_password_confirmation: Some("abc".into()),
            ..channel_form()
        };
        let body = form.submission_body();
        for field in CLIENT_ONLY_FIELDS {
            assert!(!body.contains_key(field), "{field} leaked");
        }
        assert_eq!(body["interface_type"], "RETURN_CHANNEL");
        assert_eq!(body["user_password"], "abc");
        assert_eq!(body["provider_hosts"], "dss34:5200");
    }

    #[test]
    fn test_submission_body_of_sparse_update_has_no_interface_type() {
        let update = ProfileForm {
            service_instance_id: Some("sagr=2".into()),
            ..ProfileForm::default()
        };
        let body = update.submission_body();
        assert_eq!(body.len(), 1);
        assert!(!body.contains_key("interface_type"));
    }

    #[test]
    fn test_form_from_profile_round_trips_through_validation() {
        let record: Profile = serde_json::from_value(serde_json::json!({
            "profile_name": "rcf-vc0",
            "interface_type": "RETURN_CHANNEL",
            "provider_hosts": "dss34:5200",
            "service_instance_id": "sagr=1",
            "spacecraft_id": 76,
            "frame_version": 1,
            "virtual_channel": 0,
        }))
        .unwrap();
        let form = ProfileForm::from(&record);
        assert_eq!(form.return_type.as_deref(), Some("RETURN_CHANNEL"));
        assert_eq!(form.spacecraft_id.as_deref(), Some("76"));
        assert!(form.frame_quality.is_none());
        assert!(validate_profile_form(&form, FormMode::Create).is_valid());
    }
}
