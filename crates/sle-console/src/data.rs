//! REST client for the proxy.
//!
//! Reads degrade to `None` or empty values on any failure so callers only
//! have to null-check. Mutations return [`Outcome`]: a 403 is handled here
//! (the not-authorized notice is raised and the call resolves to
//! [`Outcome::Unauthorized`]) so it never reaches the caller's failure path.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use sle_proto::{
    DownlinkConfig, Link, LinkAction, LogEntry, Profile, ProviderAction, ProviderType,
    ServerState, ValidationError,
};
use tracing::{debug, warn};
use url::Url;

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult, ServerFailure};
use crate::notice::{Notice, NoticeSink};

const SLE_INTERFACE: &str = "sle-interface";
const CHILL_INTERFACE: &str = "chill-interface";

/// Result of a mutating request that reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The server accepted the request.
    Done(T),
    /// The server answered 403; the operator has already been notified.
    Unauthorized,
}

impl<T> Outcome<T> {
    /// Whether the server accepted the request.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Map the accepted value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Done(value) => Outcome::Done(f(value)),
            Self::Unauthorized => Outcome::Unauthorized,
        }
    }
}

/// One parameter of a forward throw request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrowCommand {
    /// Turn command modulation on or off.
    CommandMod(bool),
    /// Turn range modulation on or off.
    RangeMod(bool),
    /// Change the bitrate.
    Bitrate(f64),
    /// Change the modulation index.
    ModIndex(u32),
}

impl ThrowCommand {
    /// Query parameter name.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::CommandMod(_) => "set-command-mod",
            Self::RangeMod(_) => "set-range-mod",
            Self::Bitrate(_) => "change-rate",
            Self::ModIndex(_) => "change-index",
        }
    }

    /// Query parameter value.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::CommandMod(on) | Self::RangeMod(on) => on_off(*on).to_string(),
            Self::Bitrate(rate) => rate.to_string(),
            Self::ModIndex(index) => index.to_string(),
        }
    }
}

const fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Error body as the proxy sends it; every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureBody {
    code: Option<u16>,
    reason_phrase: Option<String>,
    description: Option<String>,
}

/// Build a [`ServerFailure`] from a non-2xx response.
fn parse_failure(status: StatusCode, body: &[u8]) -> ServerFailure {
    let reason = status.canonical_reason().unwrap_or("Unknown Status").to_string();
    match serde_json::from_slice::<FailureBody>(body) {
        Ok(parsed) => ServerFailure {
            code: parsed.code.unwrap_or_else(|| status.as_u16()),
            reason_phrase: parsed.reason_phrase.unwrap_or(reason),
            description: parsed.description.unwrap_or_default(),
        },
        Err(_) => ServerFailure {
            code: status.as_u16(),
            reason_phrase: reason,
            description: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}

/// REST client for the proxy.
#[derive(Clone)]
pub struct DataService {
    client: Client,
    base: Url,
    notices: Arc<dyn NoticeSink>,
}

impl std::fmt::Debug for DataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataService")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl DataService {
    /// Create a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &ConsoleConfig, notices: Arc<dyn NoticeSink>) -> ConsoleResult<Self> {
        let base = config.parsed_base_url()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConsoleError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            notices,
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> ConsoleResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ConsoleError::Config(format!("base URL '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ==================== Reads ====================

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Option<T> {
        let url = match self.endpoint(segments) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build request URL");
                return None;
            }
        };

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "GET failed");
                return None;
            }
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            self.notices.show(Notice::NotAuthorized);
            return None;
        }
        if !status.is_success() {
            warn!(%url, %status, "GET rejected");
            return None;
        }

        match response.json::<T>().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%url, error = %e, "GET returned an undecodable body");
                None
            }
        }
    }

    /// `GET /state`.
    pub async fn get_server_state(&self) -> Option<ServerState> {
        self.get_json(&["state"]).await
    }

    /// `GET /messages`; empty on failure.
    pub async fn get_messages(&self) -> Vec<LogEntry> {
        self.get_json(&["messages"]).await.unwrap_or_default()
    }

    /// `GET /chill-interface/config`.
    pub async fn get_chill_config(&self) -> Option<DownlinkConfig> {
        self.get_json(&[CHILL_INTERFACE, "config"]).await
    }

    /// `GET /sle-interface/profiles`.
    ///
    /// Entries that do not form a consistent profile are skipped.
    pub async fn get_sle_providers(&self) -> Option<Vec<Profile>> {
        let records: Vec<Value> = self.get_json(&[SLE_INTERFACE, "profiles"]).await?;
        let profiles = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Profile>(record) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable profile");
                    None
                }
            })
            .collect();
        Some(profiles)
    }

    // ==================== Mutations ====================

    async fn execute(&self, request: RequestBuilder) -> ConsoleResult<Outcome<()>> {
        let response = request
            .send()
            .await
            .map_err(|e| ServerFailure::transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!(url = %response.url(), "request not authorized");
            self.notices.show(Notice::NotAuthorized);
            return Ok(Outcome::Unauthorized);
        }
        if status.is_success() {
            debug!(url = %response.url(), %status, "request accepted");
            return Ok(Outcome::Done(()));
        }

        let body = response.bytes().await.unwrap_or_default();
        let failure = parse_failure(status, &body);
        warn!(%failure, "request rejected");
        Err(failure.into())
    }

    /// `PUT /sle-interface/profiles/{name}`.
    pub async fn create_profile(
        &self,
        name: &str,
        body: &Map<String, Value>,
    ) -> ConsoleResult<Outcome<()>> {
        let url = self.endpoint(&[SLE_INTERFACE, "profiles", name])?;
        self.execute(self.client.put(url).json(body)).await
    }

    /// `POST /sle-interface/profiles/{name}` with only the changed fields.
    pub async fn update_profile(
        &self,
        name: &str,
        changes: &Map<String, Value>,
    ) -> ConsoleResult<Outcome<()>> {
        let url = self.endpoint(&[SLE_INTERFACE, "profiles", name])?;
        self.execute(self.client.post(url).json(changes)).await
    }

    /// `DELETE /sle-interface/profiles/{name}`.
    pub async fn delete_profile(&self, name: &str) -> ConsoleResult<Outcome<()>> {
        let url = self.endpoint(&[SLE_INTERFACE, "profiles", name])?;
        self.execute(self.client.delete(url)).await
    }

    /// `POST /sle-interface/{provider}/action/{action}`.
    ///
    /// `profile` is sent only with bind, where it is required.
    pub async fn provider_state_change(
        &self,
        provider: ProviderType,
        action: ProviderAction,
        profile: Option<&str>,
    ) -> ConsoleResult<Outcome<()>> {
        let url = self.endpoint(&[SLE_INTERFACE, provider.as_str(), "action", action.as_str()])?;
        let mut request = self.client.post(url);
        if action == ProviderAction::Bind {
            let profile = profile.ok_or(ConsoleError::NoProfileSelected(provider))?;
            request = request.query(&[("profile", profile)]);
        }
        self.execute(request).await
    }

    /// `POST /chill-interface/{link}/action/{action}`.
    pub async fn chill_state_change(
        &self,
        link: Link,
        action: LinkAction,
    ) -> ConsoleResult<Outcome<()>> {
        if action.link() != link {
            return Err(ConsoleError::WrongLink { link, action });
        }
        let url = self.endpoint(&[CHILL_INTERFACE, link.as_str(), "action", action.as_str()])?;
        self.execute(self.client.post(url)).await
    }

    /// `POST /sle-interface/forward/action/throw` with one query parameter
    /// per command.
    pub async fn forward_provider_throw(
        &self,
        commands: &[ThrowCommand],
    ) -> ConsoleResult<Outcome<()>> {
        let url = self.endpoint(&[
            SLE_INTERFACE,
            ProviderType::Forward.as_str(),
            "action",
            "throw",
        ])?;
        let query: Vec<(&str, String)> = commands.iter().map(|c| (c.key(), c.value())).collect();
        self.execute(self.client.post(url).query(&query)).await
    }

    /// `POST /chill-interface/config`.
    pub async fn update_downlink_config(
        &self,
        config: &DownlinkConfig,
    ) -> ConsoleResult<Outcome<()>> {
        if config.host.trim().is_empty() {
            return Err(ConsoleError::Validation(vec![ValidationError::new(
                "host",
                "is required",
            )]));
        }
        if config.port == 0 {
            return Err(ConsoleError::Validation(vec![ValidationError::new(
                "port",
                "must be between 1 and 65535",
            )]));
        }
        let url = self.endpoint(&[CHILL_INTERFACE, "config"])?;
        self.execute(self.client.post(url).json(config)).await
    }
}
