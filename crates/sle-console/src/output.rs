//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use anyhow::Context as _;
use serde::Serialize;
use sle_proto::{DownlinkConfig, LinkSnapshot, LogEntry, Profile, ProviderSnapshot, ServerState};

use crate::cli::Format;
use crate::provider::UNKNOWN_LABEL;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> anyhow::Result<()>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .context("JSON serialization failed")?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(UNKNOWN_LABEL)
}

/// Snapshot of the proxy plus the downlink's connection settings.
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    /// `GET /state` snapshot.
    pub state: ServerState,
    /// Downlink connection settings, when the server reported them.
    pub downlink_config: Option<DownlinkConfig>,
}

fn write_provider<W: Write>(
    writer: &mut W,
    title: &str,
    provider: &ProviderSnapshot,
) -> std::io::Result<()> {
    writeln!(writer, "{title}")?;
    writeln!(writer, "  State:          {}", provider.state)?;
    writeln!(writer, "  Profile:        {}", or_unknown(provider.bound_profile()))?;
    writeln!(writer, "  Delivery mode:  {}", or_unknown(Some(&provider.delivery_mode)))?;
    writeln!(
        writer,
        "  Last transfer:  {}",
        or_unknown(provider.last_transfer_data_time.as_deref())
    )?;
    writeln!(writer, "  Transferred:    {}", provider.transfer_data_count)?;
    Ok(())
}

fn write_link<W: Write>(writer: &mut W, title: &str, link: &LinkSnapshot) -> std::io::Result<()> {
    let state = link
        .state
        .map_or_else(|| UNKNOWN_LABEL.to_string(), |s| s.to_string());
    writeln!(writer, "{title}")?;
    writeln!(writer, "  State:          {state}")?;
    writeln!(
        writer,
        "  Last transfer:  {}",
        or_unknown(link.last_transfer_data_time.as_deref())
    )?;
    writeln!(writer, "  Transferred:    {}", link.transfer_data_count)?;
    Ok(())
}

impl TableDisplay for StateReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let state = &self.state;
        writeln!(writer, "SLE Proxy State")?;
        writeln!(writer, "══════════════════════════════════")?;
        write_provider(writer, "Forward provider", &state.forward_provider)?;
        let forward = &state.forward_provider;
        let command = forward
            .command_mod_state
            .map_or_else(|| UNKNOWN_LABEL.to_string(), |s| s.to_string());
        let range = forward
            .range_mod_state
            .map_or_else(|| UNKNOWN_LABEL.to_string(), |s| s.to_string());
        writeln!(writer, "  Command mod:    {command}")?;
        writeln!(writer, "  Range mod:      {range}")?;
        if let Some(bitrate) = state.forward_config.bitrate {
            writeln!(writer, "  Bitrate:        {bitrate}")?;
        }
        if let Some(index) = state.forward_config.mod_index {
            writeln!(writer, "  Mod index:      {index}")?;
        }
        writeln!(writer)?;
        write_provider(writer, "Return provider", &state.return_provider)?;
        writeln!(writer)?;
        write_link(writer, "Uplink", &state.chill_uplink)?;
        writeln!(writer)?;
        write_link(writer, "Downlink", &state.chill_downlink)?;
        if let Some(config) = &self.downlink_config {
            writeln!(writer, "  Endpoint:       {}:{}", config.host, config.port)?;
        }
        Ok(())
    }
}

/// Profiles for listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileList {
    /// Profiles, sorted by name.
    pub profiles: Vec<Profile>,
}

impl TableDisplay for ProfileList {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        if self.profiles.is_empty() {
            writeln!(writer, "No profiles")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<24}  {:<14}  {:<32}  {:<24}",
            "NAME", "INTERFACE", "HOSTS", "SERVICE INSTANCE"
        )?;
        writeln!(writer, "{}", "─".repeat(100))?;
        for profile in &self.profiles {
            writeln!(
                writer,
                "{:<24}  {:<14}  {:<32}  {:<24}",
                profile.name,
                profile.interface_type(),
                profile.hosts,
                profile.service_instance_id
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} profile(s)", self.profiles.len())?;
        Ok(())
    }
}

/// Message log for display, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessageList {
    /// Log entries.
    pub messages: Vec<LogEntry>,
}

impl TableDisplay for MessageList {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        if self.messages.is_empty() {
            writeln!(writer, "No messages")?;
            return Ok(());
        }
        for entry in &self.messages {
            writeln!(writer, "{:<22}  {:<7}  {}", entry.time, entry.level, entry.message)?;
        }
        Ok(())
    }
}

/// Result of a requested action.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionReport {
    /// What was acted on.
    pub target: String,
    /// What was requested.
    pub action: String,
    /// `accepted`, `unchanged`, `invalid` or `unauthorized`.
    pub result: String,
}

impl ActionReport {
    /// Build a report.
    #[must_use]
    pub fn new(target: impl Into<String>, action: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            action: action.into(),
            result: result.into(),
        }
    }
}

impl TableDisplay for ActionReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{} {}: {}", self.target, self.action, self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sle_proto::{LinkState, ProviderState};

    fn render<T: Serialize + TableDisplay>(format: Format, value: &T) -> String {
        let mut buf = Vec::new();
        OutputFormat::new(format).write(&mut buf, value).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_state_table() {
        let mut state = ServerState::default();
        state.forward_provider.state = ProviderState::Ready;
        state.forward_provider.bound_profile = Some("fwd1".into());
        state.chill_uplink.state = Some(LinkState::Enabled);
        let report = StateReport {
            state,
            downlink_config: Some(DownlinkConfig {
                host: "chill".into(),
                port: 6000,
            }),
        };

        let table = render(Format::Table, &report);
        assert!(table.contains("READY"));
        assert!(table.contains("fwd1"));
        assert!(table.contains("chill:6000"));
        assert!(table.contains(UNKNOWN_LABEL));
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(
            render(Format::Table, &ProfileList { profiles: vec![] }),
            "No profiles\n"
        );
        assert_eq!(
            render(Format::Table, &MessageList { messages: vec![] }),
            "No messages\n"
        );
    }

    #[test]
    fn test_action_report_json() {
        let report = ActionReport::new("forward", "bind", "accepted");
        let json: serde_json::Value = serde_json::from_str(&render(Format::Json, &report)).unwrap();
        assert_eq!(json["result"], "accepted");
        assert!(OutputFormat::new(Format::Json).is_json());
    }

    #[test]
    fn test_message_table() {
        let list = MessageList {
            messages: vec![LogEntry {
                time: "2024-100T00:00:00".into(),
                level: "INFO".into(),
                message: "bound".into(),
            }],
        };
        let table = render(Format::Table, &list);
        assert!(table.contains("INFO"));
        assert!(table.contains("bound"));
    }
}
