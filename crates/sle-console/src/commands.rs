//! Subcommand implementations.
//!
//! Every command works through a [`ConsoleContext`] so one-shot actions get
//! the same affordance checks and notices as the live monitor.

use std::future::Future;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context as _};
use serde_json::{Map, Value};
use sle_proto::{DownlinkConfig, Link, LinkAction, ProfileForm, ProviderAction, ProviderType};
use tracing::info;

use crate::cli::{Commands, ProviderCommands, ThrowArgs};
use crate::context::ConsoleContext;
use crate::data::Outcome;
use crate::error::ConsoleError;
use crate::output::{ActionReport, MessageList, OutputFormat, ProfileList, StateReport};
use crate::profiles::EditOutcome;

/// Run one subcommand.
///
/// `shutdown` ends the monitor; other commands ignore it.
///
/// # Errors
///
/// Returns an error if the proxy cannot be reached, refuses the request,
/// or the request is not possible in the current state.
pub async fn execute<W: Write>(
    command: &Commands,
    ctx: &ConsoleContext,
    writer: &mut W,
    format: OutputFormat,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    match command {
        Commands::Monitor => {
            ctx.init().await?;
            info!(url = %ctx.config().websocket_url, "monitoring the proxy");
            ctx.run(shutdown).await?;
        }
        Commands::State => {
            let state = ctx
                .data()
                .get_server_state()
                .await
                .ok_or(ConsoleError::SnapshotUnavailable)?;
            let downlink_config = ctx.data().get_chill_config().await;
            format.write(
                writer,
                &StateReport {
                    state,
                    downlink_config,
                },
            )?;
        }
        Commands::Provider { provider, action } => {
            let provider = ProviderType::from(*provider);
            ctx.init().await?;
            let report = provider_action(ctx, provider, action).await?;
            format.write(writer, &report)?;
            ensure_authorized(&report)?;
        }
        Commands::Link { link, action } => {
            let link = Link::from(*link);
            let action = LinkAction::from(*action);
            let outcome = ctx.link(link).request(action).await?;
            let report = ActionReport::new(link.as_str(), action.as_str(), outcome_label(&outcome));
            format.write(writer, &report)?;
            ensure_authorized(&report)?;
        }
        Commands::DownlinkConfig { host, port } => {
            let config = DownlinkConfig {
                host: host.clone(),
                port: *port,
            };
            let outcome = ctx.downlink().configure(&config).await?;
            let report = ActionReport::new(
                Link::Downlink.as_str(),
                format!("configure {host}:{port}"),
                outcome_label(&outcome),
            );
            format.write(writer, &report)?;
            ensure_authorized(&report)?;
        }
        Commands::Throw(args) => {
            if args.is_empty() {
                bail!("no modulation change requested");
            }
            ctx.init().await?;
            let report = throw(ctx, args).await?;
            format.write(writer, &report)?;
            ensure_authorized(&report)?;
        }
        Commands::Profiles => {
            if !ctx.profiles().reload(ctx.data()).await {
                bail!("failed to fetch the profile list");
            }
            format.write(
                writer,
                &ProfileList {
                    profiles: ctx.profiles().list(),
                },
            )?;
        }
        Commands::CreateProfile { file } => {
            let form: ProfileForm = serde_json::from_value(Value::Object(read_form(file)?))
                .context("profile form fields must be strings")?;
            let name = form.profile_name.clone().unwrap_or_default();
            let outcome = ctx.profile_manager().create(&form).await?;
            finish_edit(writer, format, &name, "create", outcome)?;
        }
        Commands::EditProfile { name, file } => {
            if !ctx.profiles().reload(ctx.data()).await {
                bail!("failed to fetch the profile list");
            }
            let profile = ctx
                .profiles()
                .get(name)
                .ok_or_else(|| anyhow!("unknown profile: {name}"))?;
            let before = ProfileForm::from(&profile);
            let after = merge_form(&before, read_form(file)?)?;
            let outcome = ctx.profile_manager().edit(&before, &after).await?;
            finish_edit(writer, format, name, "update", outcome)?;
        }
        Commands::DeleteProfile { name } => {
            let outcome = ctx.profile_manager().delete(name).await?;
            finish_edit(writer, format, name, "delete", outcome)?;
        }
        Commands::Messages => {
            ctx.log().seed(ctx.data().get_messages().await);
            format.write(
                writer,
                &MessageList {
                    messages: ctx.log().entries(),
                },
            )?;
        }
    }
    Ok(())
}

async fn provider_action(
    ctx: &ConsoleContext,
    provider: ProviderType,
    command: &ProviderCommands,
) -> anyhow::Result<ActionReport> {
    let action = match command {
        ProviderCommands::Bind { profile } => {
            ctx.provider_config(provider).select(profile)?;
            ProviderAction::Bind
        }
        ProviderCommands::Unbind => ProviderAction::Unbind,
        ProviderCommands::Start => ProviderAction::Start,
        ProviderCommands::Stop => ProviderAction::Stop,
        ProviderCommands::Abort => ProviderAction::Abort,
    };
    let outcome = ctx.provider(provider).perform(action).await?;
    Ok(ActionReport::new(
        provider.as_str(),
        action.as_str(),
        outcome_label(&outcome),
    ))
}

async fn throw(ctx: &ConsoleContext, args: &ThrowArgs) -> anyhow::Result<ActionReport> {
    let forward = ctx.forward();
    let mut changes = Vec::new();

    if let Some(toggle) = args.command_mod {
        changes.push(format!("command-mod={toggle:?}").to_lowercase());
        if !forward.set_command_mod(toggle.into()).await?.is_done() {
            return Ok(unauthorized_throw(changes));
        }
    }
    if let Some(toggle) = args.range_mod {
        changes.push(format!("range-mod={toggle:?}").to_lowercase());
        if !forward.set_range_mod(toggle.into()).await?.is_done() {
            return Ok(unauthorized_throw(changes));
        }
    }
    if let Some(bitrate) = args.bitrate {
        changes.push(format!("bitrate={bitrate}"));
        if !forward.change_bitrate(bitrate).await?.is_done() {
            return Ok(unauthorized_throw(changes));
        }
    }
    if let Some(index) = args.mod_index {
        changes.push(format!("mod-index={index}"));
        if !forward.change_mod_index(index).await?.is_done() {
            return Ok(unauthorized_throw(changes));
        }
    }

    Ok(ActionReport::new(
        ProviderType::Forward.as_str(),
        changes.join(", "),
        "accepted",
    ))
}

fn unauthorized_throw(changes: Vec<String>) -> ActionReport {
    ActionReport::new(
        ProviderType::Forward.as_str(),
        changes.join(", "),
        "unauthorized",
    )
}

const fn outcome_label(outcome: &Outcome<()>) -> &'static str {
    match outcome {
        Outcome::Done(()) => "accepted",
        Outcome::Unauthorized => "unauthorized",
    }
}

fn ensure_authorized(report: &ActionReport) -> Result<(), ConsoleError> {
    if report.result == "unauthorized" {
        return Err(ConsoleError::NotAuthorized);
    }
    Ok(())
}

fn finish_edit<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    name: &str,
    action: &str,
    outcome: EditOutcome,
) -> anyhow::Result<()> {
    let label = match &outcome {
        EditOutcome::Submitted => "accepted",
        EditOutcome::Unchanged => "unchanged",
        EditOutcome::Invalid(_) => "invalid",
        EditOutcome::Unauthorized => "unauthorized",
    };
    format.write(writer, &ActionReport::new(name, action, label))?;
    match outcome {
        EditOutcome::Invalid(errors) => Err(ConsoleError::Validation(errors).into()),
        EditOutcome::Unauthorized => Err(ConsoleError::NotAuthorized.into()),
        EditOutcome::Submitted | EditOutcome::Unchanged => Ok(()),
    }
}

fn read_form(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    match serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must hold a JSON object", path.display()),
    }
}

/// The edit form after applying `changes` to `before`.
fn merge_form(before: &ProfileForm, changes: Map<String, Value>) -> anyhow::Result<ProfileForm> {
    let mut fields = before.to_map();
    fields.extend(changes);
    ProfileForm::from_map(fields).context("profile form fields must be strings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_merge_form_overrides_fields() {
        let before = ProfileForm {
            profile_name: Some("fwd1".into()),
            provider_hosts: Some("a:1".into()),
            ..ProfileForm::default()
        };
        let Value::Object(changes) = json!({"provider_hosts": "b:2"}) else {
            unreachable!()
        };
        let after = merge_form(&before, changes).unwrap();
        assert_eq!(after.provider_hosts.as_deref(), Some("b:2"));
        assert_eq!(after.profile_name.as_deref(), Some("fwd1"));
    }

    #[test]
    fn test_read_form_requires_object() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[1, 2]").unwrap();
        assert!(read_form(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"profile_name": "fwd1"}"#).unwrap();
        assert_eq!(read_form(file.path()).unwrap()["profile_name"], "fwd1");
    }

    #[test]
    fn test_unauthorized_report_is_an_error() {
        let report = ActionReport::new("uplink", "enable", outcome_label(&Outcome::Unauthorized));
        assert!(matches!(
            ensure_authorized(&report),
            Err(ConsoleError::NotAuthorized)
        ));
        let report = ActionReport::new("uplink", "enable", outcome_label(&Outcome::Done(())));
        assert!(ensure_authorized(&report).is_ok());
    }

    #[test]
    fn test_invalid_edit_is_an_error() {
        let mut out = Vec::new();
        let result = finish_edit(
            &mut out,
            OutputFormat::default(),
            "fwd1",
            "create",
            EditOutcome::Invalid(vec![]),
        );
        assert!(result.is_err());
        assert_eq!(String::from_utf8(out).unwrap(), "fwd1 create: invalid\n");
    }
}
