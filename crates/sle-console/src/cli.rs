//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sle_proto::{Link, LinkAction, ProviderType};

/// SLE proxy console: monitor and drive the proxy's providers and links.
#[derive(Parser, Debug, Clone)]
#[command(name = "sle-console")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// REST base URL of the proxy.
    #[arg(long, env = "SLE_CONSOLE_URL")]
    pub base_url: Option<String>,

    /// Websocket URL of the proxy.
    #[arg(long, env = "SLE_CONSOLE_WS_URL")]
    pub ws_url: Option<String>,

    /// Log filter, used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Follow the proxy's state changes until interrupted.
    Monitor,

    /// Show the proxy's current state.
    State,

    /// Drive a provider.
    Provider {
        /// Which provider.
        #[arg(value_enum)]
        provider: ProviderArg,

        /// Action to request.
        #[command(subcommand)]
        action: ProviderCommands,
    },

    /// Enable or disable the uplink, connect or disconnect the downlink.
    Link {
        /// Which link.
        #[arg(value_enum)]
        link: LinkArg,

        /// Action to request.
        #[arg(value_enum)]
        action: LinkActionArg,
    },

    /// Change where the downlink connects.
    DownlinkConfig {
        /// Downlink host.
        #[arg(long)]
        host: String,

        /// Downlink port.
        #[arg(long)]
        port: u16,
    },

    /// Change forward provider modulation.
    Throw(ThrowArgs),

    /// List profiles.
    Profiles,

    /// Create a profile from a JSON form file.
    CreateProfile {
        /// JSON file holding the profile form fields.
        file: PathBuf,
    },

    /// Change a profile using the fields of a JSON form file.
    EditProfile {
        /// Profile to change.
        name: String,

        /// JSON file holding the fields to change.
        file: PathBuf,
    },

    /// Delete a profile.
    DeleteProfile {
        /// Profile to delete.
        name: String,
    },

    /// Show the proxy's message log.
    Messages,
}

/// Provider subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommands {
    /// Bind the provider using a profile.
    Bind {
        /// Profile to bind with.
        #[arg(short, long)]
        profile: String,
    },
    /// Release the binding.
    Unbind,
    /// Start the service.
    Start,
    /// Stop the service.
    Stop,
    /// Abort the association.
    Abort,
}

/// Arguments for the throw command.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct ThrowArgs {
    /// Command modulation.
    #[arg(long, value_enum)]
    pub command_mod: Option<Toggle>,

    /// Range modulation.
    #[arg(long, value_enum)]
    pub range_mod: Option<Toggle>,

    /// Bitrate.
    #[arg(long)]
    pub bitrate: Option<f64>,

    /// Modulation index.
    #[arg(long)]
    pub mod_index: Option<u32>,
}

impl ThrowArgs {
    /// Whether no change was requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.command_mod.is_none()
            && self.range_mod.is_none()
            && self.bitrate.is_none()
            && self.mod_index.is_none()
    }
}

/// On/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// On.
    On,
    /// Off.
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        toggle == Toggle::On
    }
}

/// Provider slot argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Forward CLTU provider.
    Forward,
    /// Return provider.
    Return,
}

impl From<ProviderArg> for ProviderType {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Forward => Self::Forward,
            ProviderArg::Return => Self::Return,
        }
    }
}

/// Link argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkArg {
    /// Uplink.
    Uplink,
    /// Downlink.
    Downlink,
}

impl From<LinkArg> for Link {
    fn from(arg: LinkArg) -> Self {
        match arg {
            LinkArg::Uplink => Self::Uplink,
            LinkArg::Downlink => Self::Downlink,
        }
    }
}

/// Link action argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkActionArg {
    /// Enable the uplink.
    Enable,
    /// Disable the uplink.
    Disable,
    /// Connect the downlink.
    Connect,
    /// Disconnect the downlink.
    Disconnect,
}

impl From<LinkActionArg> for LinkAction {
    fn from(arg: LinkActionArg) -> Self {
        match arg {
            LinkActionArg::Enable => Self::Enable,
            LinkActionArg::Disable => Self::Disable,
            LinkActionArg::Connect => Self::Connect,
            LinkActionArg::Disconnect => Self::Disconnect,
        }
    }
}
