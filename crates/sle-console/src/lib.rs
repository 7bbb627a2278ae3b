//! # sle-console
//!
//! Client-side state synchronisation for the SLE proxy.
//!
//! The console keeps a local picture of the proxy's forward and return SLE
//! providers, its uplink and downlink, and its profiles. State is seeded from
//! the REST snapshot and then moved only by websocket broadcasts; operator
//! actions go out over REST and wait for the broadcast that confirms them.
//!
//! | Module | Contents |
//! |---|---|
//! | [`bus`] | Topic-keyed publish/subscribe |
//! | [`connection`] | Websocket task with optional reconnect |
//! | [`router`] | `message_type` to topic routing |
//! | [`data`] | REST client |
//! | [`provider`] | Forward/return provider state controllers |
//! | [`link`] | Uplink/downlink state controllers |
//! | [`profiles`] | Profile list, selection and editing |
//! | [`log`] | Bounded message log |
//! | [`context`] | Wiring, seeding and the message pump |
//! | [`cli`], [`commands`], [`output`], [`terminal`] | Command-line front end |
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  REST   ┌────────────┐
//! │  controllers │────────►│  SLE proxy │
//! └──────────────┘         └────────────┘
//!        ▲                       │ websocket
//!        │ EventBus              ▼
//! ┌──────────────┐  mpsc   ┌────────────┐
//! │ MessageRouter│◄────────│ connection │
//! └──────────────┘         └────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod context;
pub mod data;
pub mod error;
pub mod link;
pub mod log;
pub mod notice;
pub mod output;
pub mod profiles;
pub mod provider;
pub mod router;
pub mod terminal;
pub mod view;

pub use bus::{Event, EventBus, Topic};
pub use config::{ConsoleConfig, ReconnectSettings, ResyncStrategy};
pub use connection::{ConnectionMessage, ConnectionState, ReconnectConfig, WebsocketConnection};
pub use context::ConsoleContext;
pub use data::{DataService, Outcome, ThrowCommand};
pub use error::{ConsoleError, ConsoleResult, ServerFailure};
pub use link::{LinkStateController, LinkStatus};
pub use log::MessageLog;
pub use notice::{Notice, NoticeBuffer, NoticeSink, Recovery, ResyncHandle};
pub use profiles::{EditOutcome, ProfileManager, ProfileStore, ProviderConfig};
pub use provider::{ProviderStateController, ProviderStatus};
pub use router::MessageRouter;
pub use view::{ConsoleView, NullView};
