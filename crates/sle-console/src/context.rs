//! Application context.
//!
//! Owns every controller, wires them to one [`EventBus`], seeds them from the
//! server snapshot and pumps websocket messages through the router.
//!
//! ```text
//! websocket task ──mpsc──► ConsoleContext::run ──► MessageRouter ──► EventBus
//!                                   │                                   │
//!                              ResyncRequests                      controllers
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use sle_proto::{Link, MessageType, ProviderType, ServerState, MESSAGE_TYPE_FIELD};
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus};
use crate::config::{ConsoleConfig, ResyncStrategy};
use crate::connection::{ConnectionMessage, WebsocketConnection};
use crate::data::DataService;
use crate::error::{ConsoleError, ConsoleResult};
use crate::link::LinkStateController;
use crate::log::MessageLog;
use crate::notice::{Notice, NoticeSink, ResyncHandle, ResyncRequests};
use crate::profiles::{ProfileManager, ProfileStore, ProviderConfig};
use crate::provider::ProviderStateController;
use crate::router::MessageRouter;
use crate::view::ConsoleView;

/// Every controller of one console session.
pub struct ConsoleContext {
    config: ConsoleConfig,
    bus: Arc<EventBus>,
    data: DataService,
    notices: Arc<dyn NoticeSink>,
    view: Arc<dyn ConsoleView>,
    resync: ResyncHandle,
    resync_requests: Mutex<Option<ResyncRequests>>,
    router: MessageRouter,
    uplink: Arc<LinkStateController>,
    downlink: Arc<LinkStateController>,
    forward: Arc<ProviderStateController>,
    return_provider: Arc<ProviderStateController>,
    profiles: Arc<ProfileStore>,
    forward_config: Arc<ProviderConfig>,
    return_config: Arc<ProviderConfig>,
    profile_manager: ProfileManager,
    log: Arc<MessageLog>,
    connection: Mutex<Option<WebsocketConnection>>,
    opened_before: AtomicBool,
}

impl std::fmt::Debug for ConsoleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleContext")
            .field("config", &self.config)
            .field("forward", &self.forward)
            .field("return_provider", &self.return_provider)
            .field("uplink", &self.uplink)
            .field("downlink", &self.downlink)
            .finish_non_exhaustive()
    }
}

impl ConsoleContext {
    /// Build every controller and subscribe it to the bus.
    ///
    /// Nothing is fetched until [`init`](Self::init).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: ConsoleConfig,
        view: Arc<dyn ConsoleView>,
        notices: Arc<dyn NoticeSink>,
    ) -> ConsoleResult<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let data = DataService::new(&config, Arc::clone(&notices))?;
        let (resync, resync_requests) = ResyncHandle::channel();

        let make_link = |link: Link| {
            let controller = Arc::new(LinkStateController::new(
                link,
                data.clone(),
                Arc::clone(&notices),
                Arc::clone(&view),
            ));
            controller.attach(&bus);
            controller
        };
        let uplink = make_link(Link::Uplink);
        let downlink = make_link(Link::Downlink);

        let make_provider = |provider: ProviderType| {
            let controller = Arc::new(
                ProviderStateController::new(
                    provider,
                    Arc::clone(&bus),
                    data.clone(),
                    Arc::clone(&notices),
                    resync.clone(),
                    Arc::clone(&view),
                )
                .with_downlink(Arc::clone(&downlink)),
            );
            controller.attach();
            controller
        };
        let forward = make_provider(ProviderType::Forward);
        let return_provider = make_provider(ProviderType::Return);

        let profiles = Arc::new(ProfileStore::new());
        let make_selection = |provider: ProviderType| {
            let selection = Arc::new(ProviderConfig::new(
                provider,
                Arc::clone(&bus),
                Arc::clone(&profiles),
                Arc::clone(&view),
            ));
            selection.attach();
            selection
        };
        let forward_config = make_selection(ProviderType::Forward);
        let return_config = make_selection(ProviderType::Return);

        let log = Arc::new(MessageLog::new(config.log_capacity, Arc::clone(&view)));
        log.attach(&bus);

        Ok(Self {
            router: MessageRouter::new(Arc::clone(&bus)),
            profile_manager: ProfileManager::new(data.clone(), Arc::clone(&notices)),
            config,
            bus,
            data,
            notices,
            view,
            resync,
            resync_requests: Mutex::new(Some(resync_requests)),
            uplink,
            downlink,
            forward,
            return_provider,
            profiles,
            forward_config,
            return_config,
            log,
            connection: Mutex::new(None),
            opened_before: AtomicBool::new(false),
        })
    }

    /// Fetch the server snapshot, profiles and message history, and seed
    /// every controller from them.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::SnapshotUnavailable`] if `GET /state` fails.
    pub async fn init(&self) -> ConsoleResult<()> {
        let state = self
            .data
            .get_server_state()
            .await
            .ok_or(ConsoleError::SnapshotUnavailable)?;

        self.reload_profiles().await;
        for config in [&self.forward_config, &self.return_config] {
            config.revalidate();
        }

        self.log.seed(self.data.get_messages().await);
        self.seed(&state);
        info!("console state synchronised with the proxy");
        Ok(())
    }

    /// Discard local state and reload it from the server.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::SnapshotUnavailable`] if `GET /state` fails.
    pub async fn resync(&self) -> ConsoleResult<()> {
        info!("resynchronising with the proxy");
        self.init().await
    }

    fn seed(&self, state: &ServerState) {
        self.uplink.seed(&state.chill_uplink);
        self.downlink.seed(&state.chill_downlink);
        self.forward.seed(&state.forward_provider, &state.forward_config);
        self.return_provider.seed(&state.return_provider, &state.forward_config);
    }

    async fn reload_profiles(&self) {
        if self.profiles.reload(&self.data).await {
            self.view.profiles_changed(&self.profiles.list());
        }
    }

    /// Connect the websocket and process messages and resync requests
    /// until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::ConnectionClosed`] once the websocket closes
    /// for good, [`ConsoleError::ResyncRequested`] under the exit resync
    /// strategy, and [`ConsoleError::AlreadyRunning`] on a second call.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> ConsoleResult<()> {
        let mut requests = self
            .resync_requests
            .lock()
            .take()
            .ok_or(ConsoleError::AlreadyRunning)?;

        let (connection, mut messages) = WebsocketConnection::spawn(
            self.config.websocket_url.clone(),
            self.config.reconnect.to_reconnect_config(),
        );
        *self.connection.lock() = Some(connection);
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => self.dispatch(message).await,
                    None => break Err(ConsoleError::ConnectionClosed),
                },
                Some(()) = requests.recv() => {
                    // Collapse a burst of requests into one resync.
                    while requests.try_recv().is_ok() {}
                    match self.config.resync {
                        ResyncStrategy::Snapshot => {
                            if let Err(e) = self.resync().await {
                                warn!(error = %e, "resync failed");
                            }
                        }
                        ResyncStrategy::Exit => break Err(ConsoleError::ResyncRequested),
                    }
                }
                () = &mut shutdown => break Ok(()),
            }
        };

        self.shutdown();
        result
    }

    /// Apply one message from the websocket task.
    pub async fn dispatch(&self, message: ConnectionMessage) {
        match message {
            ConnectionMessage::Opened => {
                self.bus.publish(&Event::ConnectionOpened);
                self.view.connection_changed(true);
                if self.opened_before.swap(true, Ordering::SeqCst) {
                    info!("websocket reopened, requesting resync");
                    self.resync.request_resync();
                }
            }
            ConnectionMessage::Closed { reason } => {
                warn!(%reason, "lost connection to the proxy");
                self.bus.publish(&Event::ConnectionClosed { reason });
                self.view.connection_changed(false);
                self.notices.show(Notice::CommunicationLost);
            }
            ConnectionMessage::Received(frame) => {
                if is_profile_message(&frame) {
                    debug!("profile changed, reloading list before routing");
                    self.reload_profiles().await;
                }
                self.router.handle_message(&frame);
            }
        }
    }

    /// Tear the websocket down.
    pub fn shutdown(&self) {
        if let Some(connection) = self.connection.lock().take() {
            connection.shutdown();
            debug!(url = connection.url(), "websocket shut down");
        }
    }

    /// Forward provider controller.
    #[must_use]
    pub fn forward(&self) -> &Arc<ProviderStateController> {
        &self.forward
    }

    /// Return provider controller.
    #[must_use]
    pub fn return_provider(&self) -> &Arc<ProviderStateController> {
        &self.return_provider
    }

    /// Controller for `provider`.
    #[must_use]
    pub fn provider(&self, provider: ProviderType) -> &Arc<ProviderStateController> {
        match provider {
            ProviderType::Forward => &self.forward,
            ProviderType::Return => &self.return_provider,
        }
    }

    /// Uplink controller.
    #[must_use]
    pub fn uplink(&self) -> &Arc<LinkStateController> {
        &self.uplink
    }

    /// Downlink controller.
    #[must_use]
    pub fn downlink(&self) -> &Arc<LinkStateController> {
        &self.downlink
    }

    /// Controller for `link`.
    #[must_use]
    pub fn link(&self, link: Link) -> &Arc<LinkStateController> {
        match link {
            Link::Uplink => &self.uplink,
            Link::Downlink => &self.downlink,
        }
    }

    /// Profile list.
    #[must_use]
    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    /// Profile selection for `provider`.
    #[must_use]
    pub fn provider_config(&self, provider: ProviderType) -> &Arc<ProviderConfig> {
        match provider {
            ProviderType::Forward => &self.forward_config,
            ProviderType::Return => &self.return_config,
        }
    }

    /// Profile create/edit/delete.
    #[must_use]
    pub fn profile_manager(&self) -> &ProfileManager {
        &self.profile_manager
    }

    /// Message log.
    #[must_use]
    pub fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }

    /// Event bus shared by every controller.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// REST client.
    #[must_use]
    pub fn data(&self) -> &DataService {
        &self.data
    }

    /// Capability to request a resync.
    #[must_use]
    pub fn resync_handle(&self) -> ResyncHandle {
        self.resync.clone()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }
}

fn is_profile_message(frame: &Value) -> bool {
    frame
        .get(MESSAGE_TYPE_FIELD)
        .and_then(Value::as_str)
        .and_then(MessageType::from_wire)
        .is_some_and(|t| {
            matches!(
                t,
                MessageType::ProfileCreate | MessageType::ProfileUpdate | MessageType::ProfileDelete
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::notice::NoticeBuffer;
    use crate::view::NullView;
    use serde_json::json;
    use sle_proto::{LinkState, ProviderState};

    fn context() -> (ConsoleContext, Arc<NoticeBuffer>) {
        let notices = Arc::new(NoticeBuffer::new());
        let config = ConsoleConfig::default()
            .with_base_url("http://127.0.0.1:1")
            .with_websocket_url("ws://127.0.0.1:1/websocket");
        let ctx = ConsoleContext::new(config, Arc::new(NullView), notices.clone()).unwrap();
        (ctx, notices)
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConsoleConfig::default().with_base_url("ftp://example.com");
        let result = ConsoleContext::new(config, Arc::new(NullView), Arc::new(NoticeBuffer::new()));
        assert!(matches!(result, Err(ConsoleError::Config(_))));
    }

    #[test]
    fn test_controllers_start_in_initial_states() {
        let (ctx, _) = context();
        assert_eq!(ctx.forward().state(), ProviderState::Unbound);
        assert_eq!(ctx.provider(ProviderType::Return).state(), ProviderState::Unbound);
        assert_eq!(ctx.link(Link::Uplink).state(), LinkState::Disabled);
        assert_eq!(ctx.downlink().state(), LinkState::Disconnected);
        assert!(ctx.profiles().is_empty());
    }

    #[test]
    fn test_subscriptions_wired() {
        let (ctx, _) = context();
        let bus = ctx.bus();
        assert!(bus.subscriber_count(Topic::ProviderStateChange(ProviderType::Forward)) > 0);
        assert!(bus.subscriber_count(Topic::LinkStateChange(Link::Downlink)) > 0);
        assert!(bus.subscriber_count(Topic::ProviderBound(ProviderType::Return)) > 0);
        assert!(bus.subscriber_count(Topic::LogMessage) > 0);
    }

    // ==================== Dispatch Tests ====================

    #[tokio::test]
    async fn test_dispatch_routes_frames() {
        let (ctx, _) = context();
        ctx.dispatch(ConnectionMessage::Received(json!({
            "message_type": "chill_uplink_state_change",
            "action": "enable",
            "state_change_time": "2024-100T00:00:00",
        })))
        .await;
        assert_eq!(ctx.uplink().state(), LinkState::Enabled);
    }

    #[tokio::test]
    async fn test_close_raises_communication_lost() {
        let (ctx, notices) = context();
        ctx.dispatch(ConnectionMessage::Closed {
            reason: "eof".into(),
        })
        .await;
        assert_eq!(notices.notices(), vec![Notice::CommunicationLost]);
    }

    #[tokio::test]
    async fn test_init_fails_without_server() {
        let (ctx, _) = context();
        assert!(matches!(
            ctx.init().await,
            Err(ConsoleError::SnapshotUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_run_ends_when_connection_fails() {
        let (ctx, notices) = context();
        let result = ctx.run(std::future::pending()).await;
        assert!(matches!(result, Err(ConsoleError::ConnectionClosed)));
        assert!(notices.notices().contains(&Notice::CommunicationLost));

        assert!(matches!(
            ctx.run(std::future::pending()).await,
            Err(ConsoleError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn test_exit_strategy_stops_on_resync() {
        let notices = Arc::new(NoticeBuffer::new());
        let config = ConsoleConfig::default()
            .with_base_url("http://127.0.0.1:1")
            .with_websocket_url("ws://127.0.0.1:1/websocket")
            .with_resync(ResyncStrategy::Exit)
            .with_reconnect(crate::config::ReconnectSettings {
                enabled: true,
                initial_delay_ms: 60_000,
                max_delay_ms: 60_000,
                ..Default::default()
            });
        let ctx = ConsoleContext::new(config, Arc::new(NullView), notices).unwrap();
        ctx.resync_handle().request_resync();

        let result = ctx.run(std::future::pending()).await;
        assert!(matches!(result, Err(ConsoleError::ResyncRequested)));
    }

    #[test]
    fn test_profile_messages_detected() {
        assert!(is_profile_message(&json!({"message_type": "sle_profile_delete"})));
        assert!(!is_profile_message(&json!({"message_type": "log"})));
        assert!(!is_profile_message(&json!({})));
    }
}
