//! End-to-end tests of the console context against a mock proxy.
//!
//! The context is seeded over REST and then driven by frames pushed from the
//! mock websocket.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use serde_json::json;
use sle_console::notice::{Notice, NoticeBuffer};
use sle_console::{ConsoleConfig, ConsoleContext, ConsoleError, NullView, Outcome};
use sle_proto::{LinkState, ProviderState, ProviderType};
use tokio::time::timeout;

use common::{eventually, forward_profile, send_json, unbound_state, MockProxy, MockSocket};

struct Harness {
    proxy: MockProxy,
    socket: MockSocket,
    ctx: Arc<ConsoleContext>,
    notices: Arc<NoticeBuffer>,
}

impl Harness {
    async fn start() -> Self {
        let proxy = MockProxy::start().await;
        proxy.respond(Method::GET, "/state", 200, unbound_state());
        proxy.respond(
            Method::GET,
            "/sle-interface/profiles",
            200,
            json!([forward_profile("fwd1"), forward_profile("fwd2")]),
        );
        proxy.respond(Method::GET, "/messages", 200, json!([]));

        let socket = MockSocket::bind().await;
        let notices = Arc::new(NoticeBuffer::new());
        let config = ConsoleConfig::default()
            .with_base_url(proxy.base_url.as_str())
            .with_websocket_url(socket.url.as_str());
        let ctx = Arc::new(ConsoleContext::new(config, Arc::new(NullView), notices.clone()).unwrap());

        Self {
            proxy,
            socket,
            ctx,
            notices,
        }
    }

    fn spawn_run(&self) -> tokio::task::JoinHandle<Result<(), ConsoleError>> {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move { ctx.run(std::future::pending()).await })
    }
}

// ============================================================================
// Seeding
// ============================================================================

#[tokio::test]
async fn init_seeds_controllers_and_selection() {
    let h = Harness::start().await;
    h.proxy.respond(
        Method::GET,
        "/state",
        200,
        json!({
            "forward_provider": {
                "state": "READY",
                "bound_profile": "fwd2",
                "current_connection_number": 4,
                "delivery_mode": "THROW_EVENT",
            },
            "chill_uplink": {"state": "ENABLED", "transfer_data_count": 9},
        }),
    );
    h.proxy.respond(
        Method::GET,
        "/messages",
        200,
        json!([
            {"t": "2024-100T00:00:00", "l": "INFO", "m": "first"},
            {"t": "2024-100T00:00:01", "l": "INFO", "m": "second"},
        ]),
    );

    h.ctx.init().await.unwrap();

    let forward = h.ctx.forward().status();
    assert_eq!(forward.state, ProviderState::Ready);
    assert_eq!(forward.bound_profile.as_deref(), Some("fwd2"));
    assert_eq!(forward.connection_number, Some(4));

    let selection = h.ctx.provider_config(ProviderType::Forward);
    assert!(selection.is_locked());
    assert_eq!(selection.selected().as_deref(), Some("fwd2"));
    assert!(!h.ctx.provider_config(ProviderType::Return).is_locked());

    assert_eq!(h.ctx.uplink().state(), LinkState::Enabled);
    assert_eq!(h.ctx.downlink().state(), LinkState::Disconnected);
    assert_eq!(h.ctx.profiles().len(), 2);

    let log: Vec<_> = h.ctx.log().entries().into_iter().map(|e| e.message).collect();
    assert_eq!(log, vec!["second", "first"]);
}

#[tokio::test]
async fn init_fails_when_state_forbidden() {
    let h = Harness::start().await;
    h.proxy.respond(Method::GET, "/state", 403, json!({}));

    assert!(matches!(
        h.ctx.init().await,
        Err(ConsoleError::SnapshotUnavailable)
    ));
    assert_eq!(h.notices.notices(), vec![Notice::NotAuthorized]);
}

// ============================================================================
// Confirmation Flow
// ============================================================================

#[tokio::test]
async fn bind_waits_for_websocket_confirmation() {
    let h = Harness::start().await;
    h.ctx.init().await.unwrap();
    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;

    h.ctx
        .provider_config(ProviderType::Forward)
        .select("fwd1")
        .unwrap();
    let forward = h.ctx.forward();
    assert_eq!(forward.bind().await.unwrap(), Outcome::Done(()));

    // Accepted by REST, but nothing confirmed yet.
    let status = forward.status();
    assert_eq!(status.state, ProviderState::Unbound);
    assert!(status.bind_in_flight);
    assert!(!status.affordances().bind);

    let bind = h
        .proxy
        .mutations()
        .into_iter()
        .find(|r| r.path == "/sle-interface/forward/action/bind")
        .unwrap();
    assert_eq!(bind.query.as_deref(), Some("profile=fwd1"));

    send_json(
        &mut ws,
        json!({
            "message_type": "sle_forward_provider_state_change",
            "action": "bind",
            "profile_name": "fwd1",
            "state_change_time": "2024-100T00:00:05",
            "current_connection_number": 7,
        }),
    )
    .await;

    assert!(eventually(|| forward.state() == ProviderState::Ready).await);
    let status = forward.status();
    assert_eq!(status.bound_profile.as_deref(), Some("fwd1"));
    assert_eq!(status.connection_number, Some(7));
    assert!(!status.bind_in_flight);
    assert!(h.ctx.provider_config(ProviderType::Forward).is_locked());

    h.ctx.shutdown();
    runner.abort();
}

#[tokio::test]
async fn repeated_bind_confirmation_refreshes_metadata() {
    let h = Harness::start().await;
    h.proxy.respond(
        Method::GET,
        "/state",
        200,
        json!({
            "forward_provider": {
                "state": "READY",
                "bound_profile": "fwd1",
                "current_connection_number": 3,
                "transfer_data_count": 50,
                "state_change_time": "2024-100T12:00:00",
            },
        }),
    );
    h.ctx.init().await.unwrap();
    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;

    send_json(
        &mut ws,
        json!({
            "message_type": "sle_forward_provider_state_change",
            "action": "bind",
            "profile_name": "fwd1",
            "state_change_time": "2024-200T00:00:00",
            "current_connection_number": 9,
        }),
    )
    .await;

    let forward = h.ctx.forward();
    assert!(eventually(|| forward.status().connection_number == Some(9)).await);
    let status = forward.status();
    assert_eq!(status.state, ProviderState::Ready);
    assert_eq!(status.state_change_time.as_deref(), Some("2024-200T00:00:00"));
    assert_eq!(status.transfer_data_count, 0);
    assert_eq!(status.bound_profile.as_deref(), Some("fwd1"));
    assert_eq!(h.proxy.count(&Method::GET, "/state"), 1);

    h.ctx.shutdown();
    runner.abort();
}

#[tokio::test]
async fn link_frames_move_links() {
    let h = Harness::start().await;
    h.ctx.init().await.unwrap();
    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;

    send_json(
        &mut ws,
        json!({"message_type": "chill_downlink_state_change", "action": "connect"}),
    )
    .await;
    send_json(
        &mut ws,
        json!({"message_type": "chill_downlink_data_flow", "transfer_data_count": 12}),
    )
    .await;

    let downlink = h.ctx.downlink();
    assert!(eventually(|| downlink.status().transfer_data_count == 12).await);
    assert_eq!(downlink.state(), LinkState::Connected);
    assert_eq!(h.ctx.uplink().state(), LinkState::Disabled);

    h.ctx.shutdown();
    runner.abort();
}

#[tokio::test]
async fn unknown_frames_are_ignored() {
    let h = Harness::start().await;
    h.ctx.init().await.unwrap();
    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;

    send_json(&mut ws, json!({"message_type": "mystery", "action": "bind"})).await;
    send_json(
        &mut ws,
        json!({"message_type": "log", "t": "2024-100T00:00:09", "l": "INFO", "m": "after"}),
    )
    .await;

    let log = h.ctx.log();
    assert!(eventually(|| !log.entries().is_empty()).await);
    assert_eq!(h.ctx.forward().state(), ProviderState::Unbound);
    assert!(h.notices.notices().is_empty());

    h.ctx.shutdown();
    runner.abort();
}

// ============================================================================
// Profiles
// ============================================================================

#[tokio::test]
async fn profile_delete_reloads_list_and_clears_selection() {
    let h = Harness::start().await;
    h.ctx.init().await.unwrap();
    let selection = h.ctx.provider_config(ProviderType::Forward);
    selection.select("fwd1").unwrap();

    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;

    h.proxy.respond(
        Method::GET,
        "/sle-interface/profiles",
        200,
        json!([forward_profile("fwd2")]),
    );
    send_json(
        &mut ws,
        json!({"message_type": "sle_profile_delete", "profile_name": "fwd1"}),
    )
    .await;

    assert!(eventually(|| selection.selected().is_none()).await);
    assert_eq!(h.ctx.profiles().len(), 1);
    assert!(h.ctx.forward().status().selected_profile.is_none());

    h.ctx.shutdown();
    runner.abort();
}

// ============================================================================
// Resync and Connection Loss
// ============================================================================

#[tokio::test]
async fn illegal_transition_triggers_resync() {
    let h = Harness::start().await;
    h.ctx.init().await.unwrap();
    assert_eq!(h.proxy.count(&Method::GET, "/state"), 1);

    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;

    // Start is not possible from UNBOUND.
    send_json(
        &mut ws,
        json!({"message_type": "sle_return_provider_state_change", "action": "start"}),
    )
    .await;

    assert!(eventually(|| h.proxy.count(&Method::GET, "/state") >= 2).await);
    assert_eq!(h.ctx.return_provider().state(), ProviderState::Unbound);

    h.ctx.shutdown();
    runner.abort();
}

#[tokio::test]
async fn closed_socket_ends_run_with_notice() {
    let h = Harness::start().await;
    h.ctx.init().await.unwrap();
    let runner = h.spawn_run();
    let mut ws = h.socket.accept().await;
    ws.close(None).await.unwrap();

    let result = timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(ConsoleError::ConnectionClosed)));
    assert!(h.notices.notices().contains(&Notice::CommunicationLost));
}
