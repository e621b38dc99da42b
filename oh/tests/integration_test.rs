//! Integration tests for Overlayhub
//!
//! These tests drive a coordinator, a manager and simulated frames together
//! the way a host page and its embedded documents would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::task::JoinHandle;

use overlayhub::frame::{
    CoordinatorConfig, FrameCoordinator, FrameElement, FrameError, FrameEvent, HandshakeState, Routed,
};
use overlayhub::geometry::{CssSize, Point, Rect, Size};
use overlayhub::manager::{ManagerConfig, ManagerError, OpenConfig, OverlayManager};
use overlayhub::outcome::Outcome;
use overlayhub::overlay::{
    BasicOverlay, FocusTarget, IFrameWindow, LoadingOverlay, Overlay, OverlayCore, OverlayOptions, ResizeHandle,
    WindowOptions,
};
use overlayhub::protocol::{Command, DispatchConfig, Envelope, WindowInbox};
use overlayhub::sim::{DriverCall, RecordingDriver, SimFrame, SimViewport};

// =============================================================================
// Helpers
// =============================================================================

struct Page {
    coordinator: Arc<FrameCoordinator>,
    viewport: Arc<SimViewport>,
    manager: Arc<OverlayManager>,
    _host_inbox: WindowInbox,
}

fn page() -> Page {
    let (coordinator, host_inbox) = FrameCoordinator::new(CoordinatorConfig::default());
    let viewport = SimViewport::new(1280.0, 800.0);
    let manager = OverlayManager::new(viewport.clone(), coordinator.clone(), ManagerConfig::default());
    Page {
        coordinator,
        viewport,
        manager,
        _host_inbox: host_inbox,
    }
}

/// Let spawned tasks run until they block again
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

fn spawn_open(
    manager: &Arc<OverlayManager>,
    overlay: Arc<dyn Overlay>,
    params: Value,
) -> JoinHandle<Result<Outcome, ManagerError>> {
    let manager = manager.clone();
    tokio::spawn(async move { manager.open(overlay, OpenConfig::default(), params).await })
}

fn spawn_open_modal(
    manager: &Arc<OverlayManager>,
    overlay: Arc<dyn Overlay>,
    params: Value,
) -> JoinHandle<Result<Outcome, ManagerError>> {
    let manager = manager.clone();
    tokio::spawn(async move { manager.open_as_modal(overlay, OpenConfig::default(), params).await })
}

/// Next envelope carrying `command`, skipping anything else
async fn next_command(inbox: &mut WindowInbox, command: Command) -> Envelope {
    loop {
        let envelope = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
            .await
            .expect("Timed out waiting for envelope")
            .expect("Window closed");
        if envelope.command == Some(command) {
            return envelope;
        }
    }
}

/// Child frame, already loaded, whose client reports ready
fn ready_frame(label: &str, rect: Rect) -> (Arc<SimFrame>, WindowInbox) {
    let frame = SimFrame::loaded(label, rect);
    let inbox = frame.take_inbox().expect("inbox");
    frame.set_client_loaded(true);
    (frame, inbox)
}

fn basic(name: &str) -> Arc<BasicOverlay> {
    Arc::new(BasicOverlay::new(name, OverlayOptions::default()))
}

// =============================================================================
// End-to-end Scenarios
// =============================================================================

#[tokio::test]
async fn test_open_from_child_frame_replies_to_child_window() {
    let page = page();
    let (frame, mut child) = ready_frame("child", Rect::new(0.0, 0.0, 300.0, 200.0));
    let holder = basic("child1");
    let frame_id = page
        .coordinator
        .register(frame.clone(), &page.manager, Some(holder.clone() as Arc<dyn Overlay>), None);
    settle().await;

    assert_eq!(page.coordinator.handshake_state(&frame_id), Some(HandshakeState::Ready));
    let dispatch = next_command(&mut child, Command::DispatchConfig).await;
    let config: DispatchConfig = dispatch.params_as().unwrap();
    assert_eq!(config.frame_id, frame_id);

    let routed = page
        .coordinator
        .handle_message(
            Envelope::upstream(Command::Open, &frame_id)
                .with_target("child1")
                .with_params(json!({"name": "child1"})),
        )
        .unwrap();
    assert_eq!(routed, Routed::Dispatched(Command::Open));
    settle().await;

    assert!(page.manager.is_registered("child1"));
    assert!(holder.core().is_visible());
    assert!(child.try_recv().is_err(), "no reply before close");

    holder.close(Outcome::ok(json!({"answer": 42})));
    settle().await;

    let reply = next_command(&mut child, Command::Return).await;
    assert!(reply.to_downstream);
    assert_eq!(reply.sender.as_deref(), Some("child1"));
    assert_eq!(reply.params, json!({"isOk": true, "data": {"answer": 42}}));
    assert_eq!(page.coordinator.metrics().replies_sent, 1);
}

#[tokio::test]
async fn test_concurrent_opens_run_one_after_the_other() {
    let page = page();
    let dlg = basic("dlg");

    let first = spawn_open(&page.manager, dlg.clone(), json!("p1"));
    let second = spawn_open(&page.manager, dlg.clone(), json!("p2"));
    settle().await;
    assert_eq!(dlg.loads(), vec![json!("p1")]);

    dlg.close(Outcome::ok(json!("a")));
    settle().await;
    assert_eq!(dlg.loads(), vec![json!("p1"), json!("p2")]);
    assert!(dlg.core().is_visible());

    dlg.close(Outcome::ok(json!("b")));
    settle().await;

    assert_eq!(first.await.unwrap().unwrap(), Outcome::ok(json!("a")));
    assert_eq!(second.await.unwrap().unwrap(), Outcome::ok(json!("b")));
}

#[tokio::test]
async fn test_modal_reentry_is_cancelled_without_reload() {
    let page = page();
    let x = basic("overlayX");

    let first = spawn_open_modal(&page.manager, x.clone(), Value::Null);
    settle().await;
    assert!(x.core().is_visible());
    assert!(x.loaded_as_modal());
    assert_eq!(page.manager.modal_depth(), 1);

    let again = page
        .manager
        .open_as_modal(x.clone(), OpenConfig::default(), Value::Null)
        .await
        .unwrap();
    assert_eq!(again, Outcome::cancelled());
    assert_eq!(x.load_count(), 1);
    assert_eq!(page.manager.modal_depth(), 1);

    x.close(Outcome::ok(Value::Null));
    settle().await;
    assert!(first.await.unwrap().unwrap().is_ok);
    assert_eq!(page.manager.modal_depth(), 0);
}

#[tokio::test]
async fn test_wait_screen_round_trip_in_foreground_band() {
    let page = page();
    let panel = basic("panel");
    let panel_task = spawn_open(&page.manager, panel.clone(), Value::Null);
    settle().await;

    let screen = page.manager.wait_screen().clone();
    assert!(!screen.core().is_visible());

    let manager = page.manager.clone();
    let loading = tokio::spawn(async move { manager.show_loading_overlay("Loading\u{2026}", true, Some(0.5)).await });
    settle().await;

    assert!(screen.core().is_visible());
    assert_eq!(screen.core().z_index(), 3000);
    assert!(panel.core().z_index() < 3000);
    assert_eq!(screen.message(), "Loading\u{2026}");
    assert!(screen.shows_progress_bar());
    assert_eq!(screen.progress(), 0.5);
    assert_eq!(page.manager.active_overlay().as_deref(), Some(LoadingOverlay::DEFAULT_NAME));

    page.manager.hide_loading_overlay();
    settle().await;
    assert!(!screen.core().is_visible());
    assert!(loading.await.unwrap().unwrap().is_ok);
    assert_eq!(page.manager.active_overlay().as_deref(), Some("panel"));
    assert!(page.manager.is_registered(LoadingOverlay::DEFAULT_NAME));

    panel.close(Outcome::cancelled());
    settle().await;
    assert!(panel_task.await.unwrap().unwrap().is_cancel());
}

// =============================================================================
// Manager Tests
// =============================================================================

#[tokio::test]
async fn test_nested_modals_keep_background_until_depth_zero() {
    let page = page();
    let a = basic("a");
    let b = basic("b");

    let task_a = spawn_open_modal(&page.manager, a.clone(), Value::Null);
    settle().await;
    // a plain open is promoted while a modal is up
    let task_b = spawn_open(&page.manager, b.clone(), Value::Null);
    settle().await;

    assert_eq!(page.manager.modal_depth(), 2);
    assert!(b.loaded_as_modal());
    assert!(page.manager.is_modal_background_visible());
    assert!(a.core().is_inactive_modal_mode());
    assert!(a.core().is_inactive_layer_visible());
    assert_eq!(page.manager.active_overlay().as_deref(), Some("b"));

    b.close(Outcome::ok(Value::Null));
    settle().await;
    task_b.await.unwrap().unwrap();
    assert_eq!(page.manager.modal_depth(), 1);
    assert!(page.manager.is_modal_background_visible());
    assert!(a.core().is_front());
    assert!(!a.core().is_inactive_layer_visible());

    a.close(Outcome::ok(Value::Null));
    settle().await;
    task_a.await.unwrap().unwrap();
    assert_eq!(page.manager.modal_depth(), 0);
    assert!(!page.manager.is_modal_background_visible());
}

#[tokio::test]
async fn test_visual_drivers_see_modal_transitions() {
    let (coordinator, _host_inbox) = FrameCoordinator::new(CoordinatorConfig::default());
    let viewport = SimViewport::new(1280.0, 800.0);
    let background = Arc::new(RecordingDriver::new());
    let manager =
        OverlayManager::with_background_driver(viewport, coordinator, ManagerConfig::default(), background.clone());

    let frame_driver = Arc::new(RecordingDriver::new());
    let layer_driver = Arc::new(RecordingDriver::new());
    let a = Arc::new(BasicOverlay::with_core(OverlayCore::with_drivers(
        "a",
        OverlayOptions::default(),
        frame_driver.clone(),
        layer_driver.clone(),
    )));
    let b = basic("b");

    let task_a = spawn_open_modal(&manager, a.clone(), Value::Null);
    settle().await;
    let task_b = spawn_open_modal(&manager, b.clone(), Value::Null);
    settle().await;
    assert_eq!(layer_driver.calls().last(), Some(&DriverCall::Show));

    b.close(Outcome::ok(Value::Null));
    settle().await;
    task_b.await.unwrap().unwrap();
    assert_eq!(layer_driver.calls().last(), Some(&DriverCall::Hide));

    a.close(Outcome::ok(Value::Null));
    settle().await;
    task_a.await.unwrap().unwrap();
    assert_eq!(frame_driver.calls(), vec![DriverCall::Show, DriverCall::Hide]);
    assert_eq!(
        background.calls(),
        vec![DriverCall::Show, DriverCall::Show, DriverCall::Hide]
    );
}

#[tokio::test]
async fn test_viewport_resize_recenters_fixed_overlays() {
    let page = page();
    let options = OverlayOptions {
        size: Some(CssSize::px(200.0, 100.0)),
        fix_position_to_center_of_view_port: true,
        ..Default::default()
    };
    let fixed = Arc::new(BasicOverlay::new("fixed", options.clone()));
    let hidden = Arc::new(BasicOverlay::new("hidden", options));
    let free = basic("free");
    page.manager.register(hidden.clone(), OpenConfig::default()).unwrap();

    let task_fixed = spawn_open(&page.manager, fixed.clone(), Value::Null);
    let task_free = spawn_open(&page.manager, free.clone(), Value::Null);
    settle().await;

    page.viewport.resize(800.0, 600.0);
    page.manager.handle_viewport_resize();
    assert_eq!(fixed.core().position(), Point::new(300.0, 250.0));
    assert_eq!(fixed.core().size_px(), Size::new(200.0, 100.0));
    assert_eq!(free.core().position(), Point::default());

    // hidden overlays center once shown
    let task_hidden = spawn_open(&page.manager, hidden.clone(), Value::Null);
    settle().await;
    assert_eq!(hidden.core().position(), Point::new(300.0, 250.0));

    for overlay in [&fixed, &free, &hidden] {
        overlay.close(Outcome::ok(Value::Null));
    }
    settle().await;
    task_fixed.await.unwrap().unwrap();
    task_free.await.unwrap().unwrap();
    task_hidden.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_focus_returns_to_active_overlay() {
    let page = page();
    let a = basic("a");
    let task = spawn_open(&page.manager, a.clone(), Value::Null);
    settle().await;
    assert_eq!(page.manager.active_overlay().as_deref(), Some("a"));

    a.core().focus(FocusTarget::Content("name".into()));
    a.core().blur();
    assert_eq!(a.core().focused(), None);

    page.manager.return_focus_to_active_overlay();
    assert_eq!(a.core().focused(), Some(FocusTarget::HeadDetector));

    a.close(Outcome::ok(Value::Null));
    settle().await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_activation_moves_focus_to_front_overlay() {
    let page = page();
    let a = basic("a");
    let b = basic("b");

    let task_a = spawn_open(&page.manager, a.clone(), Value::Null);
    settle().await;
    assert_eq!(a.core().focused(), Some(FocusTarget::HeadDetector));

    a.core().blur();
    let task_b = spawn_open(&page.manager, b.clone(), Value::Null);
    settle().await;
    assert_eq!(b.core().focused(), Some(FocusTarget::HeadDetector));
    assert_eq!(a.core().focused(), None);

    b.close(Outcome::ok(Value::Null));
    settle().await;
    task_b.await.unwrap().unwrap();
    assert_eq!(a.core().focused(), Some(FocusTarget::HeadDetector));

    a.close(Outcome::ok(Value::Null));
    settle().await;
    task_a.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_abandoned_modal_open_restores_manager_state() {
    let page = page();
    let a = basic("a");

    let task = spawn_open_modal(&page.manager, a.clone(), Value::Null);
    settle().await;
    assert_eq!(page.manager.modal_depth(), 1);
    assert!(page.manager.status("a").unwrap().is_visible);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    settle().await;

    assert_eq!(page.manager.modal_depth(), 0);
    assert!(!page.manager.is_modal_background_visible());
    let status = page.manager.status("a").unwrap();
    assert!(!status.is_visible);
    assert!(!status.is_modal);
    assert!(status.pending_unmount);
    assert!(!a.core().is_active());
}

#[tokio::test]
async fn test_activate_top_overlay_without_visible_overlays_is_noop() {
    let page = page();
    page.manager.activate_top_overlay();
    assert_eq!(page.manager.active_overlay(), None);
    assert!(!page.manager.wait_screen().core().is_active());
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let page = page();
    let first = basic("dlg");
    page.manager.register(first.clone(), OpenConfig::default()).unwrap();
    // same instance only updates its config
    page.manager.register(first.clone(), OpenConfig::modal()).unwrap();
    assert!(page.manager.open_config("dlg").unwrap().modal);

    let second = basic("dlg");
    let result = page.manager.register(second, OpenConfig::default());
    assert_eq!(result, Err(ManagerError::DuplicateRegistration("dlg".into())));
}

#[tokio::test]
async fn test_send_and_broadcast() {
    let page = page();
    let a = basic("a");
    let b = basic("b");
    let mut rx_a = a.subscribe();
    let mut rx_b = b.subscribe();
    page.manager.register(a.clone(), OpenConfig::default()).unwrap();
    page.manager.register(b.clone(), OpenConfig::default()).unwrap();

    let outcome = page.manager.send_message("b", json!({"n": 1}), Some("a")).unwrap().await;
    assert!(outcome.is_ok);
    let msg = rx_b.recv().await.unwrap();
    assert_eq!(msg.data, json!({"n": 1}));
    assert_eq!(msg.sender.as_deref(), Some("a"));

    let result = page.manager.send_message("ghost", json!(1), None);
    assert!(matches!(result, Err(ManagerError::UnknownDestination(name)) if name == "ghost"));

    let outcomes = page.manager.broadcast_message(json!("all"), Some("a")).await;
    // b plus the wait-screen; the sender is skipped
    assert_eq!(outcomes.len(), 2);
    assert_eq!(rx_b.recv().await.unwrap().data, json!("all"));
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn test_allow_override_shares_the_session() {
    let page = page();
    let options = OverlayOptions {
        allow_to_override_already_opened: true,
        ..Default::default()
    };
    let dlg = Arc::new(BasicOverlay::new("dlg", options));

    let first = spawn_open(&page.manager, dlg.clone(), json!(1));
    settle().await;
    let second = spawn_open(&page.manager, dlg.clone(), json!(2));
    settle().await;
    assert_eq!(dlg.load_count(), 2);

    dlg.close(Outcome::ok(json!("done")));
    settle().await;
    assert_eq!(first.await.unwrap().unwrap(), Outcome::ok(json!("done")));
    assert_eq!(second.await.unwrap().unwrap(), Outcome::ok(json!("done")));
}

#[tokio::test]
async fn test_force_close_before_reopen() {
    let page = page();
    let options = OverlayOptions {
        force_close_before_reopen: true,
        ..Default::default()
    };
    let dlg = Arc::new(BasicOverlay::new("dlg", options));

    let first = spawn_open(&page.manager, dlg.clone(), json!("p1"));
    settle().await;
    let second = spawn_open(&page.manager, dlg.clone(), json!("p2"));
    settle().await;

    assert!(first.await.unwrap().unwrap().is_cancel());
    assert_eq!(dlg.loads(), vec![json!("p1"), json!("p2")]);
    assert!(dlg.core().is_visible());

    dlg.close(Outcome::ok(Value::Null));
    settle().await;
    assert!(second.await.unwrap().unwrap().is_ok);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_unmount_and_reregistration() {
    let page = page();
    let dlg = basic("dlg");

    let task = spawn_open(&page.manager, dlg.clone(), Value::Null);
    settle().await;
    dlg.close(Outcome::ok(Value::Null));
    settle().await;
    task.await.unwrap().unwrap();

    let status = page.manager.status("dlg").unwrap();
    assert!(status.pending_unmount);
    assert!(!status.is_visible);
    assert!(dlg.core().is_mounted());

    // reopening inside the delay cancels the unmount
    let task = spawn_open(&page.manager, dlg.clone(), Value::Null);
    settle().await;
    assert!(!page.manager.status("dlg").unwrap().pending_unmount);
    dlg.close(Outcome::ok(Value::Null));
    settle().await;
    task.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!page.manager.is_registered("dlg"));
    assert_eq!(page.manager.status("dlg"), None);
    assert!(!dlg.core().is_mounted());
}

#[tokio::test(start_paused = true)]
async fn test_permanent_overlay_stays_mounted() {
    let page = page();
    let panel = basic("panel");
    page.manager.mount_permanently(panel.clone()).unwrap();

    let task = spawn_open(&page.manager, panel.clone(), Value::Null);
    settle().await;
    panel.close(Outcome::ok(Value::Null));
    settle().await;
    task.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(page.manager.is_registered("panel"));
    assert!(page.manager.is_permanent("panel"));
    assert!(panel.core().is_mounted());
}

#[tokio::test]
async fn test_auto_close_with_one_shot_cancellation() {
    let page = page();
    let options = OverlayOptions {
        auto_close_on_outfocus: true,
        ..Default::default()
    };
    let menu = Arc::new(BasicOverlay::new("menu", options));
    let task = spawn_open(&page.manager, menu.clone(), Value::Null);
    settle().await;

    // a click inside the menu's own frame arms the one-shot cancel
    let (frame, _inbox) = ready_frame("menu-frame", Rect::default());
    page.coordinator
        .register(frame.clone(), &page.manager, Some(menu.clone() as Arc<dyn Overlay>), None);
    settle().await;
    frame.emit(FrameEvent::MouseDown { x: 1.0, y: 1.0 });
    settle().await;
    assert!(menu.core().is_visible());

    // the next click elsewhere closes it
    page.manager.handle_page_mouse_down();
    settle().await;
    assert!(!menu.core().is_visible());
    assert!(task.await.unwrap().unwrap().is_cancel());
}

#[tokio::test]
async fn test_page_changed_handler_fires_after_navigation() {
    let page = page();
    let seen: Arc<Mutex<Vec<(String, String, Option<String>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    page.manager.set_frame_page_changed_handler(Arc::new(move |url: &str, frame_id: &str, overlay: Option<&str>| {
        sink.lock()
            .unwrap()
            .push((url.to_string(), frame_id.to_string(), overlay.map(str::to_string)));
    }));

    let frame = SimFrame::new("nav", Rect::default());
    let mut inbox = frame.take_inbox().unwrap();
    let frame_id = page.coordinator.register(frame.clone(), &page.manager, None, None);

    frame.navigate("https://app.test/first");
    settle().await;
    assert_eq!(
        page.coordinator.handshake_state(&frame_id),
        Some(HandshakeState::AwaitingClientHandshake)
    );
    assert!(seen.lock().unwrap().is_empty());
    frame.announce_ready();
    settle().await;
    next_command(&mut inbox, Command::DispatchConfig).await;

    // pagehide discards the old readiness
    frame.navigate("https://app.test/next");
    settle().await;
    assert_eq!(
        page.coordinator.handshake_state(&frame_id),
        Some(HandshakeState::AwaitingClientHandshake)
    );

    frame.announce_ready();
    settle().await;
    assert_eq!(page.coordinator.handshake_state(&frame_id), Some(HandshakeState::Ready));
    next_command(&mut inbox, Command::DispatchConfig).await;
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("https://app.test/first".to_string(), frame_id.clone(), None),
            ("https://app.test/next".to_string(), frame_id.clone(), None),
        ]
    );
    assert_eq!(page.coordinator.metrics().handshakes_completed, 2);
}

// =============================================================================
// Coordinator Tests
// =============================================================================

#[tokio::test]
async fn test_host_registration_is_idempotent() {
    let page = page();
    let host = page.coordinator.host_frame_id().unwrap();
    assert_eq!(page.manager.frame_id(), Some(host.as_str()));
    assert_eq!(page.coordinator.register_host(&page.manager), host);
    assert_eq!(page.coordinator.context_count(), 1);
}

#[tokio::test]
async fn test_frame_ids_are_never_reused() {
    let page = page();
    let first = page
        .coordinator
        .register(SimFrame::new("a", Rect::default()), &page.manager, None, None);
    assert!(page.coordinator.unregister(&first));
    assert!(!page.coordinator.contains(&first));

    let second = page
        .coordinator
        .register(SimFrame::new("b", Rect::default()), &page.manager, None, None);
    assert_ne!(first, second);
    assert!(second.parse::<u64>().unwrap() > first.parse::<u64>().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_handshake_times_out_and_stops_polling() {
    let page = page();
    let frame = SimFrame::new("silent", Rect::default());
    let mut inbox = frame.take_inbox().unwrap();
    let frame_id = page.coordinator.register(frame.clone(), &page.manager, None, None);

    let started = tokio::time::Instant::now();
    let result = page.coordinator.handshake(&frame_id).await;
    assert!(matches!(result, Err(FrameError::HandshakeTimeout { .. })));
    assert!(started.elapsed() >= Duration::from_millis(5000));
    assert_eq!(page.coordinator.handshake_state(&frame_id), Some(HandshakeState::AwaitingLoad));
    assert_eq!(page.coordinator.metrics().handshake_timeouts, 1);

    let polls = frame.poll_count();
    assert!(polls >= 100);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(frame.poll_count(), polls, "no probes after the timeout");

    // the next load retries
    frame.set_client_loaded(true);
    frame.finish_loading();
    settle().await;
    assert_eq!(page.coordinator.handshake_state(&frame_id), Some(HandshakeState::Ready));
    let dispatch = next_command(&mut inbox, Command::DispatchConfig).await;
    assert_eq!(dispatch.params_as::<DispatchConfig>().unwrap().frame_id, frame_id);
}

#[tokio::test]
async fn test_protocol_violations() {
    let page = page();
    let (frame, _inbox) = ready_frame("child", Rect::default());
    let frame_id = page.coordinator.register(frame, &page.manager, None, None);

    let unmarked = Envelope {
        command: Some(Command::Open),
        sender: Some(frame_id.clone()),
        ..Default::default()
    };
    assert_eq!(page.coordinator.handle_message(unmarked).unwrap(), Routed::Ignored);
    let reply = Envelope::reply("child1", &Outcome::cancelled());
    assert_eq!(page.coordinator.handle_message(reply).unwrap(), Routed::Ignored);

    let no_command = Envelope {
        is_overlayjs_message: true,
        sender: Some(frame_id.clone()),
        ..Default::default()
    };
    assert!(matches!(
        page.coordinator.handle_message(no_command),
        Err(FrameError::MissingCommand)
    ));

    let no_sender = Envelope {
        is_overlayjs_message: true,
        command: Some(Command::Close),
        ..Default::default()
    };
    assert!(matches!(
        page.coordinator.handle_message(no_sender),
        Err(FrameError::MissingSender(Command::Close))
    ));

    let unknown = Envelope::upstream(Command::Close, "999");
    assert!(matches!(
        page.coordinator.handle_message(unknown),
        Err(FrameError::UnknownSender(id)) if id == "999"
    ));

    let no_holder = Envelope::upstream(Command::Close, &frame_id);
    assert!(matches!(
        page.coordinator.handle_message(no_holder),
        Err(FrameError::NoHolderOverlay(_))
    ));

    let downward = Envelope::upstream(Command::Stop, &frame_id);
    assert!(matches!(
        page.coordinator.handle_message(downward),
        Err(FrameError::UnexpectedCommand(Command::Stop))
    ));

    let metrics = page.coordinator.metrics();
    assert_eq!(metrics.messages_received, 5);
    assert_eq!(metrics.protocol_violations, 5);
}

#[tokio::test]
async fn test_listener_drops_violations_and_keeps_going() {
    let coordinator = FrameCoordinator::spawn(CoordinatorConfig::default());
    let viewport = SimViewport::new(800.0, 600.0);
    let manager = OverlayManager::new(viewport, coordinator.clone(), ManagerConfig::default());
    let host = coordinator.host_window();

    host.post_message(Envelope::upstream(Command::Close, "404"));
    host.post_message(Envelope::upstream(Command::HideLoadingOverlay, manager.frame_id().unwrap()));
    settle().await;

    let metrics = coordinator.metrics();
    assert_eq!(metrics.messages_received, 2);
    assert_eq!(metrics.protocol_violations, 1);
}

#[tokio::test]
async fn test_hide_posted_right_after_show_closes_wait_screen() {
    let coordinator = FrameCoordinator::spawn(CoordinatorConfig::default());
    let viewport = SimViewport::new(800.0, 600.0);
    let manager = OverlayManager::new(viewport, coordinator.clone(), ManagerConfig::default());
    let (frame, mut inbox) = ready_frame("child", Rect::default());
    let frame_id = coordinator.register(frame, &manager, None, None);
    let host = coordinator.host_window();
    settle().await;

    host.post_message(
        Envelope::upstream(Command::ShowLoadingOverlay, &frame_id).with_params(json!({"message": "Saving"})),
    );
    host.post_message(Envelope::upstream(Command::HideLoadingOverlay, &frame_id));
    settle().await;

    let screen = manager.wait_screen().clone();
    assert!(!screen.core().is_visible());
    assert_eq!(screen.core().opens_in_flight(), 0);
    assert!(!manager.status(LoadingOverlay::DEFAULT_NAME).unwrap().is_visible);
    assert_eq!(coordinator.metrics().protocol_violations, 0);
    // closed with an ok outcome, so no stop notice
    while let Ok(envelope) = inbox.try_recv() {
        assert_ne!(envelope.command, Some(Command::Stop));
    }
}

#[tokio::test]
async fn test_close_routed_right_after_open_is_not_lost() {
    let page = page();
    let dlg = basic("dlg");
    page.manager.declare(dlg.clone());
    let (frame, mut inbox) = ready_frame("child", Rect::default());
    let frame_id = page.coordinator.register(frame, &page.manager, None, None);

    page.coordinator
        .handle_message(Envelope::upstream(Command::Open, &frame_id).with_params(json!({"name": "dlg"})))
        .unwrap();
    page.coordinator
        .handle_message(
            Envelope::upstream(Command::Ok, &frame_id)
                .with_target("dlg")
                .with_params(json!("done")),
        )
        .unwrap();

    let reply = next_command(&mut inbox, Command::Return).await;
    assert_eq!(reply.sender.as_deref(), Some("dlg"));
    assert_eq!(reply.params, json!({"isOk": true, "data": "done"}));
    settle().await;
    assert_eq!(dlg.load_count(), 1);
    assert!(!dlg.core().is_visible());
    assert!(!page.manager.status("dlg").unwrap().is_visible);
}

#[tokio::test]
async fn test_translate_nested_frame_coordinates() {
    let page = page();
    let outer = SimFrame::new("outer", Rect::new(100.0, 50.0, 600.0, 400.0));
    let inner = SimFrame::new("inner", Rect::new(10.0, 20.0, 200.0, 100.0));
    let outer_id = page.coordinator.register(outer.clone(), &page.manager, None, None);
    let inner_id = page
        .coordinator
        .register_embedded(inner, &outer_id, &page.manager)
        .unwrap();

    assert_eq!(page.coordinator.parent_of(&inner_id), Some(outer_id.clone()));
    let point = page
        .coordinator
        .translate_to_host(&inner_id, Point::new(5.0, 5.0))
        .unwrap();
    assert_eq!(point, Point::new(115.0, 75.0));

    // rects are read at translation time
    outer.set_rect(Rect::new(300.0, 0.0, 600.0, 400.0));
    assert_eq!(
        page.coordinator.translate_to_host(&inner_id, Point::new(5.0, 5.0)).unwrap(),
        Point::new(315.0, 25.0)
    );

    let host = page.coordinator.host_frame_id().unwrap();
    assert_eq!(
        page.coordinator.translate_to_host(&host, Point::new(5.0, 5.0)).unwrap(),
        Point::new(5.0, 5.0)
    );
    assert!(matches!(
        page.coordinator.translate_to_host("77", Point::default()),
        Err(FrameError::UnknownFrame(_))
    ));
    assert!(page
        .coordinator
        .register_embedded(SimFrame::new("orphan", Rect::default()), "77", &page.manager)
        .is_err());
}

#[tokio::test]
async fn test_load_embedded_iframe_replies_with_frame_id() {
    let page = page();
    let (outer, mut inbox) = ready_frame("outer", Rect::new(100.0, 100.0, 500.0, 500.0));
    outer.add_embedded("report", SimFrame::new("report", Rect::new(20.0, 30.0, 100.0, 100.0)));
    let outer_id = page.coordinator.register(outer.clone(), &page.manager, None, None);

    page.coordinator
        .handle_message(
            Envelope::upstream(Command::LoadEmbeddedIFrame, &outer_id).with_params(json!({"elementId": "report"})),
        )
        .unwrap();

    let reply = next_command(&mut inbox, Command::Return).await;
    assert_eq!(reply.sender.as_deref(), Some("report"));
    let outcome = Outcome::from_value(reply.params);
    assert!(outcome.is_ok);
    let nested_id = outcome.data["frameId"].as_str().unwrap().to_string();
    assert_eq!(page.coordinator.parent_of(&nested_id), Some(outer_id.clone()));
    assert_eq!(
        page.coordinator
            .translate_to_host(&nested_id, Point::new(1.0, 1.0))
            .unwrap(),
        Point::new(121.0, 131.0)
    );

    let missing = page.coordinator.handle_message(
        Envelope::upstream(Command::LoadEmbeddedIFrame, &outer_id).with_params(json!({"elementId": "nope"})),
    );
    assert!(matches!(missing, Err(FrameError::EmbeddedFrameNotFound(id)) if id == "nope"));
}

#[tokio::test]
async fn test_close_commands_from_frame() {
    let page = page();
    let (frame, _inbox) = ready_frame("child", Rect::default());
    let holder = basic("editor");
    let frame_id = page
        .coordinator
        .register(frame, &page.manager, Some(holder.clone() as Arc<dyn Overlay>), None);

    let task = spawn_open(&page.manager, holder.clone(), Value::Null);
    settle().await;
    page.coordinator
        .handle_message(
            Envelope::upstream(Command::Close, &frame_id).with_params(json!({"isOk": false, "data": "nope"})),
        )
        .unwrap();
    settle().await;
    assert_eq!(task.await.unwrap().unwrap(), Outcome::cancel(json!("nope")));

    let task = spawn_open(&page.manager, holder.clone(), Value::Null);
    settle().await;
    page.coordinator
        .handle_message(Envelope::upstream(Command::Cancel, &frame_id).with_params(json!({"why": "user"})))
        .unwrap();
    settle().await;
    assert_eq!(task.await.unwrap().unwrap(), Outcome::cancel(json!({"why": "user"})));
}

#[tokio::test]
async fn test_messages_from_frame() {
    let page = page();
    let (frame, _inbox) = ready_frame("child", Rect::default());
    let holder = basic("editor");
    let frame_id = page
        .coordinator
        .register(frame, &page.manager, Some(holder.clone() as Arc<dyn Overlay>), None);

    let panel = basic("panel");
    let other = basic("other");
    let mut rx_panel = panel.subscribe();
    let mut rx_other = other.subscribe();
    page.manager.register(panel.clone(), OpenConfig::default()).unwrap();
    page.manager.register(other.clone(), OpenConfig::default()).unwrap();

    page.coordinator
        .handle_message(
            Envelope::upstream(Command::SendMessage, &frame_id)
                .with_target("panel")
                .with_params(json!({"saved": true})),
        )
        .unwrap();
    settle().await;
    let msg = rx_panel.try_recv().unwrap();
    assert_eq!(msg.data, json!({"saved": true}));
    assert_eq!(msg.sender.as_deref(), Some("editor"));
    assert!(rx_other.try_recv().is_err());

    page.coordinator
        .handle_message(Envelope::upstream(Command::BroadcastMessage, &frame_id).with_params(json!("hello")))
        .unwrap();
    settle().await;
    assert_eq!(rx_panel.try_recv().unwrap().data, json!("hello"));
    assert_eq!(rx_other.try_recv().unwrap().data, json!("hello"));

    let ghost = page
        .coordinator
        .handle_message(Envelope::upstream(Command::SendMessage, &frame_id).with_target("ghost"));
    assert!(matches!(
        ghost,
        Err(FrameError::Manager(ManagerError::UnknownDestination(name))) if name == "ghost"
    ));
}

#[tokio::test]
async fn test_wait_screen_from_frame_and_stop_notice() {
    let page = page();
    let (frame, mut inbox) = ready_frame("child", Rect::default());
    let frame_id = page.coordinator.register(frame, &page.manager, None, None);
    let screen = page.manager.wait_screen().clone();

    page.coordinator
        .handle_message(
            Envelope::upstream(Command::ShowLoadingOverlay, &frame_id)
                .with_params(json!({"message": "Saving", "progressRatio": 3.0})),
        )
        .unwrap();
    settle().await;
    assert!(screen.core().is_visible());
    assert_eq!(screen.message(), "Saving");
    assert_eq!(screen.progress(), 1.0);

    page.coordinator
        .handle_message(Envelope::upstream(Command::HideLoadingOverlay, &frame_id))
        .unwrap();
    settle().await;
    assert!(!screen.core().is_visible());

    page.coordinator
        .handle_message(Envelope::upstream(Command::ShowLoadingOverlay, &frame_id))
        .unwrap();
    settle().await;
    screen.force_close();
    settle().await;

    let stop = next_command(&mut inbox, Command::Stop).await;
    assert!(stop.to_downstream);
    // only the cancelled wait produced a stop notice
    assert!(inbox.try_recv().is_err());
}

// =============================================================================
// Window Tests
// =============================================================================

#[tokio::test]
async fn test_window_header_close_before_ready_force_closes() {
    let page = page();
    let window = IFrameWindow::in_viewport(
        "win",
        "https://app.test/form",
        page.viewport.as_ref(),
        WindowOptions::default(),
    );
    let frame = page.viewport.created_frames()[0].clone();
    let mut inbox = frame.take_inbox().unwrap();

    let task = spawn_open(&page.manager, window.clone(), Value::Null);
    settle().await;
    assert!(window.core().is_visible());
    assert_eq!(frame.navigations(), vec!["https://app.test/form".to_string()]);

    window.on_header_close_button_click();
    settle().await;
    assert!(task.await.unwrap().unwrap().is_cancel());
    assert_eq!(frame.navigations().last().map(String::as_str), Some("about:blank"));
    assert!(inbox.try_recv().is_err());
}

#[tokio::test]
async fn test_window_lifecycle_with_ready_client() {
    let page = page();
    let window = IFrameWindow::in_viewport(
        "win",
        "https://app.test/form",
        page.viewport.as_ref(),
        WindowOptions::default(),
    );
    let frame = page.viewport.created_frames()[0].clone();
    let mut inbox = frame.take_inbox().unwrap();

    let task = spawn_open(&page.manager, window.clone(), json!({"id": 7}));
    settle().await;
    let frame_id = window.frame_id().unwrap();
    assert_eq!(
        page.coordinator.handshake_state(&frame_id),
        Some(HandshakeState::AwaitingClientHandshake)
    );
    assert!(!page.coordinator.is_client_ready(&frame_id));

    frame.set_title("Order form");
    frame.announce_ready();
    settle().await;
    assert!(page.coordinator.is_client_ready(&frame_id));
    assert_eq!(window.caption(), "Order form");
    let dispatch = next_command(&mut inbox, Command::DispatchConfig).await;
    let config: DispatchConfig = dispatch.params_as().unwrap();
    assert_eq!(config.frame_id, frame_id);
    assert_eq!(config.load_params, json!({"id": 7}));

    page.coordinator
        .handle_message(
            Envelope::upstream(Command::ChangeWindowCaption, &frame_id).with_params(json!({"caption": "Step 2"})),
        )
        .unwrap();
    assert_eq!(window.caption(), "Step 2");

    let delivered = page
        .manager
        .send_message("win", json!({"ping": 1}), Some("panel"))
        .unwrap()
        .await;
    assert!(delivered.is_ok);
    let received = next_command(&mut inbox, Command::ReceiveMessage).await;
    assert_eq!(received.sender.as_deref(), Some("panel"));
    assert_eq!(received.params, json!({"ping": 1}));

    // a ready client is asked to confirm
    window.on_header_close_button_click();
    settle().await;
    next_command(&mut inbox, Command::HeaderCloseButtonClicked).await;
    assert!(window.core().is_visible());

    page.coordinator
        .handle_message(Envelope::upstream(Command::Close, &frame_id))
        .unwrap();
    settle().await;
    assert_eq!(task.await.unwrap().unwrap(), Outcome::cancelled());
    assert!(!window.is_content_interactive());
    assert_eq!(frame.navigations().last().map(String::as_str), Some("about:blank"));
}

#[tokio::test]
async fn test_window_drag_follows_translated_pointer() {
    let page = page();
    let window = IFrameWindow::in_viewport(
        "win",
        "https://app.test/",
        page.viewport.as_ref(),
        WindowOptions::default(),
    );
    let task = spawn_open(&page.manager, window.clone(), Value::Null);
    settle().await;

    let pointer = SimFrame::new("pointer", Rect::new(100.0, 50.0, 400.0, 300.0));
    page.coordinator.register(pointer.clone(), &page.manager, None, None);
    settle().await;

    pointer.emit(FrameEvent::MouseMove { x: 10.0, y: 10.0 });
    settle().await;
    let before = window.core().position();

    window.on_header_mouse_down();
    assert!(window.is_dragging());
    assert!(!page.manager.contents_selectable());

    pointer.emit(FrameEvent::MouseMove { x: 20.0, y: 15.0 });
    settle().await;
    assert_eq!(window.core().position(), before.offset(10.0, 5.0));

    pointer.emit(FrameEvent::MouseUp { x: 20.0, y: 15.0 });
    settle().await;
    assert!(!window.is_dragging());
    assert!(page.manager.contents_selectable());

    pointer.emit(FrameEvent::MouseMove { x: 40.0, y: 40.0 });
    settle().await;
    assert_eq!(window.core().position(), before.offset(10.0, 5.0));

    window.close(Outcome::cancelled());
    settle().await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_window_resize_from_corner_handle() {
    let page = page();
    let options = WindowOptions {
        overlay: OverlayOptions {
            size: Some(CssSize::px(400.0, 300.0)),
            ..Default::default()
        },
        ..Default::default()
    };
    let window = IFrameWindow::in_viewport("win", "https://app.test/", page.viewport.as_ref(), options);
    let task = spawn_open(&page.manager, window.clone(), Value::Null);
    settle().await;

    let pointer = SimFrame::new("pointer", Rect::new(100.0, 50.0, 400.0, 300.0));
    page.coordinator.register(pointer.clone(), &page.manager, None, None);
    settle().await;

    pointer.emit(FrameEvent::MouseMove { x: 10.0, y: 10.0 });
    settle().await;
    let position = window.core().position();
    let size = window.core().size_px();

    assert!(window.begin_resize(ResizeHandle::BottomRight, 110.0, 60.0));
    assert!(window.is_resizing());
    assert!(!page.manager.contents_selectable());

    pointer.emit(FrameEvent::MouseMove { x: 20.0, y: 15.0 });
    settle().await;
    assert_eq!(window.core().position(), position);
    assert_eq!(window.core().size_px(), Size::new(size.width + 10.0, size.height + 5.0));

    pointer.emit(FrameEvent::MouseUp { x: 20.0, y: 15.0 });
    settle().await;
    assert!(!window.is_resizing());
    assert!(page.manager.contents_selectable());

    window.close(Outcome::cancelled());
    settle().await;
    task.await.unwrap().unwrap();

    let fixed = IFrameWindow::in_viewport(
        "fixed",
        "https://app.test/",
        page.viewport.as_ref(),
        WindowOptions {
            resizable: false,
            ..Default::default()
        },
    );
    assert!(!fixed.window_options().resizable);
    assert!(!fixed.begin_resize(ResizeHandle::Left, 0.0, 0.0));
}

#[tokio::test]
async fn test_link_windows_are_pooled_by_name() {
    let page = page();
    let (frame, mut inbox) = ready_frame("launcher", Rect::default());
    let frame_id = page
        .coordinator
        .register(frame, &page.manager, Some(basic("launcher") as Arc<dyn Overlay>), None);

    let open_link = |url: &str| {
        Envelope::upstream(Command::OpenLinkInNewWindow, &frame_id).with_params(json!({"name": "docs", "url": url}))
    };

    page.coordinator.handle_message(open_link("https://docs.test/a")).unwrap();
    settle().await;
    assert_eq!(page.coordinator.pooled_window_count(), 1);
    let docs = page.manager.overlay("docs").unwrap();
    assert!(docs.core().is_visible());

    docs.close(Outcome::ok(json!("read")));
    settle().await;
    let reply = next_command(&mut inbox, Command::Return).await;
    assert_eq!(reply.sender.as_deref(), Some("docs"));
    assert_eq!(reply.params, json!({"isOk": true, "data": "read"}));

    page.coordinator.handle_message(open_link("https://docs.test/b")).unwrap();
    settle().await;
    assert_eq!(page.coordinator.pooled_window_count(), 1);
    assert_eq!(page.viewport.created_frames().len(), 1);
    let link_frame = page.viewport.created_frames()[0].clone();
    assert_eq!(
        link_frame.navigations(),
        vec![
            "https://docs.test/a".to_string(),
            "about:blank".to_string(),
            "https://docs.test/b".to_string()
        ]
    );

    page.manager.overlay("docs").unwrap().close(Outcome::cancelled());
    settle().await;
    next_command(&mut inbox, Command::Return).await;
}
