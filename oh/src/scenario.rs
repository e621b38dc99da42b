//! Scripted in-memory page runs used by `oh simulate`
//!
//! Each scenario builds a fresh coordinator, manager and simulated frames,
//! plays the embedded documents' side of the protocol by hand and records
//! every envelope crossing a window boundary.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, eyre};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::Config;
use crate::frame::{FrameCoordinator, Routed};
use crate::geometry::Rect;
use crate::manager::{OpenConfig, OverlayManager};
use crate::outcome::Outcome;
use crate::overlay::{BasicOverlay, Overlay, OverlayOptions};
use crate::protocol::{Command, Envelope, WindowInbox};
use crate::sim::{SimFrame, SimViewport};

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

/// Scripted page run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// A child frame opens its holder overlay and gets the result back
    OpenFromFrame,
    /// Two opens of one overlay run one after the other
    ConcurrentOpen,
    /// Opening an overlay that is already modal is refused
    ModalReentry,
    /// The shared wait-screen goes up in the foreground band and comes down
    WaitScreen,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::OpenFromFrame,
        Scenario::ConcurrentOpen,
        Scenario::ModalReentry,
        Scenario::WaitScreen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::OpenFromFrame => "open-from-frame",
            Self::ConcurrentOpen => "concurrent-open",
            Self::ModalReentry => "modal-reentry",
            Self::WaitScreen => "wait-screen",
        }
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "Scenario::from_str: called");
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s.to_lowercase())
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|scenario| scenario.name()).collect();
                format!("Unknown scenario: {}. Use one of: {}", s, names.join(", "))
            })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceKind {
    Upward,
    Downward,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceLine {
    pub kind: TraceKind,
    /// Window the envelope was posted into, empty for events
    pub window: String,
    pub text: String,
}

/// Ordered record of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    pub scenario: String,
    pub lines: Vec<TraceLine>,
}

impl Trace {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario: scenario.name().to_string(),
            lines: Vec::new(),
        }
    }

    fn upward(&mut self, envelope: &Envelope) {
        self.push(TraceKind::Upward, "host", envelope.to_json());
    }

    fn downward(&mut self, window: &str, envelope: &Envelope) {
        self.push(TraceKind::Downward, window, envelope.to_json());
    }

    fn event(&mut self, text: impl Into<String>) {
        self.push(TraceKind::Event, "", text.into());
    }

    fn push(&mut self, kind: TraceKind, window: &str, text: String) {
        self.lines.push(TraceLine {
            kind,
            window: window.to_string(),
            text,
        });
    }

    pub fn count(&self, kind: TraceKind) -> usize {
        self.lines.iter().filter(|line| line.kind == kind).count()
    }
}

/// Host document with one manager
struct Page {
    coordinator: Arc<FrameCoordinator>,
    manager: Arc<OverlayManager>,
    host_inbox: WindowInbox,
}

impl Page {
    fn new(config: &Config) -> Self {
        let (coordinator, host_inbox) = FrameCoordinator::new(config.coordinator.clone());
        let viewport = SimViewport::new(1280.0, 800.0);
        let manager = OverlayManager::new(viewport, coordinator.clone(), config.manager.clone());
        Self {
            coordinator,
            manager,
            host_inbox,
        }
    }

    /// Deliver an upward envelope to the coordinator
    fn send(&self, trace: &mut Trace, envelope: Envelope) -> Result<Routed> {
        trace.upward(&envelope);
        Ok(self.coordinator.handle_message(envelope)?)
    }

    fn drain_host(&mut self, trace: &mut Trace) {
        while let Ok(envelope) = self.host_inbox.try_recv() {
            trace.downward("host", &envelope);
        }
    }
}

async fn recv(inbox: &mut WindowInbox, window: &str) -> Result<Envelope> {
    tokio::time::timeout(STEP_TIMEOUT, inbox.recv())
        .await
        .map_err(|_| eyre!("Nothing arrived at {} in time", window))?
        .ok_or_else(|| eyre!("Window {} closed", window))
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) -> Result<()> {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    tokio::time::timeout(STEP_TIMEOUT, poll)
        .await
        .map_err(|_| eyre!("Timed out waiting for {}", what))
}

/// Run one scenario against a fresh page
pub async fn run(scenario: Scenario, config: &Config) -> Result<Trace> {
    info!(%scenario, "Running scenario");
    let mut trace = Trace::new(scenario);
    let mut page = Page::new(config);
    page.drain_host(&mut trace);

    match scenario {
        Scenario::OpenFromFrame => open_from_frame(&page, &mut trace).await?,
        Scenario::ConcurrentOpen => concurrent_open(&page, &mut trace).await?,
        Scenario::ModalReentry => modal_reentry(&page, &mut trace).await?,
        Scenario::WaitScreen => wait_screen(&page, &mut trace).await?,
    }

    page.drain_host(&mut trace);
    Ok(trace)
}

async fn open_from_frame(page: &Page, trace: &mut Trace) -> Result<()> {
    let frame = SimFrame::loaded("child1", Rect::new(40.0, 30.0, 640.0, 480.0));
    let mut child = frame.take_inbox().ok_or_else(|| eyre!("Child inbox already taken"))?;
    frame.set_client_loaded(true);

    let holder = Arc::new(BasicOverlay::new("child1", OverlayOptions::default()));
    let holder_dyn: Arc<dyn Overlay> = holder.clone();
    let frame_id = page.coordinator.register(frame.clone(), &page.manager, Some(holder_dyn), None);
    trace.event(format!("registered child frame {} held by child1", frame_id));

    let dispatch = recv(&mut child, "child1").await?;
    trace.downward("child1", &dispatch);

    page.send(
        trace,
        Envelope::upstream(Command::Open, &frame_id)
            .with_target("child1")
            .with_params(json!({ "name": "child1" })),
    )?;
    wait_until("child1 to show", || holder.core().is_visible()).await?;
    trace.event("child1 is visible");

    page.send(
        trace,
        Envelope::upstream(Command::Ok, &frame_id).with_params(json!({ "answer": 42 })),
    )?;
    let reply = recv(&mut child, "child1").await?;
    trace.downward("child1", &reply);
    Ok(())
}

async fn concurrent_open(page: &Page, trace: &mut Trace) -> Result<()> {
    let dlg = Arc::new(BasicOverlay::new("dlg", OverlayOptions::default()));
    let spawn_open = |params: Value| {
        let manager = page.manager.clone();
        let overlay: Arc<dyn Overlay> = dlg.clone();
        tokio::spawn(async move { manager.open(overlay, OpenConfig::default(), params).await })
    };

    let first = spawn_open(json!("p1"));
    wait_until("first load", || dlg.load_count() == 1).await?;
    let second = spawn_open(json!("p2"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    trace.event(format!("loads while first is open: {}", dlg.load_count()));

    dlg.close(Outcome::ok(json!("first")));
    wait_until("second load", || dlg.load_count() == 2).await?;
    trace.event("second load started after first close");
    dlg.close(Outcome::ok(json!("second")));

    let first = first.await??;
    let second = second.await??;
    trace.event(format!("results: {} then {}", first.to_value(), second.to_value()));
    trace.event(format!("load order: {}", Value::Array(dlg.loads())));
    Ok(())
}

async fn modal_reentry(page: &Page, trace: &mut Trace) -> Result<()> {
    let x = Arc::new(BasicOverlay::new("overlayX", OverlayOptions::default()));
    let overlay: Arc<dyn Overlay> = x.clone();

    let manager = page.manager.clone();
    let modal_overlay = overlay.clone();
    let first =
        tokio::spawn(async move { manager.open_as_modal(modal_overlay, OpenConfig::default(), Value::Null).await });
    wait_until("overlayX to show", || x.core().is_visible()).await?;
    trace.event(format!(
        "modal depth {}, background visible {}",
        page.manager.modal_depth(),
        page.manager.is_modal_background_visible()
    ));

    let again = page
        .manager
        .open_as_modal(overlay, OpenConfig::default(), Value::Null)
        .await?;
    trace.event(format!("reentrant open resolved {}", again.to_value()));
    trace.event(format!("loads: {}", x.load_count()));

    x.close(Outcome::ok(Value::Null));
    first.await??;
    trace.event(format!(
        "modal depth {}, background visible {}",
        page.manager.modal_depth(),
        page.manager.is_modal_background_visible()
    ));
    Ok(())
}

async fn wait_screen(page: &Page, trace: &mut Trace) -> Result<()> {
    let panel = Arc::new(BasicOverlay::new("panel", OverlayOptions::default()));
    let manager = page.manager.clone();
    let overlay: Arc<dyn Overlay> = panel.clone();
    let panel_task = tokio::spawn(async move { manager.open(overlay, OpenConfig::default(), Value::Null).await });
    wait_until("panel to show", || panel.core().is_visible()).await?;

    let screen = page.manager.wait_screen().clone();
    trace.event(format!("wait-screen visible {}", screen.core().is_visible()));

    let manager = page.manager.clone();
    let loading =
        tokio::spawn(async move { manager.show_loading_overlay("Loading\u{2026}", true, Some(0.5)).await });
    wait_until("wait-screen to show", || screen.core().is_visible()).await?;
    trace.event(format!(
        "wait-screen visible {} at z {}, panel at z {}",
        screen.core().is_visible(),
        screen.core().z_index(),
        panel.core().z_index()
    ));

    page.manager.hide_loading_overlay();
    loading.await??;
    trace.event(format!("wait-screen visible {}", screen.core().is_visible()));

    panel.close(Outcome::cancelled());
    panel_task.await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert!("nope".parse::<Scenario>().is_err());
    }

    #[tokio::test]
    async fn test_open_from_frame_trace() {
        let trace = run(Scenario::OpenFromFrame, &Config::default()).await.unwrap();
        let last = trace.lines.last().unwrap();
        assert_eq!(last.kind, TraceKind::Downward);
        assert_eq!(last.window, "child1");
        let reply = Envelope::from_json(&last.text).unwrap();
        assert_eq!(reply.command, Some(Command::Return));
        assert_eq!(reply.sender.as_deref(), Some("child1"));
        assert_eq!(reply.params, json!({"isOk": true, "data": {"answer": 42}}));
    }

    #[tokio::test]
    async fn test_concurrent_open_trace() {
        let trace = run(Scenario::ConcurrentOpen, &Config::default()).await.unwrap();
        let texts: Vec<_> = trace.lines.iter().map(|line| line.text.as_str()).collect();
        assert!(texts.contains(&"loads while first is open: 1"));
        assert!(texts.contains(&r#"load order: ["p1","p2"]"#));
    }

    #[tokio::test]
    async fn test_wait_screen_trace() {
        let trace = run(Scenario::WaitScreen, &Config::default()).await.unwrap();
        let texts: Vec<_> = trace.lines.iter().map(|line| line.text.as_str()).collect();
        assert!(texts.iter().any(|t| t.starts_with("wait-screen visible true at z 3000,")));
        assert_eq!(texts.iter().filter(|t| **t == "wait-screen visible false").count(), 2);
    }
}
