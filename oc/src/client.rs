//! Client counterpart running inside an embedded document

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use overlayhub::manager::OpenConfig;
use overlayhub::protocol::OpenParams;
use overlayhub::{Command, DispatchConfig, Envelope, Outcome, PendingTable, WindowInbox, WindowPort};

use crate::error::ClientError;

/// Receives the load params delivered with `dispatchConfig`
pub type BootstrapHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Asked before the window closes from its header; return false to veto
pub type CloseRequestHandler = Arc<dyn Fn() -> bool + Send + Sync>;

/// Receives `sendMessage`/`broadcastMessage` payloads and their sender name
pub type MessageHandler = Arc<dyn Fn(Value, Option<String>) + Send + Sync>;

/// Called when the ancestor cancels the wait-screen this document raised
pub type StopHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Handlers {
    bootstrap: Option<BootstrapHandler>,
    close_request: Option<CloseRequestHandler>,
    message: Option<MessageHandler>,
    stop: Option<StopHandler>,
}

struct ClientState {
    frame_id: Option<String>,
    load_params: Value,
    buffered: Vec<Envelope>,
    returns: PendingTable<Outcome>,
    handlers: Handlers,
}

pub struct OverlayClient {
    parent: WindowPort,
    loaded: Arc<AtomicBool>,
    state: Mutex<ClientState>,
    weak_self: Weak<OverlayClient>,
}

impl OverlayClient {
    /// Client posting upward into `parent`
    ///
    /// `loaded` is the flag the coordinator probes while it waits for this
    /// document; it is raised once [`OverlayClient::listen`] runs.
    pub fn new(parent: WindowPort, loaded: Arc<AtomicBool>) -> Arc<Self> {
        debug!(parent = %parent.label(), "OverlayClient::new: called");
        Arc::new_cyclic(|weak_self| Self {
            parent,
            loaded,
            state: Mutex::new(ClientState {
                frame_id: None,
                load_params: Value::Null,
                buffered: Vec::new(),
                returns: PendingTable::new(),
                handlers: Handlers::default(),
            }),
            weak_self: weak_self.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frame-id assigned by the coordinator, once the handshake is done
    pub fn frame_id(&self) -> Option<String> {
        self.lock().frame_id.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().frame_id.is_some()
    }

    /// Load params from the latest `dispatchConfig`
    pub fn load_params(&self) -> Value {
        self.lock().load_params.clone()
    }

    /// Number of calls waiting for the frame-id
    pub fn buffered_count(&self) -> usize {
        self.lock().buffered.len()
    }

    // --- callbacks ---

    pub fn on_bootstrap(&self, handler: BootstrapHandler) {
        self.lock().handlers.bootstrap = Some(handler);
    }

    pub fn on_close_request(&self, handler: CloseRequestHandler) {
        self.lock().handlers.close_request = Some(handler);
    }

    pub fn on_receive_message(&self, handler: MessageHandler) {
        self.lock().handlers.message = Some(handler);
    }

    pub fn on_stop(&self, handler: StopHandler) {
        self.lock().handlers.stop = Some(handler);
    }

    // --- inbound ---

    /// Process downstream envelopes from this document's inbox
    ///
    /// Marks the client loaded first, so the coordinator's readiness probe
    /// succeeds from here on. Pending requests fail once the inbox closes.
    pub fn listen(&self, mut inbox: WindowInbox) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        self.loaded.store(true, Ordering::SeqCst);
        info!(parent = %self.parent.label(), "Client loaded");
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let Some(client) = weak.upgrade() else {
                    break;
                };
                client.handle(envelope);
            }
            if let Some(client) = weak.upgrade() {
                client.lock().returns.clear();
            }
            debug!("OverlayClient::listen: inbox closed");
        })
    }

    /// Handle one envelope delivered to this document
    pub fn handle(&self, envelope: Envelope) {
        if !envelope.is_overlayjs_message {
            return;
        }
        let Some(command) = envelope.command else {
            warn!("Envelope without command ignored");
            return;
        };
        debug!(?command, sender = ?envelope.sender, "OverlayClient::handle: called");

        match command {
            Command::DispatchConfig => match envelope.params_as::<DispatchConfig>() {
                Ok(config) => self.connect(config),
                Err(e) => warn!(error = %e, "Malformed dispatchConfig"),
            },
            Command::Return => {
                let Some(name) = envelope.sender else {
                    warn!("Return without overlay name ignored");
                    return;
                };
                let outcome = Outcome::from_value(envelope.params);
                if !self.lock().returns.resolve(&name, outcome) {
                    debug!(%name, "Nobody waiting for return");
                }
            }
            Command::HeaderCloseButtonClicked => {
                let handler = self.lock().handlers.close_request.clone();
                let allowed = handler.is_none_or(|handler| handler());
                if allowed {
                    if let Err(e) = self.cancel_and_close() {
                        warn!(error = %e, "Close request not delivered");
                    }
                } else {
                    info!("Close request vetoed");
                }
            }
            Command::ReceiveMessage => {
                let handler = self.lock().handlers.message.clone();
                if let Some(handler) = handler {
                    handler(envelope.params, envelope.sender);
                }
            }
            Command::Stop => {
                let handler = self.lock().handlers.stop.clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
            other => debug!(command = ?other, "Upward command ignored by client"),
        }
    }

    /// Adopt the frame-id and replay buffered calls in order
    fn connect(&self, config: DispatchConfig) {
        info!(frame_id = %config.frame_id, "Client received frame-id");
        let bootstrap = {
            let mut state = self.lock();
            state.frame_id = Some(config.frame_id.clone());
            state.load_params = config.load_params.clone();
            for envelope in state.buffered.drain(..) {
                self.parent.post_message(envelope.with_sender(config.frame_id.clone()));
            }
            state.handlers.bootstrap.clone()
        };
        if let Some(bootstrap) = bootstrap {
            bootstrap(&config.load_params);
        }
    }

    // --- outbound ---

    /// Post upward now, or buffer until the frame-id is known
    fn post(&self, envelope: Envelope) -> Result<(), ClientError> {
        let mut state = self.lock();
        let Some(frame_id) = state.frame_id.clone() else {
            debug!(command = ?envelope.command, "Buffered until frame-id arrives");
            state.buffered.push(envelope);
            return Ok(());
        };
        if self.parent.post_message(envelope.with_sender(frame_id)) {
            Ok(())
        } else {
            Err(ClientError::Disconnected)
        }
    }

    /// Post a request answered by a `return` correlated on `name`
    async fn request(&self, name: &str, envelope: Envelope) -> Result<Outcome, ClientError> {
        let reply: oneshot::Receiver<Outcome> = self.lock().returns.register(name);
        self.post(envelope)?;
        let outcome = reply.await.map_err(|_| ClientError::Disconnected)?;
        if outcome.is_ok {
            Ok(outcome)
        } else {
            Err(ClientError::Rejected(outcome))
        }
    }

    fn open_envelope(command: Command, name: &str, params: OpenParams) -> Envelope {
        upward(command)
            .with_target(name)
            .with_params(serde_json::to_value(params).unwrap_or(Value::Null))
    }

    /// Open the overlay `name` in an ancestor document and wait for it to close
    ///
    /// A cancelled session is returned as [`ClientError::Rejected`].
    pub async fn open(&self, name: &str, load_params: Value, config: Option<OpenConfig>) -> Result<Outcome, ClientError> {
        debug!(%name, "OverlayClient::open: called");
        let params = OpenParams {
            name: Some(name.to_string()),
            load_params,
            open_config: config,
            url: None,
        };
        self.request(name, Self::open_envelope(Command::Open, name, params)).await
    }

    pub async fn open_as_modal(
        &self,
        name: &str,
        load_params: Value,
        config: Option<OpenConfig>,
    ) -> Result<Outcome, ClientError> {
        debug!(%name, "OverlayClient::open_as_modal: called");
        let params = OpenParams {
            name: Some(name.to_string()),
            load_params,
            open_config: config,
            url: None,
        };
        self.request(name, Self::open_envelope(Command::OpenAsModal, name, params))
            .await
    }

    /// Show `url` in the pooled link window `name`
    pub async fn open_link_in_new_window(
        &self,
        name: &str,
        url: &str,
        config: Option<OpenConfig>,
    ) -> Result<Outcome, ClientError> {
        self.open_link(Command::OpenLinkInNewWindow, name, url, config).await
    }

    pub async fn open_link_in_new_modal_window(
        &self,
        name: &str,
        url: &str,
        config: Option<OpenConfig>,
    ) -> Result<Outcome, ClientError> {
        self.open_link(Command::OpenLinkInNewModalWindow, name, url, config).await
    }

    async fn open_link(
        &self,
        command: Command,
        name: &str,
        url: &str,
        config: Option<OpenConfig>,
    ) -> Result<Outcome, ClientError> {
        debug!(%name, %url, ?command, "OverlayClient::open_link: called");
        let params = OpenParams {
            name: Some(name.to_string()),
            load_params: Value::Null,
            open_config: config,
            url: Some(url.to_string()),
        };
        self.request(name, Self::open_envelope(command, name, params)).await
    }

    /// Ask the ancestor to register the nested frame `element_id`
    ///
    /// Returns the nested frame's frame-id.
    pub async fn load_embedded_iframe(&self, element_id: &str) -> Result<String, ClientError> {
        debug!(%element_id, "OverlayClient::load_embedded_iframe: called");
        let envelope = upward(Command::LoadEmbeddedIFrame).with_params(json!({ "elementId": element_id }));
        let outcome = self.request(element_id, envelope).await?;
        match outcome.data.get("frameId").and_then(Value::as_str) {
            Some(frame_id) => Ok(frame_id.to_string()),
            None => Err(ClientError::Rejected(outcome)),
        }
    }

    /// Close the holder overlay with a success carrying `data`
    pub fn return_and_close(&self, data: Value) -> Result<(), ClientError> {
        debug!("OverlayClient::return_and_close: called");
        self.post(upward(Command::Ok).with_params(data))
    }

    /// Close the holder overlay with a cancellation
    pub fn cancel_and_close(&self) -> Result<(), ClientError> {
        debug!("OverlayClient::cancel_and_close: called");
        self.post(upward(Command::Cancel))
    }

    /// Close the holder overlay with an explicit outcome
    pub fn close(&self, outcome: &Outcome) -> Result<(), ClientError> {
        self.post(upward(Command::Close).with_params(outcome.to_value()))
    }

    pub fn change_window_caption(&self, caption: &str) -> Result<(), ClientError> {
        self.post(upward(Command::ChangeWindowCaption).with_params(json!({ "caption": caption })))
    }

    pub fn send_message(&self, destination: &str, data: Value) -> Result<(), ClientError> {
        debug!(%destination, "OverlayClient::send_message: called");
        self.post(
            upward(Command::SendMessage)
                .with_target(destination)
                .with_params(data),
        )
    }

    pub fn broadcast_message(&self, data: Value) -> Result<(), ClientError> {
        self.post(upward(Command::BroadcastMessage).with_params(data))
    }

    /// Raise the ancestor's wait-screen; a `stop` arrives if it is cancelled
    pub fn show_loading_overlay(
        &self,
        message: &str,
        show_progress_bar: bool,
        progress_ratio: Option<f64>,
    ) -> Result<(), ClientError> {
        debug!(%message, "OverlayClient::show_loading_overlay: called");
        self.post(upward(Command::ShowLoadingOverlay).with_params(json!({
            "message": message,
            "showProgressBar": show_progress_bar,
            "progressRatio": progress_ratio,
        })))
    }

    pub fn hide_loading_overlay(&self) -> Result<(), ClientError> {
        self.post(upward(Command::HideLoadingOverlay))
    }
}

impl std::fmt::Debug for OverlayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("OverlayClient")
            .field("parent", &self.parent.label())
            .field("frame_id", &state.frame_id)
            .field("buffered", &state.buffered.len())
            .finish()
    }
}

/// Marked upward envelope; the sender is filled in when posted
fn upward(command: Command) -> Envelope {
    Envelope {
        is_overlayjs_message: true,
        command: Some(command),
        ..Default::default()
    }
}
