//! Routing of upward protocol messages

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::FrameCoordinator;
use crate::frame::error::FrameError;
use crate::manager::{ManagerError, OpenConfig, OverlayManager};
use crate::outcome::Outcome;
use crate::overlay::Overlay;
use crate::protocol::{
    CaptionParams, Command, EmbeddedFrameParams, Envelope, OpenParams, WaitScreenParams, WindowPort,
};

/// What the coordinator did with an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Not protocol traffic, or a reply travelling downward
    Ignored,
    Dispatched(Command),
}

/// Everything the coordinator knows about the sending document
struct Origin {
    frame_id: String,
    manager: Arc<OverlayManager>,
    holder: Option<Arc<dyn Overlay>>,
    reply_window: Option<WindowPort>,
}

impl Origin {
    fn holder(&self) -> Result<Arc<dyn Overlay>, FrameError> {
        self.holder
            .clone()
            .ok_or_else(|| FrameError::NoHolderOverlay(self.frame_id.clone()))
    }

    fn holder_name(&self) -> Option<String> {
        self.holder.as_ref().map(|holder| holder.name().to_string())
    }

    /// Overlay addressed by name, falling back to the holder
    fn resolve_overlay(&self, name: &str) -> Result<Arc<dyn Overlay>, FrameError> {
        self.manager
            .overlay(name)
            .or_else(|| self.holder.clone().filter(|holder| holder.name() == name))
            .ok_or_else(|| FrameError::Manager(ManagerError::UnknownOverlay(name.to_string())))
    }
}

fn decode<T: DeserializeOwned>(envelope: &Envelope, command: Command) -> Result<T, FrameError> {
    envelope
        .params_as()
        .map_err(|source| FrameError::InvalidParams { command, source })
}

impl FrameCoordinator {
    /// Handle one message arriving at the host window
    ///
    /// Unmarked and downstream envelopes are ignored. Anything else must name
    /// a command and a registered sender; violations are errors.
    pub fn handle_message(&self, envelope: Envelope) -> Result<Routed, FrameError> {
        if !envelope.is_overlayjs_message || envelope.to_downstream {
            return Ok(Routed::Ignored);
        }
        self.lock().metrics.messages_received += 1;

        let result = self.route(envelope);
        if result.is_err() {
            self.lock().metrics.protocol_violations += 1;
        }
        result
    }

    fn route(&self, envelope: Envelope) -> Result<Routed, FrameError> {
        let command = envelope.command.ok_or(FrameError::MissingCommand)?;
        if command.is_downstream() {
            return Err(FrameError::UnexpectedCommand(command));
        }
        let frame_id = envelope.sender.clone().ok_or(FrameError::MissingSender(command))?;
        debug!(%frame_id, ?command, "FrameCoordinator::route: called");

        let origin = {
            let state = self.lock();
            let context = state
                .contexts
                .get(&frame_id)
                .ok_or_else(|| FrameError::UnknownSender(frame_id.clone()))?;
            let manager = context
                .manager()
                .ok_or_else(|| FrameError::ManagerDropped(frame_id.clone()))?;
            Origin {
                manager,
                holder: context.holder(),
                reply_window: context.reply_window(),
                frame_id: frame_id.clone(),
            }
        };

        match command {
            Command::Open | Command::OpenAsModal => {
                let params: OpenParams = decode(&envelope, command)?;
                let name = envelope
                    .target_overlay
                    .clone()
                    .or(params.name)
                    .ok_or(FrameError::MissingTarget(command))?;
                let overlay = origin.resolve_overlay(&name)?;
                self.spawn_open(
                    &origin,
                    overlay,
                    params.open_config.unwrap_or_default(),
                    params.load_params,
                    command,
                );
            }
            Command::OpenLinkInNewWindow | Command::OpenLinkInNewModalWindow => {
                let params: OpenParams = decode(&envelope, command)?;
                let url = params.url.clone().ok_or(FrameError::MissingTarget(command))?;
                let name = envelope
                    .target_overlay
                    .clone()
                    .or(params.name)
                    .unwrap_or_else(|| url.clone());
                let window: Arc<dyn Overlay> = self.window_for_link(&name, &url, &origin.manager);
                self.spawn_open(
                    &origin,
                    window,
                    params.open_config.unwrap_or_default(),
                    params.load_params,
                    command,
                );
            }
            Command::Close | Command::Ok | Command::Cancel => {
                let overlay = match &envelope.target_overlay {
                    Some(name) => origin.resolve_overlay(name)?,
                    None => origin.holder()?,
                };
                let outcome = match command {
                    Command::Ok => Outcome::ok(envelope.params.clone()),
                    Command::Cancel => Outcome::cancel(envelope.params.clone()),
                    _ if envelope.params.is_null() => Outcome::cancelled(),
                    _ => Outcome::from_value(envelope.params.clone()),
                };
                overlay.close(outcome);
            }
            Command::ShowLoadingOverlay => {
                let params: WaitScreenParams = decode(&envelope, command)?;
                let showing = origin.manager.show_loading_overlay(
                    params.message.as_deref().unwrap_or_default(),
                    params.show_progress_bar,
                    params.progress_ratio,
                );
                let reply_window = origin.reply_window.clone();
                tokio::spawn(async move {
                    let result = showing.await;
                    let cancelled = match result {
                        Ok(outcome) => outcome.is_cancel(),
                        Err(e) => {
                            warn!(error = %e, "Wait-screen failed");
                            true
                        }
                    };
                    if cancelled {
                        if let Some(window) = reply_window {
                            window.post_message(Envelope::downstream(Command::Stop));
                        }
                    }
                });
            }
            Command::HideLoadingOverlay => {
                origin.manager.hide_loading_overlay();
            }
            Command::ChangeWindowCaption => {
                let params: CaptionParams = decode(&envelope, command)?;
                let holder = origin.holder()?;
                if !holder.set_caption(&params.caption) {
                    debug!(name = %holder.name(), "Holder overlay has no caption");
                }
            }
            Command::SendMessage => {
                let destination = envelope
                    .target_overlay
                    .clone()
                    .ok_or(FrameError::MissingTarget(command))?;
                let delivery = origin.manager.send_message(
                    &destination,
                    envelope.params.clone(),
                    origin.holder_name().as_deref(),
                )?;
                tokio::spawn(delivery);
            }
            Command::BroadcastMessage => {
                let delivery = origin
                    .manager
                    .broadcast_message(envelope.params.clone(), origin.holder_name().as_deref());
                tokio::spawn(delivery);
            }
            Command::LoadEmbeddedIFrame => {
                let params: EmbeddedFrameParams = decode(&envelope, command)?;
                let parent = self
                    .lock()
                    .contexts
                    .get(&frame_id)
                    .and_then(|context| context.element().cloned());
                let element = parent
                    .and_then(|parent| parent.find_embedded(&params.element_id))
                    .ok_or_else(|| FrameError::EmbeddedFrameNotFound(params.element_id.clone()))?;

                let nested_id = self.register_embedded(element, &frame_id, &origin.manager)?;
                let outcome = Outcome::ok(json!({ "frameId": nested_id }));
                self.post_reply(command, origin.reply_window.as_ref(), &params.element_id, &outcome);
            }
            Command::DispatchConfig
            | Command::Return
            | Command::ReceiveMessage
            | Command::HeaderCloseButtonClicked
            | Command::Stop => return Err(FrameError::UnexpectedCommand(command)),
        }

        Ok(Routed::Dispatched(command))
    }

    /// Open `overlay` in the background and reply once it closes
    ///
    /// The open is reserved before this returns, so commands routed after it
    /// see it as pending.
    fn spawn_open(
        &self,
        origin: &Origin,
        overlay: Arc<dyn Overlay>,
        config: OpenConfig,
        load_params: Value,
        command: Command,
    ) {
        let reply_window = origin.reply_window.clone();
        let coordinator = self.weak_self.clone();
        let name = overlay.name().to_string();
        let modal = matches!(command, Command::OpenAsModal | Command::OpenLinkInNewModalWindow);
        let opening = if modal {
            origin.manager.open_as_modal(overlay, config, load_params)
        } else {
            origin.manager.open(overlay, config, load_params)
        };
        tokio::spawn(async move {
            let result = opening.await;
            let outcome = result.unwrap_or_else(|e| {
                warn!(%name, error = %e, "Open request failed");
                Outcome::cancelled()
            });
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.post_reply(command, reply_window.as_ref(), &name, &outcome);
            }
        });
    }

    fn post_reply(&self, command: Command, window: Option<&WindowPort>, sender: &str, outcome: &Outcome) {
        if !command.expects_return() {
            warn!(?command, %sender, "Command is not answered, dropping reply");
            return;
        }
        let Some(window) = window else {
            warn!(%sender, "No window to reply to");
            return;
        };
        if window.post_message(Envelope::reply(sender, outcome)) {
            self.lock().metrics.replies_sent += 1;
        }
    }
}
