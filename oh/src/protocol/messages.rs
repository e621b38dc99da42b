//! Cross-document message envelope and command tags
//!
//! Envelopes are JSON objects with camelCase keys. Upward traffic (child to
//! ancestor) carries the sender's frame-id; replies are flagged `toDownstream`
//! so the coordinator's own listener ignores them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manager::OpenConfig;
use crate::outcome::Outcome;

/// Command tag carried by every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    // upward
    Open,
    OpenAsModal,
    OpenLinkInNewWindow,
    OpenLinkInNewModalWindow,
    Close,
    Ok,
    Cancel,
    ShowLoadingOverlay,
    HideLoadingOverlay,
    ChangeWindowCaption,
    SendMessage,
    BroadcastMessage,
    #[serde(rename = "loadEmbeddedIFrame")]
    LoadEmbeddedIFrame,

    // downward
    DispatchConfig,
    Return,
    ReceiveMessage,
    HeaderCloseButtonClicked,
    Stop,
}

impl Command {
    /// True for tags only the ancestor side may send
    pub fn is_downstream(self) -> bool {
        matches!(
            self,
            Command::DispatchConfig
                | Command::Return
                | Command::ReceiveMessage
                | Command::HeaderCloseButtonClicked
                | Command::Stop
        )
    }

    /// True for tags answered with a correlated `return`
    pub fn expects_return(self) -> bool {
        matches!(
            self,
            Command::Open
                | Command::OpenAsModal
                | Command::OpenLinkInNewWindow
                | Command::OpenLinkInNewModalWindow
                | Command::LoadEmbeddedIFrame
        )
    }
}

/// One protocol message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Marker separating protocol traffic from unrelated window messages
    #[serde(default)]
    pub is_overlayjs_message: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,

    /// Frame-id upward, overlay name on `return`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "destination")]
    pub target_overlay: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub to_downstream: bool,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Envelope {
    /// Upward command from the document identified by `sender`
    pub fn upstream(command: Command, sender: impl Into<String>) -> Self {
        Self {
            is_overlayjs_message: true,
            command: Some(command),
            sender: Some(sender.into()),
            ..Default::default()
        }
    }

    /// Downward command; never re-processed by the coordinator
    pub fn downstream(command: Command) -> Self {
        Self {
            is_overlayjs_message: true,
            command: Some(command),
            to_downstream: true,
            ..Default::default()
        }
    }

    /// Correlated reply to an open-type request
    pub fn reply(overlay_name: impl Into<String>, outcome: &Outcome) -> Self {
        Self::downstream(Command::Return)
            .with_sender(overlay_name)
            .with_params(outcome.to_value())
    }

    /// Hands a document its frame-id and load parameters
    pub fn dispatch_config(frame_id: &str, load_params: Value) -> Self {
        let config = DispatchConfig {
            frame_id: frame_id.to_string(),
            load_params,
        };
        Self::downstream(Command::DispatchConfig).with_params(serde_json::to_value(config).unwrap_or(Value::Null))
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_overlay = Some(target.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Decode the params object as `T`; absent params decode from `{}`
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.params.is_null() {
            serde_json::from_value(Value::Object(Default::default()))
        } else {
            serde_json::from_value(self.params.clone())
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Params of `open`, `openAsModal` and the open-link commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenParams {
    pub name: Option<String>,
    pub load_params: Value,
    pub open_config: Option<OpenConfig>,
    pub url: Option<String>,
}

/// Params of `showLoadingOverlay`; also the load params of the wait-screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitScreenParams {
    pub message: Option<String>,
    pub show_progress_bar: bool,
    pub progress_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionParams {
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddedFrameParams {
    pub element_id: String,
}

/// Payload of `dispatchConfig`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchConfig {
    pub frame_id: String,
    pub load_params: Value,
}
