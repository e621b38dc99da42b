//! Cross-document message protocol
//!
//! - `messages`: envelope, command tags and typed params
//! - `port`: window messaging endpoints

mod messages;
mod port;

pub use messages::{
    CaptionParams, Command, DispatchConfig, EmbeddedFrameParams, Envelope, OpenParams, WaitScreenParams,
};
pub use port::{WindowInbox, WindowPort};
