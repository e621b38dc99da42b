//! Overlayclient - the embedded-document side of the overlayhub protocol
//!
//! A document running inside a frame creates one [`OverlayClient`] bound to
//! its ancestor's window. Calls made before the coordinator has handed out a
//! frame-id are buffered and replayed once `dispatchConfig` arrives; replies
//! to open-type requests are matched to callers by overlay name.

pub mod client;
pub mod error;

pub use client::OverlayClient;
pub use error::ClientError;
