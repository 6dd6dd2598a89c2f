//! Core types and error definitions for the IRC/Mattermost bridge.
//!
//! This crate provides the foundational pieces shared by every other bridge
//! crate: the error taxonomy, the canonical message shape, channel mapping,
//! reconnect backoff and the configuration model.
//!
//! # Main types
//!
//! - [`BridgeError`]: Unified error enum for all bridge subsystems.
//! - [`BridgeResult`]: Convenience alias for `Result<T, BridgeError>`.
//! - [`CanonicalMessage`]: Transport-agnostic message consumed by the relay.
//! - [`ChannelMap`]: Bidirectional IRC/Mattermost channel name lookup.
//! - [`Backoff`]: Exponential reconnect delay with jitter.
//! - [`BridgeConfig`]: Validated structured configuration.

/// Exponential reconnect backoff.
pub mod backoff;
/// Bidirectional channel name mapping.
pub mod channel_map;
/// Configuration model and validation.
pub mod config;
/// Error types.
pub mod error;
/// Canonical message types.
pub mod message;

pub use backoff::{Backoff, BackoffPolicy};
pub use channel_map::ChannelMap;
pub use config::{
    BridgeConfig, ChannelMapping, Credentials, GeneralConfig, IrcConfig, MattermostConfig,
    NickFormatter, RemoteMode,
};
pub use error::{BridgeError, BridgeResult};
pub use message::{CanonicalMessage, MessageKind};
