//! IRC side of the bridge.
//!
//! Wraps one persistent IRC connection: the registration/join state machine,
//! NAMES reply assembly, NickServ identification and a reconnecting
//! connection loop that hands interesting events to an [`IrcHandler`].
//!
//! # Main types
//!
//! - [`IrcEvent`]: The subset of IRC traffic the bridge reacts to.
//! - [`IrcSession`]: Connection state machine producing [`IrcInbound`] values.
//! - [`NickAccumulator`]: Per-channel NAMES reply buffer.
//! - [`IrcTransport`]: Outbound operations (join, privmsg, names).
//! - [`IrcLink`]: [`IrcTransport`] over the live client's sender.

/// Reconnecting connection loop.
pub mod connection;
/// Adapter from wire messages to [`IrcEvent`].
pub mod event;
/// NAMES reply accumulation.
pub mod names;
/// Connection state machine.
pub mod session;
/// Outbound IRC operations.
pub mod transport;

pub use connection::{client_config, run_irc, IrcHandler};
pub use event::IrcEvent;
pub use names::NickAccumulator;
pub use session::{IrcInbound, IrcSession, IrcState};
pub use transport::{IrcLink, IrcTransport};
