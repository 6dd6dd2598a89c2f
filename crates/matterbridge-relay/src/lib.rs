//! The relay engine between IRC and Mattermost.
//!
//! [`MessageNormalizer`] turns transport events into
//! [`CanonicalMessage`](matterbridge_core::CanonicalMessage)s, [`Relay`]
//! runs both directional pumps, and [`Bridge`] wires the two sessions and
//! the relay together from configuration.

/// Assembly of sessions, relay and tasks.
pub mod bridge;
/// Nick and message formatting.
pub mod format;
/// Random media lookup for `!gif`.
pub mod media;
/// Event to canonical message conversion.
pub mod normalize;
/// The two relay pumps.
pub mod relay;

pub use bridge::Bridge;
pub use media::{GiphyClient, MediaSearch};
pub use normalize::MessageNormalizer;
pub use relay::{Relay, RelayOptions};
