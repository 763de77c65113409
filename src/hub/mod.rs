//! Session Hub
//!
//! Identity registry, challenges, match wiring and outbound delivery, all
//! driven by one serialized event queue.

pub mod challenge;
pub mod core;
pub mod error;
pub mod matches;
pub mod names;
pub mod outbox;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod harness;

pub use self::core::{Hub, HubConfig, HubEvent};
pub use challenge::{Challenge, ChallengeBook};
pub use error::HubError;
pub use matches::MatchTable;
pub use registry::{Registry, User};
