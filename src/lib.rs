//! # Bid Duel Session Server
//!
//! Authoritative session hub for a two-player simultaneous-bidding game
//! built on the all-pay auction mechanic.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BID DUEL SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Identifier types                         │
//! │  └── ids.rs       - User, challenge, match, connection ids   │
//! │                                                              │
//! │  game/            - Match rules (pure, synchronous)          │
//! │  ├── rules.rs     - Contract constants and MatchRules        │
//! │  ├── state.rs     - Match state, bids, termination           │
//! │  └── round.rs     - All-pay resolution and win check         │
//! │                                                              │
//! │  hub/             - Serialized core (single consumer)        │
//! │  ├── core.rs      - Event queue consumer and dispatch        │
//! │  ├── registry.rs  - Live identities                          │
//! │  ├── challenge.rs - Pending invitations and expiry           │
//! │  ├── matches.rs   - Match table and engine wiring            │
//! │  ├── outbox.rs    - Bounded per-connection delivery          │
//! │  ├── scheduler.rs - Expiry ticks and deferred events         │
//! │  ├── names.rs     - Display-name generation                  │
//! │  └── error.rs     - Error taxonomy                           │
//! │                                                              │
//! │  network/         - Transport (producers)                    │
//! │  ├── protocol.rs  - JSON envelopes                           │
//! │  └── server.rs    - WebSocket accept loop                    │
//! │                                                              │
//! │  config.rs        - Command-line configuration               │
//! │  logging.rs       - tracing subscriber setup                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantee
//!
//! Every connection task only decodes frames and enqueues [`hub::HubEvent`]s.
//! The [`hub::Hub`] is the only writer of the user, challenge and match tables
//! and consumes the queue one event at a time, so each handler runs as an
//! atomic step. Expiry sweeps and post-match cleanup re-enter through the
//! same queue.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

use std::time::Duration;

pub mod config;
pub mod core;
pub mod game;
pub mod hub;
pub mod logging;
pub mod network;

// Re-export commonly used types
pub use crate::core::ids::{ChallengeId, ConnectionId, MatchId, UserId};
pub use game::rules::MatchRules;
pub use game::state::{MatchState, MatchStatus, MatchWinner, Seat};
pub use hub::{Hub, HubConfig, HubError, HubEvent};
pub use network::{ClientMessage, GameServer, ServerConfig, ServerMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Position a player must reach to win.
pub const MAX_STEPS: u32 = 3;

/// Starting balance for each player.
pub const INITIAL_BUDGET: u32 = 20;

/// Lifetime of a pending challenge.
pub const CHALLENGE_EXPIRY: Duration = Duration::from_secs(60);

/// How long a finished match stays queryable before removal.
pub const MATCH_RETENTION: Duration = Duration::from_secs(10);

/// Period of the challenge expiry sweep.
pub const EXPIRY_SWEEP_PERIOD: Duration = Duration::from_secs(1);
