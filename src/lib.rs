pub mod config;
pub mod engine;
pub mod guard;
pub mod join;
pub mod phone;
pub mod ratelimit;
pub mod roster;
pub mod router;
pub mod transport;
pub mod verify;

pub use config::{Community, Config};
pub use engine::Engine;
pub use join::{JoinDecision, JoinState};
pub use phone::PhoneNumber;
pub use ratelimit::{BroadcastDecision, BroadcastLimiter};
pub use roster::{LookupOutcome, RosterConnector, RosterRecord};
pub use transport::{Command, JoinEvent, MessageReceived, Transport};
pub use verify::Verifier;
