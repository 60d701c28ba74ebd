//! # Event bus for cross-feature notification
//!
//! Features publish [`GameEvent`]s without knowing who listens; aggregators such as the
//! collection tracker subscribe per [`EventKind`].
//!
//! ```text
//! catch resolution → EventBus::publish(event) → join_all(handlers for kind)
//! ```
//!
//! Delivery is same-process, best-effort and not retained: no retry, no durable queue.

mod bus;
mod event;

pub use bus::{EventBus, EventHandler, PublishReport};
pub use event::{EventKind, EventPayload, FishCaught, GameEvent, TraitFlags};
