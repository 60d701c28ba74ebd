//! # Reelbot - Game Server Core for a Chat Bot
//!
//! Reelbot is the in-process core behind a chat-driven fishing, farming and digging game.
//! It owns the pieces that have to stay consistent while many players type at once; the
//! chat transport and presentation layers live elsewhere.
//!
//! ## Features
//!
//! - **Event Bus**: Typed, in-process publish/subscribe. Handler failures and panics are isolated per subscriber.
//! - **Session Registry**: Concurrent keyed store of live minigame sessions with per-session locking.
//! - **Growth Advancer**: Periodic background task that moves crops through Planted → Growing → Ready.
//! - **Dig Site**: Grid minigame with bounded attempts, bounded finds and no repeat digs.
//! - **Collection Tracker**: Per-player discovery records aggregated from catch events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reelbot::config::Config;
//! use reelbot::server::GameServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = GameServer::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`events`] - event types and the publish/subscribe bus
//! - [`sessions`] - generic keyed session registry
//! - [`farm`] - crops, farms, the store contract and the growth advancer
//! - [`games`] - dig site engine and chat command parsing
//! - [`collection`] - discovery aggregation fed by the bus
//! - [`server`] - wires everything together for one process
//! - [`storage`] - sled-backed and in-memory farm stores
//! - [`config`] - configuration loading and validation
//! - [`errors`] - error types shared across modules

pub mod collection;
pub mod config;
pub mod errors;
pub mod events;
pub mod farm;
pub mod games;
pub mod logutil;
pub mod metrics;
pub mod server;
pub mod sessions;
pub mod storage;
