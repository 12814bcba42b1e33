//! # huddle-core
//!
//! Session store, event routing, and room lifecycle for the Huddle
//! realtime engine.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **SessionStore** - Authoritative in-memory state of every active room
//! - **EventRouter** - Validates, authorizes, and fans out client events
//! - **ReconnectionGuard** - Grace-window eviction on transport drops
//! - **Reaper** - Periodic sweep of abandoned empty rooms
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Connection │────▶│ EventRouter │────▶│ SessionStore │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!        │                   ▲                   ▲
//!        ▼ disconnect        │ deferred leave    │ sweeps
//! ┌──────────────────┐       │             ┌──────────┐
//! │ ReconnectionGuard│───────┘             │  Reaper  │
//! └──────────────────┘                     └──────────┘
//! ```
//!
//! Nothing here survives a process restart: data loss on restart is an
//! intentional privacy and cost property of the system.

pub mod error;
pub mod guard;
pub mod presence;
pub mod reaper;
pub mod room;
pub mod router;
pub mod store;

pub use error::RoomError;
pub use guard::ReconnectionGuard;
pub use presence::{ClientHandle, ConnectionRegistry, Identity};
pub use room::Room;
pub use router::{EventRouter, Session};
pub use store::{LeaveOutcome, SessionStore};
