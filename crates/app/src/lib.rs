//! # roomhub-app
//!
//! Application layer — device protocol, reconciliation and **port definitions**.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RoomRepository` — confirmed device state per room
//!   - `ScheduleRepository` — schedule store
//!   - `CommandPublisher` — outbound bus messages
//!   - `Notifier` — movement alerts
//!   - `EventLog` — audit log append & query
//!   - `CardDirectory` — card-to-user lookups and bindings
//! - Implement the core:
//!   - `DeviceRegistry` — serialized commits, implicit room creation
//!   - `DeviceController` — command/confirmation protocol per device kind
//!   - `MessageRouter` — topic classification and dispatch
//!   - `ScheduleReconciler` — per-tick punctual, interval and retry passes
//!   - `PendingCommands` — commanded-but-unconfirmed state
//! - Use-case services for rooms, schedules, the card reader, vacation mode
//!   and the audit log
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `roomhub-domain` only (plus `tokio::sync` for channels and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod controller;
pub mod event_bus;
pub mod pending;
pub mod ports;
pub mod reconciler;
pub mod registry;
pub mod router;
pub mod services;

#[cfg(test)]
mod testing;
