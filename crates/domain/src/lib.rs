//! # roomhub-domain
//!
//! Pure domain model for the roomhub household controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Rooms** and the confirmed state of their devices
//! - Define **Schedules** (punctual and interval) and the rules deciding
//!   which state a schedule asks for at a given minute
//! - Define the **bus grammar**: topics and JSON payloads
//! - Define **Events** (audit records) and the card **registration** state machine
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod event;
pub mod payload;
pub mod registration;
pub mod room;
pub mod schedule;
pub mod topic;
