//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod audit;
pub mod card_service;
pub mod room_service;
pub mod schedule_service;
pub mod vacation_service;
