//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Driven ports (implemented by adapters): [`RoomRepository`],
//! [`ScheduleRepository`], [`CommandPublisher`], [`Notifier`],
//! [`EventPublisher`], [`EventLog`], [`CardDirectory`].
//!
//! Inbound seams (implemented in this crate, consumed by the router and the
//! reconciler): [`DeviceHandler`], [`CardHandler`].

pub mod bus;
pub mod card_directory;
pub mod event_bus;
pub mod event_log;
pub mod handler;
pub mod notifier;
pub mod room_repo;
pub mod schedule_repo;

pub use bus::CommandPublisher;
pub use card_directory::CardDirectory;
pub use event_bus::EventPublisher;
pub use event_log::EventLog;
pub use handler::{CardHandler, DeviceHandler};
pub use notifier::Notifier;
pub use room_repo::RoomRepository;
pub use schedule_repo::ScheduleRepository;
