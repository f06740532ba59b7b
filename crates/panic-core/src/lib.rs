//! Core engine for the panic-vault system.
//!
//! The engine owns the simulated chain: every deployed token ledger, the
//! vault and the relay. It serializes invocations, stamps them with a block
//! timestamp, publishes their events and keeps the vault's per-user state
//! durable across restarts.

pub mod builder;
pub mod engine;

pub use builder::{BuilderError, PanicBuilder, PanicFactories};
pub use engine::clock::{Clock, ManualClock, SystemClock};
pub use engine::event_bus::EventBus;
pub use engine::{EngineError, PanicEngine, TokenPosition, UserStatus};
