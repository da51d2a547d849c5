//! Ports (trait boundaries) for external dependencies.
//!
//! This module defines the interfaces between the domain layer and infrastructure.
//! Following hexagonal architecture, these traits are owned by the domain and
//! implemented by adapters in the infrastructure layer.

pub mod channel;
pub mod input;
pub mod observer;
pub mod repository;
pub mod sink;

pub use channel::Channel;
pub use input::HumanInput;
pub use observer::Observer;
pub use repository::PolicyRepository;
pub use sink::{EventSink, GameEvent};
