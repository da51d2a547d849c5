//! Adapters implementing domain ports.
//!
//! This module contains infrastructure implementations of the traits defined
//! in the ports module. Following hexagonal architecture, adapters depend on
//! domain ports, not the other way around.

pub mod inputs;
pub mod json_repository;
pub mod msgpack_repository;
pub mod sinks;
pub mod stream_channel;
pub mod virtual_device;

pub use inputs::{LineInput, ScriptedInput};
pub use json_repository::JsonRepository;
pub use msgpack_repository::MsgPackRepository;
pub use sinks::{LogSink, RecordingSink};
pub use stream_channel::StreamChannel;
pub use virtual_device::{AckPolicy, VirtualDevice};
