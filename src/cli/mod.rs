//! CLI infrastructure for the stones trainer
//!
//! This module provides the command-line interface for training a policy,
//! exporting and inspecting it, and playing against it on a device.

pub mod commands;
pub mod config;
pub mod output;

pub use config::StonesConfig;
