//! Configuration management
//!
//! This module handles the settings a node starts with: where it listens,
//! where it keeps its data, the proof-of-work difficulty and the network
//! timing knobs.

pub mod settings;

pub use settings::Config;
