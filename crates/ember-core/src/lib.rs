//! Ember Core
//!
//! This crate contains the core functionality shared by the Ember engine crates.

pub mod alloc;
pub mod logging;
