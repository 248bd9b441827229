// src/command/mod.rs

//! Command descriptors.
//!
//! - [`spec`] holds the immutable [`CommandSpec`] and command-line assembly.
//! - [`builder`] validates options and applies defaults.
//! - [`environment`] is the explicit environment snapshot handed to a spec.

pub mod builder;
pub mod environment;
pub mod spec;

pub use builder::CommandSpecBuilder;
pub use environment::Environment;
pub use spec::{CommandSpec, DEFAULT_SHELL};
