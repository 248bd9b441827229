// src/config/mod.rs

//! Command files.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a command file from disk (`loader.rs`).
//! - Validate it and turn entries into [`CommandSpec`](crate::command::CommandSpec)s
//!   (`validate.rs`, [`ConfigFile::spec_for`]).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{CommandConfig, ConfigFile, DefaultSection, RawConfigFile};
