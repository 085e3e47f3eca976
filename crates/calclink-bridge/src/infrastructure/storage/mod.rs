//! Storage infrastructure: configuration file persistence.
//!
//! This module provides a thin adapter between the application and the
//! file system.  The `config` sub-module handles:
//!
//! - Reading the TOML configuration file from the platform-appropriate
//!   directory, or from an explicit path given on the command line.
//! - Writing the effective configuration back to disk (`calclink
//!   write-config`), which gives users a complete file to edit.
//! - Providing defaults when the file does not exist yet (first run).

pub mod config;
