//! Core engine for plcsync.
//!
//! Keeps graphical PLC editors consistent with the variable tables they
//! reference:
//! - Variable and type model, compatibility checks
//! - Rename detection between two versions of a table
//! - Graph binding synchronization (resync, relink, unlink)
//! - Type change impact analysis
//! - Variable tree construction for pickers
//! - The commit protocol tying parse, diff, confirmation and sync together
//! - Error types, configuration and JSON output types

pub mod commit;
pub mod compat;
pub mod config;
pub mod error;
pub mod flow;
pub mod interaction;
pub mod output;
pub mod project;
pub mod references;
pub mod rename;
pub mod sync;
pub mod tree;
pub mod type_change;
pub mod types;
pub mod validation;
