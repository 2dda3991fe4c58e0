//! plcsync: variable-binding consistency for IEC 61131-3 graphical editors.
//!
//! Keeps Ladder and FBD nodes consistent with the variable tables they
//! reference across renames, type changes and textual edits.

// Core engine - re-exported from plcsync-core
pub use plcsync_core::commit;
pub use plcsync_core::compat;
pub use plcsync_core::config;
pub use plcsync_core::error;
pub use plcsync_core::flow;
pub use plcsync_core::interaction;
pub use plcsync_core::output;
pub use plcsync_core::project;
pub use plcsync_core::references;
pub use plcsync_core::rename;
pub use plcsync_core::sync;
pub use plcsync_core::tree;
pub use plcsync_core::type_change;
pub use plcsync_core::types;
pub use plcsync_core::validation;

// Front door
pub mod cli;
pub mod parser;
pub mod terminal;
