//! Workflow adapter around the downsample stage
//!
//! The stage itself is a plain function of its request. Everything a hosting platform would
//! declare around it (display metadata, parameter rules, a record of each run) lives here.

/// Display name, author and parameter descriptions
pub mod metadata;
/// Record of a completed run
pub mod manifest;
