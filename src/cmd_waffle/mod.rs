//! Subcommand modules for the `waffle` binary.

pub mod profile;
pub mod scan;
pub mod sort;
