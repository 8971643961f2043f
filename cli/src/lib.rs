//! mlist CLI - assemble, push and inspect multi-platform manifest lists.

pub mod commands;
pub mod output;
pub mod spec;
