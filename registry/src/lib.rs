//! mlist registry layer - manifest list / image index assembly, publishing
//! and inspection.
//!
//! Everything here runs against the [`oci::Resolver`] capability; the
//! `oci-distribution` backed [`oci::RegistryResolver`] is the production
//! implementation.

#![allow(clippy::result_large_err)]

pub mod oci;

pub use oci::{inspect, inspect_with, push_manifest_list};
pub use oci::{Descriptor, ImageReference, InspectReport, ListSpec, ManifestEntry, Platform};
pub use oci::{MemoryStore, PushResult, RegistryAuth, RegistryResolver, Resolver};

/// mlist registry layer version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
