//! Manifest list assembly and publishing over the OCI distribution API.
//!
//! Stages, leaves first:
//!
//! ```text
//! MemoryStore ──► DescriptorFetcher ──► resolve_platform ──► assemble ──► push_manifest_list
//!      ▲                  │
//!      └──── Resolver ◄───┘   (RegistryResolver in production, MockRegistry in tests)
//! ```

mod assemble;
pub mod credentials;
pub mod digest;
pub mod fetch;
pub mod inspect;
pub mod manifest;
pub mod platform;
pub mod publish;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{build as assemble_list, list_media_type};
pub use credentials::DockerConfig;
pub use fetch::DescriptorFetcher;
pub use inspect::{inspect, inspect_with, InspectReport, ListEntryReport};
pub use manifest::{ContentKind, Descriptor, ImageConfig, ImageIndex, ImageManifest, Platform};
pub use platform::{is_valid_platform, resolve_platform};
pub use publish::{
    push_manifest_list, ListSpec, ManifestEntry, ManifestList, PushResult, ResolvedManifest,
};
pub use reference::ImageReference;
pub use registry::{RegistryAuth, RegistryResolver};
pub use resolver::{RawManifest, Resolver};
pub use store::MemoryStore;
