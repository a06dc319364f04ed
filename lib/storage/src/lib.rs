//! # ATI Storage
//!
//! Versioned artifact store for trained bundles. Every published version is
//! immutable, checksummed and activated through an atomically replaced
//! `CURRENT` pointer.

pub mod manifest;
pub mod store;

pub use manifest::{BundleManifest, ConfigSummary};
pub use store::{ArtifactStore, StoreError};
