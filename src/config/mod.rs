//! Cluster configuration document
//!
//! - [`document`] - the document and its staged updates
//! - [`layer0`] - provider, network and topology facts
//! - [`layer1`] - platform service settings
//! - [`store`] - YAML persistence

pub mod document;
pub mod layer0;
pub mod layer1;
pub mod store;

pub use document::{ConfigDocument, ReleaseUpdate};
pub use layer0::{GceProvider, Layer0, Layer0Network, Provider, ResourceTopology};
pub use layer1::{DiskSpec, DiskType, Layer1, Layer1Settings};
pub use store::DocumentStore;
