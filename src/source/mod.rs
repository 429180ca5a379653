//! Catalog sources
//!
//! This module provides:
//! - The `CatalogSource` trait and the `Lookup` table of
//!   secondary lookups
//! - `SakaniCatalog`, the HTTP implementation
//!
//! Endpoint URLs and response paths must live in the source
//! implementation. Collectors interact exclusively through the
//! `CatalogSource` trait.

pub mod catalog;
pub mod sakani;

pub use catalog::{CatalogSource, Lookup};
pub use sakani::SakaniCatalog;
