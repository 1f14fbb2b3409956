//! # kitsync-catalog
//!
//! Remote template catalog: the reqwest-backed [`HttpCatalogSource`], the
//! TTL-bounded [`CatalogCache`] and the browsing filters in [`CatalogQuery`].

pub mod cache;
pub mod client;
pub mod query;

pub use cache::{CacheConfig, CatalogCache};
pub use client::{CatalogConfig, CatalogSource, HttpCatalogSource};
pub use query::{CatalogQuery, ShowFilter, SortOrder};
