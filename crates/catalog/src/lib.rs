//! Product catalog access
//!
//! Read-mostly catalog data is fetched through the authenticated pipeline,
//! cached by full request URL for a fixed TTL, and paged endpoints are
//! aggregated into complete lists.
//!
//! - `cache`: in-memory TTL map with lazy eviction
//! - `paginate`: offset/limit aggregation over a page-fetch function
//! - `types`: catalog records as served by the catalog forwarder
//! - `api`: `CatalogApi`, the typed operations over the above

pub mod api;
pub mod cache;
pub mod paginate;
pub mod types;

pub use api::{CatalogApi, MAIN_CATEGORY_IDS, VariantFilter};
pub use cache::{DEFAULT_TTL, TtlCache};
pub use paginate::{Page, Paging, fetch_all};
pub use types::*;
