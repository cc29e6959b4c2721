//! Typed catalog operations
//!
//! All reads go through the shared `ApiClient` against the catalog
//! forwarder. Responses are cached by full URL except pricing, which is
//! always fetched fresh.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use storefront_client::{ApiClient, Error, Method, Result};
use tracing::{debug, instrument};

use crate::cache::{DEFAULT_TTL, TtlCache};
use crate::paginate::{Page, fetch_all};
use crate::types::{
    CatalogVariant, Category, Product, ProductPricing, SelectedProduct, SelectionPayload,
    UserSelection,
};

/// Path prefix of the catalog forwarder.
const CATALOG_PREFIX: &str = "/api/printful/v2";

/// Top-level categories: men's, women's, kids' and home & living.
pub const MAIN_CATEGORY_IDS: [u64; 4] = [1, 2, 3, 5];

const CATEGORY_PAGE_SIZE: usize = 100;
const PRODUCT_PAGE_SIZE: usize = 20;
const VARIANT_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Optional size/color constraint on a variant listing.
///
/// Empty strings do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantFilter {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl VariantFilter {
    pub fn matches(&self, variant: &CatalogVariant) -> bool {
        let accepts = |wanted: &Option<String>, actual: &str| match wanted.as_deref() {
            None | Some("") => true,
            Some(wanted) => wanted == actual,
        };
        accepts(&self.size, &variant.size) && accepts(&self.color, &variant.color)
    }
}

/// Catalog reader with a shared response cache.
#[derive(Clone)]
pub struct CatalogApi {
    client: ApiClient,
    base_url: String,
    cache: Arc<TtlCache<Value>>,
}

impl CatalogApi {
    /// Read the catalog through the forwarder at `forwarder_url`.
    pub fn new(client: ApiClient, forwarder_url: &str) -> Self {
        Self {
            client,
            base_url: format!("{}{CATALOG_PREFIX}", forwarder_url.trim_end_matches('/')),
            cache: Arc::new(TtlCache::new(DEFAULT_TTL)),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Arc::new(TtlCache::new(ttl));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Every category, across all pages.
    pub async fn all_categories(&self) -> Result<Vec<Category>> {
        self.list("/catalog-categories", CATEGORY_PAGE_SIZE).await
    }

    pub async fn main_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.all_categories().await?;
        categories.retain(|c| MAIN_CATEGORY_IDS.contains(&c.id));
        Ok(categories)
    }

    pub async fn subcategories(&self, parent_id: u64) -> Result<Vec<Category>> {
        let mut categories = self.all_categories().await?;
        categories.retain(|c| c.parent_id == Some(parent_id));
        Ok(categories)
    }

    pub async fn has_children(&self, category_id: u64) -> Result<bool> {
        Ok(!self.subcategories(category_id).await?.is_empty())
    }

    /// Every product in `category_id`, across all pages.
    pub async fn products_by_category(&self, category_id: u64) -> Result<Vec<Product>> {
        let path = format!("/catalog-products?category_ids={category_id}");
        self.list(&path, PRODUCT_PAGE_SIZE).await
    }

    pub async fn product(&self, product_id: u64) -> Result<Product> {
        let path = format!("/catalog-products/{product_id}");
        let envelope: Envelope<Product> = self.request(&path, true).await?;
        Ok(envelope.data)
    }

    /// Every variant of `product_id` that passes `filter`.
    pub async fn product_variants(
        &self,
        product_id: u64,
        filter: &VariantFilter,
    ) -> Result<Vec<CatalogVariant>> {
        let path = format!("/catalog-products/{product_id}/catalog-variants");
        let mut variants: Vec<CatalogVariant> = self.list(&path, VARIANT_PAGE_SIZE).await?;
        variants.retain(|v| filter.matches(v));
        Ok(variants)
    }

    /// Current pricing. Never served from cache.
    pub async fn product_pricing(&self, product_id: u64) -> Result<ProductPricing> {
        let path = format!("/catalog-products/{product_id}/prices");
        let envelope: Envelope<ProductPricing> = self.request(&path, false).await?;
        Ok(envelope.data)
    }

    /// Send the user's configured product to the backend.
    pub async fn submit_product_selection(
        &self,
        product: &Product,
        selection: &UserSelection,
    ) -> Result<Value> {
        self.client
            .submit_product_selection(
                &SelectedProduct::from(product),
                &SelectionPayload::from(selection),
            )
            .await
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, page_size: usize) -> Result<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        fetch_all(page_size, |offset, limit| {
            let endpoint = format!("{path}{separator}limit={limit}&offset={offset}");
            async move { self.request::<Page<T>>(&endpoint, true).await }
        })
        .await
    }

    #[instrument(skip(self), fields(url = tracing::field::Empty))]
    async fn request<T: DeserializeOwned>(&self, endpoint: &str, use_cache: bool) -> Result<T> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::Span::current().record("url", url.as_str());

        if use_cache {
            if let Some(cached) = self.cache.get(&url) {
                metrics::counter!("catalog_cache_lookups_total", "result" => "hit").increment(1);
                debug!("served from cache");
                return decode(cached);
            }
            metrics::counter!("catalog_cache_lookups_total", "result" => "miss").increment(1);
        }

        let value: Value = self.client.call(Method::GET, &url, None).await?;
        let decoded = decode(value.clone())?;
        if use_cache {
            self.cache.set(url, value);
        }
        Ok(decoded)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
}
