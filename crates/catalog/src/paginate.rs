//! Offset/limit page aggregation

use std::future::Future;

use serde::Deserialize;
use tracing::debug;

/// Paging block returned alongside each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Paging {
    pub total: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

/// One page of a paged listing: `{data, paging}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub paging: Paging,
}

/// Fetch every page of a listing and concatenate the items in order.
///
/// `fetch_page(offset, limit)` is called with `offset = 0, limit, 2*limit, ...`
/// until `offset >= total` as reported by the most recent page. The first
/// page is always requested, even when the listing is empty. A `limit` of 0
/// is treated as 1. The first failing page aborts the whole aggregation.
///
/// `total` is re-read from every page and not reconciled across pages, so a
/// listing that changes mid-walk can yield duplicates or skip items.
pub async fn fetch_all<T, E, F, Fut>(limit: usize, mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let limit = limit.max(1);
    let mut items = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch_page(offset, limit).await?;
        let total = page.paging.total;
        items.extend(page.data);
        offset += limit;

        if offset >= total {
            debug!(total, fetched = items.len(), "aggregated all pages");
            return Ok(items);
        }
    }
}
