//! Request-scoped filtering, pagination and statistics over a reconciliation.

use serde::{Deserialize, Serialize};

use crate::reconcile::{CombinedEntity, Reconciliation};
use crate::sync_status::SyncStatus;
use crate::types::Entity;

pub const DEFAULT_PER_PAGE: usize = 25;
pub const MAX_PER_PAGE: usize = 200;

/// Listing filters as sent by the UI. Lives for one request only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<SyncStatus>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl ListQuery {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> usize {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    fn matches_text(&self, name: &str, urn: &str, description: Option<&str>) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        name.to_lowercase().contains(&needle)
            || urn.to_lowercase().contains(&needle)
            || description.is_some_and(|d| d.to_lowercase().contains(&needle))
    }

    fn matches_status(&self, status: SyncStatus) -> bool {
        self.status.map_or(true, |s| s == status)
    }

    fn matches_entity(&self, e: &Entity, status: SyncStatus) -> bool {
        self.matches_status(status)
            && self.matches_text(e.display_name(), e.urn.as_str(), e.description.as_deref())
    }

    fn matches_combined(&self, c: &CombinedEntity) -> bool {
        self.matches_status(c.sync_status)
            && (self.matches_text(
                c.local.display_name(),
                c.urn.as_str(),
                c.local.description.as_deref(),
            ) || self.matches_text(
                c.remote.display_name(),
                c.urn.as_str(),
                c.remote.description.as_deref(),
            ))
    }
}

/// Counts over the unfiltered reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub synced: usize,
    pub modified: usize,
    pub local_only: usize,
    pub remote_only: usize,
}

impl Statistics {
    pub fn of(r: &Reconciliation) -> Self {
        let modified = r
            .synced
            .iter()
            .filter(|c| c.sync_status == SyncStatus::Modified)
            .count();
        Self {
            total: r.len(),
            synced: r.synced.len() - modified,
            modified,
            local_only: r.local_only.len(),
            remote_only: r.remote_only.len(),
        }
    }

    /// Counts for a plain list of local rows using their stored status.
    pub fn of_local(entities: &[Entity]) -> Self {
        let mut stats = Self {
            total: entities.len(),
            ..Self::default()
        };
        for e in entities {
            match e.sync_status {
                SyncStatus::Synced => stats.synced += 1,
                SyncStatus::Modified => stats.modified += 1,
                SyncStatus::LocalOnly => stats.local_only += 1,
                SyncStatus::RemoteOnly => stats.remote_only += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    fn cut(items: Vec<T>, query: &ListQuery) -> Self {
        let per_page = query.per_page();
        let page = query.page();
        let total = items.len();
        let total_pages = total.div_ceil(per_page).max(1);
        let items = items
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingData {
    pub synced: Page<CombinedEntity>,
    pub local_only: Page<Entity>,
    pub remote_only: Page<Entity>,
}

/// Listing envelope: `{success, data, statistics, filters}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingResponse<D> {
    pub success: bool,
    pub data: D,
    pub statistics: Statistics,
    pub filters: ListQuery,
}

/// Filter and paginate each bucket. Buckets are sorted by display name.
pub fn build_listing(r: Reconciliation, query: ListQuery) -> ListingResponse<ListingData> {
    let statistics = Statistics::of(&r);

    let mut synced: Vec<CombinedEntity> = r
        .synced
        .into_iter()
        .filter(|c| query.matches_combined(c))
        .collect();
    synced.sort_by(|a, b| by_name(a.display_name(), b.display_name()).then(a.urn.cmp(&b.urn)));

    let local_only = sorted_entities(r.local_only, &query, SyncStatus::LocalOnly);
    let remote_only = sorted_entities(r.remote_only, &query, SyncStatus::RemoteOnly);

    ListingResponse {
        success: true,
        data: ListingData {
            synced: Page::cut(synced, &query),
            local_only: Page::cut(local_only, &query),
            remote_only: Page::cut(remote_only, &query),
        },
        statistics,
        filters: query,
    }
}

/// Listing of local rows only, filtered by their stored status.
pub fn build_local_listing(entities: Vec<Entity>, query: ListQuery) -> ListingResponse<Page<Entity>> {
    let statistics = Statistics::of_local(&entities);
    let mut items: Vec<Entity> = entities
        .into_iter()
        .filter(|e| query.matches_entity(e, e.sync_status))
        .collect();
    items.sort_by(|a, b| by_name(a.display_name(), b.display_name()).then(a.urn.cmp(&b.urn)));
    ListingResponse {
        success: true,
        data: Page::cut(items, &query),
        statistics,
        filters: query,
    }
}

fn sorted_entities(entities: Vec<Entity>, query: &ListQuery, status: SyncStatus) -> Vec<Entity> {
    let mut out: Vec<Entity> = entities
        .into_iter()
        .filter(|e| query.matches_entity(e, status))
        .collect();
    out.sort_by(|a, b| by_name(a.display_name(), b.display_name()).then(a.urn.cmp(&b.urn)));
    out
}

fn by_name(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
