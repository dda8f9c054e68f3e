//! Transport contract between master caches and the origin of entity data.
//!
//! A [`Transport`] performs the actual I/O for one entity type. The engine only
//! needs two operations: load full records for a list of ids, and resolve a
//! free-form criteria object to a page of ids.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{DataResult, EntityId, EntityRecord};

/// Paging information reported with a criteria response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number that was returned.
    pub page: u64,
    /// Requested page size.
    pub page_size: u64,
    /// Total rows matching the criteria across all pages.
    pub row_count: u64,
    /// Number of pages at this page size.
    pub page_count: u64,
}

/// Result of resolving criteria to ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaResponse {
    /// Ids on the requested page, in backend order.
    pub ids: Vec<EntityId>,
    /// Paging details, when the backend pages results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Sorting the backend applied, echoed back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<Value>,
}

impl CriteriaResponse {
    /// Response with ids only.
    pub fn from_ids(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Total matching rows, when reported.
    pub fn row_count(&self) -> Option<u64> {
        self.pagination.map(|p| p.row_count)
    }
}

/// Origin of entity data for one entity type.
///
/// Implementations must return `'static` futures; clone whatever state the
/// request needs into the future.
pub trait Transport: Send + Sync {
    /// Load the records for `ids`. Unknown ids are simply absent from the result.
    fn fetch_by_ids(&self, ids: Vec<EntityId>) -> BoxFuture<'static, DataResult<Vec<EntityRecord>>>;

    /// Resolve `criteria` (passed through verbatim) to a page of ids.
    fn fetch_ids_by_criteria(&self, criteria: Value) -> BoxFuture<'static, DataResult<CriteriaResponse>>;
}
