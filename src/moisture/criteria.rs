//! Criteria handling for moisture id queries.
//!
//! A criteria object has two optional members:
//!
//! - `pagination`: `{page, pageSize}`, 1-based, defaulting to page 1 of 10
//! - `sorting`: a column name (ascending), a `{column, direction}` object, or an
//!   array of such objects for multi-column sorts. Defaults to `created_at`
//!   ascending.
//!
//! ```json
//! {
//!   "pagination": { "page": 2, "pageSize": 25 },
//!   "sorting": [{ "column": "moisture", "direction": "desc" }, { "column": "created_at" }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::MoistureReading;
use crate::cache::{CriteriaResponse, Pagination};
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::core::{DataError, DataResult, EntityId};

/// Sortable reading column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    Moisture,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    /// Look up a column by its stored name.
    pub fn parse(name: &str) -> DataResult<Self> {
        match name {
            "id" => Ok(Self::Id),
            "moisture" => Ok(Self::Moisture),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(invalid(format!("unknown sort column '{other}'"))),
        }
    }

    fn key(self, reading: &MoistureReading) -> i64 {
        match self {
            Self::Id => reading.id,
            Self::Moisture => i64::from(reading.moisture),
            Self::CreatedAt => reading.created_at,
            Self::UpdatedAt => reading.updated_at,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(value: &str) -> DataResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(invalid(format!("unknown sort direction '{other}'"))),
        }
    }
}

/// One column of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending sort on `column`.
    pub fn asc(column: SortColumn) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    fn from_object(object: &Map<String, Value>) -> DataResult<Self> {
        let column = object.get("column").and_then(Value::as_str).filter(|c| !c.is_empty()).ok_or_else(|| {
            invalid(format!(
                "column property is required for a sort definition {}",
                Value::Object(object.clone())
            ))
        })?;
        let direction = match object.get("direction") {
            None | Some(Value::Null) => SortDirection::default(),
            Some(Value::String(direction)) => SortDirection::parse(direction)?,
            Some(other) => return Err(invalid(format!("sort direction must be a string, got {other}"))),
        };
        Ok(Self {
            column: SortColumn::parse(column)?,
            direction,
        })
    }

    fn compare(&self, a: &MoistureReading, b: &MoistureReading) -> Ordering {
        let ordering = self.column.key(a).cmp(&self.column.key(b));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Parsed criteria for a moisture id query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoistureCriteria {
    /// Sort keys, most significant first.
    pub sorting: Vec<SortKey>,
    /// 1-based page number.
    pub page: u64,
    /// Ids per page.
    pub page_size: u64,
}

impl Default for MoistureCriteria {
    fn default() -> Self {
        Self {
            sorting: vec![SortKey::asc(SortColumn::CreatedAt)],
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MoistureCriteria {
    /// Parse a criteria object. `null` means all defaults.
    pub fn from_value(criteria: &Value) -> DataResult<Self> {
        let object = match criteria {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => return Err(invalid(format!("criteria must be an object, got {other}"))),
        };

        let mut parsed = Self::default();
        match object.get("sorting") {
            None | Some(Value::Null) => {}
            Some(sorting) => parsed.sorting = parse_sorting(sorting)?,
        }
        match object.get("pagination") {
            None | Some(Value::Null) => {}
            Some(Value::Object(pagination)) => {
                parsed.page = pagination.get("page").and_then(Value::as_u64).unwrap_or(1).max(1);
                parsed.page_size =
                    pagination.get("pageSize").and_then(Value::as_u64).unwrap_or(DEFAULT_PAGE_SIZE);
                if parsed.page_size == 0 {
                    return Err(invalid("pageSize must be at least 1".to_string()));
                }
            }
            Some(other) => return Err(invalid(format!("pagination must be an object, got {other}"))),
        }
        Ok(parsed)
    }

    /// Sort `readings` and cut out the requested page.
    pub fn apply(&self, readings: &[MoistureReading]) -> CriteriaResponse {
        let mut sorted: Vec<&MoistureReading> = readings.iter().collect();
        sorted.sort_by(|a, b| {
            self.sorting.iter().map(|key| key.compare(a, b)).find(|o| o.is_ne()).unwrap_or(Ordering::Equal)
        });

        let row_count = sorted.len() as u64;
        let offset = usize::try_from((self.page - 1).saturating_mul(self.page_size)).unwrap_or(usize::MAX);
        let take = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let ids = sorted.into_iter().skip(offset).take(take).map(|r| EntityId::Int(r.id)).collect();

        CriteriaResponse {
            ids,
            pagination: Some(Pagination {
                page: self.page,
                page_size: self.page_size,
                row_count,
                page_count: row_count.div_ceil(self.page_size),
            }),
            sorting: serde_json::to_value(&self.sorting).ok(),
        }
    }
}

fn parse_sorting(sorting: &Value) -> DataResult<Vec<SortKey>> {
    match sorting {
        Value::String(column) => Ok(vec![SortKey::asc(SortColumn::parse(column)?)]),
        Value::Object(object) => Ok(vec![SortKey::from_object(object)?]),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry {
                Value::Object(object) => SortKey::from_object(object),
                other => Err(invalid(format!(
                    "column property is required for a sort definition {other}"
                ))),
            })
            .collect(),
        other => Err(invalid(format!(
            "Sorting property not recognized (must be string, object or array of objects) {other}"
        ))),
    }
}

fn invalid(reason: String) -> DataError {
    DataError::InvalidCriteria {
        reason,
    }
}
