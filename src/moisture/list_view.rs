//! Paged list of moisture readings.

use anyhow::{Context, Result};
use chrono::DateTime;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tera::Tera;
use tracing::{debug, warn};

use super::{MoistureReading, dryness_percent, sampled_summary};
use crate::cache::CacheRegistry;
use crate::config::DataModel;
use crate::constants::{MAX_MOISTURE, MOISTURE_TYPE};
use crate::core::{DataResult, EntityId};
use crate::service::{DataService, OnDispose, OnInit, OnPrepareContext, Render};

const TEMPLATE_NAME: &str = "moisture_list";

const LIST_TEMPLATE: &str = "\
Moisture readings: page {{ view.page }} of {{ page_count }} ({{ row_count }} total)
{% if readings %}{% for reading in readings %}  #{{ reading.id }}  {{ reading.taken }}  raw {{ reading.moisture }}  dryness {{ reading.moisture | dryness }}
{% endfor %}{% else %}  no readings
{% endif %}{% if summary %}Average dryness {{ summary.avg_moisture | dryness }} (std dev {{ summary.std_dev_moisture | dryness }})
{% endif %}";

/// Owner that lists one page of readings, oldest first.
///
/// Declares a single `moisture` collection fetched by criteria and re-fetched when
/// the view's `page` changes.
pub struct MoistureListView {
    page_size: u64,
    tera: Tera,
    output: Mutex<String>,
    renders: AtomicUsize,
}

impl MoistureListView {
    /// List showing `page_size` readings per page.
    pub fn new(page_size: u64) -> Result<Arc<Self>> {
        let mut tera = Tera::default();
        tera.register_filter("dryness", dryness_filter);
        tera.add_raw_template(TEMPLATE_NAME, LIST_TEMPLATE).context("Failed to parse moisture list template")?;
        Ok(Arc::new(Self {
            page_size: page_size.max(1),
            tera,
            output: Mutex::new(String::new()),
            renders: AtomicUsize::new(0),
        }))
    }

    /// Data model declarations for this owner.
    pub fn data_models(&self) -> Vec<DataModel> {
        let page_size = self.page_size;
        vec![
            DataModel::new(MOISTURE_TYPE)
                .collection_type(MOISTURE_TYPE)
                .depends_on("view:page")
                .criteria_fn(move |service| {
                    json!({
                        "pagination": {
                            "page": service.view_state().get("page").unwrap_or(Value::from(1)),
                            "pageSize": page_size,
                        }
                    })
                }),
        ]
    }

    /// Create a data service for this list against `registry`.
    pub fn attach(self: &Arc<Self>, registry: Arc<CacheRegistry>) -> DataResult<DataService> {
        DataService::builder(registry).data_models(self.data_models()).initialize(Arc::clone(self))
    }

    /// Move to `page` (1-based). The reading list re-fetches on the next settle.
    pub fn set_page(&self, service: &DataService, page: u64) {
        service.view_state().set("page", page.max(1));
    }

    /// Text produced by the most recent render.
    pub fn output(&self) -> String {
        self.output.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of renders so far.
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn readings(service: &DataService) -> Vec<MoistureReading> {
        let Some(fetched) = service.fetched(MOISTURE_TYPE) else {
            return Vec::new();
        };
        fetched
            .entities()
            .iter()
            .filter_map(|entity| {
                let Some(EntityId::Int(id)) = entity.id() else {
                    return None;
                };
                match entity.to_json() {
                    Value::Object(attributes) => MoistureReading::from_attributes(*id, &attributes).ok(),
                    _ => None,
                }
            })
            .collect()
    }
}

fn dryness_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value.as_f64().ok_or_else(|| tera::Error::msg("dryness filter expects a number"))?;
    Ok(Value::from(format!("{:.1}%", raw / f64::from(MAX_MOISTURE) * 100.0)))
}

fn format_taken(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|at| at.format("%b %-d %-I:%M %p").to_string())
        .unwrap_or_else(|| millis.to_string())
}

impl Render for MoistureListView {
    fn render(&self, service: &DataService) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let context = match tera::Context::from_serialize(Value::Object(service.prepare())) {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to build moisture list context: {}", e);
                return;
            }
        };
        match self.tera.render(TEMPLATE_NAME, &context) {
            Ok(rendered) => {
                debug!("Rendered moisture list ({} bytes)", rendered.len());
                *self.output.lock().unwrap_or_else(PoisonError::into_inner) = rendered;
            }
            Err(e) => warn!("Failed to render moisture list: {}", e),
        }
    }
}

impl OnInit for MoistureListView {
    fn on_init(&self, service: &DataService) {
        service.view_state().set("page", 1);
    }
}

impl OnPrepareContext for MoistureListView {
    fn prepare_context(&self, service: &DataService) -> Map<String, Value> {
        let readings = Self::readings(service);
        let row_count = service
            .private_view(MOISTURE_TYPE)
            .ok()
            .and_then(|view| view.full_list_size())
            .unwrap_or(readings.len() as u64);

        let rows: Vec<Value> = readings
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "moisture": r.moisture,
                    "dryness": dryness_percent(r.moisture),
                    "taken": format_taken(r.created_at),
                })
            })
            .collect();

        let mut context = Map::new();
        context.insert("readings".into(), Value::Array(rows));
        context.insert("row_count".into(), Value::from(row_count));
        context.insert("page_count".into(), Value::from(row_count.div_ceil(self.page_size).max(1)));
        let summary = sampled_summary(&readings, readings.len()).into_iter().next();
        context.insert("summary".into(), serde_json::to_value(summary).unwrap_or(Value::Null));
        context
    }
}

impl OnDispose for MoistureListView {}
