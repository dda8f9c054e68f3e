//! Owner lifecycle hooks.
//!
//! An owner is the component that declares data models and is told to re-render.
//! The data service calls these hooks explicitly; every hook but [`Render`] has a
//! no-op default, so an owner only implements what it needs.

use serde_json::{Map, Value};

use super::DataService;

/// Re-render trigger. Called after each store or clear unless suppressed.
pub trait Render {
    /// Redraw from the service's current state.
    fn render(&self, service: &DataService);
}

/// Called once, after the service sets up its private state and before the data
/// models are parsed. Typical use is seeding view state.
pub trait OnInit {
    /// Initialize owner state.
    fn on_init(&self, _service: &DataService) {}
}

/// Extra template context merged on top of the alias context by
/// [`DataService::prepare`].
pub trait OnPrepareContext {
    /// Additional context entries.
    fn prepare_context(&self, _service: &DataService) -> Map<String, Value> {
        Map::new()
    }
}

/// Called after the service has released its private views.
pub trait OnDispose {
    /// Release owner resources.
    fn on_dispose(&self) {}
}

/// Everything the data service needs from its owner.
pub trait Owner: Render + OnInit + OnPrepareContext + OnDispose + Send + Sync {}

impl<T> Owner for T where T: Render + OnInit + OnPrepareContext + OnDispose + Send + Sync {}
