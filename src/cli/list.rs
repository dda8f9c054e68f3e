//! `irrigation list`: print one page of moisture readings.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use crate::cache::CacheRegistry;
use crate::config::Settings;
use crate::constants::MOISTURE_TYPE;
use crate::core::DataError;
use crate::moisture::{MoistureBackend, MoistureListView};

/// Seed the in-memory backend and render a page of readings.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Page to show (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: u64,

    /// Readings per page (defaults to the `page_size` setting)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Readings to generate (defaults to the `readings` setting)
    #[arg(long)]
    pub readings: Option<usize>,
}

impl ListCommand {
    /// Run the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the list owner cannot be initialized or the reading
    /// fetch fails.
    pub async fn execute(self, settings: &Settings) -> Result<()> {
        let page_size = self.page_size.unwrap_or(settings.page_size);
        let readings = self.readings.unwrap_or(settings.readings);

        let registry = CacheRegistry::new();
        registry.register(MOISTURE_TYPE, MoistureBackend::with_generated(readings));

        let list = MoistureListView::new(page_size)?;
        let service = list.attach(registry).context("Failed to initialize the moisture list")?;

        let failure: Arc<Mutex<Option<DataError>>> = Arc::default();
        let _errors = {
            let failure = Arc::clone(&failure);
            service.on_fetch_error(MOISTURE_TYPE, move |error| {
                *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
            })
        };

        service.settle().await;
        if self.page != 1 {
            list.set_page(&service, self.page);
            service.settle().await;
        }

        let failure = failure.lock().unwrap_or_else(PoisonError::into_inner).take();
        service.dispose();
        if let Some(error) = failure {
            return Err(error).context("Failed to fetch moisture readings");
        }

        info!("Listed page {} of {} generated readings", self.page, readings);
        print!("{}", list.output());
        Ok(())
    }
}
