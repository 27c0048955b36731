//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use ephemera_core::{Clock, Config, SystemClock};
use ephemera_infra::ExpirySweeper;
use std::sync::Arc;

/// Everything `main` needs to run the service.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub sweeper: Arc<ExpirySweeper>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;

    crate::error::set_hide_error_details(config.is_production());

    let store = storage::setup_storage(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sweeper = Arc::new(ExpirySweeper::new(
        store.clone(),
        clock.clone(),
        config.sweep_interval(),
    ));

    let state = Arc::new(AppState::new(config.clone(), store, clock));
    let router = routes::setup_routes(&config, state.clone());

    Ok(App {
        state,
        router,
        sweeper,
    })
}
