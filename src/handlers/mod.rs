pub mod items;
pub mod operations;
pub mod search;
pub mod stats;
pub mod tasks;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        audit::AuditService, consumption::ConsumptionService, expiration::ExpirationService,
        inventory::InventoryService, search::SearchService, statistics::StatisticsService,
        tasks::TaskService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer shared by the REST handlers and the tool dispatcher
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub consumption: Arc<ConsumptionService>,
    pub expiration: Arc<ExpirationService>,
    pub tasks: Arc<TaskService>,
    pub statistics: Arc<StatisticsService>,
    pub search: Arc<SearchService>,
    pub audit: Arc<AuditService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let timeout = config.command_timeout();

        let inventory = InventoryService::new(db_pool.clone(), timeout, config.expiring_soon_days);
        let tasks = TaskService::new(db_pool.clone(), timeout);
        let search = SearchService::new(inventory.clone(), tasks.clone());

        Self {
            consumption: Arc::new(ConsumptionService::new(db_pool.clone(), timeout)),
            expiration: Arc::new(ExpirationService::new(db_pool.clone(), timeout)),
            statistics: Arc::new(StatisticsService::new(
                db_pool.clone(),
                timeout,
                config.stats_default_window_days.clamp(1, 3650) as u32,
            )),
            audit: Arc::new(AuditService::new(db_pool, timeout)),
            inventory: Arc::new(inventory),
            tasks: Arc::new(tasks),
            search: Arc::new(search),
        }
    }
}
