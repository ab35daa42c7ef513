pub mod app_state;
pub mod cash_register_service;
pub mod ledger;
pub mod lifecycle;
pub mod order_service;
pub mod report_service;
pub mod sync_service;
pub mod table_service;

pub use app_state::*;
pub use cash_register_service::*;
pub use lifecycle::LifecycleEngine;
pub use order_service::*;
pub use report_service::*;
pub use sync_service::*;
pub use table_service::*;

use std::sync::Arc;

use crate::config::Config;
use crate::store::Store;
use crate::utils::Clock;

/// Every service wired over one store, mirror and clock.
#[derive(Clone)]
pub struct Services {
    pub state: AppState,
    pub orders: OrderService,
    pub tables: TableService,
    pub cash_register: CashRegisterService,
    pub reports: ReportService,
    pub sync: SyncService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let state = AppState::new();
        let tables = TableService::new(store.clone(), state.clone(), clock.clone());
        let orders = OrderService::new(
            store.clone(),
            state.clone(),
            LifecycleEngine::new(config.lifecycle.clone()),
            clock.clone(),
            tables.clone(),
        );
        let cash_register = CashRegisterService::new(store.clone(), state.clone(), clock.clone());
        let reports = ReportService::new(store.clone(), clock, &config.reporting);
        let sync = SyncService::new(store, state.clone());
        Self {
            state,
            orders,
            tables,
            cash_register,
            reports,
            sync,
        }
    }
}
