pub mod common;
pub mod parts;
pub mod stock_transactions;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    bom_sync::BomSyncService, parts::PartService, stock_transactions::StockTransactionService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub parts: Arc<PartService>,
    pub stock_transactions: Arc<StockTransactionService>,
    pub bom_sync: Arc<BomSyncService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let bom_sync = Arc::new(BomSyncService::new(db_pool.clone(), event_sender.clone()));
        let parts = Arc::new(PartService::new(
            db_pool.clone(),
            event_sender.clone(),
            bom_sync.clone(),
        ));
        let stock_transactions = Arc::new(StockTransactionService::new(db_pool, event_sender));

        Self {
            parts,
            stock_transactions,
            bom_sync,
        }
    }
}
