pub mod assets;
pub mod dashboard;
pub mod export;
pub mod reconciliation;
pub mod schema;
pub mod table_cache;
pub mod workflow;

pub use assets::AssetStore;
pub use reconciliation::{ReconciliationEngine, ReconciliationError};
pub use table_cache::TableCache;
pub use workflow::{DashboardService, SheetNames};
