use tracing::{debug, error, info, warn};

use crate::models::ReconciliationReport;

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Salão dashboard server starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_table_fetched(table: &str, rows: usize) {
    debug!("Sheet fetched: {} - {} rows", table, rows);
}

pub fn log_reconciliation_applied(table: &str, report: &ReconciliationReport) {
    info!(
        "Reconciliation applied on {}: updated={} appended={} skipped={} ranges={}",
        table, report.updated, report.appended, report.skipped, report.ranges_written
    );
    for ambiguous in &report.ambiguous {
        warn!(
            "Ambiguous key {} on {}: rows {:?}",
            ambiguous.key, table, ambiguous.positions
        );
    }
    if !report.parse_failures.is_empty() {
        warn!("{} intents skipped on {} with unparsable keys", report.parse_failures.len(), table);
    }
}

pub fn log_reconciliation_failed(table: &str, attempted: usize, error: &str) {
    error!(
        "❌ Reconciliation failed on {}: {} row operations aborted - Error: {}",
        table, attempted, error
    );
}

pub fn log_export_generated(layout: &str, included: usize, skipped: usize) {
    info!("📄 Export '{}' generated: {} rows, {} skipped", layout, included, skipped);
}

pub fn log_asset_uploaded(name: &str, url: &str) {
    info!("Photo uploaded for {}: {}", name, url);
}

pub fn log_asset_upload_failed(name: &str, error: &str) {
    error!("Photo upload failed for {}: {}", name, error);
}

pub fn log_notification_skipped(cliente: &str, reason: &str) {
    debug!("Notification skipped for {}: {}", cliente, reason);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
