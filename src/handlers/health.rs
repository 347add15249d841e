use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::utils::logging::*;
use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_health_check();

    let (hits, misses) = state.dashboard.cache().stats();
    let notificacoes = match &state.notifier {
        Some(queue) => json!({
            "enabled": true,
            "delivered": queue.stats().delivered.load(Ordering::Relaxed),
            "retried": queue.stats().retried.load(Ordering::Relaxed),
            "dead_lettered": queue.stats().dead_lettered.load(Ordering::Relaxed),
        }),
        None => json!({ "enabled": false }),
    };

    Json(json!({
        "status": "healthy",
        "service": "salao-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "cache": { "hits": hits, "misses": misses },
        "notificacoes": notificacoes
    }))
}

/// Descarta as leituras em cache (após edição manual na planilha)
pub async fn invalidate_cache(State(state): State<Arc<AppState>>) -> Json<Value> {
    let removed = state.dashboard.invalidate_cache().await;
    log_info(&format!("🧹 Cache invalidado: {} abas", removed));

    Json(json!({ "removed": removed }))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{router, send, store};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_cache_stats() {
        let (status, body) = send(router(store()), "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cache"]["hits"], 0);
        assert_eq!(body["notificacoes"]["enabled"], false);
    }

    #[tokio::test]
    async fn test_invalidate_cache() {
        let router = router(store());
        let (status, _) = send(router.clone(), "GET", "/atendimentos?data=01/05/2024", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(router, "POST", "/cache/invalidar", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);
    }
}
