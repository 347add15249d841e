use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use crate::handlers::optional_date;
use crate::models::{FieldValues, KeyInput, ReconciliationReport};
use crate::services::workflow::DayView;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub data: Option<String>,
    pub profissional: Option<String>,
}

/// GET /atendimentos?data=dd/mm/aaaa&profissional= (sem data: hoje)
pub async fn get_day_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DayQuery>,
) -> AppResult<Json<DayView>> {
    let data = optional_date("data", query.data.as_deref())?
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let profissional = query.profissional.filter(|p| !p.trim().is_empty());

    Ok(Json(state.dashboard.day_view(data, profissional).await?))
}

/// POST /atendimentos com `{ "cliente": ..., "data": ..., "servico": ... }`
pub async fn create_atendimento(
    State(state): State<Arc<AppState>>,
    Json(values): Json<FieldValues>,
) -> AppResult<Json<ReconciliationReport>> {
    Ok(Json(state.dashboard.create_appointment(values).await?))
}

#[derive(Debug, Deserialize)]
pub struct ConferirRequest {
    pub chaves: Vec<KeyInput>,
}

pub async fn conferir_atendimentos(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConferirRequest>,
) -> AppResult<Json<ReconciliationReport>> {
    Ok(Json(state.dashboard.confirm(request.chaves).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub chave: KeyInput,
    pub valores: FieldValues,
}

/// PATCH /atendimentos: lançamento de pagamento, valor ou observação
pub async fn update_atendimento(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateRequest>,
) -> AppResult<Json<ReconciliationReport>> {
    if request.chave.cliente.trim().is_empty() {
        return Err(AppError::ValidationError("chave.cliente is required".to_string()));
    }
    Ok(Json(state.dashboard.update(request.chave, request.valores).await?))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{router, send, sheets, store};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_day_view() {
        let (status, body) = send(router(store()), "GET", "/atendimentos?data=01/05/2024", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["atendimentos"].as_array().unwrap().len(), 3);
        assert_eq!(body["metricas"]["conferidos"], 1);
        assert_eq!(body["duplicados"][0]["positions"], json!([2, 3]));
    }

    #[tokio::test]
    async fn test_day_view_invalid_date() {
        let (status, body) = send(router(store()), "GET", "/atendimentos?data=31/04/2024", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("31/04/2024"));
    }

    #[tokio::test]
    async fn test_conferir_marks_all_duplicates() {
        let store = store();
        let (status, body) = send(
            router(store.clone()),
            "POST",
            "/atendimentos/conferir",
            Some(json!({ "chaves": [
                { "cliente": "Ana Silva", "data": "01/05/2024" },
                { "cliente": "Ana Silva", "data": "31/04/2024" }
            ]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 2);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["parse_failures"][0]["field"], "data");

        let values = store.values(&sheets().atendimentos).await.unwrap();
        assert_eq!(values[1][5], "sim");
        assert_eq!(values[2][5], "sim");
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let store = store();
        let router = router(store.clone());

        let (status, body) = send(
            router.clone(),
            "POST",
            "/atendimentos",
            Some(json!({ "cliente": "Carla", "data": "02/05/2024", "servico": "Manicure" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appended"], 1);

        let (status, body) = send(
            router,
            "PATCH",
            "/atendimentos",
            Some(json!({
                "chave": { "cliente": "carla", "data": "2/5/2024" },
                "valores": { "valor": "45,00" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 1);

        let values = store.values(&sheets().atendimentos).await.unwrap();
        assert_eq!(values[4][0], "Carla");
        assert_eq!(values[4][4], "45,00");
    }

    #[tokio::test]
    async fn test_write_failure_returns_bad_gateway_with_report() {
        let store = store();
        store.fail_writes_after(0);

        let (status, body) = send(
            router(store),
            "POST",
            "/atendimentos/conferir",
            Some(json!({ "chaves": [{ "cliente": "Ana Silva", "data": "01/05/2024" }] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["report"]["updated"], 0);
        assert_eq!(body["report"]["failed"], 2);
    }
}
