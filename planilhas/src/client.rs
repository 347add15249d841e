//! Cliente HTTP para a API de valores do Google Sheets (v4)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, SheetsError};
use crate::retry::{send_with_retry, RetryPolicy};
use crate::store::{validate_range, RemoteTable};
use crate::types::{Table, TableRef, WriteRange};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Resposta de `GET .../values/{range}`
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Cliente para a API de planilhas
///
/// A autenticação (OAuth / service account) fica fora do crate: o cliente
/// recebe um access token pronto.
#[derive(Clone)]
pub struct SheetsClient {
    http_client: HttpClient,
    access_token: String,
    base_url: String,
    retry: RetryPolicy,
}

impl SheetsClient {
    /// Cria um novo cliente
    ///
    /// # Timeouts
    ///
    /// - Total: 30s
    /// - Connect: 5s
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    /// Cria um cliente apontando para outra URL base (proxy, testes)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SheetsError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn values_url(&self, table: &TableRef, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(&table.table_id),
            urlencoding::encode(range)
        )
    }

    fn sheet_range(table: &TableRef) -> String {
        format!("'{}'", table.sheet_name.replace('\'', "''"))
    }

    async fn get_values(&self, table: &TableRef, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(table, range);
        tracing::debug!("GET {}", url);

        let request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")]);

        let response = send_with_retry(request, &self.retry).await?;
        let response = self.handle_response(table, response).await?;
        let body: ValueRange = response.json().await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Largura atual do cabeçalho remoto
    async fn header_width(&self, table: &TableRef) -> Result<usize> {
        let range = format!("{}!1:1", Self::sheet_range(table));
        let values = self.get_values(table, &range).await?;
        Ok(values.first().map(|h| h.len()).unwrap_or(0))
    }

    async fn ensure_width(&self, table: &TableRef, width: usize) -> Result<()> {
        let remote = self.header_width(table).await?;
        if remote != width {
            return Err(SheetsError::SchemaMismatch(format!(
                "{} has {} header columns, write assumed {}",
                table, remote, width
            )));
        }
        Ok(())
    }

    /// Processa a resposta HTTP e trata erros
    async fn handle_response(&self, table: &TableRef, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        tracing::error!("Sheets API error ({}) on {}: {}", status_code, table, error_body);

        let message = serde_json::from_str::<Value>(&error_body)
            .ok()
            .and_then(|json| {
                json.pointer("/error/message")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or(error_body);

        Err(match status_code {
            401 | 403 => SheetsError::RemoteUnavailable(format!("authentication rejected: {}", message)),
            404 => SheetsError::NotFound(format!("{}: {}", table, message)),
            408 | 429 | 500..=599 => SheetsError::RemoteUnavailable(format!("status {}: {}", status_code, message)),
            _ => SheetsError::ApiError {
                status: status_code,
                message,
            },
        })
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RemoteTable for SheetsClient {
    async fn fetch(&self, table: &TableRef) -> Result<Table> {
        let values = self.get_values(table, &Self::sheet_range(table)).await?;
        let table_data = Table::from_values(values);
        tracing::debug!("Fetched {} rows from {}", table_data.len(), table);
        Ok(table_data)
    }

    async fn write_back(&self, table: &TableRef, start_row: usize, rows: Vec<Vec<String>>) -> Result<()> {
        let width = self.header_width(table).await?;
        let range = WriteRange::new(start_row, rows);
        validate_range(&range, width)?;

        let a1 = range.a1_range(&table.sheet_name, width);
        let url = self.values_url(table, &a1);
        tracing::debug!("PUT {} ({} rows)", url, range.rows.len());

        let request = self
            .http_client
            .put(&url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({
                "range": a1,
                "majorDimension": "ROWS",
                "values": range.rows,
            }));

        let response = send_with_retry(request, &self.retry).await?;
        self.handle_response(table, response).await?;
        Ok(())
    }

    /// Todos os blocos vão numa única chamada `values:batchUpdate`
    async fn write_ranges(&self, table: &TableRef, width: usize, ranges: Vec<WriteRange>) -> Result<()> {
        if ranges.is_empty() {
            return Ok(());
        }
        for range in &ranges {
            validate_range(range, width)?;
        }
        self.ensure_width(table, width).await?;

        let data: Vec<Value> = ranges
            .iter()
            .map(|range| {
                json!({
                    "range": range.a1_range(&table.sheet_name, width),
                    "majorDimension": "ROWS",
                    "values": range.rows,
                })
            })
            .collect();

        let url = format!(
            "{}/v4/spreadsheets/{}/values:batchUpdate",
            self.base_url,
            urlencoding::encode(&table.table_id)
        );
        tracing::debug!("POST {} ({} ranges)", url, data.len());

        let request = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "valueInputOption": "USER_ENTERED",
                "data": data,
            }));

        let response = send_with_retry(request, &self.retry).await?;
        self.handle_response(table, response).await?;
        Ok(())
    }
}
