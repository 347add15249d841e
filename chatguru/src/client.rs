//! Cliente HTTP da API ChatGuru (`/api/v1`, parâmetros por query string)

use std::time::Duration;

use chrono::Local;
use reqwest::Client as HttpClient;
use serde_json::Value;

use crate::error::{ChatGuruError, Result};

/// Credenciais e endereço da conta ChatGuru
#[derive(Debug, Clone)]
pub struct ChatGuruConfig {
    pub api_endpoint: String,
    pub api_token: String,
    pub account_id: String,
    pub phone_id: String,
}

#[derive(Clone)]
pub struct ChatGuruClient {
    http_client: HttpClient,
    config: ChatGuruConfig,
}

impl ChatGuruClient {
    pub fn new(config: ChatGuruConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ChatGuruError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, config })
    }

    /// URL base terminando em `/api/v1`, aceitando endpoint com ou sem sufixo
    pub fn base_url(&self) -> String {
        let endpoint = self.config.api_endpoint.trim_end_matches('/');
        if endpoint.ends_with("/api/v1") {
            endpoint.to_string()
        } else {
            format!("{}/api/v1", endpoint)
        }
    }

    /// Envia mensagem de WhatsApp para o número informado
    ///
    /// O envio é agendado para "agora" (`send_date` no fuso local).
    pub async fn send_message(&self, phone_number: &str, text: &str) -> Result<()> {
        let chat_number = clean_phone(phone_number)?;
        let send_date = Local::now().format("%Y-%m-%d %H:%M").to_string();

        tracing::debug!("ChatGuru message_send to {}", chat_number);

        let response = self
            .http_client
            .post(self.base_url())
            .query(&[
                ("key", self.config.api_token.as_str()),
                ("account_id", self.config.account_id.as_str()),
                ("phone_id", self.config.phone_id.as_str()),
                ("action", "message_send"),
                ("send_date", send_date.as_str()),
                ("text", text),
                ("chat_number", chat_number.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ChatGuruError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        // A API às vezes responde 200 com `result: error`
        if let Ok(json) = serde_json::from_str::<Value>(&body) {
            if json.get("result").and_then(|v| v.as_str()) == Some("error") {
                let message = json
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(ChatGuruError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        tracing::info!("Mensagem enviada com sucesso para {}", chat_number);
        Ok(())
    }
}

/// Mantém só os dígitos; prefixa 55 (Brasil) quando o número vem sem DDI
pub fn clean_phone(phone: &str) -> Result<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        0..=9 => Err(ChatGuruError::InvalidPhone(phone.to_string())),
        10 | 11 => Ok(format!("55{}", digits)),
        _ => Ok(digits),
    }
}
