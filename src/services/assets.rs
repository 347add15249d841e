//! Upload de fotos de clientes para o serviço de imagens
//!
//! A foto nunca fica no servidor nem na planilha: só a URL devolvida pelo
//! serviço é gravada na coluna `foto`.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::utils::error::{AppError, AppResult};
use crate::utils::logging::*;

/// Foto já decodificada, pronta para upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl PhotoUpload {
    /// Aceita base64 puro ou data URL (`data:image/png;base64,...`)
    pub fn from_base64(data: &str) -> AppResult<Self> {
        let (extension, payload) = match data.split_once(',') {
            Some((prefix, payload)) if prefix.starts_with("data:") => {
                let mime = prefix
                    .trim_start_matches("data:")
                    .split(';')
                    .next()
                    .unwrap_or_default();
                let extension = match mime {
                    "image/png" => "png",
                    "image/webp" => "webp",
                    "image/gif" => "gif",
                    _ => "jpg",
                };
                (extension, payload)
            }
            _ => ("jpg", data),
        };

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| AppError::ValidationError(format!("foto: invalid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::ValidationError("foto: empty image".to_string()));
        }

        Ok(Self {
            bytes,
            extension: extension.to_string(),
        })
    }

    fn mime_type(&self) -> &'static str {
        match self.extension.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "image/jpeg",
        }
    }
}

#[derive(Clone)]
pub struct AssetStore {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: Option<String>,
}

impl AssetStore {
    pub fn new(upload_url: impl Into<String>, upload_preset: Option<String>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create asset HTTP client: {}", e)))?;

        Ok(Self {
            http,
            upload_url: upload_url.into(),
            upload_preset,
        })
    }

    /// Envia a foto e devolve a URL pública (`secure_url`, ou `url` se ausente)
    pub async fn upload(&self, photo: &PhotoUpload, name: &str) -> AppResult<String> {
        let filename = format!("{}.{}", name, photo.extension);
        let part = reqwest::multipart::Part::bytes(photo.bytes.clone())
            .file_name(filename)
            .mime_str(photo.mime_type())
            .map_err(|e| AppError::InternalError(format!("Failed to create image part: {}", e)))?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(preset) = &self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        let response = self.http.post(&self.upload_url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log_asset_upload_failed(name, &error_text);
            return Err(AppError::AssetUpload(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        let body: Value = response.json().await?;
        let url = body
            .get("secure_url")
            .or_else(|| body.get("url"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| AppError::AssetUpload("response without url".to_string()))?;

        log_asset_uploaded(name, url);
        Ok(url.to_string())
    }
}
