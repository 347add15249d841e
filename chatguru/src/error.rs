//! Tipos de erro para o crate chatguru

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatGuruError {
    /// Erro de requisição HTTP (rede, timeout)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A API respondeu com status não-2xx ou `result: error`
    #[error("ChatGuru API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Telefone sem dígitos suficientes para um chat_number
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    /// Erro de configuração
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChatGuruError {
    /// Erros que valem nova tentativa (rede, 429, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            ChatGuruError::HttpError(_) => true,
            ChatGuruError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatGuruError>;
