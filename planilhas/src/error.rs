//! Tipos de erro para o crate planilhas

use thiserror::Error;

/// Erros do cliente de planilhas
#[derive(Debug, Error)]
pub enum SheetsError {
    /// Falha de rede, timeout ou autenticação: a planilha não pôde ser lida/escrita
    #[error("Remote table unavailable: {0}")]
    RemoteUnavailable(String),

    /// Largura das linhas não bate com o cabeçalho, ou coluna esperada ausente
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Erro da API (status não-2xx que não é de disponibilidade)
    #[error("Sheets API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Erro de parsing JSON
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Aba ou planilha inexistente
    #[error("Sheet not found: {0}")]
    NotFound(String),

    /// Erro de configuração
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SheetsError {
    /// Indica se o erro é de disponibilidade (rede/autenticação)
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SheetsError::RemoteUnavailable(_))
    }
}

impl From<reqwest::Error> for SheetsError {
    fn from(err: reqwest::Error) -> Self {
        SheetsError::RemoteUnavailable(err.to_string())
    }
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, SheetsError>;
