use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub planilhas: PlanilhasSettings,
    pub chatguru: ChatGuruSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub comissao: ComissaoSettings,
    #[serde(default)]
    pub exportacao: ExportacaoSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Onde ficam as abas: Google Sheets (`google`) ou memória do processo (`memory`)
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Google,
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlanilhasSettings {
    pub backend: Backend,
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub spreadsheet_id: String,
    pub aba_atendimentos: String,
    pub aba_clientes: String,
    pub cache_ttl_seconds: u64,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatGuruSettings {
    pub enabled: bool,
    pub api_token: Option<String>,
    pub api_endpoint: Option<String>,
    pub account_id: Option<String>,
    pub phone_id: Option<String>,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub dead_letter_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AssetSettings {
    pub enabled: bool,
    pub upload_url: Option<String>,
    pub upload_preset: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ComissaoSettings {
    pub taxa_padrao: f64,
    /// Nome do profissional → taxa (0.0 a 1.0)
    #[serde(default)]
    pub excecoes: HashMap<String, f64>,
}

impl Default for ComissaoSettings {
    fn default() -> Self {
        Self {
            taxa_padrao: 0.4,
            excecoes: HashMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportacaoSettings {
    pub delimitador: char,
    pub marcar_exportado: bool,
}

impl Default for ExportacaoSettings {
    fn default() -> Self {
        Self {
            delimitador: ';',
            marcar_exportado: true,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("SALAO").separator("__"));

        // Segredos ficam fora dos arquivos
        if let Ok(token) = std::env::var("SHEETS_ACCESS_TOKEN") {
            builder = builder.set_override("planilhas.access_token", token)?;
        }
        if let Ok(token) = std::env::var("CHATGURU_API_TOKEN") {
            builder = builder.set_override("chatguru.api_token", token)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Valida combinações que o deserializador não cobre
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.planilhas.backend == Backend::Google && self.planilhas.access_token.is_none() {
            return Err(ConfigError::Message(
                "planilhas.access_token (ou SHEETS_ACCESS_TOKEN) é obrigatório com backend google".into(),
            ));
        }
        if !self.exportacao.delimitador.is_ascii() {
            return Err(ConfigError::Message("exportacao.delimitador deve ser ASCII".into()));
        }
        if !(0.0..=1.0).contains(&self.comissao.taxa_padrao)
            || self.comissao.excecoes.values().any(|t| !(0.0..=1.0).contains(t))
        {
            return Err(ConfigError::Message("taxas de comissão devem estar entre 0 e 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const BASE: &str = r#"
        [server]
        host = "0.0.0.0"
        port = 8080

        [planilhas]
        backend = "memory"
        spreadsheet_id = "planilha"
        aba_atendimentos = "Atendimentos"
        aba_clientes = "Clientes"
        cache_ttl_seconds = 60

        [chatguru]
        enabled = false
        max_attempts = 3
        initial_backoff_ms = 500
    "#;

    #[test]
    fn test_optional_sections_use_defaults() {
        let settings = from_toml(BASE);
        assert_eq!(settings.planilhas.backend, Backend::Memory);
        assert_eq!(settings.exportacao.delimitador, ';');
        assert!((settings.comissao.taxa_padrao - 0.4).abs() < f64::EPSILON);
        assert!(!settings.assets.enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_google_backend_requires_token() {
        let mut settings = from_toml(BASE);
        settings.planilhas.backend = Backend::Google;
        assert!(settings.validate().is_err());

        settings.planilhas.access_token = Some("token".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_commission_overrides() {
        let settings = from_toml(&format!(
            "{}\n[comissao]\ntaxa_padrao = 0.35\n[comissao.excecoes]\nRita = 0.5\n",
            BASE
        ));
        // config normaliza chaves para minúsculas; a busca por profissional também normaliza
        assert_eq!(settings.comissao.excecoes.get("rita"), Some(&0.5));
        assert!((settings.comissao.taxa_padrao - 0.35).abs() < f64::EPSILON);

        let mut invalid = settings.clone();
        invalid.comissao.taxa_padrao = 1.5;
        assert!(invalid.validate().is_err());
    }
}
