use std::fmt;

use chrono::NaiveDate;
use planilhas::RemoteRow;
use serde::{Deserialize, Serialize};

use crate::models::Field;
use crate::services::schema::ResolvedSchema;
use crate::utils::normalization::{format_date_br, normalize_string, parse_date};

/// Identidade normalizada de um atendimento: cliente + data (+ serviço)
///
/// Sem serviço, a chave casa com qualquer serviço do mesmo cliente no dia.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalKey {
    pub cliente: String,
    pub data: NaiveDate,
    pub servico: Option<String>,
}

impl CanonicalKey {
    pub fn new(cliente: &str, data: NaiveDate, servico: Option<&str>) -> Self {
        Self {
            cliente: normalize_string(cliente),
            data,
            servico: servico
                .map(normalize_string)
                .filter(|s| !s.is_empty()),
        }
    }

    /// Chave sem o serviço, usada como índice
    pub fn day_key(&self) -> (String, NaiveDate) {
        (self.cliente.clone(), self.data)
    }

    /// `self` é o alvo (intenção); `row` é a chave da linha remota
    pub fn matches(&self, row: &CanonicalKey) -> bool {
        self.cliente == row.cliente
            && self.data == row.data
            && match &self.servico {
                Some(servico) => row.servico.as_ref() == Some(servico),
                None => true,
            }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.cliente, format_date_br(self.data))?;
        if let Some(servico) = &self.servico {
            write!(f, " ({})", servico)?;
        }
        Ok(())
    }
}

/// Campo que não pôde ser interpretado; a linha/intenção fica fora do casamento
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub field: Field,
    pub value: String,
    pub position: Option<usize>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(p) => write!(f, "row {}: cannot parse {} from '{}'", p, self.field, self.value),
            None => write!(f, "cannot parse {} from '{}'", self.field, self.value),
        }
    }
}

/// Chave como digitada pelo usuário, antes da normalização
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub cliente: String,
    pub data: String,
    #[serde(default)]
    pub servico: Option<String>,
}

impl KeyInput {
    pub fn new(cliente: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            cliente: cliente.into(),
            data: data.into(),
            servico: None,
        }
    }

    pub fn with_servico(mut self, servico: impl Into<String>) -> Self {
        self.servico = Some(servico.into());
        self
    }

    pub fn resolve(&self) -> Result<CanonicalKey, ParseFailure> {
        if normalize_string(&self.cliente).is_empty() {
            return Err(ParseFailure {
                field: Field::Cliente,
                value: self.cliente.clone(),
                position: None,
            });
        }
        let data = parse_date(&self.data).ok_or_else(|| ParseFailure {
            field: Field::Data,
            value: self.data.clone(),
            position: None,
        })?;
        Ok(CanonicalKey::new(&self.cliente, data, self.servico.as_deref()))
    }
}

/// Monta a chave canônica de uma linha remota
pub fn build_key(row: &RemoteRow, schema: &ResolvedSchema) -> Result<CanonicalKey, ParseFailure> {
    let failure = |field: Field| ParseFailure {
        field,
        value: schema.value(row, field).unwrap_or_default().to_string(),
        position: Some(row.position),
    };

    let cliente = schema
        .value(row, Field::Cliente)
        .filter(|c| !normalize_string(c).is_empty())
        .ok_or_else(|| failure(Field::Cliente))?;
    let data = schema
        .value(row, Field::Data)
        .and_then(parse_date)
        .ok_or_else(|| failure(Field::Data))?;

    Ok(CanonicalKey::new(cliente, data, schema.value(row, Field::Servico)))
}
