use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Field, KeyInput};

/// Valores por campo lógico
pub type FieldValues = BTreeMap<Field, String>;

/// Edição proposta pelo usuário, resolvida contra a planilha e descartada em seguida
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum EditIntent {
    /// Nova linha; se a chave já existe, vira atualização da última ocorrência
    Insert { values: FieldValues },
    /// Atualiza campos da última ocorrência da chave
    UpdateFields { key: KeyInput, values: FieldValues },
    /// Marca como conferidas todas as linhas da chave
    MarkConferred { key: KeyInput },
    /// Marca como exportada a linha da posição, se ela ainda tem a chave exportada
    MarkExported { position: usize, key: KeyInput },
}

impl EditIntent {
    pub fn insert(values: FieldValues) -> Self {
        EditIntent::Insert { values }
    }

    pub fn update(key: KeyInput, values: FieldValues) -> Self {
        EditIntent::UpdateFields { key, values }
    }

    pub fn mark_conferred(key: KeyInput) -> Self {
        EditIntent::MarkConferred { key }
    }

    /// Chave digitada da intenção
    pub fn key_input(&self) -> Option<KeyInput> {
        match self {
            EditIntent::Insert { values } => Some(KeyInput {
                cliente: values.get(&Field::Cliente).cloned().unwrap_or_default(),
                data: values.get(&Field::Data).cloned().unwrap_or_default(),
                servico: values.get(&Field::Servico).cloned(),
            }),
            EditIntent::UpdateFields { key, .. }
            | EditIntent::MarkConferred { key }
            | EditIntent::MarkExported { key, .. } => Some(key.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EditIntent::Insert { .. } => "insert",
            EditIntent::UpdateFields { .. } => "update_fields",
            EditIntent::MarkConferred { .. } => "mark_conferred",
            EditIntent::MarkExported { .. } => "mark_exported",
        }
    }
}
