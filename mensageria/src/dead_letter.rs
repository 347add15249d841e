//! Registro das notificações que esgotaram as tentativas
//!
//! As últimas entradas ficam em memória (consultáveis pelo endpoint de saúde) e,
//! se houver caminho configurado, cada uma é anexada como uma linha JSON no
//! arquivo, que é o registro completo.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::notification::Notification;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub notification: Notification,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

/// Quantas entradas ficam em memória por padrão
pub const DEFAULT_MEMORY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct DeadLetterLog {
    path: Option<PathBuf>,
    limit: usize,
    entries: Arc<RwLock<VecDeque<DeadLetter>>>,
}

impl Default for DeadLetterLog {
    fn default() -> Self {
        Self {
            path: None,
            limit: DEFAULT_MEMORY_LIMIT,
            entries: Arc::new(RwLock::new(VecDeque::new())),
        }
    }
}

impl DeadLetterLog {
    /// Só em memória
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Em memória + arquivo JSONL
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Limita as entradas em memória; as mais antigas saem primeiro
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub async fn record(&self, letter: DeadLetter) {
        tracing::error!(
            "☠️ Notificação {} ({:?}) para {} descartada após {} tentativas: {}",
            letter.notification.id,
            letter.notification.kind,
            letter.notification.phone,
            letter.attempts,
            letter.last_error
        );

        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, &letter).await {
                tracing::error!("Falha ao gravar dead-letter em {}: {}", path.display(), e);
            }
        }

        let mut entries = self.entries.write().await;
        while entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back(letter);
    }

    /// Entradas em memória, da mais antiga para a mais recente
    pub async fn entries(&self) -> Vec<DeadLetter> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

async fn append_line(path: &PathBuf, letter: &DeadLetter) -> std::io::Result<()> {
    let mut line = serde_json::to_string(letter)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
