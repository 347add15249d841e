use async_trait::async_trait;
use chatguru::ChatGuruClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Motivo do envio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AgendamentoCriado,
    AtendimentoConferido,
}

/// Mensagem a ser entregue ao cliente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub phone: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, phone: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            phone: phone.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Falha de entrega; `transient` decide se vale tentar de novo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub transient: bool,
    pub message: String,
}

impl DeliveryError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            transient: false,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.transient { "transient" } else { "permanent" };
        write!(f, "{} delivery error: {}", kind, self.message)
    }
}

/// Canal de saída das notificações
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

#[async_trait]
impl NotificationChannel for ChatGuruClient {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.send_message(&notification.phone, &notification.text)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    DeliveryError::transient(e.to_string())
                } else {
                    DeliveryError::permanent(e.to_string())
                }
            })
    }
}
