//! Fila de notificações em segundo plano
//!
//! Comportamento:
//! - `enqueue` nunca bloqueia a operação principal (confirmação de agendamento,
//!   conferência de atendimento)
//! - Uma task dedicada entrega cada notificação pelo [`NotificationChannel`]
//! - Falhas transitórias são repetidas até `max_attempts`, com espera dobrando
//! - Falhas permanentes ou tentativas esgotadas vão para o [`DeadLetterLog`]
//!
//! Exemplo:
//! ```text
//! POST /atendimentos -> planilha atualizada -> enqueue(AgendamentoCriado)
//!                    -> resposta HTTP imediata
//! worker: deliver() 502 -> espera 500ms -> deliver() 200 -> entregue
//! ```

pub mod dead_letter;
pub mod notification;
pub mod queue;

pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use notification::{DeliveryError, Notification, NotificationChannel, NotificationKind};
pub use queue::{DeliveryPolicy, NotificationQueue, QueueStats};
