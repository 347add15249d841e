use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dead_letter::{DeadLetter, DeadLetterLog};
use crate::notification::{Notification, NotificationChannel};

/// Capacidade da fila; `enqueue` nunca bloqueia, descarta para o dead-letter quando cheia
const QUEUE_CAPACITY: usize = 256;

/// Tentativas e espera entre elas (dobra a cada falha)
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
        }
    }
}

impl DeliveryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(exponent)
                .min(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Default)]
pub struct QueueStats {
    pub delivered: AtomicU64,
    pub retried: AtomicU64,
    pub dead_lettered: AtomicU64,
}

/// Fila de notificações processada por uma task dedicada
///
/// O chamador só enfileira: falhas de envio nunca voltam para a operação
/// principal, terminam em retentativa ou no dead-letter log.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
    dead_letters: DeadLetterLog,
    stats: Arc<QueueStats>,
}

impl NotificationQueue {
    /// Inicia a task de entrega; o `JoinHandle` termina quando todas as cópias da fila são descartadas
    pub fn start(
        channel: Arc<dyn NotificationChannel>,
        policy: DeliveryPolicy,
        dead_letters: DeadLetterLog,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let stats = Arc::new(QueueStats::default());

        let worker = tokio::spawn(run_worker(
            receiver,
            channel,
            policy,
            dead_letters.clone(),
            Arc::clone(&stats),
        ));

        (
            Self {
                sender,
                dead_letters,
                stats,
            },
            worker,
        )
    }

    /// Enfileira sem esperar; devolve `false` se a mensagem foi para o dead-letter
    pub async fn enqueue(&self, notification: Notification) -> bool {
        tracing::debug!(
            "📬 Notificação {:?} enfileirada para {}",
            notification.kind,
            notification.phone
        );

        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(err) => {
                let reason = match &err {
                    mpsc::error::TrySendError::Full(_) => "fila cheia",
                    mpsc::error::TrySendError::Closed(_) => "fila encerrada",
                };
                self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                self.dead_letters
                    .record(DeadLetter {
                        notification: err.into_inner(),
                        attempts: 0,
                        last_error: reason.to_string(),
                        failed_at: Utc::now(),
                    })
                    .await;
                false
            }
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Notification>,
    channel: Arc<dyn NotificationChannel>,
    policy: DeliveryPolicy,
    dead_letters: DeadLetterLog,
    stats: Arc<QueueStats>,
) {
    tracing::info!("📨 Worker de notificações iniciado");

    while let Some(notification) = receiver.recv().await {
        deliver_with_retry(&notification, channel.as_ref(), &policy, &dead_letters, &stats).await;
    }

    tracing::info!("📭 Worker de notificações encerrado");
}

async fn deliver_with_retry(
    notification: &Notification,
    channel: &dyn NotificationChannel,
    policy: &DeliveryPolicy,
    dead_letters: &DeadLetterLog,
    stats: &QueueStats,
) {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match channel.deliver(notification).await {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    "✅ Notificação {} entregue na tentativa {}/{}",
                    notification.id,
                    attempt,
                    attempts
                );
                return;
            }
            Err(err) if err.transient && attempt < attempts => {
                stats.retried.fetch_add(1, Ordering::Relaxed);
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "🔁 Notificação {} falhou ({}), nova tentativa {}/{} em {:?}",
                    notification.id,
                    err,
                    attempt + 1,
                    attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                dead_letters
                    .record(DeadLetter {
                        notification: notification.clone(),
                        attempts: attempt,
                        last_error: err.message,
                        failed_at: Utc::now(),
                    })
                    .await;
                return;
            }
        }
    }
}
