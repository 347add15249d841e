use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use planilhas::{RemoteTable, Table, TableRef};
use tokio::sync::RwLock;

/// Cache de leituras das planilhas para poupar a cota da API
///
/// Cada aba (planilha + nome da aba) fica guardada por `ttl`. Não há
/// invalidação automática além do TTL: quem escreve chama [`TableCache::invalidate`].
///
/// Uma leitura só é guardada se nenhuma invalidação da mesma aba aconteceu
/// enquanto ela buscava na planilha.
#[derive(Debug, Clone)]
pub struct TableCache {
    ttl: Duration,
    state: Arc<RwLock<CacheState>>,
    stats: Arc<CacheStats>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<TableRef, CachedTable>,
    generations: HashMap<TableRef, u64>,
    /// Incrementada por `clear`, vale para todas as abas
    epoch: u64,
}

impl CacheState {
    fn generation(&self, table: &TableRef) -> (u64, u64) {
        (self.epoch, self.generations.get(table).copied().unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
struct CachedTable {
    table: Arc<Table>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl TableCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.min(i64::MAX as u64) as i64),
            state: Arc::new(RwLock::new(CacheState::default())),
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Lê do cache se ainda válido, senão busca na planilha e guarda
    pub async fn get_or_fetch(&self, store: &dyn RemoteTable, table: &TableRef) -> planilhas::Result<Arc<Table>> {
        let generation = {
            let state = self.state.read().await;
            if let Some(cached) = state.entries.get(table) {
                if Utc::now() - cached.fetched_at < self.ttl {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Cache hit para {}", table);
                    return Ok(Arc::clone(&cached.table));
                }
            }
            state.generation(table)
        };

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = Arc::new(store.fetch(table).await?);
        crate::utils::logging::log_table_fetched(&table.to_string(), fetched.len());

        let mut state = self.state.write().await;
        if state.generation(table) == generation {
            state.entries.insert(
                table.clone(),
                CachedTable {
                    table: Arc::clone(&fetched),
                    fetched_at: Utc::now(),
                },
            );
        } else {
            tracing::debug!("Leitura de {} concorrente com invalidação, não guardada", table);
        }
        Ok(fetched)
    }

    pub async fn invalidate(&self, table: &TableRef) {
        let mut state = self.state.write().await;
        *state.generations.entry(table.clone()).or_insert(0) += 1;
        if state.entries.remove(table).is_some() {
            tracing::debug!("Cache invalidado para {}", table);
        }
    }

    pub async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let count = state.entries.len();
        state.entries.clear();
        state.epoch += 1;
        count
    }

    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.hits.load(Ordering::Relaxed),
            self.stats.misses.load(Ordering::Relaxed),
        )
    }
}
