//! Armazenamento em memória com a mesma semântica posicional da planilha remota
//!
//! Usado nos testes e pelo backend `memory` da configuração. Escritas de
//! vários blocos são preparadas numa cópia e só publicadas se todos os blocos
//! forem aceitos, então uma falha no meio do lote não deixa nada visível.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, SheetsError};
use crate::store::{validate_range, RemoteTable};
use crate::types::{Table, TableRef, WriteRange};

const NO_FAILURE: usize = usize::MAX;

#[derive(Debug)]
pub struct MemoryTable {
    sheets: RwLock<HashMap<TableRef, Vec<Vec<String>>>>,
    fail_fetch: AtomicBool,
    fail_after_ranges: AtomicUsize,
    write_calls: AtomicUsize,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTable {
    pub fn new() -> Self {
        Self {
            sheets: RwLock::new(HashMap::new()),
            fail_fetch: AtomicBool::new(false),
            fail_after_ranges: AtomicUsize::new(NO_FAILURE),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Cria a aba com os valores dados (primeira linha = cabeçalho)
    pub fn with_sheet(mut self, table: TableRef, values: Vec<Vec<String>>) -> Self {
        self.sheets.get_mut().insert(table, values);
        self
    }

    pub async fn insert_sheet(&self, table: TableRef, values: Vec<Vec<String>>) {
        self.sheets.write().await.insert(table, values);
    }

    /// Matriz bruta da aba, incluindo cabeçalho
    pub async fn values(&self, table: &TableRef) -> Option<Vec<Vec<String>>> {
        self.sheets.read().await.get(table).cloned()
    }

    /// Faz as leituras seguintes falharem como indisponibilidade
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Simula queda de rede depois de `ranges` blocos aceitos no mesmo lote
    pub fn fail_writes_after(&self, ranges: usize) {
        self.fail_after_ranges.store(ranges, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        self.fail_fetch.store(false, Ordering::SeqCst);
        self.fail_after_ranges.store(NO_FAILURE, Ordering::SeqCst);
    }

    /// Quantas chamadas de escrita chegaram ao armazenamento
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

fn apply_range(values: &mut Vec<Vec<String>>, range: WriteRange) {
    let end = range.end_row();
    if values.len() < end {
        values.resize(end, Vec::new());
    }
    for (offset, row) in range.rows.into_iter().enumerate() {
        values[range.start_row - 1 + offset] = row;
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    async fn fetch(&self, table: &TableRef) -> Result<Table> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SheetsError::RemoteUnavailable(format!(
                "simulated network failure reading {}",
                table
            )));
        }
        let sheets = self.sheets.read().await;
        let values = sheets
            .get(table)
            .ok_or_else(|| SheetsError::NotFound(table.to_string()))?;
        Ok(Table::from_values(values.clone()))
    }

    async fn write_back(&self, table: &TableRef, start_row: usize, rows: Vec<Vec<String>>) -> Result<()> {
        let width = {
            let sheets = self.sheets.read().await;
            sheets
                .get(table)
                .and_then(|v| v.first())
                .map(|h| h.len())
                .ok_or_else(|| SheetsError::NotFound(table.to_string()))?
        };
        self.write_ranges(table, width, vec![WriteRange::new(start_row, rows)])
            .await
    }

    async fn write_ranges(&self, table: &TableRef, width: usize, ranges: Vec<WriteRange>) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let mut sheets = self.sheets.write().await;
        let current = sheets
            .get(table)
            .ok_or_else(|| SheetsError::NotFound(table.to_string()))?;

        let header_width = current.first().map(|h| h.len()).unwrap_or(0);
        if header_width != width {
            return Err(SheetsError::SchemaMismatch(format!(
                "{} has {} columns, write assumed {}",
                table, header_width, width
            )));
        }
        for range in &ranges {
            validate_range(range, width)?;
        }

        let fail_after = self.fail_after_ranges.load(Ordering::SeqCst);
        let mut staged = current.clone();
        for (applied, range) in ranges.into_iter().enumerate() {
            if applied >= fail_after {
                return Err(SheetsError::RemoteUnavailable(format!(
                    "simulated network failure writing {} after {} ranges",
                    table, applied
                )));
            }
            apply_range(&mut staged, range);
        }

        sheets.insert(table.clone(), staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> (TableRef, Vec<Vec<String>>) {
        (
            TableRef::new("planilha", "Atendimentos"),
            vec![
                vec!["Cliente".into(), "Conferido".into()],
                vec!["Ana".into(), "não".into()],
                vec!["Bia".into(), "não".into()],
            ],
        )
    }

    #[tokio::test]
    async fn test_write_back_is_visible_to_next_fetch() {
        let (table, values) = sheet();
        let store = MemoryTable::new().with_sheet(table.clone(), values);

        store
            .write_back(&table, 3, vec![vec!["Bia".into(), "sim".into()]])
            .await
            .unwrap();

        let fetched = store.fetch(&table).await.unwrap();
        assert_eq!(fetched.rows[1].cells, vec!["Bia", "sim"]);
    }

    #[tokio::test]
    async fn test_write_beyond_end_appends() {
        let (table, values) = sheet();
        let store = MemoryTable::new().with_sheet(table.clone(), values);

        store
            .write_back(&table, 4, vec![vec!["Carla".into(), "não".into()]])
            .await
            .unwrap();

        let fetched = store.fetch(&table).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched.rows[2].position, 4);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_nothing_visible() {
        let (table, values) = sheet();
        let store = MemoryTable::new().with_sheet(table.clone(), values.clone());
        store.fail_writes_after(1);

        let result = store
            .write_ranges(
                &table,
                2,
                vec![
                    WriteRange::new(2, vec![vec!["Ana".into(), "sim".into()]]),
                    WriteRange::new(4, vec![vec!["Carla".into(), "sim".into()]]),
                ],
            )
            .await;

        assert!(matches!(result, Err(SheetsError::RemoteUnavailable(_))));
        assert_eq!(store.values(&table).await.unwrap(), values);
    }

    #[tokio::test]
    async fn test_width_mismatch_is_rejected() {
        let (table, values) = sheet();
        let store = MemoryTable::new().with_sheet(table.clone(), values);

        let result = store.write_back(&table, 2, vec![vec!["Ana".into()]]).await;
        assert!(matches!(result, Err(SheetsError::SchemaMismatch(_))));
    }

    #[tokio::test]
    async fn test_fetch_failure_and_missing_sheet() {
        let (table, values) = sheet();
        let store = MemoryTable::new().with_sheet(table.clone(), values);

        store.set_fail_fetch(true);
        assert!(store.fetch(&table).await.unwrap_err().is_unavailable());

        store.clear_failures();
        let missing = TableRef::new("planilha", "Outra");
        assert!(matches!(store.fetch(&missing).await, Err(SheetsError::NotFound(_))));
    }
}
