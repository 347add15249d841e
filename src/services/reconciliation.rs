//! Reconciliação de edições locais contra a planilha remota
//!
//! Fluxo de uma chamada a [`ReconciliationEngine::reconcile`]:
//!
//! 1. Lê a aba direto do armazenamento (nunca do cache)
//! 2. Indexa as linhas pela [`CanonicalKey`]; linhas sem chave válida ficam fora
//! 3. Resolve cada [`EditIntent`]:
//!    - chave encontrada → UPDATE na última ocorrência
//!    - `MarkConferred` → UPDATE em **todas** as ocorrências da chave
//!    - `Insert` sem ocorrência → APPEND na primeira linha livre
//!    - demais casos → skipped
//! 4. Junta as linhas alteradas em blocos contíguos e escreve tudo numa chamada
//!
//! A planilha não tem transação nem trava de linha: entre a leitura e a
//! escrita outro usuário pode alterar a aba, e a última escrita vence. Em caso
//! de falha nada é repetido automaticamente; o chamador relê antes de tentar
//! de novo, porque as posições podem ter mudado.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use planilhas::{RemoteRow, RemoteTable, SheetsError, Table, TableRef, WriteRange};
use thiserror::Error;

use crate::models::{
    build_key, AmbiguousMatch, CanonicalKey, EditIntent, Field, FieldValues, ParseFailure, ReconciliationReport,
};
use crate::services::schema::{ResolvedSchema, SchemaError, SheetSchema};
use crate::services::table_cache::TableCache;
use crate::utils::logging::*;
use crate::utils::normalization::normalize_string;

/// Valor gravado nas colunas de conferência/exportação
pub const SIM: &str = "sim";
pub const NAO: &str = "não";

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Remote table unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Reconciliation failed, {attempted} row operations aborted: {reason}")]
    ReconciliationFailed {
        attempted: usize,
        reason: String,
        report: Box<ReconciliationReport>,
    },
}

impl From<SheetsError> for ReconciliationError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::SchemaMismatch(msg) => ReconciliationError::SchemaMismatch(msg),
            SheetsError::NotFound(msg) => ReconciliationError::SchemaMismatch(format!("sheet not found: {}", msg)),
            other => ReconciliationError::RemoteUnavailable(other.to_string()),
        }
    }
}

impl From<SchemaError> for ReconciliationError {
    fn from(err: SchemaError) -> Self {
        ReconciliationError::SchemaMismatch(err.to_string())
    }
}

/// Escrita calculada para um lote de intenções
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub ranges: Vec<WriteRange>,
    pub report: ReconciliationReport,
}

struct Planner<'a> {
    table: &'a Table,
    schema: &'a ResolvedSchema,
    index: HashMap<(String, NaiveDate), Vec<(usize, CanonicalKey)>>,
    rows: BTreeMap<usize, Vec<String>>,
    next_free: usize,
    report: ReconciliationReport,
}

/// Ajusta a linha à largura do cabeçalho (células além dela não são escritas)
fn fit(cells: &[String], width: usize) -> Vec<String> {
    let mut cells: Vec<String> = cells.iter().take(width).cloned().collect();
    cells.resize(width, String::new());
    cells
}

impl<'a> Planner<'a> {
    fn new(table: &'a Table, schema: &'a ResolvedSchema) -> Self {
        let mut planner = Self::new_unindexed(table, schema);

        for row in table.rows.iter().filter(|r| !r.is_blank()) {
            match build_key(row, schema) {
                Ok(key) => planner.add_to_index(row.position, key),
                Err(failure) => {
                    tracing::debug!("Linha fora do casamento: {}", failure);
                    planner.report.excluded_rows += 1;
                }
            }
        }
        planner
    }

    /// Planner sem índice de chaves (upsert por campo único)
    fn new_unindexed(table: &'a Table, schema: &'a ResolvedSchema) -> Self {
        Self {
            table,
            schema,
            index: HashMap::new(),
            rows: BTreeMap::new(),
            next_free: table.next_free_position(),
            report: ReconciliationReport::default(),
        }
    }

    fn add_to_index(&mut self, position: usize, key: CanonicalKey) {
        let entry = self.index.entry(key.day_key()).or_default();
        entry.retain(|(p, _)| *p != position);
        entry.push((position, key));
        entry.sort_by_key(|(p, _)| *p);
    }

    fn remove_from_index(&mut self, position: usize) {
        for entries in self.index.values_mut() {
            entries.retain(|(p, _)| *p != position);
        }
    }

    /// Posições (crescentes) cujas chaves casam com o alvo
    fn lookup(&self, target: &CanonicalKey) -> Vec<usize> {
        self.index
            .get(&target.day_key())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, key)| target.matches(key))
                    .map(|(p, _)| *p)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn original_cells(&self, position: usize) -> Option<Vec<String>> {
        self.table
            .row_at(position)
            .map(|r| fit(&r.cells, self.schema.width()))
    }

    fn current_cells(&self, position: usize) -> Vec<String> {
        self.rows
            .get(&position)
            .cloned()
            .or_else(|| self.original_cells(position))
            .unwrap_or_else(|| vec![String::new(); self.schema.width()])
    }

    fn write_values(&self, cells: &mut Vec<String>, values: &FieldValues) {
        for (field, value) in values {
            if !self.schema.set(cells, *field, value) {
                tracing::warn!("Campo '{}' não existe na aba, valor ignorado", field);
            }
        }
    }

    /// Aplica valores numa linha existente e reindexa se a chave mudou
    fn update_row(&mut self, position: usize, values: &FieldValues) {
        let mut cells = self.current_cells(position);
        self.write_values(&mut cells, values);

        let touches_key = values
            .keys()
            .any(|f| matches!(f, Field::Cliente | Field::Data | Field::Servico));
        if touches_key {
            self.remove_from_index(position);
            if let Ok(key) = build_key(&RemoteRow::new(position, cells.clone()), self.schema) {
                self.add_to_index(position, key);
            }
        }

        self.rows.insert(position, cells);
        self.report.updated += 1;
    }

    fn append_row(&mut self, key: CanonicalKey, values: &FieldValues) {
        let position = self.next_free;
        self.next_free += 1;

        let mut cells = vec![String::new(); self.schema.width()];
        self.write_values(&mut cells, values);

        self.add_to_index(position, key);
        self.rows.insert(position, cells);
        self.report.appended += 1;
    }

    fn skip(&mut self, intent: &EditIntent, reason: &str) {
        tracing::debug!("Intenção {} ignorada: {}", intent.kind(), reason);
        self.report.skipped += 1;
    }

    /// Resolve a chave digitada; intenção com chave inválida é ignorada e contada
    fn resolve_key(&mut self, intent: &EditIntent) -> Option<CanonicalKey> {
        let input = intent.key_input()?;
        match input.resolve() {
            Ok(key) => Some(key),
            Err(failure) => {
                self.report.parse_failures.push(failure.clone());
                self.skip(intent, &failure.to_string());
                None
            }
        }
    }

    fn targets(&mut self, key: &CanonicalKey) -> Vec<usize> {
        let positions = self.lookup(key);
        if positions.len() > 1 {
            self.report.record_ambiguous(key, &positions);
        }
        positions
    }

    fn apply(&mut self, intent: &EditIntent) {
        match intent {
            EditIntent::Insert { values } => {
                let Some(key) = self.resolve_key(intent) else { return };
                match self.targets(&key).last().copied() {
                    Some(position) => self.update_row(position, values),
                    None => self.append_row(key, values),
                }
            }
            EditIntent::UpdateFields { values, .. } => {
                let Some(key) = self.resolve_key(intent) else { return };
                match self.targets(&key).last().copied() {
                    Some(position) => self.update_row(position, values),
                    None => self.skip(intent, "key not found"),
                }
            }
            EditIntent::MarkConferred { .. } => {
                let Some(key) = self.resolve_key(intent) else { return };
                let positions = self.targets(&key);
                if positions.is_empty() {
                    self.skip(intent, "key not found");
                    return;
                }
                let values = FieldValues::from([(Field::Conferido, SIM.to_string())]);
                for position in positions {
                    self.update_row(position, &values);
                }
            }
            EditIntent::MarkExported { position, .. } => {
                let Some(key) = self.resolve_key(intent) else { return };
                let unchanged = self
                    .table
                    .row_at(*position)
                    .and_then(|row| build_key(row, self.schema).ok())
                    .map_or(false, |row_key| key.matches(&row_key));
                if unchanged {
                    let values = FieldValues::from([(Field::Exportado, SIM.to_string())]);
                    self.update_row(*position, &values);
                } else {
                    self.skip(intent, "row at position no longer carries the exported key");
                }
            }
        }
    }

    fn finish(mut self) -> WritePlan {
        let dirty: Vec<(usize, Vec<String>)> = std::mem::take(&mut self.rows)
            .into_iter()
            .filter(|(position, cells)| self.original_cells(*position).as_ref() != Some(cells))
            .collect();

        let mut ranges: Vec<WriteRange> = Vec::new();
        for (position, cells) in &dirty {
            let contiguous = ranges.last().map_or(false, |r| r.end_row() + 1 == *position);
            match ranges.last_mut() {
                Some(range) if contiguous => range.rows.push(cells.clone()),
                _ => ranges.push(WriteRange::new(*position, vec![cells.clone()])),
            }
        }

        self.report.ranges_written = ranges.len();
        self.report.written = dirty
            .into_iter()
            .map(|(position, cells)| RemoteRow::new(position, cells))
            .collect();

        WritePlan {
            ranges,
            report: self.report,
        }
    }
}

/// Calcula a escrita mínima para aplicar as intenções sobre a tabela
///
/// Só falha se a aba não tem a coluna exigida por algum tipo de intenção
/// (`conferido` para `MarkConferred`, `exportado` para `MarkExported`).
pub fn plan(table: &Table, schema: &ResolvedSchema, intents: &[EditIntent]) -> Result<WritePlan, SchemaError> {
    if intents.iter().any(|i| matches!(i, EditIntent::MarkConferred { .. })) {
        schema.require(Field::Conferido)?;
    }
    if intents.iter().any(|i| matches!(i, EditIntent::MarkExported { .. })) {
        schema.require(Field::Exportado)?;
    }

    let mut planner = Planner::new(table, schema);
    for intent in intents {
        planner.apply(intent);
    }
    Ok(planner.finish())
}

/// Grupos de linhas com a mesma chave completa (para exibir duplicidades)
pub fn find_duplicates(table: &Table, schema: &ResolvedSchema) -> Vec<AmbiguousMatch> {
    let mut groups: BTreeMap<CanonicalKey, Vec<usize>> = BTreeMap::new();
    for row in table.rows.iter().filter(|r| !r.is_blank()) {
        if let Ok(key) = build_key(row, schema) {
            groups.entry(key).or_default().push(row.position);
        }
    }
    groups
        .into_iter()
        .filter(|(_, positions)| positions.len() > 1)
        .map(|(key, positions)| AmbiguousMatch { key, positions })
        .collect()
}

/// Upsert por um único campo identificador (cadastro de clientes, que não tem data)
///
/// Mesmas regras do `Insert`: com ocorrência, atualiza a última; sem
/// ocorrência, acrescenta na primeira linha livre.
pub fn plan_upsert(
    table: &Table,
    schema: &ResolvedSchema,
    identity: Field,
    values: &FieldValues,
) -> Result<WritePlan, SchemaError> {
    schema.require(identity)?;
    let mut planner = Planner::new_unindexed(table, schema);

    let wanted = values.get(&identity).map(|v| normalize_string(v)).unwrap_or_default();
    if wanted.is_empty() {
        planner.report.skipped += 1;
        planner.report.parse_failures.push(ParseFailure {
            field: identity,
            value: values.get(&identity).cloned().unwrap_or_default(),
            position: None,
        });
        return Ok(planner.finish());
    }

    let positions: Vec<usize> = table
        .rows
        .iter()
        .filter(|row| schema.value(row, identity).map(normalize_string).as_deref() == Some(wanted.as_str()))
        .map(|row| row.position)
        .collect();

    match positions.last() {
        Some(&position) => {
            if positions.len() > 1 {
                tracing::warn!("'{}' aparece nas linhas {:?}, atualizando a última", wanted, positions);
            }
            // A grafia já gravada do identificador é mantida
            let mut values = values.clone();
            values.remove(&identity);
            planner.update_row(position, &values);
        }
        None => {
            let position = planner.next_free;
            planner.next_free += 1;
            let mut cells = vec![String::new(); schema.width()];
            planner.write_values(&mut cells, values);
            planner.rows.insert(position, cells);
            planner.report.appended += 1;
        }
    }
    Ok(planner.finish())
}

/// Executa leitura → plano → escrita em lote
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn RemoteTable>,
    cache: TableCache,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn RemoteTable>, cache: TableCache) -> Self {
        Self { store, cache }
    }

    pub async fn reconcile(
        &self,
        table: &TableRef,
        schema: &SheetSchema,
        intents: Vec<EditIntent>,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        self.reconcile_resolved(table, schema, intents)
            .await
            .map(|(report, _)| report)
    }

    /// Como [`reconcile`](Self::reconcile), devolvendo também o mapeamento de
    /// colunas usado, para interpretar `report.written`
    pub async fn reconcile_resolved(
        &self,
        table: &TableRef,
        schema: &SheetSchema,
        intents: Vec<EditIntent>,
    ) -> Result<(ReconciliationReport, ResolvedSchema), ReconciliationError> {
        let current = self.store.fetch(table).await?;
        let resolved = schema.resolve(&current.headers)?;
        let write_plan = plan(&current, &resolved, &intents)?;

        let report = self.execute(table, resolved.width(), write_plan).await?;
        Ok((report, resolved))
    }

    /// Upsert de uma linha identificada por um único campo
    pub async fn upsert(
        &self,
        table: &TableRef,
        schema: &SheetSchema,
        identity: Field,
        values: FieldValues,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let current = self.store.fetch(table).await?;
        let resolved = schema.resolve(&current.headers)?;
        let write_plan = plan_upsert(&current, &resolved, identity, &values)?;

        self.execute(table, resolved.width(), write_plan).await
    }

    async fn execute(
        &self,
        table: &TableRef,
        width: usize,
        write_plan: WritePlan,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let WritePlan { ranges, report } = write_plan;

        if ranges.is_empty() {
            log_reconciliation_applied(&table.to_string(), &report);
            return Ok(report);
        }

        let attempted = report.applied();
        let result = self.store.write_ranges(table, width, ranges).await;

        // Com ou sem sucesso, a cópia em cache não representa mais a planilha
        self.cache.invalidate(table).await;

        match result {
            Ok(()) => {
                log_reconciliation_applied(&table.to_string(), &report);
                Ok(report)
            }
            Err(e) => {
                log_reconciliation_failed(&table.to_string(), attempted, &e.to_string());
                Err(ReconciliationError::ReconciliationFailed {
                    attempted,
                    reason: e.to_string(),
                    report: Box::new(report.into_failed()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyInput;
    use crate::services::schema::{ATENDIMENTOS, CLIENTES};
    use planilhas::MemoryTable;

    fn strings(row: &[&str]) -> Vec<String> {
        row.iter().map(|c| c.to_string()).collect()
    }

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|r| strings(r)).collect()
    }

    fn table_ref() -> TableRef {
        TableRef::new("planilha", "Atendimentos")
    }

    fn engine_with(values: Vec<Vec<String>>) -> (Arc<MemoryTable>, ReconciliationEngine) {
        let store = Arc::new(MemoryTable::new().with_sheet(table_ref(), values));
        let engine = ReconciliationEngine::new(store.clone(), TableCache::new(60));
        (store, engine)
    }

    fn ana_duplicada() -> Vec<Vec<String>> {
        sheet(&[
            &["Cliente", "Data", "conferido"],
            &["Ana Silva", "01/05/2024", "não"],
            &["ana   silva", "01/05/2024", "não"],
        ])
    }

    fn values(pairs: &[(Field, &str)]) -> FieldValues {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_mark_conferred_updates_every_duplicate() {
        let (store, engine) = engine_with(ana_duplicada());

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::mark_conferred(KeyInput::new("Ana Silva", "01/05/2024"))],
            )
            .await
            .unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].positions, vec![2, 3]);
        assert_eq!(report.ranges_written, 1);
        assert_eq!(store.write_calls(), 1);

        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values[1][2], "sim");
        assert_eq!(values[2][2], "sim");
    }

    #[tokio::test]
    async fn test_mark_conferred_on_n_duplicates_never_a_subset() {
        let mut rows = vec![strings(&["Cliente", "Data", "Conferido"])];
        for i in 0..7 {
            let nome = if i % 2 == 0 { "Bia Souza" } else { "BIA  SOUZA " };
            rows.push(strings(&[nome, "02/05/2024", "não"]));
            rows.push(strings(&["Carla", "02/05/2024", "não"]));
        }
        let (store, engine) = engine_with(rows);

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::mark_conferred(KeyInput::new("Bia Souza", "2/5/2024"))],
            )
            .await
            .unwrap();

        assert_eq!(report.updated, 7);
        let values = store.values(&table_ref()).await.unwrap();
        for row in values.iter().skip(1) {
            let expected = if row[0] == "Carla" { "não" } else { "sim" };
            assert_eq!(row[2], expected);
        }
    }

    #[tokio::test]
    async fn test_update_fields_with_unique_keys_targets_one_row_each() {
        let (store, engine) = engine_with(sheet(&[
            &["Cliente", "Data", "Valor", "Forma de pagamento"],
            &["Ana", "01/05/2024", "", ""],
            &["Bia", "01/05/2024", "", ""],
            &["Carla", "01/05/2024", "", ""],
            &["Ana", "02/05/2024", "", ""],
        ]));

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![
                    EditIntent::update(
                        KeyInput::new("ana", "01/05/2024"),
                        values(&[(Field::Valor, "120,00"), (Field::FormaPagamento, "Pix")]),
                    ),
                    EditIntent::update(KeyInput::new("Carla", "01/05/2024"), values(&[(Field::Valor, "80,00")])),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.appended, 0);
        assert!(report.ambiguous.is_empty());

        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values.len(), 5);
        assert_eq!(values[1], strings(&["Ana", "01/05/2024", "120,00", "Pix"]));
        assert_eq!(values[2], strings(&["Bia", "01/05/2024", "", ""]));
        assert_eq!(values[3], strings(&["Carla", "01/05/2024", "80,00", ""]));
        assert_eq!(values[4], strings(&["Ana", "02/05/2024", "", ""]));
    }

    #[tokio::test]
    async fn test_update_with_duplicates_targets_last_occurrence() {
        let (store, engine) = engine_with(ana_duplicada());

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::update(
                    KeyInput::new("Ana Silva", "01/05/2024"),
                    values(&[(Field::Conferido, "sim")]),
                )],
            )
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.ambiguous[0].positions, vec![2, 3]);
        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values[1][2], "não");
        assert_eq!(values[2][2], "sim");
    }

    #[tokio::test]
    async fn test_insert_appends_after_last_occupied_row() {
        let (store, engine) = engine_with(sheet(&[
            &["Cliente", "Data", "Serviço"],
            &["Ana", "01/05/2024", "Corte"],
            &["", "", ""],
            &["Bia", "01/05/2024", "Escova"],
            &["", "", ""],
        ]));

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![
                    EditIntent::insert(values(&[
                        (Field::Cliente, "Carla"),
                        (Field::Data, "03/05/2024"),
                        (Field::Servico, "Manicure"),
                    ])),
                    EditIntent::insert(values(&[
                        (Field::Cliente, "Dani"),
                        (Field::Data, "03/05/2024"),
                        (Field::Servico, "Pedicure"),
                    ])),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.appended, 2);
        assert_eq!(report.ranges_written, 1);
        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values[2], strings(&["", "", ""]));
        assert_eq!(values[4], strings(&["Carla", "03/05/2024", "Manicure"]));
        assert_eq!(values[5], strings(&["Dani", "03/05/2024", "Pedicure"]));
    }

    #[tokio::test]
    async fn test_insert_existing_key_becomes_update() {
        let (store, engine) = engine_with(sheet(&[
            &["Cliente", "Data", "Serviço", "Valor"],
            &["Ana", "01/05/2024", "Corte", ""],
        ]));

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::insert(values(&[
                    (Field::Cliente, "ANA"),
                    (Field::Data, "01/05/2024"),
                    (Field::Servico, "corte"),
                    (Field::Valor, "50"),
                ]))],
            )
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.appended, 0);
        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1][3], "50");
    }

    #[tokio::test]
    async fn test_insert_then_confer_in_same_batch() {
        let (store, engine) = engine_with(sheet(&[&["Cliente", "Data", "Conferido"]]));

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![
                    EditIntent::insert(values(&[
                        (Field::Cliente, "Ana"),
                        (Field::Data, "01/05/2024"),
                        (Field::Conferido, "não"),
                    ])),
                    EditIntent::mark_conferred(KeyInput::new("Ana", "01/05/2024")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.appended, 1);
        assert_eq!(report.updated, 1);
        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values[1], strings(&["Ana", "01/05/2024", "sim"]));
    }

    #[tokio::test]
    async fn test_invalid_date_intent_is_skipped_not_fatal() {
        let (store, engine) = engine_with(ana_duplicada());

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![
                    EditIntent::mark_conferred(KeyInput::new("Ana Silva", "31/04/2024")),
                    EditIntent::mark_conferred(KeyInput::new("Ana Silva", "01/05/2024")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.parse_failures.len(), 1);
        assert_eq!(report.parse_failures[0].field, Field::Data);
        assert_eq!(report.updated, 2);
        assert_eq!(store.values(&table_ref()).await.unwrap()[1][2], "sim");
    }

    #[tokio::test]
    async fn test_unknown_key_is_skipped() {
        let (store, engine) = engine_with(ana_duplicada());

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::mark_conferred(KeyInput::new("Zélia", "01/05/2024"))],
            )
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.applied(), 0);
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_applies_nothing() {
        let (store, engine) = engine_with(sheet(&[
            &["Cliente", "Data", "Conferido"],
            &["Ana Silva", "01/05/2024", "não"],
            &["Bia", "01/05/2024", "não"],
            &["ana silva", "01/05/2024", "não"],
        ]));
        let before = store.values(&table_ref()).await.unwrap();
        store.fail_writes_after(1);

        let err = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::mark_conferred(KeyInput::new("Ana Silva", "01/05/2024"))],
            )
            .await
            .unwrap_err();

        match err {
            ReconciliationError::ReconciliationFailed { attempted, report, .. } => {
                assert_eq!(attempted, 2);
                assert_eq!(report.updated, 0);
                assert_eq!(report.appended, 0);
                assert_eq!(report.failed, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.values(&table_ref()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_remote_unavailable() {
        let (store, engine) = engine_with(ana_duplicada());
        store.set_fail_fetch(true);

        let err = engine
            .reconcile(&table_ref(), &ATENDIMENTOS, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::RemoteUnavailable(_)));
    }

    #[tokio::test]
    async fn test_mark_conferred_without_column_is_schema_mismatch() {
        let (store, engine) = engine_with(sheet(&[&["Cliente", "Data"], &["Ana", "01/05/2024"]]));

        let err = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![EditIntent::mark_conferred(KeyInput::new("Ana", "01/05/2024"))],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::SchemaMismatch(_)));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_mark_exported_checks_row_is_unchanged() {
        let (store, engine) = engine_with(sheet(&[
            &["Cliente", "Data", "Exportado"],
            &["Ana", "01/05/2024", ""],
            &["Bia", "01/05/2024", ""],
        ]));

        let report = engine
            .reconcile(
                &table_ref(),
                &ATENDIMENTOS,
                vec![
                    EditIntent::MarkExported {
                        position: 2,
                        key: KeyInput::new("Ana", "1/5/2024"),
                    },
                    EditIntent::MarkExported {
                        position: 3,
                        key: KeyInput::new("Carla", "01/05/2024"),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 1);
        let values = store.values(&table_ref()).await.unwrap();
        assert_eq!(values[1][2], "sim");
        assert_eq!(values[2][2], "");
    }

    #[test]
    fn test_plan_coalesces_contiguous_rows() {
        let table = Table::from_values(sheet(&[
            &["Cliente", "Data", "Conferido"],
            &["Ana", "01/05/2024", "não"],
            &["Ana", "01/05/2024", "não"],
            &["Bia", "01/05/2024", "não"],
            &["Ana", "01/05/2024", "não"],
        ]));
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();

        let plan = plan(
            &table,
            &schema,
            &[EditIntent::mark_conferred(KeyInput::new("Ana", "01/05/2024"))],
        )
        .unwrap();

        assert_eq!(plan.ranges.len(), 2);
        assert_eq!(plan.ranges[0].start_row, 2);
        assert_eq!(plan.ranges[0].rows.len(), 2);
        assert_eq!(plan.ranges[1].start_row, 5);
    }

    #[test]
    fn test_plan_skips_rows_already_holding_values() {
        let table = Table::from_values(sheet(&[
            &["Cliente", "Data", "Conferido"],
            &["Ana", "01/05/2024", "sim"],
        ]));
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();

        let plan = plan(
            &table,
            &schema,
            &[EditIntent::mark_conferred(KeyInput::new("Ana", "01/05/2024"))],
        )
        .unwrap();

        assert_eq!(plan.report.updated, 1);
        assert!(plan.ranges.is_empty());
    }

    #[test]
    fn test_rows_with_bad_dates_are_excluded_from_matching() {
        let table = Table::from_values(sheet(&[
            &["Cliente", "Data", "Conferido"],
            &["Ana", "31/04/2024", "não"],
            &["Ana", "30/04/2024", "não"],
        ]));
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();

        let plan = plan(
            &table,
            &schema,
            &[EditIntent::mark_conferred(KeyInput::new("Ana", "30/04/2024"))],
        )
        .unwrap();

        assert_eq!(plan.report.excluded_rows, 1);
        assert_eq!(plan.report.updated, 1);
        assert_eq!(plan.ranges[0].start_row, 3);
    }

    #[test]
    fn test_find_duplicates() {
        let table = Table::from_values(ana_duplicada());
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();

        let duplicates = find_duplicates(&table, &schema);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].key.cliente, "ana silva");
        assert_eq!(duplicates[0].positions, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_upsert_client_by_name() {
        let clientes = TableRef::new("planilha", "Clientes");
        let store = Arc::new(MemoryTable::new().with_sheet(
            clientes.clone(),
            sheet(&[&["Nome", "Telefone", "Foto"], &["Ana Silva", "11 1111-1111", ""]]),
        ));
        let engine = ReconciliationEngine::new(store.clone(), TableCache::new(60));

        let report = engine
            .upsert(
                &clientes,
                &CLIENTES,
                Field::Cliente,
                values(&[(Field::Cliente, "ANA SILVA"), (Field::Telefone, "11 2222-2222")]),
            )
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let report = engine
            .upsert(
                &clientes,
                &CLIENTES,
                Field::Cliente,
                values(&[(Field::Cliente, "Bia"), (Field::Foto, "https://cdn/bia.jpg")]),
            )
            .await
            .unwrap();
        assert_eq!(report.appended, 1);

        let values = store.values(&clientes).await.unwrap();
        assert_eq!(values[1], strings(&["Ana Silva", "11 2222-2222", ""]));
        assert_eq!(values[2], strings(&["Bia", "", "https://cdn/bia.jpg"]));
    }

    #[test]
    fn test_upsert_without_identity_is_skipped() {
        let table = Table::from_values(sheet(&[&["Nome", "Telefone"]]));
        let schema = CLIENTES.resolve(&table.headers).unwrap();

        let plan = plan_upsert(&table, &schema, Field::Cliente, &values(&[(Field::Telefone, "1")])).unwrap();
        assert_eq!(plan.report.skipped, 1);
        assert!(plan.ranges.is_empty());
    }
}
