//! Exportação de atendimentos para o layout de importação da contabilidade
//!
//! O layout é uma tabela fixa de colunas externas → campo interno + transformação.
//! Campos internos sem coluna no layout são ignorados. Uma linha sem algum
//! campo obrigatório (ou com valor que não converte) fica fora do arquivo e
//! entra na contagem de `skipped`; nunca sai uma linha pela metade.

use chrono::NaiveDate;
use planilhas::{RemoteRow, Table};
use serde::Serialize;
use thiserror::Error;

use crate::models::{EditIntent, Field, KeyInput};
use crate::services::schema::ResolvedSchema;
use crate::utils::normalization::{format_date_br, format_decimal_br, is_affirmative, normalize_string, parse_currency, parse_date};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to finish export blob: {0}")]
    Write(String),
}

/// Conversão aplicada ao valor da célula antes de ir para o arquivo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Text,
    /// Sem acento, maiúsculas
    Upper,
    DateBr,
    DateIso,
    /// `1234,50`
    Decimal,
    /// `S`/`N`
    Flag,
    Digits,
}

impl Transform {
    /// `None` quando o valor não converte (conta como ausente)
    pub fn apply(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            Transform::Text => Some(raw.to_string()),
            Transform::Upper => Some(normalize_string(raw).to_uppercase()).filter(|s| !s.is_empty()),
            Transform::DateBr => parse_date(raw).map(format_date_br),
            Transform::DateIso => parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string()),
            Transform::Decimal => parse_currency(raw).map(format_decimal_br),
            Transform::Flag => Some(if is_affirmative(raw) { "S" } else { "N" }.to_string()),
            Transform::Digits => {
                let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
                (!digits.is_empty()).then_some(digits)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportColumn {
    pub header: &'static str,
    pub field: Field,
    pub transform: Transform,
    pub required: bool,
}

const fn col(header: &'static str, field: Field, transform: Transform, required: bool) -> ExportColumn {
    ExportColumn {
        header,
        field,
        transform,
        required,
    }
}

#[derive(Debug, Clone)]
pub struct ExportSchema {
    pub name: &'static str,
    pub columns: Vec<ExportColumn>,
    pub delimiter: u8,
}

impl ExportSchema {
    /// Layout de lançamentos da contabilidade (ordem das colunas é contrato)
    pub fn contabil() -> Self {
        Self {
            name: "contabil",
            columns: vec![
                col("DATA", Field::Data, Transform::DateBr, true),
                col("CLIENTE", Field::Cliente, Transform::Upper, true),
                col("HISTORICO", Field::Servico, Transform::Text, false),
                col("PROFISSIONAL", Field::Profissional, Transform::Text, false),
                col("VALOR", Field::Valor, Transform::Decimal, true),
                col("FORMA_PAGAMENTO", Field::FormaPagamento, Transform::Upper, false),
                col("PAGO", Field::Pago, Transform::Flag, false),
            ],
            delimiter: b';',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.header).collect()
    }
}

/// Quais linhas entram na exportação
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFilter {
    pub inicio: Option<NaiveDate>,
    pub fim: Option<NaiveDate>,
    pub only_conferred: bool,
    pub skip_exported: bool,
}

impl ExportFilter {
    fn accepts(&self, row: &RemoteRow, schema: &ResolvedSchema) -> bool {
        // Data inválida segue adiante e é descartada como obrigatório ausente
        if let Some(data) = schema.value(row, Field::Data).and_then(parse_date) {
            if self.inicio.map_or(false, |inicio| data < inicio) || self.fim.map_or(false, |fim| data > fim) {
                return false;
            }
        }
        if self.only_conferred && !schema.value(row, Field::Conferido).map_or(false, is_affirmative) {
            return false;
        }
        if self.skip_exported && schema.value(row, Field::Exportado).map_or(false, is_affirmative) {
            return false;
        }
        true
    }
}

/// Linha que saiu no arquivo, com a chave para o `MarkExported` posterior
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedRow {
    pub position: usize,
    pub key: KeyInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub blob: String,
    pub included: Vec<ExportedRow>,
    pub skipped: usize,
    pub skipped_positions: Vec<usize>,
}

impl ExportOutcome {
    /// Intenções de marcação para exatamente as linhas exportadas
    pub fn mark_exported_intents(&self) -> Vec<EditIntent> {
        self.included
            .iter()
            .map(|row| EditIntent::MarkExported {
                position: row.position,
                key: row.key.clone(),
            })
            .collect()
    }
}

pub fn select_rows<'a>(table: &'a Table, schema: &ResolvedSchema, filter: &ExportFilter) -> Vec<&'a RemoteRow> {
    table
        .rows
        .iter()
        .filter(|row| !row.is_blank() && filter.accepts(row, schema))
        .collect()
}

fn render_row(row: &RemoteRow, schema: &ResolvedSchema, target: &ExportSchema) -> Option<Vec<String>> {
    target
        .columns
        .iter()
        .map(|column| {
            let value = schema.value(row, column.field).and_then(|v| column.transform.apply(v));
            match value {
                Some(v) => Some(v),
                None if column.required => None,
                None => Some(String::new()),
            }
        })
        .collect()
}

fn exported_key(row: &RemoteRow, schema: &ResolvedSchema) -> KeyInput {
    KeyInput {
        cliente: schema.value(row, Field::Cliente).unwrap_or_default().to_string(),
        data: schema.value(row, Field::Data).unwrap_or_default().to_string(),
        servico: schema.value(row, Field::Servico).map(str::to_string),
    }
}

/// Gera o arquivo delimitado (cabeçalho + linhas, CRLF) para o layout
pub fn format(rows: &[&RemoteRow], schema: &ResolvedSchema, target: &ExportSchema) -> Result<ExportOutcome, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(target.delimiter)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(target.headers())?;

    let mut included = Vec::new();
    let mut skipped_positions = Vec::new();

    for row in rows {
        match render_row(row, schema, target) {
            Some(record) => {
                writer.write_record(&record)?;
                included.push(ExportedRow {
                    position: row.position,
                    key: exported_key(row, schema),
                });
            }
            None => {
                tracing::debug!("Linha {} sem campo obrigatório para '{}'", row.position, target.name);
                skipped_positions.push(row.position);
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Write(e.to_string()))?;
    let blob = String::from_utf8(bytes).map_err(|e| ExportError::Write(e.to_string()))?;

    Ok(ExportOutcome {
        blob,
        included,
        skipped: skipped_positions.len(),
        skipped_positions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::schema::ATENDIMENTOS;

    fn table(rows: &[&[&str]]) -> Table {
        Table::from_values(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn sample() -> Table {
        table(&[
            &["Cliente", "Data", "Serviço", "Profissional", "Valor", "Forma de pagamento", "Conferido", "Exportado"],
            &["Ana Silva", "01/05/2024", "Escova", "Júlia", "R$ 80,00", "Pix", "sim", ""],
            &["Bia", "01/05/2024", "Corte", "Júlia", "", "Dinheiro", "sim", ""],
            &["Carla Dias", "02/05/2024", "Manicure; pé", "Rita", "1.234,5", "cartão", "não", ""],
            &["Dani", "03/05/2024", "Corte", "Rita", "50", "Pix", "sim", "sim"],
        ])
    }

    #[test]
    fn test_missing_required_field_excludes_row() {
        let table = sample();
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();
        let rows = select_rows(&table, &schema, &ExportFilter::default());

        let outcome = format(&rows, &schema, &ExportSchema::contabil()).unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.skipped_positions, vec![3]);
        assert_eq!(outcome.included.len(), 3);
        assert!(!outcome.blob.contains("BIA"));
        assert_eq!(outcome.blob.lines().count(), 4);
    }

    #[test]
    fn test_blob_layout() {
        let table = sample();
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();
        let rows = select_rows(&table, &schema, &ExportFilter::default());

        let outcome = format(&rows, &schema, &ExportSchema::contabil()).unwrap();
        let lines: Vec<&str> = outcome.blob.split("\r\n").collect();

        assert_eq!(lines[0], "DATA;CLIENTE;HISTORICO;PROFISSIONAL;VALOR;FORMA_PAGAMENTO;PAGO");
        assert_eq!(lines[1], "01/05/2024;ANA SILVA;Escova;Júlia;80,00;PIX;");
        assert_eq!(lines[2], "02/05/2024;CARLA DIAS;\"Manicure; pé\";Rita;1234,50;CARTAO;");
        assert!(outcome.blob.ends_with("\r\n"));
    }

    #[test]
    fn test_filter_conferred_and_not_exported() {
        let table = sample();
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();
        let filter = ExportFilter {
            only_conferred: true,
            skip_exported: true,
            ..Default::default()
        };

        let positions: Vec<usize> = select_rows(&table, &schema, &filter)
            .iter()
            .map(|r| r.position)
            .collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[test]
    fn test_filter_date_range() {
        let table = sample();
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();
        let filter = ExportFilter {
            inicio: NaiveDate::from_ymd_opt(2024, 5, 2),
            fim: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };

        let rows = select_rows(&table, &schema, &filter);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, 4);
    }

    #[test]
    fn test_mark_exported_only_for_included_rows() {
        let table = sample();
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();
        let rows = select_rows(&table, &schema, &ExportFilter::default());
        let outcome = format(&rows, &schema, &ExportSchema::contabil()).unwrap();

        let intents = outcome.mark_exported_intents();
        let positions: Vec<usize> = intents
            .iter()
            .map(|i| match i {
                EditIntent::MarkExported { position, .. } => *position,
                other => panic!("unexpected intent {:?}", other),
            })
            .collect();
        assert_eq!(positions, vec![2, 4, 5]);
        assert!(!positions.contains(&3));
    }

    #[test]
    fn test_transforms() {
        assert_eq!(Transform::DateIso.apply("1/5/24"), Some("2024-05-01".to_string()));
        assert_eq!(Transform::DateBr.apply("31/04/2024"), None);
        assert_eq!(Transform::Flag.apply("Sim"), Some("S".to_string()));
        assert_eq!(Transform::Flag.apply("pendente"), Some("N".to_string()));
        assert_eq!(Transform::Digits.apply("(11) 98888-7777"), Some("11988887777".to_string()));
        assert_eq!(Transform::Decimal.apply("abc"), None);
        assert_eq!(Transform::Text.apply("   "), None);
    }

    #[test]
    fn test_custom_delimiter() {
        let table = sample();
        let schema = ATENDIMENTOS.resolve(&table.headers).unwrap();
        let rows = select_rows(&table, &schema, &ExportFilter::default());

        let outcome = format(&rows[..1], &schema, &ExportSchema::contabil().with_delimiter(b',')).unwrap();
        assert!(outcome.blob.starts_with("DATA,CLIENTE,"));
    }
}
