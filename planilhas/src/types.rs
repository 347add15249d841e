//! Tipos de dados das planilhas: referência, linhas e blocos de escrita

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matching::same_header;

/// Posição (1-based) da linha de cabeçalho na aba
pub const HEADER_POSITION: usize = 1;

/// Identidade de uma aba: planilha + nome da aba
///
/// Também é a chave do cache de leituras.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub table_id: String,
    pub sheet_name: String,
}

impl TableRef {
    pub fn new(table_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            sheet_name: sheet_name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table_id, self.sheet_name)
    }
}

/// Uma linha da planilha remota
///
/// Não há chave primária: a identidade é a posição na aba (A1, 1-based,
/// cabeçalho na posição 1, primeira linha de dados na posição 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub position: usize,
    pub cells: Vec<String>,
}

impl RemoteRow {
    pub fn new(position: usize, cells: Vec<String>) -> Self {
        Self { position, cells }
    }

    /// Valor da coluna `index`, `None` se a célula não existe
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|s| s.as_str())
    }

    /// Linha sem nenhuma célula preenchida
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Conteúdo completo de uma aba, com o cabeçalho já consumido como schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<RemoteRow>,
}

impl Table {
    /// Monta a tabela a partir da matriz de valores devolvida pela API
    ///
    /// A API omite células vazias no fim de cada linha; as linhas são
    /// completadas até a largura do cabeçalho. Células extras vazias são
    /// descartadas, células extras preenchidas são mantidas.
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut iter = values.into_iter();
        let headers: Vec<String> = iter
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        let width = headers.len();

        let rows = iter
            .enumerate()
            .map(|(i, mut cells)| {
                while cells.len() > width && cells.last().map_or(false, |c| c.is_empty()) {
                    cells.pop();
                }
                if cells.len() < width {
                    cells.resize(width, String::new());
                }
                RemoteRow::new(HEADER_POSITION + 1 + i, cells)
            })
            .collect();

        Self { headers, rows }
    }

    /// Número de colunas do cabeçalho
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Índice (0-based) da coluna, comparando sem acento/caixa
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| same_header(h, name))
    }

    /// Linhas são densas a partir de `HEADER_POSITION + 1`, então a posição é o índice
    pub fn row_at(&self, position: usize) -> Option<&RemoteRow> {
        let index = position.checked_sub(HEADER_POSITION + 1)?;
        self.rows.get(index).filter(|r| r.position == position)
    }

    /// Posição da última linha com algum conteúdo (o cabeçalho se não há dados)
    pub fn last_occupied_position(&self) -> usize {
        self.rows
            .iter()
            .rev()
            .find(|r| !r.is_blank())
            .map(|r| r.position)
            .unwrap_or(HEADER_POSITION)
    }

    /// Primeira linha livre depois da última ocupada
    pub fn next_free_position(&self) -> usize {
        self.last_occupied_position() + 1
    }

    /// Matriz de valores incluindo o cabeçalho (formato da API)
    pub fn to_values(&self) -> Vec<Vec<String>> {
        std::iter::once(self.headers.clone())
            .chain(self.rows.iter().map(|r| r.cells.clone()))
            .collect()
    }
}

/// Bloco contíguo de linhas a sobrescrever, começando em `start_row`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRange {
    pub start_row: usize,
    pub rows: Vec<Vec<String>>,
}

impl WriteRange {
    pub fn new(start_row: usize, rows: Vec<Vec<String>>) -> Self {
        Self { start_row, rows }
    }

    /// Última posição coberta pelo bloco
    pub fn end_row(&self) -> usize {
        self.start_row + self.rows.len().saturating_sub(1)
    }

    /// Intervalo em notação A1, ex.: `'Atendimentos'!A2:F4`
    pub fn a1_range(&self, sheet_name: &str, width: usize) -> String {
        format!(
            "'{}'!A{}:{}{}",
            sheet_name.replace('\'', "''"),
            self.start_row,
            column_letter(width.max(1)),
            self.end_row()
        )
    }
}

/// Converte índice de coluna 1-based em letras (1 → A, 27 → AA)
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}
