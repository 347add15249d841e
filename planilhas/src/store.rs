//! Contrato do armazenamento tabular remoto

use async_trait::async_trait;

use crate::error::{Result, SheetsError};
use crate::types::{Table, TableRef, WriteRange, HEADER_POSITION};

/// Armazenamento tabular endereçado por posição
///
/// Leituras devolvem a aba inteira; escritas sobrescrevem linhas inteiras
/// em blocos contíguos. Tudo que é escrito fica visível na leitura seguinte.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Lê todas as linhas da aba, consumindo a primeira como cabeçalho
    async fn fetch(&self, table: &TableRef) -> Result<Table>;

    /// Sobrescreve `rows` a partir de `start_row`
    async fn write_back(&self, table: &TableRef, start_row: usize, rows: Vec<Vec<String>>) -> Result<()>;

    /// Escreve vários blocos
    ///
    /// A implementação padrão valida todos os blocos antes da primeira escrita;
    /// implementações com escrita em lote remota devem sobrescrever.
    async fn write_ranges(&self, table: &TableRef, width: usize, ranges: Vec<WriteRange>) -> Result<()> {
        for range in &ranges {
            validate_range(range, width)?;
        }
        for range in ranges {
            self.write_back(table, range.start_row, range.rows).await?;
        }
        Ok(())
    }
}

/// Garante que o bloco não toca o cabeçalho e que toda linha tem a largura do schema
pub fn validate_range(range: &WriteRange, width: usize) -> Result<()> {
    if range.start_row <= HEADER_POSITION {
        return Err(SheetsError::SchemaMismatch(format!(
            "write at row {} would overwrite the header",
            range.start_row
        )));
    }
    if let Some((offset, row)) = range.rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(SheetsError::SchemaMismatch(format!(
            "row {} has {} columns, header has {}",
            range.start_row + offset,
            row.len(),
            width
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_range() {
        let ok = WriteRange::new(2, vec![vec!["a".into(), "b".into()]]);
        assert!(validate_range(&ok, 2).is_ok());

        let narrow = WriteRange::new(2, vec![vec!["a".into()]]);
        assert!(matches!(validate_range(&narrow, 2), Err(SheetsError::SchemaMismatch(_))));

        let header = WriteRange::new(1, vec![vec!["a".into(), "b".into()]]);
        assert!(matches!(validate_range(&header, 2), Err(SheetsError::SchemaMismatch(_))));
    }
}
