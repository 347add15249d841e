use planilhas::RemoteRow;
use serde::Serialize;

use crate::models::{CanonicalKey, ParseFailure};

/// Mais de uma linha remota com a mesma chave; informado, nunca descartado em silêncio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousMatch {
    pub key: CanonicalKey,
    pub positions: Vec<usize>,
}

/// Resultado de uma reconciliação
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    /// Atualizações de linha (uma intenção pode atualizar várias linhas)
    pub updated: usize,
    pub appended: usize,
    /// Intenções sem alvo: chave não encontrada, chave inválida ou linha mudou
    pub skipped: usize,
    /// Operações abortadas porque a escrita falhou
    pub failed: usize,
    pub parse_failures: Vec<ParseFailure>,
    pub ambiguous: Vec<AmbiguousMatch>,
    /// Linhas remotas sem chave válida (ficam fora do casamento)
    pub excluded_rows: usize,
    /// Blocos contíguos enviados na escrita
    pub ranges_written: usize,
    /// Estado final das linhas escritas
    #[serde(skip)]
    pub written: Vec<RemoteRow>,
}

impl ReconciliationReport {
    pub fn applied(&self) -> usize {
        self.updated + self.appended
    }

    /// Relatório de um lote cuja escrita falhou: nada aplicado
    pub fn into_failed(mut self) -> Self {
        self.failed = self.applied();
        self.updated = 0;
        self.appended = 0;
        self.ranges_written = 0;
        self.written.clear();
        self
    }

    pub(crate) fn record_ambiguous(&mut self, key: &CanonicalKey, positions: &[usize]) {
        if !self.ambiguous.iter().any(|a| &a.key == key) {
            self.ambiguous.push(AmbiguousMatch {
                key: key.clone(),
                positions: positions.to_vec(),
            });
        }
    }
}
