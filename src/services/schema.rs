//! Mapeamento declarativo entre campos lógicos e cabeçalhos da planilha
//!
//! Cada aba tem uma tabela de [`ColumnSpec`] com os apelidos aceitos para o
//! cabeçalho, em ordem de preferência. A resolução compara sem acento, caixa
//! ou pontuação e segue duas regras:
//!
//! - **Fallback**: o primeiro apelido (na ordem da tabela) que casar com algum
//!   cabeçalho vence; um cabeçalho já usado por outro campo não é reaproveitado
//! - **Ambiguidade**: se o mesmo apelido casar com mais de um cabeçalho, vale a
//!   coluna mais à esquerda e o caso fica registrado em `warnings`
//!
//! Campo obrigatório ausente é `SchemaError::MissingColumn`, com sugestão do
//! cabeçalho mais parecido quando houver.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use planilhas::matching::{closest_header, normalize_header};
use planilhas::RemoteRow;
use thiserror::Error;

use crate::models::Field;

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub field: Field,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

const fn column(field: Field, aliases: &'static [&'static str], required: bool) -> ColumnSpec {
    ColumnSpec {
        field,
        aliases,
        required,
    }
}

#[derive(Debug, Clone)]
pub struct SheetSchema {
    pub name: &'static str,
    pub columns: Vec<ColumnSpec>,
}

/// Aba de atendimentos (agenda, comissões e conferência diária)
pub static ATENDIMENTOS: Lazy<SheetSchema> = Lazy::new(|| SheetSchema {
    name: "atendimentos",
    columns: vec![
        column(Field::Cliente, &["cliente", "nome do cliente", "nome cliente", "nome"], true),
        column(Field::Data, &["data", "data do atendimento", "data atendimento", "dia"], true),
        column(Field::Horario, &["horario", "hora"], false),
        column(Field::Servico, &["servico", "servicos", "procedimento"], false),
        column(
            Field::Profissional,
            &["profissional", "funcionario", "funcionaria", "colaborador", "atendente"],
            false,
        ),
        column(Field::Valor, &["valor", "valor r", "valor total", "preco", "total"], false),
        column(
            Field::FormaPagamento,
            &["forma de pagamento", "forma pagamento", "meio de pagamento", "pagamento"],
            false,
        ),
        column(Field::Pago, &["pago", "status pagamento"], false),
        column(Field::Conferido, &["conferido", "conferencia", "conf"], false),
        column(Field::Exportado, &["exportado", "exportacao"], false),
        column(Field::Telefone, &["telefone", "celular", "whatsapp", "fone"], false),
        column(Field::Observacao, &["observacao", "observacoes", "obs"], false),
    ],
});

/// Aba de cadastro de clientes
pub static CLIENTES: Lazy<SheetSchema> = Lazy::new(|| SheetSchema {
    name: "clientes",
    columns: vec![
        column(Field::Cliente, &["cliente", "nome", "nome completo"], true),
        column(Field::Telefone, &["telefone", "celular", "whatsapp", "fone"], false),
        column(Field::Email, &["email", "e mail"], false),
        column(Field::Foto, &["foto", "foto url", "url foto", "imagem"], false),
        column(Field::Observacao, &["observacao", "observacoes", "obs"], false),
    ],
});

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("sheet '{sheet}' has no column for '{field}'{}", .suggestion.as_ref().map(|s| format!(" (closest header: '{}')", s)).unwrap_or_default())]
    MissingColumn {
        sheet: String,
        field: Field,
        suggestion: Option<String>,
    },
}

/// Resultado da resolução: campo lógico → índice da coluna
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    sheet: String,
    columns: BTreeMap<Field, usize>,
    width: usize,
    pub warnings: Vec<String>,
}

impl SheetSchema {
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedSchema, SchemaError> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut used = BTreeSet::new();
        let mut columns = BTreeMap::new();
        let mut warnings = Vec::new();

        for spec in &self.columns {
            let found = spec.aliases.iter().find_map(|alias| {
                let alias = normalize_header(alias);
                let matches: Vec<usize> = normalized
                    .iter()
                    .enumerate()
                    .filter(|(i, h)| !used.contains(i) && **h == alias)
                    .map(|(i, _)| i)
                    .collect();
                (!matches.is_empty()).then_some(matches)
            });

            match found {
                Some(matches) => {
                    if matches.len() > 1 {
                        let warning = format!(
                            "{}: '{}' matches columns {:?}, using column {}",
                            self.name,
                            spec.field,
                            matches.iter().map(|i| &headers[*i]).collect::<Vec<_>>(),
                            matches[0] + 1
                        );
                        tracing::warn!("{}", warning);
                        warnings.push(warning);
                    }
                    used.insert(matches[0]);
                    columns.insert(spec.field, matches[0]);
                }
                None if spec.required => {
                    let suggestion = spec
                        .aliases
                        .iter()
                        .find_map(|alias| closest_header(alias, headers))
                        .map(|(h, _)| h.to_string());
                    return Err(SchemaError::MissingColumn {
                        sheet: self.name.to_string(),
                        field: spec.field,
                        suggestion,
                    });
                }
                None => {}
            }
        }

        Ok(ResolvedSchema {
            sheet: self.name.to_string(),
            columns,
            width: headers.len(),
            warnings,
        })
    }
}

impl ResolvedSchema {
    pub fn index(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn require(&self, field: Field) -> Result<usize, SchemaError> {
        self.index(field).ok_or_else(|| SchemaError::MissingColumn {
            sheet: self.sheet.clone(),
            field,
            suggestion: None,
        })
    }

    /// Largura do cabeçalho (toda escrita usa exatamente esta largura)
    pub fn width(&self) -> usize {
        self.width
    }

    /// Valor da célula do campo, sem espaços nas pontas; vazio conta como ausente
    pub fn value<'a>(&self, row: &'a RemoteRow, field: Field) -> Option<&'a str> {
        self.index(field)
            .and_then(|i| row.get(i))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Grava o valor na célula do campo; `false` se a aba não tem a coluna
    pub fn set(&self, cells: &mut Vec<String>, field: Field, value: &str) -> bool {
        match self.index(field) {
            Some(i) => {
                if cells.len() <= i {
                    cells.resize(i + 1, String::new());
                }
                cells[i] = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.columns.keys().copied()
    }
}
