use std::fmt;

use serde::{Deserialize, Serialize};

/// Campos lógicos que o dashboard conhece, independentes do texto do cabeçalho
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Cliente,
    Data,
    Horario,
    Servico,
    Profissional,
    Valor,
    FormaPagamento,
    Pago,
    Conferido,
    Exportado,
    Telefone,
    Email,
    Foto,
    Observacao,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Cliente => "cliente",
            Field::Data => "data",
            Field::Horario => "horario",
            Field::Servico => "servico",
            Field::Profissional => "profissional",
            Field::Valor => "valor",
            Field::FormaPagamento => "forma_pagamento",
            Field::Pago => "pago",
            Field::Conferido => "conferido",
            Field::Exportado => "exportado",
            Field::Telefone => "telefone",
            Field::Email => "email",
            Field::Foto => "foto",
            Field::Observacao => "observacao",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
