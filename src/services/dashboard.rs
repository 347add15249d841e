//! Projeções sem estado usadas pelas páginas do dashboard
//!
//! Tudo aqui é função pura sobre uma [`Table`] já lida: nenhuma escrita,
//! nenhum cache próprio.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use planilhas::{RemoteRow, Table};
use serde::Serialize;

use crate::models::Field;
use crate::services::schema::ResolvedSchema;
use crate::utils::normalization::{is_affirmative, normalize_string, parse_currency, parse_date};

const SEM_PROFISSIONAL: &str = "sem profissional";

/// Linha de atendimento como exibida na tabela
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtendimentoView {
    pub position: usize,
    pub cliente: String,
    pub data: Option<NaiveDate>,
    pub horario: Option<String>,
    pub servico: Option<String>,
    pub profissional: Option<String>,
    pub valor: Option<f64>,
    pub forma_pagamento: Option<String>,
    pub conferido: bool,
    pub exportado: bool,
}

impl AtendimentoView {
    fn from_row(row: &RemoteRow, schema: &ResolvedSchema) -> Self {
        let text = |field| schema.value(row, field).map(str::to_string);
        let flag = |field| schema.value(row, field).map_or(false, is_affirmative);

        Self {
            position: row.position,
            cliente: text(Field::Cliente).unwrap_or_default(),
            data: schema.value(row, Field::Data).and_then(parse_date),
            horario: text(Field::Horario),
            servico: text(Field::Servico),
            profissional: text(Field::Profissional),
            valor: schema.value(row, Field::Valor).and_then(parse_currency),
            forma_pagamento: text(Field::FormaPagamento),
            conferido: flag(Field::Conferido),
            exportado: flag(Field::Exportado),
        }
    }
}

/// Filtros da tabela: dia exato ou intervalo, e profissional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub data: Option<NaiveDate>,
    pub inicio: Option<NaiveDate>,
    pub fim: Option<NaiveDate>,
    pub profissional: Option<String>,
}

impl ViewFilter {
    pub fn day(data: NaiveDate) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn range(inicio: Option<NaiveDate>, fim: Option<NaiveDate>) -> Self {
        Self {
            inicio,
            fim,
            ..Default::default()
        }
    }

    fn has_date_filter(&self) -> bool {
        self.data.is_some() || self.inicio.is_some() || self.fim.is_some()
    }

    fn accepts(&self, view: &AtendimentoView) -> bool {
        if self.has_date_filter() {
            let Some(data) = view.data else { return false };
            if self.data.map_or(false, |d| d != data)
                || self.inicio.map_or(false, |i| data < i)
                || self.fim.map_or(false, |f| data > f)
            {
                return false;
            }
        }
        match &self.profissional {
            Some(wanted) => view
                .profissional
                .as_deref()
                .map_or(false, |p| normalize_string(p) == normalize_string(wanted)),
            None => true,
        }
    }
}

pub fn table_view(table: &Table, schema: &ResolvedSchema, filter: &ViewFilter) -> Vec<AtendimentoView> {
    table
        .rows
        .iter()
        .filter(|row| !row.is_blank())
        .map(|row| AtendimentoView::from_row(row, schema))
        .filter(|view| filter.accepts(view))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub atendimentos: usize,
    pub receita: f64,
    pub conferidos: usize,
    pub pendentes: usize,
    pub ticket_medio: f64,
}

pub fn metrics(rows: &[AtendimentoView]) -> Metrics {
    let receita: f64 = rows.iter().filter_map(|r| r.valor).sum();
    let conferidos = rows.iter().filter(|r| r.conferido).count();
    let com_valor = rows.iter().filter(|r| r.valor.is_some()).count();

    Metrics {
        atendimentos: rows.len(),
        receita,
        conferidos,
        pendentes: rows.len() - conferidos,
        ticket_medio: if com_valor == 0 { 0.0 } else { receita / com_valor as f64 },
    }
}

/// Percentual padrão e exceções por profissional (nome normalizado)
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionRates {
    default_rate: f64,
    overrides: HashMap<String, f64>,
}

impl CommissionRates {
    pub fn new(default_rate: f64) -> Self {
        Self {
            default_rate,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, profissional: &str, rate: f64) -> Self {
        self.overrides.insert(normalize_string(profissional), rate);
        self
    }

    pub fn rate_for(&self, profissional: &str) -> f64 {
        self.overrides
            .get(&normalize_string(profissional))
            .copied()
            .unwrap_or(self.default_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionLine {
    pub profissional: String,
    pub atendimentos: usize,
    pub receita: f64,
    pub taxa: f64,
    pub comissao: f64,
}

/// Comissão por profissional, em ordem alfabética
///
/// Grafias diferentes do mesmo nome são somadas; a primeira grafia vista é a exibida.
pub fn commission_summary(rows: &[AtendimentoView], rates: &CommissionRates) -> Vec<CommissionLine> {
    let mut groups: BTreeMap<String, CommissionLine> = BTreeMap::new();

    for row in rows {
        let display = row
            .profissional
            .clone()
            .unwrap_or_else(|| SEM_PROFISSIONAL.to_string());
        let line = groups
            .entry(normalize_string(&display))
            .or_insert_with(|| CommissionLine {
                taxa: rates.rate_for(&display),
                profissional: display,
                atendimentos: 0,
                receita: 0.0,
                comissao: 0.0,
            });
        line.atendimentos += 1;
        line.receita += row.valor.unwrap_or(0.0);
    }

    groups
        .into_values()
        .map(|mut line| {
            line.comissao = (line.receita * line.taxa * 100.0).round() / 100.0;
            line
        })
        .collect()
}

/// Ponto da série diária (gráfico de faturamento)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub data: NaiveDate,
    pub atendimentos: usize,
    pub receita: f64,
}

pub fn daily_series(rows: &[AtendimentoView]) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, DailyPoint> = BTreeMap::new();
    for row in rows {
        let Some(data) = row.data else { continue };
        let point = days.entry(data).or_insert(DailyPoint {
            data,
            atendimentos: 0,
            receita: 0.0,
        });
        point.atendimentos += 1;
        point.receita += row.valor.unwrap_or(0.0);
    }
    days.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClienteView {
    pub position: usize,
    pub nome: String,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub foto: Option<String>,
}

pub fn client_view(table: &Table, schema: &ResolvedSchema) -> Vec<ClienteView> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let nome = schema.value(row, Field::Cliente)?;
            Some(ClienteView {
                position: row.position,
                nome: nome.to_string(),
                telefone: schema.value(row, Field::Telefone).map(str::to_string),
                email: schema.value(row, Field::Email).map(str::to_string),
                foto: schema.value(row, Field::Foto).map(str::to_string),
            })
        })
        .collect()
}

/// Telefone do cliente pelo nome normalizado (última ocorrência vence)
pub fn find_phone(clientes: &[ClienteView], nome: &str) -> Option<String> {
    let wanted = normalize_string(nome);
    clientes
        .iter()
        .rev()
        .find(|c| normalize_string(&c.nome) == wanted)
        .and_then(|c| c.telefone.clone())
}
