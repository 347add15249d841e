//! Operações das páginas do dashboard sobre as abas de atendimentos e clientes
//!
//! Cada operação faz uma leitura (pelo cache quando só exibe, direto quando
//! reconcilia), no máximo uma escrita em lote e devolve o resultado para a
//! resposta HTTP. Notificações e upload de fotos são efeitos colaterais: falham
//! sem derrubar a operação principal.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use mensageria::{Notification, NotificationKind, NotificationQueue};
use planilhas::{RemoteTable, Table, TableRef};
use serde::{Deserialize, Serialize};

use crate::models::{build_key, AmbiguousMatch, EditIntent, Field, FieldValues, KeyInput, ReconciliationReport};
use crate::services::assets::{AssetStore, PhotoUpload};
use crate::services::dashboard::{
    client_view, commission_summary, daily_series, find_phone, metrics, table_view, AtendimentoView, ClienteView,
    CommissionLine, CommissionRates, DailyPoint, Metrics, ViewFilter,
};
use crate::services::export::{format, select_rows, ExportFilter, ExportSchema, ExportedRow};
use crate::services::reconciliation::{find_duplicates, ReconciliationEngine, NAO};
use crate::services::schema::{ResolvedSchema, SheetSchema, ATENDIMENTOS, CLIENTES};
use crate::services::table_cache::TableCache;
use crate::utils::error::{AppError, AppResult};
use crate::utils::logging::*;
use crate::utils::normalization::{format_date_br, normalize_string};

/// Abas usadas pelo dashboard
#[derive(Debug, Clone)]
pub struct SheetNames {
    pub atendimentos: TableRef,
    pub clientes: TableRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub data: NaiveDate,
    pub atendimentos: Vec<AtendimentoView>,
    pub metricas: Metrics,
    /// Chaves repetidas no dia, exibidas para correção manual
    pub duplicados: Vec<AmbiguousMatch>,
    pub avisos: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommissionReport {
    pub inicio: Option<NaiveDate>,
    pub fim: Option<NaiveDate>,
    pub linhas: Vec<CommissionLine>,
    pub total_comissao: f64,
    pub metricas: Metrics,
    pub serie_diaria: Vec<DailyPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub layout: &'static str,
    pub conteudo: String,
    pub incluidos: Vec<ExportedRow>,
    pub ignorados: usize,
    pub linhas_ignoradas: Vec<usize>,
    /// Resultado da marcação `exportado`, quando habilitada
    pub marcacao: Option<ReconciliationReport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub nome: String,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub observacao: Option<String>,
    /// Foto em base64 ou data URL
    pub foto: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientSaved {
    pub relatorio: ReconciliationReport,
    pub foto_url: Option<String>,
    /// Falha no upload da foto (o cadastro foi salvo mesmo assim)
    pub foto_erro: Option<String>,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn RemoteTable>,
    cache: TableCache,
    engine: ReconciliationEngine,
    sheets: SheetNames,
    notifier: Option<NotificationQueue>,
    assets: Option<AssetStore>,
    rates: CommissionRates,
    export_schema: ExportSchema,
    mark_exported: bool,
}

impl DashboardService {
    pub fn new(store: Arc<dyn RemoteTable>, cache: TableCache, sheets: SheetNames) -> Self {
        Self {
            engine: ReconciliationEngine::new(Arc::clone(&store), cache.clone()),
            store,
            cache,
            sheets,
            notifier: None,
            assets: None,
            rates: CommissionRates::new(0.4),
            export_schema: ExportSchema::contabil(),
            mark_exported: true,
        }
    }

    pub fn with_notifier(mut self, notifier: NotificationQueue) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_assets(mut self, assets: AssetStore) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_commission_rates(mut self, rates: CommissionRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_export(mut self, schema: ExportSchema, mark_exported: bool) -> Self {
        self.export_schema = schema;
        self.mark_exported = mark_exported;
        self
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    async fn read(&self, table: &TableRef, schema: &SheetSchema) -> AppResult<(Arc<Table>, ResolvedSchema)> {
        let current = self.cache.get_or_fetch(self.store.as_ref(), table).await?;
        let resolved = schema.resolve(&current.headers)?;
        Ok((current, resolved))
    }

    /// Página "atendimentos por dia"
    pub async fn day_view(&self, data: NaiveDate, profissional: Option<String>) -> AppResult<DayView> {
        let (table, schema) = self.read(&self.sheets.atendimentos, &ATENDIMENTOS).await?;

        let filter = ViewFilter {
            profissional,
            ..ViewFilter::day(data)
        };
        let atendimentos = table_view(&table, &schema, &filter);
        let duplicados = find_duplicates(&table, &schema)
            .into_iter()
            .filter(|d| d.key.data == data)
            .collect();

        Ok(DayView {
            data,
            metricas: metrics(&atendimentos),
            atendimentos,
            duplicados,
            avisos: schema.warnings.clone(),
        })
    }

    /// Página de comissões (intervalo opcional nas duas pontas)
    pub async fn commissions(&self, inicio: Option<NaiveDate>, fim: Option<NaiveDate>) -> AppResult<CommissionReport> {
        if let (Some(i), Some(f)) = (inicio, fim) {
            if i > f {
                log_validation_error("inicio", "posterior ao fim");
                return Err(AppError::ValidationError("inicio must not be after fim".to_string()));
            }
        }
        let (table, schema) = self.read(&self.sheets.atendimentos, &ATENDIMENTOS).await?;
        let rows = table_view(&table, &schema, &ViewFilter::range(inicio, fim));
        let linhas = commission_summary(&rows, &self.rates);

        Ok(CommissionReport {
            inicio,
            fim,
            total_comissao: linhas.iter().map(|l| l.comissao).sum(),
            linhas,
            metricas: metrics(&rows),
            serie_diaria: daily_series(&rows),
        })
    }

    /// Novo agendamento; avisa o cliente quando há telefone
    pub async fn create_appointment(&self, mut values: FieldValues) -> AppResult<ReconciliationReport> {
        // Sem serviço a chave casaria com qualquer atendimento do cliente no dia
        for field in [Field::Cliente, Field::Data, Field::Servico] {
            if values.get(&field).map_or(true, |v| v.trim().is_empty()) {
                log_validation_error(field.as_str(), "obrigatório");
                return Err(AppError::ValidationError(format!("{} is required", field)));
            }
        }
        values.entry(Field::Conferido).or_insert_with(|| NAO.to_string());

        let telefone = values.get(&Field::Telefone).cloned();
        let cliente = values.get(&Field::Cliente).cloned().unwrap_or_default();
        let data = values.get(&Field::Data).cloned().unwrap_or_default();

        let report = self
            .engine
            .reconcile(&self.sheets.atendimentos, &ATENDIMENTOS, vec![EditIntent::insert(values)])
            .await?;

        if report.applied() > 0 {
            let text = format!("Olá {}, seu horário de {} está agendado. Até breve!", cliente.trim(), data.trim());
            self.notify(NotificationKind::AgendamentoCriado, &cliente, telefone, text)
                .await;
        }
        Ok(report)
    }

    /// Conferência do dia: marca todas as linhas de cada chave e avisa os clientes
    pub async fn confirm(&self, keys: Vec<KeyInput>) -> AppResult<ReconciliationReport> {
        if keys.is_empty() {
            return Err(AppError::ValidationError("no keys to confirm".to_string()));
        }
        let intents = keys.into_iter().map(EditIntent::mark_conferred).collect();

        let (report, schema) = self
            .engine
            .reconcile_resolved(&self.sheets.atendimentos, &ATENDIMENTOS, intents)
            .await?;

        let mut notified = BTreeSet::new();
        for row in &report.written {
            let Ok(key) = build_key(row, &schema) else { continue };
            if !notified.insert(key.day_key()) {
                continue;
            }
            let cliente = schema.value(row, Field::Cliente).unwrap_or_default().to_string();
            let telefone = schema.value(row, Field::Telefone).map(str::to_string);
            let text = format!(
                "Olá {}, seu atendimento de {} foi conferido. Obrigado pela preferência!",
                cliente,
                format_date_br(key.data)
            );
            self.notify(NotificationKind::AtendimentoConferido, &cliente, telefone, text)
                .await;
        }
        Ok(report)
    }

    /// Lançamentos (pagamento, valor, observação) na última ocorrência da chave
    pub async fn update(&self, key: KeyInput, values: FieldValues) -> AppResult<ReconciliationReport> {
        if values.is_empty() {
            return Err(AppError::ValidationError("no fields to update".to_string()));
        }
        let report = self
            .engine
            .reconcile(&self.sheets.atendimentos, &ATENDIMENTOS, vec![EditIntent::update(key, values)])
            .await?;
        Ok(report)
    }

    /// Exporta e, se configurado, marca como exportadas exatamente as linhas incluídas
    pub async fn export(&self, filter: ExportFilter) -> AppResult<ExportResult> {
        let (table, schema) = self.read(&self.sheets.atendimentos, &ATENDIMENTOS).await?;
        let rows = select_rows(&table, &schema, &filter);
        let outcome = format(&rows, &schema, &self.export_schema)?;
        log_export_generated(self.export_schema.name, outcome.included.len(), outcome.skipped);

        let marcacao = if !self.mark_exported || outcome.included.is_empty() {
            None
        } else if !schema.has(Field::Exportado) {
            log_warning("Aba de atendimentos sem coluna 'exportado', marcação ignorada");
            None
        } else {
            let report = self
                .engine
                .reconcile(&self.sheets.atendimentos, &ATENDIMENTOS, outcome.mark_exported_intents())
                .await?;
            Some(report)
        };

        Ok(ExportResult {
            layout: self.export_schema.name,
            conteudo: outcome.blob,
            incluidos: outcome.included,
            ignorados: outcome.skipped,
            linhas_ignoradas: outcome.skipped_positions,
            marcacao,
        })
    }

    pub async fn clients(&self) -> AppResult<Vec<ClienteView>> {
        let (table, schema) = self.read(&self.sheets.clientes, &CLIENTES).await?;
        Ok(client_view(&table, &schema))
    }

    /// Cadastro de cliente; a foto vai para o serviço de imagens e só a URL fica na planilha
    pub async fn save_client(&self, client: NewClient) -> AppResult<ClientSaved> {
        if normalize_string(&client.nome).is_empty() {
            log_validation_error("nome", "obrigatório");
            return Err(AppError::ValidationError("nome is required".to_string()));
        }
        let photo = client.foto.as_deref().map(PhotoUpload::from_base64).transpose()?;

        let mut foto_url = None;
        let mut foto_erro = None;
        if let Some(photo) = photo {
            match &self.assets {
                Some(assets) => match assets.upload(&photo, &normalize_string(&client.nome).replace(' ', "_")).await {
                    Ok(url) => foto_url = Some(url),
                    Err(e) => foto_erro = Some(e.to_string()),
                },
                None => foto_erro = Some("asset store disabled".to_string()),
            }
        }

        let mut values = FieldValues::new();
        values.insert(Field::Cliente, client.nome.trim().to_string());
        let optional = [
            (Field::Telefone, client.telefone),
            (Field::Email, client.email),
            (Field::Observacao, client.observacao),
            (Field::Foto, foto_url.clone()),
        ];
        for (field, value) in optional {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                values.insert(field, value);
            }
        }

        let relatorio = self
            .engine
            .upsert(&self.sheets.clientes, &CLIENTES, Field::Cliente, values)
            .await?;

        Ok(ClientSaved {
            relatorio,
            foto_url,
            foto_erro,
        })
    }

    pub async fn invalidate_cache(&self) -> usize {
        self.cache.clear().await
    }

    /// Enfileira a mensagem; sem fila ou sem telefone, só registra e segue
    async fn notify(&self, kind: NotificationKind, cliente: &str, telefone: Option<String>, text: String) {
        let Some(queue) = &self.notifier else {
            log_notification_skipped(cliente, "notifications disabled");
            return;
        };

        let telefone = match telefone {
            Some(t) => Some(t),
            None => self.lookup_phone(cliente).await,
        };
        match telefone {
            Some(phone) => {
                queue.enqueue(Notification::new(kind, phone, text)).await;
            }
            None => log_notification_skipped(cliente, "no phone on record"),
        }
    }

    async fn lookup_phone(&self, cliente: &str) -> Option<String> {
        match self.clients().await {
            Ok(clientes) => find_phone(&clientes, cliente),
            Err(e) => {
                log_warning(&format!("Cadastro de clientes indisponível para notificação: {}", e));
                None
            }
        }
    }
}
