/// Servidor do dashboard do salão
///
/// Arquitetura:
/// - Planilha (Google Sheets) é a única fonte de dados; nada persiste localmente
/// - Leituras passam pelo TableCache (TTL); escritas vão direto, em lote
/// - Notificações de WhatsApp (ChatGuru) saem por uma fila em segundo plano
/// - Fotos de clientes vão para o serviço de imagens; a planilha guarda a URL

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use chatguru::{ChatGuruClient, ChatGuruConfig};
use mensageria::{DeadLetterLog, DeliveryPolicy, NotificationQueue};
use planilhas::{MemoryTable, RemoteTable, RetryPolicy, SheetsClient, TableRef};
use salao_dashboard::config::{Backend, Settings};
use salao_dashboard::handlers::build_router;
use salao_dashboard::services::dashboard::CommissionRates;
use salao_dashboard::services::export::ExportSchema;
use salao_dashboard::services::{AssetStore, DashboardService, SheetNames, TableCache};
use salao_dashboard::utils::logging::*;
use salao_dashboard::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    let settings = Settings::new().context("Failed to load settings")?;
    settings.validate().context("Invalid settings")?;
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    let store = build_store(&settings)?;
    let sheets = SheetNames {
        atendimentos: TableRef::new(&settings.planilhas.spreadsheet_id, &settings.planilhas.aba_atendimentos),
        clientes: TableRef::new(&settings.planilhas.spreadsheet_id, &settings.planilhas.aba_clientes),
    };

    let rates = settings
        .comissao
        .excecoes
        .iter()
        .fold(CommissionRates::new(settings.comissao.taxa_padrao), |rates, (nome, taxa)| {
            rates.with_override(nome, *taxa)
        });
    let export_schema = ExportSchema::contabil().with_delimiter(settings.exportacao.delimitador as u8);

    let mut dashboard = DashboardService::new(store, TableCache::new(settings.planilhas.cache_ttl_seconds), sheets)
        .with_commission_rates(rates)
        .with_export(export_schema, settings.exportacao.marcar_exportado);

    if settings.assets.enabled {
        match &settings.assets.upload_url {
            Some(url) => {
                dashboard = dashboard.with_assets(AssetStore::new(url.clone(), settings.assets.upload_preset.clone())?);
                log_info("🖼️ Upload de fotos habilitado");
            }
            None => log_warning("⚠️ assets.enabled sem assets.upload_url - upload de fotos desabilitado"),
        }
    }

    let mut state = AppState::new(dashboard);
    if let Some(queue) = start_notifier(&settings)? {
        state = state.with_notifier(queue);
    }

    let app = build_router(Arc::new(state));

    // No Cloud Run, usar a variável de ambiente PORT
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let listener = TcpListener::bind(format!("{}:{}", settings.server.host, port)).await?;

    log_server_startup(port);
    log_server_ready(port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn RemoteTable>> {
    let planilhas = &settings.planilhas;
    match planilhas.backend {
        Backend::Google => {
            let token = planilhas
                .access_token
                .clone()
                .context("planilhas.access_token is required for the google backend")?;
            let mut client = match &planilhas.base_url {
                Some(url) => SheetsClient::with_base_url(token, url.clone())?,
                None => SheetsClient::new(token)?,
            };
            if let Some(max_attempts) = planilhas.max_attempts {
                client = client.with_retry_policy(RetryPolicy {
                    max_attempts,
                    ..RetryPolicy::default()
                });
            }
            log_info(&format!("📄 Planilha Google: {}", planilhas.spreadsheet_id));
            Ok(Arc::new(client))
        }
        Backend::Memory => {
            log_warning("⚠️ Backend em memória: dados de demonstração, nada é persistido");
            Ok(Arc::new(demo_store(settings)))
        }
    }
}

/// Abas vazias (só cabeçalho) para o backend em memória
fn demo_store(settings: &Settings) -> MemoryTable {
    let header = |names: &[&str]| vec![names.iter().map(|n| n.to_string()).collect::<Vec<_>>()];
    let id = &settings.planilhas.spreadsheet_id;

    MemoryTable::new()
        .with_sheet(
            TableRef::new(id, &settings.planilhas.aba_atendimentos),
            header(&[
                "Cliente",
                "Data",
                "Horário",
                "Serviço",
                "Profissional",
                "Valor",
                "Forma de pagamento",
                "Conferido",
                "Exportado",
            ]),
        )
        .with_sheet(
            TableRef::new(id, &settings.planilhas.aba_clientes),
            header(&["Nome", "Telefone", "Email", "Foto", "Observação"]),
        )
}

fn start_notifier(settings: &Settings) -> anyhow::Result<Option<NotificationQueue>> {
    let chatguru = &settings.chatguru;
    if !chatguru.enabled {
        log_info("ℹ️ Notificações ChatGuru desabilitadas");
        return Ok(None);
    }

    let (Some(api_token), Some(api_endpoint), Some(account_id), Some(phone_id)) = (
        chatguru.api_token.clone(),
        chatguru.api_endpoint.clone(),
        chatguru.account_id.clone(),
        chatguru.phone_id.clone(),
    ) else {
        log_warning("⚠️ chatguru.enabled sem credenciais completas - notificações desabilitadas");
        return Ok(None);
    };

    let client = ChatGuruClient::new(ChatGuruConfig {
        api_endpoint,
        api_token,
        account_id,
        phone_id,
    })?;

    let dead_letters = match &chatguru.dead_letter_path {
        Some(path) => DeadLetterLog::with_file(path),
        None => DeadLetterLog::in_memory(),
    };
    let policy = DeliveryPolicy {
        max_attempts: chatguru.max_attempts,
        initial_backoff_ms: chatguru.initial_backoff_ms,
        ..DeliveryPolicy::default()
    };

    // A task de entrega vive enquanto houver cópias da fila no AppState
    let (queue, _worker) = NotificationQueue::start(Arc::new(client), policy, dead_letters);
    log_info("📬 Fila de notificações ChatGuru iniciada");
    Ok(Some(queue))
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log_info("Shutdown signal received");
}
