// Biblioteca do dashboard do salão
// Expõe módulos para uso em testes e no binário

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use mensageria::NotificationQueue;

// AppState é definido aqui para ser compartilhado entre handlers e main
#[derive(Clone)]
pub struct AppState {
    pub dashboard: services::DashboardService,
    pub notifier: Option<NotificationQueue>,
}

impl AppState {
    pub fn new(dashboard: services::DashboardService) -> Self {
        Self {
            dashboard,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: NotificationQueue) -> Self {
        self.dashboard = self.dashboard.with_notifier(notifier.clone());
        self.notifier = Some(notifier);
        self
    }
}
