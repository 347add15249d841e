//! Cliente de planilhas remotas
//!
//! Este crate encapsula o armazenamento tabular usado pelo dashboard:
//!
//! - [`RemoteTable`]: contrato de leitura da aba inteira e escrita de blocos
//!   contíguos de linhas
//! - [`SheetsClient`]: implementação sobre a API de valores do Google Sheets v4
//! - [`MemoryTable`]: implementação em memória, com injeção de falhas
//! - [`matching`]: comparação de cabeçalhos sem acento/caixa
//!
//! # Endereçamento
//!
//! Linhas não têm chave primária. Cada [`RemoteRow`] carrega sua posição A1
//! (cabeçalho = 1, primeira linha de dados = 2) e toda escrita sobrescreve
//! linhas inteiras.
//!
//! # Exemplo Básico
//!
//! ```rust,ignore
//! use planilhas::{RemoteTable, SheetsClient, TableRef};
//!
//! #[tokio::main]
//! async fn main() -> planilhas::Result<()> {
//!     let token = std::env::var("SHEETS_ACCESS_TOKEN")
//!         .expect("SHEETS_ACCESS_TOKEN não configurado");
//!     let client = SheetsClient::new(token)?;
//!
//!     let table = client.fetch(&TableRef::new("1AbC...", "Atendimentos")).await?;
//!     println!("{} linhas", table.len());
//!     Ok(())
//! }
//! ```

// Módulos públicos
pub mod client;
pub mod error;
pub mod matching;
pub mod memory;
pub mod retry;
pub mod store;
pub mod types;

// Re-exports principais
pub use client::SheetsClient;
pub use error::{Result, SheetsError};
pub use memory::MemoryTable;
pub use retry::RetryPolicy;
pub use store::RemoteTable;
pub use types::{RemoteRow, Table, TableRef, WriteRange, HEADER_POSITION};
