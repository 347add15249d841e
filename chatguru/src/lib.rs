//! Cliente da API ChatGuru
//!
//! Usado como canal de notificação: confirmação de agendamento e de
//! atendimento conferido são enviadas por WhatsApp ao cliente.

pub mod client;
pub mod error;

pub use client::{clean_phone, ChatGuruClient, ChatGuruConfig};
pub use error::{ChatGuruError, Result};
