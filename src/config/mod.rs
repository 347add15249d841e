pub mod settings;

pub use settings::{Backend, Settings};
