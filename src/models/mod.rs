pub mod field;
pub mod intent;
pub mod key;
pub mod report;

pub use field::Field;
pub use intent::{EditIntent, FieldValues};
pub use key::{build_key, CanonicalKey, KeyInput, ParseFailure};
pub use report::{AmbiguousMatch, ReconciliationReport};
