pub mod envelope;
pub mod normalizer;
pub mod types;

pub use envelope::unwrap_document;
pub use normalizer::{decode_record, normalize, rename_legacy_mode, NormalizedEvent};
pub use types::*;
