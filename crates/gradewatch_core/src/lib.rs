//! Gradewatch core: transcript parsing and reconciliation against stored grades.
mod parser;
mod reconcile;
mod store;
mod types;

pub use parser::{GradeParser, ParseAnomaly, TranscriptParse};
pub use reconcile::{reconcile, Reconciliation};
pub use store::{GradeStore, MemoryStore, PersistenceError};
pub use types::{ChangeEvent, GradeRecord, GradeStatus, PersistedGradeEntry};
