// SWIFT Code Registry - Core Library
// Bank identifier codes grouped by country, populated by CSV reconciliation

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod logging;
pub mod parser;
pub mod reconciliation;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::{open_database, setup_database, ImportReport, ImportStatus};
pub use entities::{headquarters_code_for, is_headquarters_code, BankCode, Country};
pub use error::{RegistryError, Result};
pub use import::{ImportDriver, RecordStream, RowOutcome};
pub use parser::{normalize, BankRecord, RawRow};
pub use reconciliation::{ReconcileOutcome, ReconciliationEngine};
pub use service::{
    BankCodeDetails, BankCodeSummary, CountryBankCodes, NewBankCode, NewCountry, RegistryService,
};
pub use store::{BankCodeStore, CountryStore, ImportLog, MemoryStore, SqliteStore};
