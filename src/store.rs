// 🗄️ Store contracts + implementations
//
// The reconciliation engine only sees these traits. Two implementations:
// - SqliteStore: production, backed by rusqlite (schema in db.rs)
// - MemoryStore: Arc<RwLock<..>> registry used by tests and dry runs
//
// Both give read-your-writes within a single import pass: a head office saved
// by one row is visible to the lookup of a later branch row.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::db::{self, ImportReport};
use crate::entities::{BankCode, Country};
use crate::error::{RegistryError, Result};

// ============================================================================
// CONTRACTS
// ============================================================================

/// Persistence of countries keyed by ISO code
pub trait CountryStore {
    fn find_by_iso_code(&self, iso_code: &str) -> Result<Option<Country>>;

    fn find_country_by_id(&self, id: i64) -> Result<Option<Country>>;

    fn exists_by_iso_code(&self, iso_code: &str) -> Result<bool> {
        Ok(self.find_by_iso_code(iso_code)?.is_some())
    }

    /// All countries ordered by ISO code
    fn find_all_countries(&self) -> Result<Vec<Country>>;

    /// Upsert by identity; returns the persisted country with its id
    fn save_country(&self, country: &Country) -> Result<Country>;

    /// Delete a country and every code it owns
    fn delete_country(&self, id: i64) -> Result<()>;
}

/// Persistence of SWIFT codes keyed by code string
pub trait BankCodeStore {
    fn find_by_code(&self, code: &str) -> Result<Option<BankCode>>;

    fn exists_by_code(&self, code: &str) -> Result<bool> {
        Ok(self.find_by_code(code)?.is_some())
    }

    /// Codes owned by a country, ordered by code
    fn find_all_by_country(&self, country_id: i64) -> Result<Vec<BankCode>>;

    /// Branches linked to a head office, ordered by code
    fn find_all_by_headquarters(&self, headquarters_id: i64) -> Result<Vec<BankCode>>;

    /// Upsert by identity; returns the persisted record with its id
    fn save_bank_code(&self, bank_code: &BankCode) -> Result<BankCode>;

    /// Delete one code; branches pointing at it lose their link
    fn delete_bank_code(&self, id: i64) -> Result<()>;
}

/// Audit trail of import passes
pub trait ImportLog {
    fn record_import_run(&self, report: &ImportReport) -> Result<()>;

    fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportReport>>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wrap an open connection, creating the schema if missing
    pub fn new(conn: Connection) -> Result<Self> {
        db::setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    /// Open the database file with a busy timeout
    pub fn open(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = db::open_database(db_path, busy_timeout)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

const COUNTRY_COLUMNS: &str = "id, iso_code, name";

const BANK_CODE_COLUMNS: &str =
    "id, swift_code, bank_name, branch_name, address, is_headquarter, country_id, headquarters_id";

fn map_country(row: &rusqlite::Row<'_>) -> rusqlite::Result<Country> {
    Ok(Country {
        id: row.get(0)?,
        iso_code: row.get(1)?,
        name: row.get(2)?,
    })
}

fn map_bank_code(row: &rusqlite::Row<'_>) -> rusqlite::Result<BankCode> {
    Ok(BankCode {
        id: row.get(0)?,
        code: row.get(1)?,
        bank_name: row.get(2)?,
        branch_name: row.get(3)?,
        address: row.get(4)?,
        headquarters: row.get(5)?,
        country_id: row.get(6)?,
        headquarters_id: row.get(7)?,
    })
}

/// Unique-key violations become Conflict, everything else stays a database error
fn map_write_error(err: rusqlite::Error, entity: &'static str, key: &str) -> RegistryError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RegistryError::conflict(entity, key)
        }
        other => RegistryError::Database(other),
    }
}

impl CountryStore for SqliteStore {
    fn find_by_iso_code(&self, iso_code: &str) -> Result<Option<Country>> {
        let country = self
            .conn
            .query_row(
                &format!("SELECT {} FROM countries WHERE iso_code = ?1", COUNTRY_COLUMNS),
                params![iso_code],
                map_country,
            )
            .optional()?;

        Ok(country)
    }

    fn find_country_by_id(&self, id: i64) -> Result<Option<Country>> {
        let country = self
            .conn
            .query_row(
                &format!("SELECT {} FROM countries WHERE id = ?1", COUNTRY_COLUMNS),
                params![id],
                map_country,
            )
            .optional()?;

        Ok(country)
    }

    fn find_all_countries(&self) -> Result<Vec<Country>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM countries ORDER BY iso_code",
            COUNTRY_COLUMNS
        ))?;

        let countries = stmt
            .query_map([], map_country)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(countries)
    }

    fn save_country(&self, country: &Country) -> Result<Country> {
        let mut saved = country.clone();

        if country.is_persisted() {
            let changed = self
                .conn
                .execute(
                    "UPDATE countries SET iso_code = ?1, name = ?2 WHERE id = ?3",
                    params![country.iso_code, country.name, country.id],
                )
                .map_err(|e| map_write_error(e, "country", &country.iso_code))?;

            if changed == 0 {
                return Err(RegistryError::not_found("country", country.iso_code.clone()));
            }
        } else {
            self.conn
                .execute(
                    "INSERT INTO countries (iso_code, name) VALUES (?1, ?2)",
                    params![country.iso_code, country.name],
                )
                .map_err(|e| map_write_error(e, "country", &country.iso_code))?;

            saved.id = self.conn.last_insert_rowid();
        }

        Ok(saved)
    }

    fn delete_country(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM countries WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl BankCodeStore for SqliteStore {
    fn find_by_code(&self, code: &str) -> Result<Option<BankCode>> {
        let bank_code = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM swift_codes WHERE swift_code = ?1",
                    BANK_CODE_COLUMNS
                ),
                params![code],
                map_bank_code,
            )
            .optional()?;

        Ok(bank_code)
    }

    fn find_all_by_country(&self, country_id: i64) -> Result<Vec<BankCode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM swift_codes WHERE country_id = ?1 ORDER BY swift_code",
            BANK_CODE_COLUMNS
        ))?;

        let codes = stmt
            .query_map(params![country_id], map_bank_code)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(codes)
    }

    fn find_all_by_headquarters(&self, headquarters_id: i64) -> Result<Vec<BankCode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM swift_codes WHERE headquarters_id = ?1 ORDER BY swift_code",
            BANK_CODE_COLUMNS
        ))?;

        let codes = stmt
            .query_map(params![headquarters_id], map_bank_code)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(codes)
    }

    fn save_bank_code(&self, bank_code: &BankCode) -> Result<BankCode> {
        let mut saved = bank_code.clone();

        if bank_code.is_persisted() {
            let changed = self
                .conn
                .execute(
                    "UPDATE swift_codes
                     SET swift_code = ?1, bank_name = ?2, branch_name = ?3, address = ?4,
                         is_headquarter = ?5, country_id = ?6, headquarters_id = ?7
                     WHERE id = ?8",
                    params![
                        bank_code.code,
                        bank_code.bank_name,
                        bank_code.branch_name,
                        bank_code.address,
                        bank_code.headquarters,
                        bank_code.country_id,
                        bank_code.headquarters_id,
                        bank_code.id,
                    ],
                )
                .map_err(|e| map_write_error(e, "swift code", &bank_code.code))?;

            if changed == 0 {
                return Err(RegistryError::not_found("swift code", bank_code.code.clone()));
            }
        } else {
            self.conn
                .execute(
                    "INSERT INTO swift_codes (
                        swift_code, bank_name, branch_name, address,
                        is_headquarter, country_id, headquarters_id
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        bank_code.code,
                        bank_code.bank_name,
                        bank_code.branch_name,
                        bank_code.address,
                        bank_code.headquarters,
                        bank_code.country_id,
                        bank_code.headquarters_id,
                    ],
                )
                .map_err(|e| map_write_error(e, "swift code", &bank_code.code))?;

            saved.id = self.conn.last_insert_rowid();
        }

        Ok(saved)
    }

    fn delete_bank_code(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM swift_codes WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl ImportLog for SqliteStore {
    fn record_import_run(&self, report: &ImportReport) -> Result<()> {
        db::insert_import_run(&self.conn, report)
    }

    fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportReport>> {
        db::get_recent_import_runs(&self.conn, limit)
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    countries: Vec<Country>,
    bank_codes: Vec<BankCode>,
    import_runs: Vec<ImportReport>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Mirror of `ON DELETE SET NULL` on swift_codes.headquarters_id
    fn unlink_branches_of(&mut self, removed: &[i64]) {
        for code in self.bank_codes.iter_mut() {
            if code.headquarters_id.is_some_and(|hq| removed.contains(&hq)) {
                code.headquarters_id = None;
            }
        }
    }
}

/// In-memory registry; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored code ordered by code (test and dry-run inspection)
    pub fn all_bank_codes(&self) -> Vec<BankCode> {
        let mut codes = self.read().bank_codes.clone();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        codes
    }
}

impl CountryStore for MemoryStore {
    fn find_by_iso_code(&self, iso_code: &str) -> Result<Option<Country>> {
        Ok(self
            .read()
            .countries
            .iter()
            .find(|c| c.iso_code == iso_code)
            .cloned())
    }

    fn find_country_by_id(&self, id: i64) -> Result<Option<Country>> {
        Ok(self.read().countries.iter().find(|c| c.id == id).cloned())
    }

    fn find_all_countries(&self) -> Result<Vec<Country>> {
        let mut countries = self.read().countries.clone();
        countries.sort_by(|a, b| a.iso_code.cmp(&b.iso_code));
        Ok(countries)
    }

    fn save_country(&self, country: &Country) -> Result<Country> {
        let mut state = self.write();

        let duplicate = state
            .countries
            .iter()
            .any(|c| c.iso_code == country.iso_code && c.id != country.id);
        if duplicate {
            return Err(RegistryError::conflict("country", country.iso_code.clone()));
        }

        if country.is_persisted() {
            let existing = state
                .countries
                .iter_mut()
                .find(|c| c.id == country.id)
                .ok_or_else(|| RegistryError::not_found("country", country.iso_code.clone()))?;
            *existing = country.clone();
            return Ok(country.clone());
        }

        let mut saved = country.clone();
        saved.id = state.next_id();
        state.countries.push(saved.clone());
        Ok(saved)
    }

    fn delete_country(&self, id: i64) -> Result<()> {
        let mut state = self.write();

        state.countries.retain(|c| c.id != id);

        // Cascade to owned codes
        let removed: Vec<i64> = state
            .bank_codes
            .iter()
            .filter(|b| b.country_id == id)
            .map(|b| b.id)
            .collect();
        state.bank_codes.retain(|b| b.country_id != id);
        state.unlink_branches_of(&removed);

        Ok(())
    }
}

impl BankCodeStore for MemoryStore {
    fn find_by_code(&self, code: &str) -> Result<Option<BankCode>> {
        Ok(self
            .read()
            .bank_codes
            .iter()
            .find(|b| b.code == code)
            .cloned())
    }

    fn find_all_by_country(&self, country_id: i64) -> Result<Vec<BankCode>> {
        let mut codes: Vec<BankCode> = self
            .read()
            .bank_codes
            .iter()
            .filter(|b| b.country_id == country_id)
            .cloned()
            .collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(codes)
    }

    fn find_all_by_headquarters(&self, headquarters_id: i64) -> Result<Vec<BankCode>> {
        let mut codes: Vec<BankCode> = self
            .read()
            .bank_codes
            .iter()
            .filter(|b| b.headquarters_id == Some(headquarters_id))
            .cloned()
            .collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(codes)
    }

    fn save_bank_code(&self, bank_code: &BankCode) -> Result<BankCode> {
        let mut state = self.write();

        let duplicate = state
            .bank_codes
            .iter()
            .any(|b| b.code == bank_code.code && b.id != bank_code.id);
        if duplicate {
            return Err(RegistryError::conflict("swift code", bank_code.code.clone()));
        }

        if !state.countries.iter().any(|c| c.id == bank_code.country_id) {
            return Err(RegistryError::not_found(
                "country",
                bank_code.country_id.to_string(),
            ));
        }

        if bank_code.is_persisted() {
            let existing = state
                .bank_codes
                .iter_mut()
                .find(|b| b.id == bank_code.id)
                .ok_or_else(|| RegistryError::not_found("swift code", bank_code.code.clone()))?;
            *existing = bank_code.clone();
            return Ok(bank_code.clone());
        }

        let mut saved = bank_code.clone();
        saved.id = state.next_id();
        state.bank_codes.push(saved.clone());
        Ok(saved)
    }

    fn delete_bank_code(&self, id: i64) -> Result<()> {
        let mut state = self.write();
        state.bank_codes.retain(|b| b.id != id);
        state.unlink_branches_of(&[id]);
        Ok(())
    }
}

impl ImportLog for MemoryStore {
    fn record_import_run(&self, report: &ImportReport) -> Result<()> {
        self.write().import_runs.push(report.clone());
        Ok(())
    }

    fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportReport>> {
        Ok(self
            .read()
            .import_runs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
