// 📥 Import Driver - CSV source → record stream → reconciliation engine
//
// Failure containment:
// - row-level (malformed row, bad ISO code): logged, skipped, pass continues
// - source-level (cannot open/read, store error): logged, pass stops,
//   rows already applied stay applied
// Nothing raises past `import_path` / `import_reader`; callers get a report.
//
// Each call is an independent pass. Passes against the same store must be
// serialized by the caller.

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{error, info, warn};

use crate::db::{ImportReport, ImportStatus};
use crate::error::{RegistryError, Result};
use crate::parser::{normalize, BankRecord, RawRow};
use crate::reconciliation::{ReconcileOutcome, ReconciliationEngine};
use crate::store::{BankCodeStore, CountryStore, ImportLog};

// ============================================================================
// PER-ROW OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOutcome {
    Inserted,
    Updated,
    /// Row rejected; the reason is logged and tallied
    Skipped(String),
}

impl From<ReconcileOutcome> for RowOutcome {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Inserted => RowOutcome::Inserted,
            ReconcileOutcome::Updated => RowOutcome::Updated,
        }
    }
}

// ============================================================================
// RECORD STREAM
// ============================================================================

/// Hashes every byte handed to the CSV reader
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Lazy sequence of normalized records, header row skipped
///
/// Yields `(line, result)`; `line` is the 1-based line where the row starts.
pub struct RecordStream<R: Read> {
    reader: csv::Reader<HashingReader<R>>,
    record: StringRecord,
    source_name: String,
    rows_read: u64,
}

impl<R: Read> RecordStream<R> {
    pub fn new(source_name: &str, reader: R) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            // short rows surface as InvalidRow instead of a reader error
            .flexible(true)
            .from_reader(HashingReader {
                inner: reader,
                hasher: Sha256::new(),
            });

        RecordStream {
            reader,
            record: StringRecord::new(),
            source_name: source_name.to_string(),
            rows_read: 0,
        }
    }

    /// Hex SHA-256 of all bytes read so far
    pub fn finish(self) -> String {
        let hashing = self.reader.into_inner();
        format!("{:x}", hashing.hasher.finalize())
    }

    fn classify(&self, err: csv::Error) -> RegistryError {
        if !err.is_io_error() {
            return RegistryError::invalid_row(err.to_string());
        }

        match err.into_kind() {
            csv::ErrorKind::Io(source) => RegistryError::SourceUnavailable {
                source_name: self.source_name.clone(),
                source,
            },
            other => RegistryError::invalid_row(format!("{:?}", other)),
        }
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = (u64, Result<BankRecord>);

    fn next(&mut self) -> Option<Self::Item> {
        self.rows_read += 1;
        // +1 for the header row
        let fallback_line = self.rows_read + 1;

        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let line = self
                    .record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                let result = RawRow::from_record(&self.record).and_then(|raw| normalize(&raw));
                Some((line, result))
            }
            Err(err) => Some((fallback_line, Err(self.classify(err)))),
        }
    }
}

// ============================================================================
// IMPORT DRIVER
// ============================================================================

pub struct ImportDriver<'a, S> {
    store: &'a S,
}

impl<'a, S> ImportDriver<'a, S>
where
    S: CountryStore + BankCodeStore + ImportLog,
{
    pub fn new(store: &'a S) -> Self {
        ImportDriver { store }
    }

    /// Run one pass over a CSV file
    pub fn import_path(&self, path: &Path) -> ImportReport {
        let source_name = path.display().to_string();

        match File::open(path) {
            Ok(file) => self.import_reader(&source_name, file),
            Err(source) => {
                let err = RegistryError::SourceUnavailable {
                    source_name: source_name.clone(),
                    source,
                };
                let mut report = ImportReport::begin(&source_name);
                self.abort(&mut report, &err);
                self.finish(report)
            }
        }
    }

    /// Run one pass over any reader (file, stdin, in-memory buffer)
    pub fn import_reader<R: Read>(&self, source_name: &str, reader: R) -> ImportReport {
        let mut report = ImportReport::begin(source_name);
        info!(run_id = %report.run_id, source = %source_name, "starting SWIFT code import");

        let engine = ReconciliationEngine::new(self.store);
        let mut stream = RecordStream::new(source_name, reader);

        for (line, item) in stream.by_ref() {
            match Self::apply_row(&engine, item) {
                Ok(RowOutcome::Inserted) => report.inserted += 1,
                Ok(RowOutcome::Updated) => report.updated += 1,
                Ok(RowOutcome::Skipped(reason)) => {
                    warn!(line, reason = %reason, "skipping row");
                    report.skipped += 1;
                }
                Err(err) => {
                    self.abort(&mut report, &err);
                    break;
                }
            }
        }

        let digest = stream.finish();
        if report.is_completed() {
            report.source_sha256 = Some(digest);
        }

        self.finish(report)
    }

    /// Ok = row handled (applied or skipped); Err = source-level failure
    fn apply_row(
        engine: &ReconciliationEngine<'_, S>,
        item: Result<BankRecord>,
    ) -> Result<RowOutcome> {
        let record = match item {
            Ok(record) => record,
            Err(err) if err.is_row_level() => return Ok(RowOutcome::Skipped(err.to_string())),
            Err(err) => return Err(err),
        };

        match engine.reconcile(&record) {
            Ok(outcome) => Ok(outcome.into()),
            Err(err) if err.is_row_level() => Ok(RowOutcome::Skipped(err.to_string())),
            Err(err) => Err(err),
        }
    }

    fn abort(&self, report: &mut ImportReport, err: &RegistryError) {
        error!(
            run_id = %report.run_id,
            source = %report.source,
            error = %error_chain(err),
            "import aborted"
        );
        report.status = ImportStatus::Aborted;
        report.error = Some(error_chain(err));
    }

    fn finish(&self, mut report: ImportReport) -> ImportReport {
        report.finished_at = chrono::Utc::now();

        if let Err(err) = self.store.record_import_run(&report) {
            warn!(run_id = %report.run_id, error = %err, "could not record import run");
        }

        info!("{}", report.summary());
        report
    }
}

/// "outer: inner: ..." rendering of an error and its sources
fn error_chain(err: &RegistryError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};
    use std::io::{Cursor, Write};

    const HEADER: &str =
        "COUNTRY ISO2 CODE,SWIFT CODE,CODE TYPE,NAME,ADDRESS,TOWN NAME,COUNTRY NAME,TIME ZONE\n";

    fn csv_source(rows: &[&str]) -> Cursor<Vec<u8>> {
        let mut data = HEADER.to_string();
        for row in rows {
            data.push_str(row);
            data.push('\n');
        }
        Cursor::new(data.into_bytes())
    }

    const PL_HQ: &str = "PL,AAAAPLPWXXX,BIC11,Bank A,Addr1,Warsaw,POLAND,Europe/Warsaw";
    const PL_BRANCH: &str = "PL,AAAAPLPW001,BIC11,Bank A Branch,Addr2,Krakow,POLAND,Europe/Warsaw";

    /// Reader that serves `data` once, then fails
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_headquarters_and_branch_scenario() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);

        let report = driver.import_reader("pl.csv", csv_source(&[PL_HQ, PL_BRANCH]));

        assert!(report.is_completed());
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 0);

        let countries = store.find_all_countries().unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].iso_code, "PL");
        assert_eq!(countries[0].name, "POLAND");

        let hq = store.find_by_code("AAAAPLPWXXX").unwrap().unwrap();
        let branch = store.find_by_code("AAAAPLPW001").unwrap().unwrap();
        assert_eq!(branch.headquarters_id, Some(hq.id));
        assert_eq!(branch.branch_name.as_deref(), Some("Krakow"));
    }

    #[test]
    fn test_malformed_iso_interleaved() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);

        let report = driver.import_reader(
            "mixed.csv",
            csv_source(&[
                "XX9,BADCODE,BIC11,Bad Bank,Addr,Town,NOWHERE,UTC",
                PL_HQ,
                "PL,AAAAPLPW002",
            ]),
        );

        assert!(report.is_completed());
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 2);

        let codes = store.all_bank_codes();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "AAAAPLPWXXX");
        assert!(store.find_by_iso_code("XX").unwrap().is_none());
        assert_eq!(store.find_all_countries().unwrap().len(), 1);
    }

    #[test]
    fn test_import_is_idempotent() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);
        let rows = [PL_HQ, PL_BRANCH];

        let first = driver.import_reader("pl.csv", csv_source(&rows));
        let after_first = (store.find_all_countries().unwrap(), store.all_bank_codes());

        let second = driver.import_reader("pl.csv", csv_source(&rows));
        let after_second = (store.find_all_countries().unwrap(), store.all_bank_codes());

        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(after_first, after_second);
        assert_eq!(first.source_sha256, second.source_sha256);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn test_branch_first_then_rerun_links() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);
        let rows = [
            "AL,AAISALTR1XX,BIC11,Bank,Addr,Durres,ALBANIA,Europe/Tirane",
            "AL,AAISALTRXXX,BIC11,Bank,Addr,Tirana,ALBANIA,Europe/Tirane",
        ];

        driver.import_reader("al.csv", csv_source(&rows));
        let branch = store.find_by_code("AAISALTR1XX").unwrap().unwrap();
        assert_eq!(branch.headquarters_id, None);

        driver.import_reader("al.csv", csv_source(&rows));
        let hq = store.find_by_code("AAISALTRXXX").unwrap().unwrap();
        let branch = store.find_by_code("AAISALTR1XX").unwrap().unwrap();
        assert_eq!(branch.headquarters_id, Some(hq.id));
    }

    #[test]
    fn test_missing_file_is_contained() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);

        let report = driver.import_path(Path::new("/definitely/not/here.csv"));

        assert_eq!(report.status, ImportStatus::Aborted);
        assert!(report.error.is_some());
        assert_eq!(report.source_sha256, None);
        assert!(store.all_bank_codes().is_empty());

        // Aborted passes are still logged
        let runs = store.recent_import_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, ImportStatus::Aborted);
    }

    #[test]
    fn test_read_failure_keeps_applied_rows() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);

        let reader = FailingReader {
            data: csv_source(&[PL_HQ, PL_BRANCH]),
        };
        let report = driver.import_reader("flaky.csv", reader);

        assert_eq!(report.status, ImportStatus::Aborted);
        assert_eq!(report.inserted, 2);
        assert_eq!(store.all_bank_codes().len(), 2);
    }

    #[test]
    fn test_empty_source() {
        let store = MemoryStore::new();
        let driver = ImportDriver::new(&store);

        let report = driver.import_reader("empty.csv", Cursor::new(Vec::new()));

        assert!(report.is_completed());
        assert_eq!(report.applied(), 0);
    }

    #[test]
    fn test_import_file_into_sqlite() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}{}\n{}\n", HEADER, PL_HQ, PL_BRANCH).unwrap();

        let store = SqliteStore::open_in_memory().unwrap();
        let driver = ImportDriver::new(&store);
        let report = driver.import_path(file.path());

        assert!(report.is_completed());
        assert_eq!(report.inserted, 2);
        assert_eq!(report.source_sha256.as_ref().map(|d| d.len()), Some(64));

        let hq = store.find_by_code("AAAAPLPWXXX").unwrap().unwrap();
        let branches = store.find_all_by_headquarters(hq.id).unwrap();
        assert_eq!(branches.len(), 1);

        let runs = store.recent_import_runs(1).unwrap();
        assert_eq!(runs[0].run_id, report.run_id);
        assert_eq!(runs[0].inserted, 2);
    }

    #[test]
    fn test_record_stream_line_numbers() {
        let stream = RecordStream::new("lines.csv", csv_source(&[PL_HQ, "XX9,BAD", PL_BRANCH]));
        let items: Vec<(u64, bool)> = stream.map(|(line, r)| (line, r.is_ok())).collect();

        assert_eq!(items, vec![(2, true), (3, false), (4, true)]);
    }
}
