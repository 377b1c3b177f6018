// ⚖️ Reconciliation Engine - upsert one normalized record into the registry
//
// Per record, strictly in input order:
//   1. resolve country by ISO code (create if absent, never rename)
//   2. find-or-create the SWIFT code, then overwrite every value field
//   3. link branch → head office by the "first 8 chars + XXX" convention
//   4. persist with a single save
//
// A branch seen before its head office stays unlinked for this pass; there is
// no second linking pass. Running the same dataset twice converges on the
// same registry state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::{headquarters_code_for, BankCode, Country};
use crate::error::Result;
use crate::parser::BankRecord;
use crate::store::{BankCodeStore, CountryStore};

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// Code did not exist and was created
    Inserted,

    /// Code existed and was overwritten
    Updated,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Inserted => "inserted",
            ReconcileOutcome::Updated => "updated",
        }
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// Stateless apart from the borrowed store; not safe to run two passes
/// against the same store concurrently
pub struct ReconciliationEngine<'a, S> {
    store: &'a S,
}

impl<'a, S> ReconciliationEngine<'a, S>
where
    S: CountryStore + BankCodeStore,
{
    pub fn new(store: &'a S) -> Self {
        ReconciliationEngine { store }
    }

    /// Apply one record to the store
    ///
    /// Only store failures are errors; a missing head office is not.
    pub fn reconcile(&self, record: &BankRecord) -> Result<ReconcileOutcome> {
        let country = self.resolve_country(record)?;

        let (mut bank_code, outcome) = match self.store.find_by_code(&record.swift_code)? {
            Some(existing) => (existing, ReconcileOutcome::Updated),
            None => (BankCode::new(&record.swift_code), ReconcileOutcome::Inserted),
        };

        // Full overwrite, last write wins
        bank_code.bank_name = record.bank_name.clone();
        bank_code.address = record.address.clone();
        bank_code.branch_name = record.town_name.clone();
        bank_code.headquarters = record.is_headquarters;
        bank_code.country_id = country.id;
        bank_code.headquarters_id = self.resolve_headquarters(record)?;

        let saved = self.store.save_bank_code(&bank_code)?;

        debug!(
            swift_code = %saved.code,
            outcome = outcome.as_str(),
            linked = saved.headquarters_id.is_some(),
            "reconciled SWIFT code"
        );

        Ok(outcome)
    }

    /// Existing country is reused as-is; only a missing one is created
    fn resolve_country(&self, record: &BankRecord) -> Result<Country> {
        if let Some(country) = self.store.find_by_iso_code(&record.country_iso2)? {
            return Ok(country);
        }

        let country = self
            .store
            .save_country(&Country::new(&record.country_iso2, &record.country_name))?;

        debug!(iso_code = %country.iso_code, name = %country.name, "created country");
        Ok(country)
    }

    /// Head offices never link; branches link only if the head office exists now
    fn resolve_headquarters(&self, record: &BankRecord) -> Result<Option<i64>> {
        if record.is_headquarters {
            return Ok(None);
        }

        let Some(hq_code) = headquarters_code_for(&record.swift_code) else {
            return Ok(None);
        };

        Ok(self.store.find_by_code(&hq_code)?.map(|hq| hq.id))
    }
}

// ============================================================================
// TESTS
// ============================================================================
