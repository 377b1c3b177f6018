// 🔎 Registry Service - explicit single-record operations and read views
//
// Unlike bulk import, these never upsert:
// - create of an existing key → Conflict
// - missing country / code / head office → NotFound
// The ISO code of a country is immutable; only its name can change.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entities::bank_code::{
    MAX_ADDRESS_LEN, MAX_BANK_NAME_LEN, MAX_BRANCH_NAME_LEN, MAX_CODE_LEN, MIN_CODE_LEN,
};
use crate::entities::country::MAX_COUNTRY_NAME_LEN;
use crate::entities::{headquarters_code_for, is_headquarters_code, BankCode, Country};
use crate::error::{RegistryError, Result};
use crate::store::{BankCodeStore, CountryStore};

// ============================================================================
// READ VIEWS
// ============================================================================

/// One code in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCodeSummary {
    pub address: Option<String>,
    #[serde(rename = "bankName")]
    pub bank_name: String,
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    #[serde(rename = "isHeadquarter")]
    pub is_headquarters: bool,
    #[serde(rename = "swiftCode")]
    pub swift_code: String,
}

/// One code with its country and, for head offices, its branches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCodeDetails {
    pub address: Option<String>,
    #[serde(rename = "bankName")]
    pub bank_name: String,
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    #[serde(rename = "countryName")]
    pub country_name: String,
    #[serde(rename = "isHeadquarter")]
    pub is_headquarters: bool,
    #[serde(rename = "swiftCode")]
    pub swift_code: String,
    /// Present only for head offices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<BankCodeSummary>>,
}

/// Every code of one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryBankCodes {
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    #[serde(rename = "countryName")]
    pub country_name: String,
    #[serde(rename = "swiftCodes")]
    pub swift_codes: Vec<BankCodeSummary>,
}

// ============================================================================
// WRITE REQUESTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCountry {
    pub iso_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBankCode {
    pub swift_code: String,
    pub bank_name: String,
    pub address: Option<String>,
    pub branch_name: Option<String>,
    pub country_iso2: String,
    pub is_headquarters: bool,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct RegistryService<'a, S> {
    store: &'a S,
}

impl<'a, S> RegistryService<'a, S>
where
    S: CountryStore + BankCodeStore,
{
    pub fn new(store: &'a S) -> Self {
        RegistryService { store }
    }

    // ------------------------------------------------------------------------
    // Countries
    // ------------------------------------------------------------------------

    pub fn list_countries(&self) -> Result<Vec<Country>> {
        self.store.find_all_countries()
    }

    pub fn get_country(&self, iso_code: &str) -> Result<Country> {
        let iso_code = iso_code.trim().to_uppercase();
        self.store
            .find_by_iso_code(&iso_code)?
            .ok_or_else(|| RegistryError::not_found("country", iso_code))
    }

    pub fn create_country(&self, request: &NewCountry) -> Result<Country> {
        let iso_code = validate_iso_code(&request.iso_code)?;
        let name = validate_required("name", &request.name, MAX_COUNTRY_NAME_LEN)?;

        if self.store.exists_by_iso_code(&iso_code)? {
            return Err(RegistryError::conflict("country", iso_code));
        }

        let country = self.store.save_country(&Country::new(&iso_code, &name))?;
        info!(iso_code = %country.iso_code, "created country");
        Ok(country)
    }

    /// Change the display name; the ISO code stays as-is
    pub fn rename_country(&self, iso_code: &str, name: &str) -> Result<Country> {
        let mut country = self.get_country(iso_code)?;
        country.name = validate_required("name", name, MAX_COUNTRY_NAME_LEN)?;

        let country = self.store.save_country(&country)?;
        info!(iso_code = %country.iso_code, name = %country.name, "renamed country");
        Ok(country)
    }

    /// Delete a country together with all its codes
    pub fn delete_country(&self, iso_code: &str) -> Result<()> {
        let country = self.get_country(iso_code)?;
        self.store.delete_country(country.id)?;
        info!(iso_code = %country.iso_code, "deleted country");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // SWIFT codes
    // ------------------------------------------------------------------------

    /// Code details; head offices also list their linked branches
    pub fn get_bank_code(&self, code: &str) -> Result<BankCodeDetails> {
        let bank_code = self.find_bank_code(code)?;
        let country = self.country_of(&bank_code)?;

        let branches = if bank_code.headquarters {
            let branches = self
                .store
                .find_all_by_headquarters(bank_code.id)?
                .iter()
                .map(|branch| self.summarize(branch))
                .collect::<Result<Vec<_>>>()?;
            Some(branches)
        } else {
            None
        };

        Ok(BankCodeDetails {
            address: bank_code.address,
            bank_name: bank_code.bank_name,
            country_iso2: country.iso_code,
            country_name: country.name,
            is_headquarters: bank_code.headquarters,
            swift_code: bank_code.code,
            branches,
        })
    }

    pub fn get_bank_codes_by_country(&self, iso_code: &str) -> Result<CountryBankCodes> {
        let country = self.get_country(iso_code)?;

        let swift_codes = self
            .store
            .find_all_by_country(country.id)?
            .into_iter()
            .map(|code| summary_for(&code, &country.iso_code))
            .collect();

        Ok(CountryBankCodes {
            country_iso2: country.iso_code,
            country_name: country.name,
            swift_codes,
        })
    }

    /// Create one code; branches require their head office to exist
    pub fn create_bank_code(&self, request: &NewBankCode) -> Result<BankCode> {
        let code = validate_swift_code(&request.swift_code)?;
        let iso_code = validate_iso_code(&request.country_iso2)?;
        let bank_name = validate_required("bank_name", &request.bank_name, MAX_BANK_NAME_LEN)?;
        let address = validate_optional("address", request.address.as_deref(), MAX_ADDRESS_LEN)?;
        let branch_name = validate_optional(
            "branch_name",
            request.branch_name.as_deref(),
            MAX_BRANCH_NAME_LEN,
        )?;

        if request.is_headquarters != is_headquarters_code(&code) {
            return Err(RegistryError::validation(
                "is_headquarters",
                format!(
                    "head-office flag must be {} for code {}",
                    is_headquarters_code(&code),
                    code
                ),
            ));
        }

        if self.store.exists_by_code(&code)? {
            return Err(RegistryError::conflict("swift code", code));
        }

        let country = self.get_country(&iso_code)?;

        let headquarters_id = if request.is_headquarters {
            None
        } else {
            let hq_code = headquarters_code_for(&code)
                .ok_or_else(|| RegistryError::not_found("headquarters", code.clone()))?;
            let hq = self
                .store
                .find_by_code(&hq_code)?
                .ok_or_else(|| RegistryError::not_found("headquarters", code.clone()))?;
            Some(hq.id)
        };

        let mut bank_code = BankCode::new(&code);
        bank_code.bank_name = bank_name;
        bank_code.address = address;
        bank_code.branch_name = branch_name;
        bank_code.headquarters = request.is_headquarters;
        bank_code.country_id = country.id;
        bank_code.headquarters_id = headquarters_id;

        let saved = self.store.save_bank_code(&bank_code)?;
        info!(swift_code = %saved.code, "created SWIFT code");
        Ok(saved)
    }

    /// Delete one code; its branches stay but lose their link
    pub fn delete_bank_code(&self, code: &str) -> Result<()> {
        let bank_code = self.find_bank_code(code)?;
        self.store.delete_bank_code(bank_code.id)?;
        info!(swift_code = %bank_code.code, "deleted SWIFT code");
        Ok(())
    }

    fn find_bank_code(&self, code: &str) -> Result<BankCode> {
        let code = code.trim().to_uppercase();
        self.store
            .find_by_code(&code)?
            .ok_or_else(|| RegistryError::not_found("swift code", code))
    }

    fn country_of(&self, bank_code: &BankCode) -> Result<Country> {
        self.store
            .find_country_by_id(bank_code.country_id)?
            .ok_or_else(|| RegistryError::not_found("country", bank_code.country_id.to_string()))
    }

    fn summarize(&self, bank_code: &BankCode) -> Result<BankCodeSummary> {
        let country = self.country_of(bank_code)?;
        Ok(summary_for(bank_code, &country.iso_code))
    }
}

fn summary_for(bank_code: &BankCode, country_iso2: &str) -> BankCodeSummary {
    BankCodeSummary {
        address: bank_code.address.clone(),
        bank_name: bank_code.bank_name.clone(),
        country_iso2: country_iso2.to_string(),
        is_headquarters: bank_code.headquarters,
        swift_code: bank_code.code.clone(),
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_iso_code(value: &str) -> Result<String> {
    let iso_code = value.trim().to_uppercase();
    if iso_code.chars().count() != 2 {
        return Err(RegistryError::validation(
            "iso_code",
            "must be exactly 2 characters",
        ));
    }
    Ok(iso_code)
}

fn validate_swift_code(value: &str) -> Result<String> {
    let code = value.trim().to_uppercase();
    let len = code.chars().count();
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&len) {
        return Err(RegistryError::validation(
            "swift_code",
            format!("must be {}-{} characters", MIN_CODE_LEN, MAX_CODE_LEN),
        ));
    }
    Ok(code)
}

fn validate_required(field: &'static str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RegistryError::validation(field, "cannot be blank"));
    }
    if value.chars().count() > max {
        return Err(RegistryError::validation(
            field,
            format!("can't be longer than {} characters", max),
        ));
    }
    Ok(value.to_string())
}

fn validate_optional(field: &'static str, value: Option<&str>, max: usize) -> Result<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => validate_required(field, v, max).map(Some),
        None => Ok(None),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};

    fn new_code(code: &str, iso: &str) -> NewBankCode {
        NewBankCode {
            swift_code: code.to_string(),
            bank_name: "Bank A".to_string(),
            address: Some("Addr1".to_string()),
            branch_name: None,
            country_iso2: iso.to_string(),
            is_headquarters: is_headquarters_code(&code.to_uppercase()),
        }
    }

    fn seeded<S: CountryStore + BankCodeStore>(store: &S) -> RegistryService<'_, S> {
        let service = RegistryService::new(store);
        service
            .create_country(&NewCountry {
                iso_code: "pl".to_string(),
                name: "POLAND".to_string(),
            })
            .unwrap();
        service
    }

    #[test]
    fn test_create_country_conflict() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        let dup = service.create_country(&NewCountry {
            iso_code: "PL".to_string(),
            name: "POLAND AGAIN".to_string(),
        });
        assert!(matches!(dup, Err(RegistryError::Conflict { .. })));
    }

    #[test]
    fn test_create_country_validation() {
        let store = MemoryStore::new();
        let service = RegistryService::new(&store);

        let bad_iso = service.create_country(&NewCountry {
            iso_code: "POL".to_string(),
            name: "POLAND".to_string(),
        });
        assert!(matches!(bad_iso, Err(RegistryError::Validation { .. })));

        let blank = service.create_country(&NewCountry {
            iso_code: "PL".to_string(),
            name: "  ".to_string(),
        });
        assert!(matches!(blank, Err(RegistryError::Validation { .. })));
    }

    #[test]
    fn test_rename_country_keeps_iso_code() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        let renamed = service.rename_country("pl", "REPUBLIC OF POLAND").unwrap();
        assert_eq!(renamed.iso_code, "PL");
        assert_eq!(service.get_country("PL").unwrap().name, "REPUBLIC OF POLAND");

        let missing = service.rename_country("DE", "GERMANY");
        assert!(matches!(missing, Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn test_create_branch_requires_headquarters() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        let orphan = service.create_bank_code(&new_code("AAAAPLPW001", "PL"));
        assert!(matches!(
            orphan,
            Err(RegistryError::NotFound { entity: "headquarters", .. })
        ));

        let hq = service.create_bank_code(&new_code("AAAAPLPWXXX", "PL")).unwrap();
        let branch = service.create_bank_code(&new_code("AAAAPLPW001", "PL")).unwrap();
        assert_eq!(branch.headquarters_id, Some(hq.id));
    }

    #[test]
    fn test_create_bank_code_conflict_and_missing_country() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        service.create_bank_code(&new_code("AAAAPLPWXXX", "PL")).unwrap();
        let dup = service.create_bank_code(&new_code("aaaaplpwxxx", "PL"));
        assert!(matches!(dup, Err(RegistryError::Conflict { .. })));

        let no_country = service.create_bank_code(&new_code("BBBBDEFFXXX", "DE"));
        assert!(matches!(no_country, Err(RegistryError::NotFound { entity: "country", .. })));
    }

    #[test]
    fn test_create_bank_code_flag_must_match_suffix() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        let mut request = new_code("AAAAPLPWXXX", "PL");
        request.is_headquarters = false;
        let result = service.create_bank_code(&request);
        assert!(matches!(result, Err(RegistryError::Validation { .. })));
    }

    #[test]
    fn test_headquarters_details_list_branches() {
        let store = SqliteStore::open_in_memory().unwrap();
        let service = seeded(&store);

        service.create_bank_code(&new_code("AAAAPLPWXXX", "PL")).unwrap();
        service.create_bank_code(&new_code("AAAAPLPW001", "PL")).unwrap();
        service.create_bank_code(&new_code("AAAAPLPW002", "PL")).unwrap();

        let details = service.get_bank_code("aaaaplpwxxx").unwrap();
        assert!(details.is_headquarters);
        assert_eq!(details.country_name, "POLAND");
        let branches = details.branches.unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].swift_code, "AAAAPLPW001");
        assert_eq!(branches[0].country_iso2, "PL");

        let branch = service.get_bank_code("AAAAPLPW001").unwrap();
        assert_eq!(branch.branches, None);

        let json = serde_json::to_value(&branch).unwrap();
        assert_eq!(json["isHeadquarter"], false);
        assert_eq!(json["countryISO2"], "PL");
        assert!(json.get("branches").is_none());
    }

    #[test]
    fn test_codes_by_country() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        service.create_bank_code(&new_code("AAAAPLPWXXX", "PL")).unwrap();
        service.create_bank_code(&new_code("AAAAPLPW001", "PL")).unwrap();

        let listing = service.get_bank_codes_by_country("pl").unwrap();
        assert_eq!(listing.country_iso2, "PL");
        assert_eq!(listing.swift_codes.len(), 2);

        let missing = service.get_bank_codes_by_country("DE");
        assert!(matches!(missing, Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn test_delete_country_cascades() {
        let store = SqliteStore::open_in_memory().unwrap();
        let service = seeded(&store);

        service.create_bank_code(&new_code("AAAAPLPWXXX", "PL")).unwrap();
        service.delete_country("PL").unwrap();

        assert!(matches!(
            service.get_bank_code("AAAAPLPWXXX"),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(service.list_countries().unwrap().is_empty());
    }

    #[test]
    fn test_delete_headquarters_unlinks_branch() {
        let store = MemoryStore::new();
        let service = seeded(&store);

        service.create_bank_code(&new_code("AAAAPLPWXXX", "PL")).unwrap();
        service.create_bank_code(&new_code("AAAAPLPW001", "PL")).unwrap();
        service.delete_bank_code("AAAAPLPWXXX").unwrap();

        let branch = store.find_by_code("AAAAPLPW001").unwrap().unwrap();
        assert_eq!(branch.headquarters_id, None);

        let missing = service.delete_bank_code("AAAAPLPWXXX");
        assert!(matches!(missing, Err(RegistryError::NotFound { .. })));
    }
}
